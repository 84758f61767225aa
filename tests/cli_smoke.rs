use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;

fn dsym_bundle(root: &Path) -> PathBuf {
    let bundle = root.join("Demo.app.dSYM");
    let dwarf = bundle.join("Contents/Resources/DWARF");
    fs::create_dir_all(&dwarf).unwrap();
    fs::write(dwarf.join("Demo"), b"").unwrap();
    bundle
}

#[cfg(unix)]
fn fake_atos(root: &Path) -> PathBuf {
    script(root, "atos", "echo 'main (in Demo) (main.m:14)'")
}

#[cfg(unix)]
fn script(root: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let script = root.join(name);
    fs::write(&script, format!("#!/bin/sh\n{}\n", body)).unwrap();
    fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();
    script
}

#[cfg(unix)]
fn crashpoint(root: &Path, files: &[(&str, &str)]) -> PathBuf {
    let bundle = root.join("Demo.xccrashpoint");
    let logs = bundle.join("Filters/Filter_1/logs");
    fs::create_dir_all(&logs).unwrap();
    for (name, contents) in files {
        fs::write(logs.join(name), contents).unwrap();
    }
    bundle
}

#[test]
fn help_displays_usage() {
    Command::cargo_bin("crashsym")
        .expect("binary exists")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("USAGE"));
}

#[test]
fn locate_prints_dwarf_path() {
    let temp = tempfile::tempdir().unwrap();
    let bundle = dsym_bundle(temp.path());

    Command::cargo_bin("crashsym")
        .unwrap()
        .args(&["locate", "-d"])
        .arg(&bundle)
        .assert()
        .success()
        .stdout(predicate::str::contains("Contents/Resources/DWARF/Demo"));
}

#[test]
fn locate_fails_without_dwarf() {
    let temp = tempfile::tempdir().unwrap();
    let bundle = temp.path().join("Empty.app.dSYM");
    fs::create_dir_all(&bundle).unwrap();

    Command::cargo_bin("crashsym")
        .unwrap()
        .args(&["locate", "-d"])
        .arg(&bundle)
        .assert()
        .failure()
        .stderr(predicate::str::contains("no DWARF executable"));
}

#[cfg(unix)]
#[test]
fn report_substitutes_addresses_in_log() {
    let temp = tempfile::tempdir().unwrap();
    let bundle = dsym_bundle(temp.path());
    let atos = fake_atos(temp.path());
    let log = temp.path().join("umeng.log");
    fs::write(&log, "Thread 0 Crashed:\n0 Demo 0x0000000100004abc\n").unwrap();

    Command::cargo_bin("crashsym")
        .unwrap()
        .arg("report")
        .arg("--no-color")
        .arg("-c")
        .arg(&log)
        .arg("-d")
        .arg(&bundle)
        .arg("--atos")
        .arg(&atos)
        .assert()
        .success()
        .stdout(predicate::eq(
            "Thread 0 Crashed:\n0 Demo main (in Demo) (main.m:14)\n",
        ));
}

#[cfg(unix)]
#[test]
fn report_highlights_symbolicated_lines() {
    let temp = tempfile::tempdir().unwrap();
    let bundle = dsym_bundle(temp.path());
    let atos = fake_atos(temp.path());
    let log = temp.path().join("umeng.log");
    fs::write(&log, "Thread 0 Crashed:\n0 Demo 0x0000000100004abc\n").unwrap();

    Command::cargo_bin("crashsym")
        .unwrap()
        .arg("report")
        .arg("-c")
        .arg(&log)
        .arg("-d")
        .arg(&bundle)
        .arg("--atos")
        .arg(&atos)
        .assert()
        .success()
        .stdout(predicate::str::starts_with("Thread 0 Crashed:\n"))
        .stdout(predicate::str::contains(
            "\u{1b}[1m0 Demo main (in Demo) (main.m:14)\u{1b}[0m",
        ));
}

#[cfg(unix)]
#[test]
fn report_uses_arch_of_main_image() {
    let temp = tempfile::tempdir().unwrap();
    let bundle = dsym_bundle(temp.path());
    // atos is called as `-o <binary> -arch <arch> <address>`.
    let atos = script(temp.path(), "atos", "echo \"arch=$4\"");
    let log = temp.path().join("intel.log");
    fs::write(
        &log,
        "0 Demo 0x10\n\nBinary Images:\n       0x100000000 -        0x100ffffff Demo x86_64  <00112233445566778899aabbccddeeff> /Demo\n",
    )
    .unwrap();

    Command::cargo_bin("crashsym")
        .unwrap()
        .args(&["report", "--no-color", "-c"])
        .arg(&log)
        .arg("-d")
        .arg(&bundle)
        .arg("--atos")
        .arg(&atos)
        .assert()
        .success()
        .stdout(predicate::str::contains("0 Demo arch=x86_64\n"));
}

#[cfg(unix)]
#[test]
fn report_on_crashpoint_prints_each_log() {
    let temp = tempfile::tempdir().unwrap();
    let bundle = dsym_bundle(temp.path());
    let atos = fake_atos(temp.path());
    let crashpoint = crashpoint(
        temp.path(),
        &[("a.crash", "0 Demo 0x10\n"), ("b.crash", "0 Demo 0x20\n")],
    );

    Command::cargo_bin("crashsym")
        .unwrap()
        .args(&["report", "--no-color", "-c"])
        .arg(&crashpoint)
        .arg("-d")
        .arg(&bundle)
        .arg("--atos")
        .arg(&atos)
        .assert()
        .success()
        .stdout(predicate::eq(
            "==> a.crash\n0 Demo main (in Demo) (main.m:14)\n==> b.crash\n0 Demo main (in Demo) (main.m:14)\n",
        ));
}

#[cfg(unix)]
#[test]
fn report_on_crashpoint_marks_failed_logs() {
    let temp = tempfile::tempdir().unwrap();
    let bundle = dsym_bundle(temp.path());
    let atos = script(temp.path(), "atos", "exit 1");
    let crashpoint = crashpoint(temp.path(), &[("a.crash", "0 Demo 0x10\n")]);

    Command::cargo_bin("crashsym")
        .unwrap()
        .args(&["report", "--no-color", "-c"])
        .arg(&crashpoint)
        .arg("-d")
        .arg(&bundle)
        .arg("--atos")
        .arg(&atos)
        .assert()
        .success()
        .stdout(predicate::str::contains("==> a.crash\n"))
        .stdout(predicate::str::contains("(symbolication failed)"));
}

#[cfg(unix)]
#[test]
fn address_pairs_are_resolved_and_bad_lines_marked() {
    let temp = tempfile::tempdir().unwrap();
    let bundle = dsym_bundle(temp.path());
    let atos = fake_atos(temp.path());

    Command::cargo_bin("crashsym")
        .unwrap()
        .arg("address")
        .arg("--no-color")
        .arg("-d")
        .arg(&bundle)
        .arg("--atos")
        .arg(&atos)
        .write_stdin("0x0000000103385dfc 0x102ed4000\n0x1\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("main (in Demo) (main.m:14)"))
        .stdout(predicate::str::contains("0x1: symbolication failed"));
}

#[test]
fn convert_renders_ips_json() {
    let temp = tempfile::tempdir().unwrap();
    let ips = temp.path().join("Demo.ips");
    fs::write(
        &ips,
        r#"{"metadata": {"appName": "Demo"}, "threads": [{"id": 0, "triggered": true, "frames": []}]}"#,
    )
    .unwrap();
    let out = temp.path().join("out.crash");

    Command::cargo_bin("crashsym")
        .unwrap()
        .arg("convert")
        .arg(&ips)
        .arg("-o")
        .arg(&out)
        .assert()
        .success();

    assert_eq!(
        fs::read_to_string(out).unwrap(),
        "App Name: Demo\n\nThread 0 Crashed:\n"
    );
}
