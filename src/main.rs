#[macro_use]
extern crate clap;

use std::collections::HashSet;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use ansi_term::Style;
use anyhow::{Context, Result};
use clap::{App, AppSettings, Arg, ArgMatches, SubCommand};
use time::OffsetDateTime;

use crashsym::address;
use crashsym::artifact::{self, BatchTool, Options, Outcome, Symbols};
use crashsym::batch::CrashItem;
use crashsym::config::Config;
use crashsym::export;
use crashsym::ips;
use crashsym::tool::Atos;

fn main() -> Result<()> {
    let matches = app().get_matches();
    let (name, sub) = matches.subcommand();
    let sub = match sub {
        Some(sub) => sub,
        None => anyhow::bail!("no subcommand given"),
    };

    crashsym::init_logging(
        matches
            .occurrences_of("verbose")
            .max(sub.occurrences_of("verbose")),
    );

    let mut config = Config::load(global(&matches, sub, "config").map(Path::new))?;
    if let Some(arch) = global(&matches, sub, "arch") {
        config.arch = Some(arch.to_owned());
    }
    if let Some(atos) = global(&matches, sub, "atos") {
        config.tools.atos = Some(PathBuf::from(atos));
    }
    let style = if matches.is_present("no_color") || sub.is_present("no_color") {
        Style::new()
    } else {
        Style::new().bold()
    };

    match name {
        "report" => report(&config, sub, style),
        "address" => addresses(&config, sub, style),
        "locate" => locate(sub),
        "convert" => convert(sub),
        other => anyhow::bail!("unknown subcommand `{}`", other),
    }
}

/// Global flags may be given before or after the subcommand name.
fn global<'a>(top: &'a ArgMatches, sub: &'a ArgMatches, name: &str) -> Option<&'a str> {
    sub.value_of(name).or_else(|| top.value_of(name))
}

fn app() -> App<'static, 'static> {
    let dsym = Arg::with_name("dsym")
        .required(true)
        .short("d")
        .long("dsym")
        .takes_value(true)
        .help("The path to a .dSYM bundle or an .xcarchive (eg. Some.app.dSYM)");
    let output = Arg::with_name("output")
        .short("o")
        .long("output")
        .takes_value(true)
        .help("Write the result to this file, or into this directory with a timestamped name");

    App::new(crate_name!())
        .version(crate_version!())
        .about(crate_description!())
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .arg(
            Arg::with_name("verbose")
                .short("v")
                .long("verbose")
                .multiple(true)
                .global(true)
                .help("Increase log verbosity (-v info, -vv debug, -vvv trace)"),
        )
        .arg(
            Arg::with_name("config")
                .long("config")
                .takes_value(true)
                .global(true)
                .help("An additional TOML config file"),
        )
        .arg(
            Arg::with_name("arch")
                .long("arch")
                .takes_value(true)
                .global(true)
                .help("CPU architecture passed to atos (default arm64)"),
        )
        .arg(
            Arg::with_name("atos")
                .long("atos")
                .takes_value(true)
                .global(true)
                .help("The path to atos, skipping the probe list"),
        )
        .arg(
            Arg::with_name("no_color")
                .long("no-color")
                .global(true)
                .help("Do not highlight symbolicated output"),
        )
        .subcommand(
            SubCommand::with_name("report")
                .about("Symbolicate a .log, .ips, .crash or .xccrashpoint")
                .arg(
                    Arg::with_name("crash_log")
                        .required(true)
                        .short("c")
                        .long("crash_log")
                        .takes_value(true)
                        .help("The path to a crash log"),
                )
                .arg(dsym.clone())
                .arg(output.clone())
                .arg(
                    Arg::with_name("symbolicatecrash")
                        .long("symbolicatecrash")
                        .help("Symbolicate .xccrashpoint logs with symbolicatecrash instead of atos"),
                ),
        )
        .subcommand(
            SubCommand::with_name("address")
                .about("Resolve `<crash address> <load address>` pairs (read from stdin if none are given)")
                .arg(dsym.clone())
                .arg(
                    Arg::with_name("pairs")
                        .multiple(true)
                        .help("Pairs such as \"0x0000000103385dfc 0x102ed4000\""),
                ),
        )
        .subcommand(
            SubCommand::with_name("locate")
                .about("Print the DWARF executable inside a .dSYM or .xcarchive")
                .arg(dsym),
        )
        .subcommand(
            SubCommand::with_name("convert")
                .about("Render a JSON .ips report as plain crash text")
                .arg(
                    Arg::with_name("ips")
                        .required(true)
                        .takes_value(true)
                        .help("The path to a JSON .ips report"),
                )
                .arg(output),
        )
}

fn symbols_of(matches: &ArgMatches) -> Result<Symbols> {
    let path = matches
        .value_of("dsym")
        .ok_or(crashsym::Error::MissingInput("dSYM"))?;
    Symbols::locate(Path::new(path)).with_context(|| format!("cannot use symbols at {}", path))
}

fn report(config: &Config, matches: &ArgMatches, style: Style) -> Result<()> {
    let crash_log = matches
        .value_of("crash_log")
        .ok_or(crashsym::Error::MissingInput("crash log"))?;
    let symbols = symbols_of(matches)?;

    let options = Options {
        batch_tool: if matches.is_present("symbolicatecrash") {
            BatchTool::SymbolicateCrash
        } else {
            BatchTool::Atos
        },
        ..Options::default()
    };
    let outcome = artifact::symbolicate(config, Path::new(crash_log), &symbols, options)
        .with_context(|| format!("could not symbolicate {}", crash_log))?;

    let output = matches.value_of("output");
    let style = if output.is_some() { Style::new() } else { style };
    match outcome {
        Outcome::Report { raw, symbolicated } => {
            emit(&highlight(&raw, &symbolicated, style), output)
        }
        Outcome::Batch(mut items) => {
            items.sort_by(|a, b| a.file_name.cmp(&b.file_name));
            emit(&render_batch(&items, style), output)
        }
    }
}

/// Paints the lines symbolication changed.
fn highlight(raw: &str, symbolicated: &str, style: Style) -> String {
    let unchanged: HashSet<&str> = raw.lines().collect();
    let mut out = String::with_capacity(symbolicated.len());
    for line in symbolicated.lines() {
        if unchanged.contains(line) {
            out.push_str(line);
        } else {
            out.push_str(&style.paint(line).to_string());
        }
        out.push('\n');
    }
    out
}

fn render_batch(items: &[CrashItem], style: Style) -> String {
    let mut out = String::new();
    for item in items {
        out.push_str(&format!("{}\n", style.paint(format!("==> {}", item.file_name))));
        match &item.symbolicated {
            Some(text) => out.push_str(&highlight(&item.raw, text, style)),
            None => out.push_str("(symbolication failed)\n"),
        }
        if !out.ends_with('\n') {
            out.push('\n');
        }
    }
    out
}

fn addresses(config: &Config, matches: &ArgMatches, style: Style) -> Result<()> {
    let symbols = symbols_of(matches)?;
    let input = match matches.values_of("pairs") {
        Some(pairs) => pairs.collect::<Vec<_>>().join("\n"),
        None => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("could not read address pairs from stdin")?;
            buf
        }
    };

    let atos = Atos::from_config(config);
    let resolved = address::resolve_lines(&atos, &symbols.executable, &input)?;
    for line in resolved.lines() {
        println!("{}", style.paint(line));
    }
    Ok(())
}

fn locate(matches: &ArgMatches) -> Result<()> {
    let symbols = symbols_of(matches)?;
    println!("{}", symbols.executable.display());
    Ok(())
}

fn convert(matches: &ArgMatches) -> Result<()> {
    let path = matches
        .value_of("ips")
        .ok_or(crashsym::Error::MissingInput("ips report"))?;
    let text = fs::read_to_string(path).with_context(|| format!("could not read {}", path))?;
    let report = ips::parse_document(&text)?;
    emit(&ips::to_crash_text(&report), matches.value_of("output"))
}

fn emit(text: &str, output: Option<&str>) -> Result<()> {
    match output {
        Some(target) => {
            let mut path = PathBuf::from(target);
            if path.is_dir() {
                path.push(export::default_file_name(OffsetDateTime::now_utc()));
            }
            export::write_report(&path, text)
                .with_context(|| format!("could not write {}", path.display()))?;
            eprintln!("wrote {}", path.display());
        }
        None => print!("{}", text),
    }
    Ok(())
}
