//! External symbolication tools: `atos` and `symbolicatecrash`.
//!
//! See TN2151, "Symbolicating with atos":
//! https://developer.apple.com/library/archive/technotes/tn2151/_index.html

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use crate::batch::ReportSymbolicator;
use crate::config::Config;
use crate::error::{Error, Result};

/// A program plus the arguments that always precede the per-call ones
/// (`xcrun` needs `atos` first).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    program: PathBuf,
    leading: Vec<String>,
}

impl ToolCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            leading: Vec::new(),
        }
    }

    pub fn with_leading_arg(mut self, arg: impl Into<String>) -> Self {
        self.leading.push(arg.into());
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn leading_args(&self) -> &[String] {
        &self.leading
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.leading);
        command
    }

    fn display_name(&self) -> String {
        self.program.display().to_string()
    }
}

/// Resolves addresses in `binary` to symbol text.
pub trait ExternalResolver: Sync {
    fn resolve(&self, binary: &Path, load_address: Option<&str>, addresses: &[&str])
        -> Result<String>;
}

/// `atos -o <binary> -arch <arch> [-l <load address>] <address>...`
#[derive(Debug, Clone)]
pub struct Atos {
    command: ToolCommand,
    arch: String,
}

impl Atos {
    pub fn new(command: ToolCommand, arch: impl Into<String>) -> Self {
        Self {
            command,
            arch: arch.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.atos_command(), config.arch())
    }

    pub fn with_arch(mut self, arch: impl Into<String>) -> Self {
        self.arch = arch.into();
        self
    }

    pub fn arch(&self) -> &str {
        &self.arch
    }

    fn arguments(
        &self,
        binary: &Path,
        load_address: Option<&str>,
        addresses: &[&str],
    ) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "-o".into(),
            binary.as_os_str().to_owned(),
            "-arch".into(),
            self.arch.as_str().into(),
        ];
        if let Some(load) = load_address {
            args.push("-l".into());
            args.push(load.into());
        }
        args.extend(addresses.iter().map(OsString::from));
        args
    }
}

impl ExternalResolver for Atos {
    fn resolve(
        &self,
        binary: &Path,
        load_address: Option<&str>,
        addresses: &[&str],
    ) -> Result<String> {
        let mut command = self.command.command();
        command.args(self.arguments(binary, load_address, addresses));
        tracing::trace!(?addresses, ?load_address, "invoking atos");
        let output = command
            .output()
            .map_err(|err| Error::process(self.command.display_name(), err))?;
        stdout_of(&self.command.display_name(), output)
    }
}

/// Xcode's `symbolicatecrash`, run with `DEVELOPER_DIR` and `DEVELOPER_SYMBOL_PATH` set.
#[derive(Debug, Clone)]
pub struct SymbolicateCrash {
    command: ToolCommand,
    developer_dir: PathBuf,
    symbol_path: PathBuf,
}

impl SymbolicateCrash {
    pub fn new(config: &Config, symbol_path: impl Into<PathBuf>) -> Self {
        Self {
            command: ToolCommand::new(&config.tools.symbolicatecrash),
            developer_dir: config.tools.developer_dir.clone(),
            symbol_path: symbol_path.into(),
        }
    }

    pub fn run(&self, report: &Path) -> Result<String> {
        let mut command = self.command.command();
        command
            .arg(report)
            .env("DEVELOPER_DIR", &self.developer_dir)
            .env("DEVELOPER_SYMBOL_PATH", &self.symbol_path);
        tracing::debug!(report = %report.display(), symbols = %self.symbol_path.display(), "invoking symbolicatecrash");
        let output = command
            .output()
            .map_err(|err| Error::process(self.command.display_name(), err))?;
        stdout_of(&self.command.display_name(), output)
    }
}

impl ReportSymbolicator for SymbolicateCrash {
    fn symbolicate_report(&self, path: &Path, _contents: &str) -> Result<String> {
        self.run(path)
    }
}

fn stdout_of(program: &str, output: Output) -> Result<String> {
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::process(
            program,
            format!("{} {}", output.status, stderr.trim()),
        ));
    }
    String::from_utf8(output.stdout).map_err(|err| Error::process(program, err))
}
