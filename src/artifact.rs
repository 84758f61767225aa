//! Classifying dropped-in artifacts and routing them to the right symbolicator.

use std::fs;
use std::path::{Path, PathBuf};

use crate::batch::{BatchLoader, CancelToken, CrashItem, ReportSymbolicator};
use crate::config::Config;
use crate::dsym;
use crate::error::{Error, Result};
use crate::images;
use crate::pipeline::AddressPipeline;
use crate::tool::{Atos, SymbolicateCrash};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Ips,
    Log,
    Crash,
    CrashPoint,
    Archive,
    Dsym,
}

impl ArtifactKind {
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .ok_or_else(|| Error::UnsupportedInput(path.to_path_buf()))?;
        match ext.as_str() {
            "ips" => Ok(ArtifactKind::Ips),
            "log" => Ok(ArtifactKind::Log),
            "crash" => Ok(ArtifactKind::Crash),
            "xccrashpoint" => Ok(ArtifactKind::CrashPoint),
            "xcarchive" => Ok(ArtifactKind::Archive),
            "dsym" => Ok(ArtifactKind::Dsym),
            _ => Err(Error::UnsupportedInput(path.to_path_buf())),
        }
    }
}

/// A dSYM bundle and the DWARF executable found inside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbols {
    pub bundle: PathBuf,
    pub executable: PathBuf,
}

impl Symbols {
    /// Accepts either a `.dSYM` bundle or an `.xcarchive` containing one.
    pub fn locate(path: &Path) -> Result<Self> {
        let bundle = match ArtifactKind::from_path(path)? {
            ArtifactKind::Dsym => path.to_path_buf(),
            ArtifactKind::Archive => dsym::locate_in_archive(path)?,
            _ => return Err(Error::UnsupportedInput(path.to_path_buf())),
        };
        let executable = dsym::require_dwarf_executable(&bundle)?;
        Ok(Self { bundle, executable })
    }
}

/// Which tool symbolicates each report of an `.xccrashpoint` batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchTool {
    Atos,
    SymbolicateCrash,
}

impl Default for BatchTool {
    fn default() -> Self {
        BatchTool::Atos
    }
}

#[derive(Debug, Clone, Default)]
pub struct Options {
    pub cancel: CancelToken,
    pub batch_tool: BatchTool,
}

#[derive(Debug)]
pub enum Outcome {
    Report { raw: String, symbolicated: String },
    Batch(Vec<CrashItem>),
}

/// `.log` goes through per-address atos, `.ips`/`.crash` through symbolicatecrash,
/// `.xccrashpoint` through the batch loader.
pub fn symbolicate(
    config: &Config,
    crash: &Path,
    symbols: &Symbols,
    options: Options,
) -> Result<Outcome> {
    match ArtifactKind::from_path(crash)? {
        ArtifactKind::Log => {
            let raw = read(crash)?;
            let symbolicated = ReportAtos::new(config, &symbols.executable)
                .symbolicate_report(crash, &raw)?;
            Ok(Outcome::Report { raw, symbolicated })
        }
        ArtifactKind::Ips | ArtifactKind::Crash => {
            let raw = read(crash)?;
            let symbolicated = SymbolicateCrash::new(config, &symbols.bundle).run(crash)?;
            Ok(Outcome::Report { raw, symbolicated })
        }
        ArtifactKind::CrashPoint => {
            let items = match options.batch_tool {
                BatchTool::Atos => {
                    let atos = ReportAtos::new(config, &symbols.executable);
                    BatchLoader::new(&atos)
                        .with_cancel_token(options.cancel)
                        .load(crash)?
                }
                BatchTool::SymbolicateCrash => {
                    let tool = SymbolicateCrash::new(config, &symbols.bundle);
                    BatchLoader::new(&tool)
                        .with_cancel_token(options.cancel)
                        .load(crash)?
                }
            };
            Ok(Outcome::Batch(items))
        }
        ArtifactKind::Archive | ArtifactKind::Dsym => {
            Err(Error::UnsupportedInput(crash.to_path_buf()))
        }
    }
}

fn read(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|err| Error::read(path, err))
}

/// Runs the address pipeline with an atos whose arch is picked per report.
struct ReportAtos<'a> {
    config: &'a Config,
    binary: &'a Path,
}

impl<'a> ReportAtos<'a> {
    fn new(config: &'a Config, binary: &'a Path) -> Self {
        Self { config, binary }
    }
}

impl ReportSymbolicator for ReportAtos<'_> {
    fn symbolicate_report(&self, _path: &Path, contents: &str) -> Result<String> {
        let atos = atos_for(self.config, contents);
        AddressPipeline::new(&atos, self.binary).try_symbolicate_text(contents)
    }
}

/// An explicitly configured arch wins; otherwise the report's main image decides.
fn atos_for(config: &Config, report: &str) -> Atos {
    let atos = Atos::from_config(config);
    if config.arch.is_some() {
        return atos;
    }
    match images::detect_arch(report) {
        Some(arch) => {
            tracing::debug!(%arch, "architecture taken from Binary Images");
            atos.with_arch(arch)
        }
        None => atos,
    }
}
