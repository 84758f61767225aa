//! Line-by-line address substitution.

use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::batch::ReportSymbolicator;
use crate::error::{Error, Result};
use crate::tool::ExternalResolver;

static ADDRESS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"0x[0-9a-fA-F]+").expect("address pattern is valid"));

/// Counts for one processed line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LineStats {
    pub matched: usize,
    pub replaced: usize,
    /// Tokens whose resolver call returned an error.
    pub failed: usize,
}

impl LineStats {
    fn add(&mut self, other: LineStats) {
        self.matched += other.matched;
        self.replaced += other.replaced;
        self.failed += other.failed;
    }
}

/// Replaces every hex address token with what the resolver reports for it.
pub struct AddressPipeline<'r, R: ?Sized> {
    resolver: &'r R,
    binary: PathBuf,
}

impl<'r, R: ExternalResolver + ?Sized> AddressPipeline<'r, R> {
    pub fn new(resolver: &'r R, binary: impl Into<PathBuf>) -> Self {
        Self {
            resolver,
            binary: binary.into(),
        }
    }

    /// Symbolicates each line of `text`, keeping the original line separators.
    /// Best-effort: unresolved tokens stay as they are.
    pub fn symbolicate_text(&self, text: &str) -> String {
        self.run(text).0
    }

    /// Like [`symbolicate_text`](Self::symbolicate_text), but fails with the last
    /// resolver error when no token was replaced and at least one lookup errored.
    pub fn try_symbolicate_text(&self, text: &str) -> Result<String> {
        let (out, total, last_error) = self.run(text);
        match last_error {
            Some(err) if total.replaced == 0 => Err(err),
            _ => Ok(out),
        }
    }

    fn run(&self, text: &str) -> (String, LineStats, Option<Error>) {
        let mut out = String::with_capacity(text.len());
        let mut total = LineStats::default();
        let mut last_error = None;
        for segment in text.split_inclusive('\n') {
            let (line, ending) = split_ending(segment);
            let (resolved, stats) = self.substitute(line, &mut last_error);
            total.add(stats);
            out.push_str(&resolved);
            out.push_str(ending);
        }
        tracing::debug!(
            matched = total.matched,
            replaced = total.replaced,
            failed = total.failed,
            "address pipeline finished"
        );
        (out, total, last_error)
    }

    pub fn symbolicate_line(&self, line: &str) -> String {
        self.symbolicate_line_counted(line).0
    }

    pub fn symbolicate_line_counted(&self, line: &str) -> (String, LineStats) {
        self.substitute(line, &mut None)
    }

    /// Matches are substituted right to left so the byte ranges of earlier matches
    /// stay valid. Failed or empty resolutions leave the token in place.
    fn substitute(&self, line: &str, last_error: &mut Option<Error>) -> (String, LineStats) {
        let ranges: Vec<_> = ADDRESS.find_iter(line).map(|m| m.range()).collect();
        let mut stats = LineStats {
            matched: ranges.len(),
            ..LineStats::default()
        };
        let mut out = line.to_owned();
        for range in ranges.into_iter().rev() {
            let address = &line[range.clone()];
            match self.resolver.resolve(&self.binary, None, &[address]) {
                Ok(symbol) => {
                    let symbol = symbol.trim();
                    if symbol.is_empty() {
                        continue;
                    }
                    out.replace_range(range, symbol);
                    stats.replaced += 1;
                }
                Err(err) => {
                    tracing::warn!(address, error = %err, "could not resolve address");
                    stats.failed += 1;
                    *last_error = Some(err);
                }
            }
        }
        (out, stats)
    }
}

impl<'r, R: ExternalResolver + ?Sized> ReportSymbolicator for AddressPipeline<'r, R> {
    fn symbolicate_report(&self, _path: &Path, contents: &str) -> Result<String> {
        self.try_symbolicate_text(contents)
    }
}

fn split_ending(segment: &str) -> (&str, &str) {
    if let Some(line) = segment.strip_suffix("\r\n") {
        (line, "\r\n")
    } else if let Some(line) = segment.strip_suffix('\n') {
        (line, "\n")
    } else {
        (segment, "")
    }
}
