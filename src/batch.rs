//! Batch symbolication of the crash logs inside an `.xccrashpoint` bundle.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rayon::prelude::*;

use crate::error::{Error, Result};

const CRASH_EXTENSION: &str = "crash";

/// Turns one crash report into its symbolicated text.
pub trait ReportSymbolicator: Sync {
    fn symbolicate_report(&self, path: &Path, contents: &str) -> Result<String>;
}

/// One crash report within a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrashItem {
    pub id: usize,
    pub file_name: String,
    pub raw: String,
    /// `None` when symbolication of this report failed.
    pub symbolicated: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

pub struct BatchLoader<'s, S: ?Sized> {
    symbolicator: &'s S,
    cancel: CancelToken,
}

impl<'s, S: ReportSymbolicator + ?Sized> BatchLoader<'s, S> {
    pub fn new(symbolicator: &'s S) -> Self {
        Self {
            symbolicator,
            cancel: CancelToken::new(),
        }
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Symbolicates every `Filters/<first subfolder>/logs/*.crash` file in parallel and
    /// returns once all of them are done. Item order is unspecified.
    pub fn load(&self, bundle: &Path) -> Result<Vec<CrashItem>> {
        let logs = match logs_dir(bundle) {
            Some(logs) => logs,
            None => {
                tracing::warn!(bundle = %bundle.display(), "no Filters/*/logs directory");
                return Ok(Vec::new());
            }
        };

        let files = crash_files(&logs);
        tracing::info!(count = files.len(), logs = %logs.display(), "symbolicating batch");

        let items: Vec<CrashItem> = files
            .par_iter()
            .enumerate()
            .filter_map(|(id, path)| self.load_one(id, path))
            .collect();

        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        Ok(items)
    }

    fn load_one(&self, id: usize, path: &Path) -> Option<CrashItem> {
        if self.cancel.is_cancelled() {
            return None;
        }

        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "skipping unreadable log");
                return None;
            }
        };

        let symbolicated = match self.symbolicator.symbolicate_report(path, &raw) {
            Ok(text) => Some(text),
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "symbolication failed");
                None
            }
        };

        Some(CrashItem {
            id,
            file_name: path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default(),
            raw,
            symbolicated,
        })
    }
}

fn logs_dir(bundle: &Path) -> Option<PathBuf> {
    let mut filters: Vec<PathBuf> = fs::read_dir(bundle.join("Filters"))
        .ok()?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .collect();
    filters.sort();
    let logs = filters.into_iter().next()?.join("logs");
    logs.is_dir().then(|| logs)
}

fn crash_files(logs: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = match fs::read_dir(logs) {
        Ok(read) => read
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.extension().map_or(false, |ext| ext == CRASH_EXTENSION))
            .collect(),
        Err(err) => {
            tracing::warn!(logs = %logs.display(), error = %err, "cannot list logs");
            Vec::new()
        }
    };
    files.sort();
    files
}
