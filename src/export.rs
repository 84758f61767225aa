//! Writing symbolicated reports to disk.

use std::fs;
use std::io;
use std::path::Path;

use time::macros::format_description;
use time::OffsetDateTime;

/// `symbolicated_YYYYMMDD_HHMMSS.crash`
pub fn default_file_name(now: OffsetDateTime) -> String {
    let format = format_description!("[year][month][day]_[hour][minute][second]");
    let stamp = now
        .format(&format)
        .unwrap_or_else(|_| now.unix_timestamp().to_string());
    format!("symbolicated_{}.crash", stamp)
}

pub fn write_report(path: &Path, text: &str) -> io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, text)?;
    tracing::info!(path = %path.display(), bytes = text.len(), "wrote report");
    Ok(())
}
