//! Rendering iOS 16+ JSON `.ips` reports as plain crash text.

use std::fmt::Write;

use serde::Deserialize;

use crate::error::{Error, Result};

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct IpsReport {
    pub system: Option<System>,
    pub metadata: Option<Metadata>,
    pub crash: Option<Crash>,
    pub threads: Vec<Thread>,
    pub used_images: Vec<Image>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct System {
    pub os_version: Option<String>,
    pub os_build: Option<String>,
    pub architecture: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Metadata {
    pub app_name: Option<String>,
    pub app_version: Option<String>,
    pub app_build_version: Option<String>,
    pub process_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Crash {
    pub exception_type: Option<String>,
    pub termination: Option<Termination>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Termination {
    pub reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Thread {
    pub id: Option<i64>,
    pub triggered: bool,
    pub frames: Vec<Frame>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Frame {
    pub image: Option<String>,
    pub symbol: Option<String>,
    pub offset: Option<i64>,
    pub image_index: Option<usize>,
    pub image_offset: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Image {
    pub name: Option<String>,
}

/// Accepts a single JSON object, or the two-part `.ips` layout where a one-line
/// header object precedes the report body.
pub fn parse_document(text: &str) -> Result<IpsReport> {
    match serde_json::from_str(text) {
        Ok(report) => Ok(report),
        Err(whole) => {
            let body = text
                .split_once('\n')
                .map(|(_, body)| body)
                .ok_or_else(|| Error::MalformedReport(whole.to_string()))?;
            serde_json::from_str(body).map_err(|err| Error::MalformedReport(err.to_string()))
        }
    }
}

pub fn to_crash_text(report: &IpsReport) -> String {
    let mut out = String::new();

    if let Some(system) = &report.system {
        field(&mut out, "OS Version", &system.os_version);
        field(&mut out, "OS Build", &system.os_build);
        field(&mut out, "Architecture", &system.architecture);
    }

    if let Some(meta) = &report.metadata {
        field(&mut out, "App Name", &meta.app_name);
        field(&mut out, "App Version", &meta.app_version);
        field(&mut out, "App Build", &meta.app_build_version);
        field(&mut out, "Process", &meta.process_name);
    }

    if let Some(crash) = &report.crash {
        field(&mut out, "Exception Type", &crash.exception_type);
        if let Some(termination) = &crash.termination {
            field(&mut out, "Termination Reason", &termination.reason);
        }
    }

    for thread in &report.threads {
        let id = match thread.id {
            Some(id) => id,
            None => continue,
        };
        if thread.triggered {
            let _ = writeln!(out, "\nThread {} Crashed:", id);
        } else {
            let _ = writeln!(out, "\nThread {}", id);
        }
        for (index, frame) in thread.frames.iter().enumerate() {
            let _ = writeln!(
                out,
                "{:<4} {} {} + {}",
                index,
                image_name(report, frame),
                frame.symbol.as_deref().unwrap_or("???"),
                frame.offset.or(frame.image_offset).unwrap_or(0)
            );
        }
    }

    out
}

fn image_name<'a>(report: &'a IpsReport, frame: &'a Frame) -> &'a str {
    frame
        .image
        .as_deref()
        .or_else(|| {
            frame
                .image_index
                .and_then(|index| report.used_images.get(index))
                .and_then(|image| image.name.as_deref())
        })
        .unwrap_or("???")
}

fn field(out: &mut String, label: &str, value: &Option<String>) {
    if let Some(value) = value {
        let _ = writeln!(out, "{}: {}", label, value);
    }
}
