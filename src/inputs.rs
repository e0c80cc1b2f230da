//! Locating and loading the patient files the runner should summarize.
//!
//! Patient files are either EMBR text (`.embr`) or structured records (`.json`, `.yaml`, `.yml`).
//! Structured records are parsed here and encoded later by the summarizer; EMBR text is passed on
//! as read.

use anyhow::Context;
use embr::{ClinicalRecord, structured};
use std::fs;
use std::path::{Path, PathBuf};

/// How a patient file is read, by extension.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PatientFormat {
    Embr,
    Json,
    Yaml,
}

impl PatientFormat {
    /// `None` for extensions that are not patient files.
    pub fn from_extension(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "embr" => Some(PatientFormat::Embr),
            "json" => Some(PatientFormat::Json),
            "yaml" | "yml" => Some(PatientFormat::Yaml),
            _ => None,
        }
    }
}

/// A loaded patient file.
#[derive(Debug)]
pub enum PatientFile {
    Encoded(String),
    Record(ClinicalRecord),
}

/// Read and, for structured files, parse a patient file.
///
/// Files with an unrecognised extension are read as EMBR text.
///
/// # Errors
///
/// Returns an error if the file cannot be read or a JSON/YAML record does not match the schema.
pub fn load(path: &Path) -> anyhow::Result<PatientFile> {
    let text =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;

    let record = match PatientFormat::from_extension(path).unwrap_or(PatientFormat::Embr) {
        PatientFormat::Embr => return Ok(PatientFile::Encoded(text)),
        PatientFormat::Json => structured::parse_json(&text),
        PatientFormat::Yaml => structured::parse_yaml(&text),
    }
    .with_context(|| format!("invalid patient record in {}", path.display()))?;

    Ok(PatientFile::Record(record))
}

/// Expand command-line paths into the list of files to summarize.
///
/// Directories contribute their patient files (not recursively) in sorted order; files are taken
/// as given, whatever their extension. With no paths, `default_dir` is scanned.
pub fn collect_inputs(paths: &[PathBuf], default_dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    if paths.is_empty() {
        return scan_dir(default_dir);
    }

    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            files.extend(scan_dir(path)?);
        } else {
            files.push(path.clone());
        }
    }
    Ok(files)
}

fn scan_dir(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let entries = fs::read_dir(dir)
        .with_context(|| format!("cannot read patient directory {}", dir.display()))?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry
            .with_context(|| format!("cannot list {}", dir.display()))?
            .path();
        if path.is_file() && PatientFormat::from_extension(&path).is_some() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
