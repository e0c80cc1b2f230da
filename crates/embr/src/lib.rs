//! EMBR record codec.
//!
//! EMBR is a compact, line-oriented text encoding of a single patient's clinical record. It is
//! designed to be read by people and by language models while spending as few tokens as possible:
//! entities are grouped into named sections, every entity carries a short stable ID
//! (for example `CN-9` or `EN-312`), and fields are separated by `|` rather than labelled.
//!
//! This crate provides:
//! - the structured record model ([`ClinicalRecord`] and friends)
//! - the fixed kind/prefix registry ([`registry`])
//! - [`encode`] and [`decode`], the two directions of the codec
//! - strict JSON/YAML import and export of structured records ([`structured`])
//!
//! The codec is pure: no I/O, no global mutable state. Both directions either succeed completely
//! or fail with an [`EmbrError`] that names the offending entity or line.

pub mod decoder;
pub mod encoder;
mod escape;
mod format;
pub mod record;
pub mod registry;
pub mod structured;
pub mod validation;

pub use decoder::decode;
pub use encoder::encode;
pub use record::{
    ClinicalEntity, ClinicalRecord, DateError, Demographics, EntityDetail, Goal, IsoDate, Period,
    VitalStatus,
};
pub use registry::{is_valid_id, kind_for_prefix, kind_for_section, EntityId, EntityKind, IdError};

/// Errors returned by the EMBR codec.
#[derive(Debug, thiserror::Error)]
pub enum EmbrError {
    /// A structured record violates an invariant and cannot be encoded.
    #[error("validation error for {subject}: {reason}")]
    Validation { subject: String, reason: String },

    /// EMBR text is structurally malformed.
    #[error("format error at {}: {reason}", location(.line, .section))]
    Format {
        line: usize,
        section: Option<String>,
        reason: String,
    },

    /// An ID cannot be resolved to the section it appears in.
    #[error("reference error at {}: {id}: {reason}", location(.line, .section))]
    Reference {
        line: usize,
        section: Option<String>,
        id: String,
        reason: String,
    },

    /// Two entities share the same ID.
    #[error("duplicate id {id} at {} (first seen on line {first_line})", location(.line, .section))]
    DuplicateId {
        id: String,
        line: usize,
        first_line: usize,
        section: Option<String>,
    },

    /// A structured (JSON/YAML) record does not match the wire schema.
    #[error("translation error: {0}")]
    Translation(String),
}

/// Type alias for Results that can fail with an [`EmbrError`].
pub type EmbrResult<T> = Result<T, EmbrError>;

/// Human-readable location for line-oriented errors. Line 0 means the document as a whole.
fn location(line: &usize, section: &Option<String>) -> String {
    let place = if *line == 0 {
        "document".to_string()
    } else {
        format!("line {line}")
    };
    match section {
        Some(name) => format!("{place} [{name}]"),
        None => place,
    }
}

impl EmbrError {
    /// The entity ID or line-oriented subject this error refers to, when there is one.
    pub fn subject(&self) -> Option<&str> {
        match self {
            EmbrError::Validation { subject, .. } => Some(subject),
            EmbrError::Reference { id, .. } | EmbrError::DuplicateId { id, .. } => Some(id),
            EmbrError::Format { .. } | EmbrError::Translation(_) => None,
        }
    }

    /// The 1-based line number for decode errors. `None` for validation and translation errors.
    pub fn line(&self) -> Option<usize> {
        match self {
            EmbrError::Format { line, .. }
            | EmbrError::Reference { line, .. }
            | EmbrError::DuplicateId { line, .. } => Some(*line),
            EmbrError::Validation { .. } | EmbrError::Translation(_) => None,
        }
    }
}
