//! Report-card filling engine
//!
//! This crate provides functionality for:
//! - Parsing submitted report-card records (ordered key/value maps)
//! - Resolving logical keys against the field-name variants real
//!   templates use
//! - Type-aware value writing (text, checkbox, dropdown, radio)
//! - Embedding typed and drawn signatures as raster images
//! - Separating, merging and copying term-scoped record keys
//! - Orchestrating the whole fill: resolve, write, force appearances,
//!   flatten, serialize — with graceful degradation at every rung
//!
//! # Example
//!
//! ```ignore
//! use reportcard::{FillMode, FormRecord, ReportFiller, TemplateProfile};
//!
//! let record = FormRecord::from_json_str(r#"{"studentName": "Jane Doe"}"#)?;
//! let filler = ReportFiller::new(template_bytes, TemplateProfile::default());
//! let output = filler.fill(&record, FillMode::Download)?;
//! std::fs::write("report.pdf", output.bytes)?;
//! ```

mod debounce;
mod engine;
mod fetch;
mod record;
mod signature;
mod terms;
mod variants;
mod writer;

pub use debounce::Debouncer;
pub use engine::{
    FailedWrite, FillMode, FillOutput, FillReport, LogoStamp, MatchedField, ReportFiller,
    TemplateProfile,
};
pub use fetch::{fetch_with_retry, MemoryStore, RetryPolicy, TemplateStore};
pub use record::{FormRecord, FormValue, SignatureKind, SignatureValue};
pub use signature::embed_signature;
pub use terms::{classify, copy_term1_to_term2, merge, separate, Term, TermBucket};
pub use variants::{resolve_signature_variants, resolve_variants};
pub use writer::{write_value, WriteOutcome};

use thiserror::Error;

/// Errors that can occur while filling a report card
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    #[error("Template error: {0}")]
    TemplateError(String),

    #[error("Template fetch failed: {0}")]
    FetchError(String),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error(transparent)]
    FormError(#[from] form_core::FormError),
}

/// Result type for report-card operations
pub type Result<T> = std::result::Result<T, ReportError>;
