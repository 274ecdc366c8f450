//! Form Core - Low-level AcroForm manipulation
//!
//! This crate provides functionality for:
//! - Opening AcroForm-bearing PDF documents and saving them back to bytes
//! - Enumerating interactive fields and resolving their types
//! - Writing text, checkbox and choice values
//! - Regenerating field appearance streams before flattening
//! - Flattening the interactive form into static page content
//! - Stamping raster images (JPEG, PNG) onto pages
//!
//! # Example
//!
//! ```ignore
//! use form_core::FormDocument;
//!
//! let mut doc = FormDocument::open_from_bytes(&template_bytes)?;
//! doc.set_text_value("Student Name", "Jane Doe")?;
//! doc.set_checked("Language Esl", true)?;
//! form_core::force_appearances(&mut doc);
//! let outcome = form_core::flatten_form(&mut doc)?;
//! let bytes = doc.save_to_bytes()?;
//! ```

mod appearance;
mod document;
mod field;
mod flatten;
mod image;

pub use appearance::force_appearances;
pub use document::FormDocument;
pub use field::{Align, FieldHandle, FieldKind, Rect};
pub use flatten::{flatten_field, flatten_form, FlattenMode, FlattenOutcome};
pub use image::{scale_to_fit, ImageXObject};

use thiserror::Error;

/// Errors that can occur during AcroForm operations
#[derive(Debug, Error)]
pub enum FormError {
    #[error("Failed to open PDF: {0}")]
    OpenError(String),

    #[error("Failed to save PDF: {0}")]
    SaveError(String),

    #[error("Field not found: {0}")]
    FieldNotFound(String),

    #[error("Field has no widget: {0}")]
    MissingWidget(String),

    #[error("Field has no host page: {0}")]
    MissingPage(String),

    #[error("Image error: {0}")]
    ImageError(String),

    #[error("PDF parsing error: {0}")]
    ParseError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Lopdf error: {0}")]
    LopdfError(#[from] lopdf::Error),
}

/// Result type for AcroForm operations
pub type Result<T> = std::result::Result<T, FormError>;
