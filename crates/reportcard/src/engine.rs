//! Fill orchestration
//!
//! One pipeline for every template; per-template differences (signature
//! slots, logo placement) come in as [`TemplateProfile`] data. The
//! pipeline degrades instead of aborting: unmatched keys, failed writes
//! and flatten failures are collected into the [`FillReport`] the
//! caller gets alongside the bytes. Only a template that cannot be
//! parsed, or a document that cannot be serialized at all, is a hard
//! error.

use crate::record::{FormRecord, FormValue, SignatureKind, SignatureValue};
use crate::signature::embed_signature;
use crate::variants::resolve_variants;
use crate::writer::{write_value, WriteOutcome};
use crate::{ReportError, Result};
use form_core::{flatten_form, force_appearances, scale_to_fit, FlattenMode, FormDocument, ImageXObject, Rect};
use serde::Serialize;

/// A logo stamped onto the output as post-processing
#[derive(Debug, Clone)]
pub struct LogoStamp {
    /// JPEG or PNG bytes
    pub image: Vec<u8>,
    /// Zero-based page index
    pub page_index: usize,
    /// Target rectangle in PDF user space
    pub rect: Rect,
}

/// Per-template data driving the shared pipeline
#[derive(Debug, Clone, Default)]
pub struct TemplateProfile {
    pub name: String,
    /// Record keys that are signature slots even when their value
    /// arrives as plain text
    pub signature_keys: Vec<String>,
    pub logo: Option<LogoStamp>,
}

/// What the caller wants back
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillMode {
    /// Flattened, non-interactive output
    Download,
    /// Still-interactive output for on-screen preview
    Preview,
}

/// One key that landed in a physical field
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchedField {
    pub key: String,
    pub field: String,
    pub value: String,
}

/// One key that found a field but could not be written
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedWrite {
    pub key: String,
    pub field: String,
    pub reason: String,
}

/// Diagnostic account of a fill pass
///
/// This is part of the contract, not telemetry: callers surface it to
/// the person reviewing the generated card.
#[derive(Debug, Default, Serialize)]
pub struct FillReport {
    pub matched: Vec<MatchedField>,
    pub unmatched_keys: Vec<String>,
    pub failed_writes: Vec<FailedWrite>,
    pub signatures_embedded: Vec<String>,
    pub signatures_failed: Vec<String>,
    /// Fields whose appearance streams could not be regenerated
    pub failed_appearances: Vec<(String, String)>,
    /// "bulk" or "per-field" when flattening ran
    pub flatten_mode: Option<String>,
    pub failed_flatten_fields: Vec<(String, String)>,
    /// Set when the flattened document could not be serialized and the
    /// interactive pre-flatten document was returned instead
    pub fallback_unflattened: bool,
}

/// Fills one template from submitted records
pub struct ReportFiller {
    template: Vec<u8>,
    profile: TemplateProfile,
    signature_font: Option<Vec<u8>>,
}

/// Output bytes plus the diagnostic report
pub struct FillOutput {
    pub bytes: Vec<u8>,
    pub report: FillReport,
}

impl ReportFiller {
    pub fn new(template: Vec<u8>, profile: TemplateProfile) -> Self {
        Self {
            template,
            profile,
            signature_font: None,
        }
    }

    /// Supply the cursive TTF/OTF used to rasterize typed signatures
    pub fn with_signature_font(mut self, font: Vec<u8>) -> Self {
        self.signature_font = Some(font);
        self
    }

    /// Run the full pipeline over one record
    ///
    /// Each key resolves to its first existing candidate field; values
    /// are written by effective type; signatures are embedded and (in
    /// Download mode) their fields flattened on the spot; appearances
    /// are forced; Download mode then flattens the rest and serializes,
    /// falling back to the interactive document if the flattened one
    /// will not serialize.
    pub fn fill(&self, record: &FormRecord, mode: FillMode) -> Result<FillOutput> {
        let mut doc = FormDocument::open_from_bytes(&self.template)
            .map_err(|e| ReportError::TemplateError(e.to_string()))?;
        let mut report = FillReport::default();
        let font = self.signature_font.as_deref();
        let flatten_signatures = mode == FillMode::Download;

        for (key, value) in record.iter() {
            if let Some(sig) = self.as_signature(key, value) {
                if embed_signature(&mut doc, key, &sig, font, flatten_signatures) {
                    report.signatures_embedded.push(key.to_string());
                } else {
                    report.signatures_failed.push(key.to_string());
                }
                continue;
            }

            let Some(field) = resolve_variants(key)
                .into_iter()
                .find(|candidate| doc.has_field(candidate))
            else {
                log::debug!("no field matches key '{key}'");
                report.unmatched_keys.push(key.to_string());
                continue;
            };

            match write_value(&mut doc, &field, value) {
                WriteOutcome::Written => report.matched.push(MatchedField {
                    key: key.to_string(),
                    field,
                    value: value.as_text(),
                }),
                WriteOutcome::NoMatchingOption => report.failed_writes.push(FailedWrite {
                    key: key.to_string(),
                    field,
                    reason: "no matching option".to_string(),
                }),
                WriteOutcome::Unsupported => report.failed_writes.push(FailedWrite {
                    key: key.to_string(),
                    field,
                    reason: "unsupported field type".to_string(),
                }),
            }
        }

        if let Some(logo) = &self.profile.logo {
            if let Err(e) = stamp_logo(&mut doc, logo) {
                log::warn!("logo stamp failed for template '{}': {e}", self.profile.name);
            }
        }

        report.failed_appearances = force_appearances(&mut doc);

        let bytes = match mode {
            FillMode::Preview => doc.save_to_bytes()?,
            FillMode::Download => {
                // Serialize before flattening so a broken flatten can
                // still return a usable (interactive) document.
                let interactive = doc.save_to_bytes()?;
                match flatten_form(&mut doc) {
                    Ok(outcome) => {
                        report.flatten_mode = Some(
                            match outcome.mode {
                                FlattenMode::Bulk => "bulk",
                                FlattenMode::PerField => "per-field",
                            }
                            .to_string(),
                        );
                        report.failed_flatten_fields = outcome.failed_fields;
                        match doc.save_to_bytes() {
                            Ok(flat) => flat,
                            Err(e) => {
                                log::warn!("flattened document failed to serialize: {e}");
                                report.fallback_unflattened = true;
                                interactive
                            }
                        }
                    }
                    Err(e) => {
                        log::warn!("flattening failed outright: {e}");
                        report.fallback_unflattened = true;
                        interactive
                    }
                }
            }
        };

        Ok(FillOutput { bytes, report })
    }

    /// Interpret a value as a signature: explicit payloads always, and
    /// plain text when the profile declares the key a signature slot
    fn as_signature(&self, key: &str, value: &FormValue) -> Option<SignatureValue> {
        match value {
            FormValue::Signature(sig) => Some(sig.clone()),
            FormValue::Text(text) if self.profile.signature_keys.iter().any(|k| k == key) => {
                Some(SignatureValue {
                    kind: SignatureKind::Typed,
                    payload: text.clone(),
                })
            }
            _ => None,
        }
    }
}

fn stamp_logo(doc: &mut FormDocument, logo: &LogoStamp) -> crate::Result<()> {
    let page_id = *doc
        .page_ids()
        .get(logo.page_index)
        .ok_or_else(|| ReportError::TemplateError(format!("no page {}", logo.page_index)))?;
    let xobject = ImageXObject::from_bytes(&logo.image)?;
    let (w, h, dx, dy) = scale_to_fit(
        xobject.width as f64,
        xobject.height as f64,
        logo.rect.width(),
        logo.rect.height(),
    );
    doc.stamp_image(page_id, xobject, logo.rect.x1 + dx, logo.rect.y1 + dy, w, h)?;
    Ok(())
}
