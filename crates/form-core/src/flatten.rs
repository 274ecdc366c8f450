//! Form flattening
//!
//! Flattening bakes each widget's normal appearance stream into its
//! host page content and strips the interactive layer, so the filled
//! document renders identically everywhere and can no longer be
//! edited.
//!
//! [`flatten_form`] runs a two-rung ladder: a strict bulk pass over
//! every field, and if that aborts, a per-field retry on a clean
//! snapshot that skips failing fields and records them. Whichever rung
//! succeeds, the `/AcroForm` definition is removed afterwards so no
//! viewer treats the output as a fillable form.

use crate::document::FormDocument;
use crate::field::Rect;
use crate::{FormError, Result};
use lopdf::{Object, ObjectId};

// Annotation flag bits (PDF spec table 165).
const AF_HIDDEN: i64 = 1 << 1;
const AF_NOVIEW: i64 = 1 << 5;

/// How the form ended up flattened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlattenMode {
    /// Every field flattened in one strict pass
    Bulk,
    /// Bulk pass aborted; fields were flattened individually
    PerField,
}

/// Result of a [`flatten_form`] run
#[derive(Debug)]
pub struct FlattenOutcome {
    pub mode: FlattenMode,
    /// Fields skipped during the per-field rung, with the error text
    pub failed_fields: Vec<(String, String)>,
}

impl FlattenOutcome {
    pub fn is_clean(&self) -> bool {
        self.failed_fields.is_empty()
    }
}

/// Flatten every interactive field into static page content
///
/// The first error in the bulk pass aborts it; the document is then
/// restored from a snapshot taken beforehand and each field is retried
/// individually, skipping (and recording) the ones that still fail.
/// The `/AcroForm` dictionary is removed in either case.
pub fn flatten_form(doc: &mut FormDocument) -> Result<FlattenOutcome> {
    let names = doc.field_names();
    let snapshot = doc.snapshot();

    let mut bulk_error = None;
    for name in &names {
        if let Err(e) = flatten_field(doc, name) {
            bulk_error = Some((name.clone(), e));
            break;
        }
    }

    let outcome = match bulk_error {
        None => FlattenOutcome {
            mode: FlattenMode::Bulk,
            failed_fields: Vec::new(),
        },
        Some((first_name, first_err)) => {
            log::warn!("bulk flatten aborted at field '{first_name}': {first_err}; retrying per field");
            doc.restore(snapshot);

            let mut failed = Vec::new();
            for name in &names {
                if let Err(e) = flatten_field(doc, name) {
                    log::warn!("could not flatten field '{name}': {e}");
                    failed.push((name.clone(), e.to_string()));
                }
            }
            FlattenOutcome {
                mode: FlattenMode::PerField,
                failed_fields: failed,
            }
        }
    };

    doc.remove_acroform()?;
    Ok(outcome)
}

/// Flatten a single field: stamp its visible appearance into the page
/// and remove its widgets and its `/Fields` entry
pub fn flatten_field(doc: &mut FormDocument, name: &str) -> Result<()> {
    let handle = doc.require_field(name)?.clone();

    for widget_id in handle.widget_ids {
        let stamp = visible_appearance(doc, widget_id)?;

        let page_id = widget_host_page(doc, &handle.name, widget_id);
        if let Some((stream_id, rect)) = stamp {
            let page_id = page_id.ok_or_else(|| FormError::MissingPage(handle.name.clone()))?;
            stamp_appearance(doc, page_id, widget_id, stream_id, rect)?;
            doc.remove_widget_annotation(page_id, widget_id);
        } else if let Some(page_id) = page_id {
            doc.remove_widget_annotation(page_id, widget_id);
        }
    }

    remove_from_acroform_fields(doc, handle.field_id)?;
    doc.forget_field(name);
    Ok(())
}

/// The appearance stream this widget currently displays, if any
///
/// Resolves `/AP /N` through the `/AS` state for dictionary-valued
/// appearances. Hidden widgets and `Off` states produce nothing.
fn visible_appearance(
    doc: &FormDocument,
    widget_id: ObjectId,
) -> Result<Option<(ObjectId, Rect)>> {
    let widget = doc.dict_at(widget_id)?;

    let flags = widget
        .get(b"F")
        .ok()
        .and_then(|o| doc.resolve(o).as_i64().ok())
        .unwrap_or(0);
    if flags & (AF_HIDDEN | AF_NOVIEW) != 0 {
        return Ok(None);
    }

    let Some(rect) = doc.rect_from_dict(widget) else {
        return Ok(None);
    };

    let Ok(ap) = widget.get(b"AP") else {
        return Ok(None);
    };
    let Ok(ap) = doc.resolve(ap).as_dict() else {
        return Ok(None);
    };
    let Ok(normal) = ap.get(b"N") else {
        return Ok(None);
    };

    let stream_id = match normal {
        Object::Reference(id) => match doc.inner().get_object(*id) {
            Ok(Object::Stream(_)) => Some(*id),
            Ok(Object::Dictionary(states)) => {
                state_stream(doc, widget, states.iter().map(|(k, v)| (k.as_slice(), v)))
            }
            _ => None,
        },
        Object::Dictionary(states) => {
            state_stream(doc, widget, states.iter().map(|(k, v)| (k.as_slice(), v)))
        }
        _ => None,
    };

    Ok(stream_id.map(|id| (id, rect)))
}

/// Pick the state stream named by the widget's `/AS` entry
fn state_stream<'a>(
    doc: &FormDocument,
    widget: &lopdf::Dictionary,
    states: impl Iterator<Item = (&'a [u8], &'a Object)>,
) -> Option<ObjectId> {
    let as_state = match widget.get(b"AS") {
        Ok(Object::Name(n)) => n.clone(),
        _ => b"Off".to_vec(),
    };
    if as_state == b"Off" {
        return None;
    }
    for (key, value) in states {
        if key == as_state.as_slice() {
            if let Object::Reference(id) = value {
                return Some(*id);
            }
        }
    }
    None
}

fn widget_host_page(doc: &FormDocument, name: &str, widget_id: ObjectId) -> Option<ObjectId> {
    if let Ok(widget) = doc.dict_at(widget_id) {
        if let Ok(Object::Reference(page_id)) = widget.get(b"P") {
            return Some(*page_id);
        }
    }
    // Fall back to the field-level scan, which checks every page's
    // /Annots array.
    doc.widget_page(name)
}

/// Paint the appearance form XObject into the page, mapped from its
/// `/BBox` onto the widget rectangle
fn stamp_appearance(
    doc: &mut FormDocument,
    page_id: ObjectId,
    widget_id: ObjectId,
    stream_id: ObjectId,
    rect: Rect,
) -> Result<()> {
    let bbox = appearance_bbox(doc, stream_id).unwrap_or(Rect {
        x1: 0.0,
        y1: 0.0,
        x2: rect.width(),
        y2: rect.height(),
    });

    let sx = if bbox.width() > 0.0 {
        rect.width() / bbox.width()
    } else {
        1.0
    };
    let sy = if bbox.height() > 0.0 {
        rect.height() / bbox.height()
    } else {
        1.0
    };
    let tx = rect.x1 - bbox.x1 * sx;
    let ty = rect.y1 - bbox.y1 * sy;

    let resource_name = format!("Fz{}_{}", widget_id.0, widget_id.1);
    doc.add_xobject_to_page_resources(page_id, &resource_name, stream_id)?;

    let operators =
        format!("\nq\n{sx:.4} 0 0 {sy:.4} {tx:.4} {ty:.4} cm\n/{resource_name} Do\nQ\n");
    doc.append_to_page_content(page_id, operators.as_bytes())
}

fn appearance_bbox(doc: &FormDocument, stream_id: ObjectId) -> Option<Rect> {
    let Ok(Object::Stream(stream)) = doc.inner().get_object(stream_id) else {
        return None;
    };
    let bbox = doc.resolve(stream.dict.get(b"BBox").ok()?).as_array().ok()?;
    if bbox.len() < 4 {
        return None;
    }
    let coord = |o: &Object| -> Option<f64> {
        doc.resolve(o)
            .as_f32()
            .map(|v| v as f64)
            .ok()
            .or_else(|| doc.resolve(o).as_i64().ok().map(|v| v as f64))
    };
    Some(Rect::new(
        coord(&bbox[0])?,
        coord(&bbox[1])?,
        coord(&bbox[2])?,
        coord(&bbox[3])?,
    ))
}

/// Drop the field's reference from the AcroForm `/Fields` array
fn remove_from_acroform_fields(doc: &mut FormDocument, field_id: ObjectId) -> Result<()> {
    let Some(mut acroform) = doc.acroform_dict() else {
        return Ok(());
    };
    let Ok(fields) = acroform.get(b"Fields") else {
        return Ok(());
    };
    let Ok(fields) = doc.resolve(fields).as_array() else {
        return Ok(());
    };
    let filtered: Vec<Object> = fields
        .iter()
        .filter(|obj| !matches!(obj, Object::Reference(id) if *id == field_id))
        .cloned()
        .collect();
    acroform.set(b"Fields", Object::Array(filtered));
    doc.set_acroform_dict(acroform)
}
