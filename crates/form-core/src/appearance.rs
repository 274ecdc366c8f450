//! Appearance stream regeneration
//!
//! Values written into `/V` are invisible in viewers that render the
//! cached `/AP` streams instead of regenerating them. Before
//! flattening, every filled widget needs an appearance stream that
//! matches its value, plus `/NeedAppearances` as a belt-and-braces
//! signal for viewers that still honor it.

use crate::document::FormDocument;
use crate::field::{Align, FieldKind, Rect};
use crate::Result;
use lopdf::{dictionary, Dictionary, Object, ObjectId, Stream};

const DEFAULT_FONT_SIZE: f32 = 10.0;
// Rough advance width of Helvetica averaged over common glyphs, as a
// fraction of the font size. Good enough for quadding offsets.
const APPROX_GLYPH_WIDTH: f32 = 0.5;

/// Regenerate appearance streams for every filled field
///
/// Sets `/NeedAppearances true` on the AcroForm, rebuilds the `/AP /N`
/// form XObject of each text and dropdown widget from its current
/// value, re-applies checkbox and radio states, and synthesizes an
/// on-state appearance for checkable widgets that ship without one.
/// Signature fields are left alone; their visuals are stamped as
/// images.
///
/// A malformed field must not spoil the rest of the document: each
/// per-field failure is logged and returned as a `(name, error)` pair
/// while the pass carries on.
pub fn force_appearances(doc: &mut FormDocument) -> Vec<(String, String)> {
    if let Some(mut acroform) = doc.acroform_dict() {
        acroform.set(b"NeedAppearances", Object::Boolean(true));
        if let Err(e) = doc.set_acroform_dict(acroform) {
            log::warn!("failed to set /NeedAppearances: {e}");
        }
    }

    let mut failed = Vec::new();
    for name in doc.field_names() {
        if let Err(e) = regenerate_field(doc, &name) {
            log::warn!("appearance regeneration failed for field '{name}': {e}");
            failed.push((name, e.to_string()));
        }
    }

    synthesize_missing_appearances(doc);
    failed
}

fn regenerate_field(doc: &mut FormDocument, name: &str) -> Result<()> {
    let Some(kind) = doc.resolved_kind(name) else {
        return Ok(());
    };
    match kind {
        FieldKind::Text | FieldKind::Dropdown => {
            if let Some(value) = doc.text_value(name) {
                if !value.is_empty() {
                    regenerate_text_appearance(doc, name, &value)?;
                }
            }
        }
        FieldKind::Checkbox => {
            let checked = doc.is_checked(name);
            ensure_checkbox_appearance(doc, name)?;
            doc.set_checked(name, checked)?;
        }
        FieldKind::Radio => {
            // Re-writing /AS from /V nudges viewers that only look
            // at one of the two.
            if let Some(selected) = radio_value(doc, name) {
                doc.set_radio_value(name, &selected)?;
            }
        }
        FieldKind::Signature | FieldKind::Unknown => {}
    }
    Ok(())
}

/// Give every widget that still lacks `/AP` an empty form XObject
/// sized to its rectangle, so flattening never trips on a malformed
/// appearance dictionary
fn synthesize_missing_appearances(doc: &mut FormDocument) {
    let mut bare_widgets = Vec::new();
    for handle in doc.fields() {
        for &widget_id in &handle.widget_ids {
            let Ok(widget) = doc.dict_at(widget_id) else {
                continue;
            };
            if widget.has(b"AP") {
                continue;
            }
            if let Some(rect) = doc.rect_from_dict(widget) {
                bare_widgets.push((widget_id, rect));
            }
        }
    }

    for (widget_id, rect) in bare_widgets {
        let stream = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Form",
                "BBox" => vec![
                    Object::Real(0.0),
                    Object::Real(0.0),
                    Object::Real(rect.width() as f32),
                    Object::Real(rect.height() as f32),
                ],
            },
            Vec::new(),
        );
        let stream_id = doc.inner_mut().add_object(stream);
        let Ok(widget) = doc.dict_at_mut(widget_id) else {
            continue;
        };
        let mut ap = Dictionary::new();
        ap.set(b"N", Object::Reference(stream_id));
        widget.set(b"AP", Object::Dictionary(ap));
    }
}

fn radio_value(doc: &FormDocument, name: &str) -> Option<String> {
    let handle = doc.field(name)?;
    let dict = doc.dict_at(handle.field_id).ok()?;
    match doc.resolve(dict.get(b"V").ok()?) {
        Object::Name(n) if n.as_slice() != b"Off" => {
            Some(String::from_utf8_lossy(n).into_owned())
        }
        _ => None,
    }
}

/// Build a fresh `/AP /N` form XObject showing `value` and attach it to
/// every widget of the field
fn regenerate_text_appearance(doc: &mut FormDocument, name: &str, value: &str) -> Result<()> {
    let handle = doc.require_field(name)?.clone();
    let font_id = doc.ensure_helv_font()?;

    let field_dict = doc.dict_at(handle.field_id)?;
    let font_size = font_size_from_da(doc, field_dict);
    let align = alignment_from_q(doc, field_dict);

    for widget_id in handle.widget_ids {
        let Some(rect) = doc
            .dict_at(widget_id)
            .ok()
            .and_then(|w| doc.rect_from_dict(w))
        else {
            continue;
        };

        let size = effective_font_size(font_size, &rect);
        let stream = text_appearance_stream(value, &rect, size, align, font_id);
        let stream_id = doc.inner_mut().add_object(stream);

        let widget = doc.dict_at_mut(widget_id)?;
        let mut ap = Dictionary::new();
        ap.set(b"N", Object::Reference(stream_id));
        widget.set(b"AP", Object::Dictionary(ap));
    }
    Ok(())
}

fn text_appearance_stream(
    value: &str,
    rect: &Rect,
    font_size: f32,
    align: Align,
    font_id: ObjectId,
) -> Stream {
    let width = rect.width() as f32;
    let height = rect.height() as f32;

    let text_width = value.chars().count() as f32 * font_size * APPROX_GLYPH_WIDTH;
    let x = match align {
        Align::Left => 2.0,
        Align::Center => ((width - text_width) / 2.0).max(2.0),
        Align::Right => (width - text_width - 2.0).max(2.0),
    };
    // Baseline roughly centered in the box; descender allowance of 0.3em.
    let y = ((height - font_size) / 2.0 + font_size * 0.3).max(2.0);

    let content = format!(
        "/Tx BMC\nq\nBT\n/Helv {font_size:.2} Tf\n0 g\n{x:.2} {y:.2} Td\n({}) Tj\nET\nQ\nEMC",
        escape_pdf_text(value)
    );

    let dict = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Form",
        "BBox" => vec![
            Object::Real(0.0),
            Object::Real(0.0),
            Object::Real(width),
            Object::Real(height),
        ],
        "Resources" => dictionary! {
            "Font" => dictionary! {
                "Helv" => Object::Reference(font_id),
            },
        },
    };
    Stream::new(dict, content.into_bytes())
}

fn effective_font_size(declared: Option<f32>, rect: &Rect) -> f32 {
    match declared {
        // /DA size 0 means auto-size; fit to the box height.
        Some(size) if size > 0.0 => size,
        _ => DEFAULT_FONT_SIZE.min((rect.height() as f32 - 4.0).max(4.0)),
    }
}

/// Parse the font size out of a `/DA` string like `/Helv 12 Tf 0 g`
fn font_size_from_da(doc: &FormDocument, dict: &Dictionary) -> Option<f32> {
    let da = match doc.resolve(dict.get(b"DA").ok()?) {
        Object::String(bytes, _) => String::from_utf8_lossy(bytes).into_owned(),
        _ => return None,
    };
    let tokens: Vec<&str> = da.split_whitespace().collect();
    for window in tokens.windows(2) {
        if window[1] == "Tf" {
            return window[0].parse::<f32>().ok();
        }
    }
    None
}

fn alignment_from_q(doc: &FormDocument, dict: &Dictionary) -> Align {
    match dict.get(b"Q").map(|o| doc.resolve(o)) {
        Ok(Object::Integer(1)) => Align::Center,
        Ok(Object::Integer(2)) => Align::Right,
        _ => Align::Left,
    }
}

/// Give a checkable widget with no usable `/AP /N` states a synthesized
/// pair: a drawn cross for the on state and an empty stream for `Off`
fn ensure_checkbox_appearance(doc: &mut FormDocument, name: &str) -> Result<()> {
    if doc.checkbox_on_state(name).is_some() {
        return Ok(());
    }

    let handle = doc.require_field(name)?.clone();
    for widget_id in handle.widget_ids {
        let Some(rect) = doc
            .dict_at(widget_id)
            .ok()
            .and_then(|w| doc.rect_from_dict(w))
        else {
            continue;
        };

        let w = rect.width() as f32;
        let h = rect.height() as f32;
        let inset = (w.min(h) * 0.2).max(1.0);
        let on_content = format!(
            "q\n1.5 w\n0 g\n{x1:.2} {y1:.2} m\n{x2:.2} {y2:.2} l\nS\n{x1:.2} {y2:.2} m\n{x2:.2} {y1:.2} l\nS\nQ",
            x1 = inset,
            y1 = inset,
            x2 = w - inset,
            y2 = h - inset,
        );

        let bbox = vec![
            Object::Real(0.0),
            Object::Real(0.0),
            Object::Real(w),
            Object::Real(h),
        ];
        let on_stream = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Form",
                "BBox" => bbox.clone(),
            },
            on_content.into_bytes(),
        );
        let off_stream = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Form",
                "BBox" => bbox,
            },
            Vec::new(),
        );
        let on_id = doc.inner_mut().add_object(on_stream);
        let off_id = doc.inner_mut().add_object(off_stream);

        let widget = doc.dict_at_mut(widget_id)?;
        let states = dictionary! {
            "Yes" => Object::Reference(on_id),
            "Off" => Object::Reference(off_id),
        };
        let mut ap = Dictionary::new();
        ap.set(b"N", Object::Dictionary(states));
        widget.set(b"AP", Object::Dictionary(ap));
    }
    Ok(())
}

/// Escape characters that terminate or nest PDF literal strings
pub(crate) fn escape_pdf_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '(' => out.push_str("\\("),
            ')' => out.push_str("\\)"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            _ => out.push(ch),
        }
    }
    out
}
