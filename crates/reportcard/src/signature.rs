//! Signature embedding
//!
//! Signatures are not form values: they are rendered to a raster,
//! stamped over the signature field's rectangle, and the field itself
//! is flattened away immediately so no interactive widget is left
//! covering the artwork. Typed signatures are rasterized with a
//! caller-supplied cursive font; drawn signatures arrive as base64
//! data URLs. Every failure path degrades instead of erroring: the
//! worst case is a typed name written as plain field text.

use crate::record::{SignatureKind, SignatureValue};
use crate::variants::resolve_signature_variants;
use ab_glyph::{Font, FontRef, PxScale, ScaleFont};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use form_core::{flatten_field, scale_to_fit, FormDocument, ImageXObject};
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder, Rgba, RgbaImage};

const TYPED_FONT_PX: f32 = 64.0;
const TYPED_PADDING: u32 = 8;
// Dark blue-black ink.
const INK: [u8; 3] = [20, 20, 60];

/// Render and stamp one signature, then flatten its field
///
/// Resolves the key through the signature synonym table, rasterizes
/// the payload, scales it uniformly into the widget rectangle
/// (centered) and stamps it onto the host page. With `flatten_after`
/// the field is flattened on the spot. Returns whether anything
/// (artwork or fallback text) landed in the document.
pub fn embed_signature(
    doc: &mut FormDocument,
    key: &str,
    value: &SignatureValue,
    font: Option<&[u8]>,
    flatten_after: bool,
) -> bool {
    let Some(name) = resolve_signature_variants(key)
        .into_iter()
        .find(|candidate| doc.has_field(candidate))
    else {
        log::debug!("no field matches signature key '{key}'");
        return false;
    };

    // Typed names also go in as field text, so the signature survives
    // even when rasterization is impossible.
    let mut landed = false;
    if value.kind == SignatureKind::Typed {
        landed = doc.set_text_value(&name, &value.payload).is_ok();
    }

    let artwork = match value.kind {
        SignatureKind::Typed => match font {
            Some(font_bytes) => rasterize_typed(&value.payload, font_bytes),
            None => {
                log::debug!("no cursive font configured; typed signature '{key}' stays as text");
                None
            }
        },
        SignatureKind::Drawn => decode_drawn(&value.payload),
    };

    if let Some(xobject) = artwork {
        match stamp_artwork(doc, &name, xobject) {
            Ok(()) => {
                landed = true;
                if flatten_after {
                    if let Err(e) = flatten_field(doc, &name) {
                        log::warn!("could not flatten signature field '{name}': {e}");
                    }
                }
            }
            Err(e) => log::warn!("could not stamp signature '{key}' onto '{name}': {e}"),
        }
    }
    landed
}

fn stamp_artwork(
    doc: &mut FormDocument,
    name: &str,
    xobject: ImageXObject,
) -> form_core::Result<()> {
    let rect = doc
        .widget_rect(name)
        .ok_or_else(|| form_core::FormError::MissingWidget(name.to_string()))?;
    let page_id = doc
        .widget_page(name)
        .ok_or_else(|| form_core::FormError::MissingPage(name.to_string()))?;

    let (w, h, dx, dy) = scale_to_fit(
        xobject.width as f64,
        xobject.height as f64,
        rect.width(),
        rect.height(),
    );
    doc.stamp_image(page_id, xobject, rect.x1 + dx, rect.y1 + dy, w, h)
}

/// Decode a drawn signature payload: a `data:image/...;base64,` URL or
/// bare base64
fn decode_drawn(payload: &str) -> Option<ImageXObject> {
    let encoded = match payload.split_once(";base64,") {
        Some((prefix, rest)) if prefix.starts_with("data:") => rest,
        _ => payload,
    };
    let bytes = BASE64
        .decode(encoded.trim())
        .map_err(|e| log::warn!("drawn signature is not valid base64: {e}"))
        .ok()?;
    ImageXObject::from_bytes(&bytes)
        .map_err(|e| log::warn!("drawn signature could not be decoded: {e}"))
        .ok()
}

/// Rasterize a typed name in the cursive font onto a transparent
/// canvas
fn rasterize_typed(text: &str, font_bytes: &[u8]) -> Option<ImageXObject> {
    if text.trim().is_empty() {
        return None;
    }
    let font = FontRef::try_from_slice(font_bytes)
        .map_err(|e| log::warn!("cursive font failed to parse: {e}"))
        .ok()?;
    let scale = PxScale::from(TYPED_FONT_PX);
    let scaled = font.as_scaled(scale);

    let mut text_width = 0.0f32;
    let mut last = None;
    for ch in text.chars() {
        let id = font.glyph_id(ch);
        if let Some(prev) = last {
            text_width += scaled.kern(prev, id);
        }
        text_width += scaled.h_advance(id);
        last = Some(id);
    }
    if text_width <= 0.0 {
        return None;
    }

    let width = text_width.ceil() as u32 + TYPED_PADDING * 2;
    let height = scaled.height().ceil() as u32 + TYPED_PADDING * 2;
    let mut canvas = RgbaImage::from_pixel(width, height, Rgba([0, 0, 0, 0]));

    let baseline = TYPED_PADDING as f32 + scaled.ascent();
    let mut x = TYPED_PADDING as f32;
    let mut last = None;
    for ch in text.chars() {
        let id = font.glyph_id(ch);
        if let Some(prev) = last {
            x += scaled.kern(prev, id);
        }
        let glyph = id.with_scale_and_position(scale, ab_glyph::point(x, baseline));
        if let Some(outlined) = font.outline_glyph(glyph) {
            let bounds = outlined.px_bounds();
            outlined.draw(|gx, gy, coverage| {
                let px = bounds.min.x as i32 + gx as i32;
                let py = bounds.min.y as i32 + gy as i32;
                if px < 0 || py < 0 || px as u32 >= width || py as u32 >= height {
                    return;
                }
                let alpha = (coverage * 255.0) as u8;
                let pixel = canvas.get_pixel_mut(px as u32, py as u32);
                if alpha > pixel.0[3] {
                    *pixel = Rgba([INK[0], INK[1], INK[2], alpha]);
                }
            });
        }
        x += scaled.h_advance(id);
        last = Some(id);
    }

    let mut png = Vec::new();
    PngEncoder::new(&mut png)
        .write_image(canvas.as_raw(), width, height, ExtendedColorType::Rgba8)
        .map_err(|e| log::warn!("typed signature PNG encoding failed: {e}"))
        .ok()?;
    ImageXObject::from_png(&png)
        .map_err(|e| log::warn!("typed signature raster rejected: {e}"))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_png_data_url() -> String {
        let img = RgbaImage::from_pixel(12, 6, Rgba([0, 0, 0, 255]));
        let mut png = Vec::new();
        PngEncoder::new(&mut png)
            .write_image(img.as_raw(), 12, 6, ExtendedColorType::Rgba8)
            .unwrap();
        format!("data:image/png;base64,{}", BASE64.encode(&png))
    }

    #[test]
    fn test_decode_drawn_data_url() {
        let xobj = decode_drawn(&sample_png_data_url()).unwrap();
        assert_eq!((xobj.width, xobj.height), (12, 6));
    }

    #[test]
    fn test_decode_drawn_bare_base64() {
        let url = sample_png_data_url();
        let bare = url.split_once(";base64,").unwrap().1;
        assert!(decode_drawn(bare).is_some());
    }

    #[test]
    fn test_decode_drawn_garbage() {
        assert!(decode_drawn("not base64 at all!!!").is_none());
        assert!(decode_drawn(&BASE64.encode(b"not an image")).is_none());
    }

    #[test]
    fn test_rasterize_rejects_empty_text() {
        // A syntactically invalid font never gets as far as layout.
        assert!(rasterize_typed("", b"\0\0\0\0").is_none());
        assert!(rasterize_typed("Ms. Rivera", b"\0\0\0\0").is_none());
    }
}
