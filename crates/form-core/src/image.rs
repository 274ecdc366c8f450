//! Raster image embedding
//!
//! JPEG data is embedded as-is under `DCTDecode` after a lightweight
//! header scan for dimensions; PNG data is decoded with the `image`
//! crate and re-packed as Flate-compressed RGB samples with the alpha
//! channel split off into an `/SMask`.

use crate::{FormError, Result};
use flate2::write::ZlibEncoder;
use flate2::Compression;
use image::GenericImageView;
use lopdf::{dictionary, Document, Object, ObjectId, Stream};
use std::io::Write;

/// A decoded image ready to be added to a PDF as an image XObject
pub struct ImageXObject {
    pub width: u32,
    pub height: u32,
    data: Vec<u8>,
    filter: &'static str,
    color_space: &'static str,
    bits_per_component: u8,
    /// Flate-compressed 8-bit alpha samples, when the source had
    /// transparency
    smask: Option<Vec<u8>>,
}

impl ImageXObject {
    /// Decode image bytes, sniffing the container format
    ///
    /// # Arguments
    /// * `data` - JPEG or PNG file bytes
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.starts_with(&[0xFF, 0xD8]) {
            Self::from_jpeg(data)
        } else if data.starts_with(&[0x89, b'P', b'N', b'G']) {
            Self::from_png(data)
        } else {
            Err(FormError::ImageError(
                "Unsupported image format (expected JPEG or PNG)".to_string(),
            ))
        }
    }

    /// Wrap JPEG bytes without re-encoding
    ///
    /// PDF viewers decode `DCTDecode` streams natively, so the original
    /// compressed data passes straight through.
    pub fn from_jpeg(data: &[u8]) -> Result<Self> {
        let (width, height, components) = jpeg_dimensions(data)?;
        let color_space = match components {
            1 => "DeviceGray",
            3 => "DeviceRGB",
            4 => "DeviceCMYK",
            n => {
                return Err(FormError::ImageError(format!(
                    "JPEG with {n} components is not supported"
                )))
            }
        };
        Ok(Self {
            width,
            height,
            data: data.to_vec(),
            filter: "DCTDecode",
            color_space,
            bits_per_component: 8,
            smask: None,
        })
    }

    /// Decode PNG bytes into Flate-compressed RGB with a soft mask for
    /// the alpha channel
    pub fn from_png(data: &[u8]) -> Result<Self> {
        let img = image::load_from_memory_with_format(data, image::ImageFormat::Png)
            .map_err(|e| FormError::ImageError(e.to_string()))?;
        let (width, height) = img.dimensions();
        let rgba = img.to_rgba8();

        let mut rgb = Vec::with_capacity((width * height * 3) as usize);
        let mut alpha = Vec::with_capacity((width * height) as usize);
        let mut has_transparency = false;
        for pixel in rgba.pixels() {
            rgb.extend_from_slice(&pixel.0[..3]);
            alpha.push(pixel.0[3]);
            if pixel.0[3] != 0xFF {
                has_transparency = true;
            }
        }

        Ok(Self {
            width,
            height,
            data: flate_compress(&rgb)?,
            filter: "FlateDecode",
            color_space: "DeviceRGB",
            bits_per_component: 8,
            smask: if has_transparency {
                Some(flate_compress(&alpha)?)
            } else {
                None
            },
        })
    }

    /// Add the image (and its soft mask, if any) to a document,
    /// returning the XObject id
    pub fn add_to_document(&self, doc: &mut Document) -> ObjectId {
        let smask_id = self.smask.as_ref().map(|mask| {
            let dict = dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => self.width as i64,
                "Height" => self.height as i64,
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 8,
                "Filter" => "FlateDecode",
            };
            doc.add_object(Stream::new(dict, mask.clone()))
        });

        let mut dict = dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => self.width as i64,
            "Height" => self.height as i64,
            "ColorSpace" => self.color_space,
            "BitsPerComponent" => self.bits_per_component as i64,
            "Filter" => self.filter,
        };
        if let Some(smask_id) = smask_id {
            dict.set(b"SMask", Object::Reference(smask_id));
        }
        doc.add_object(Stream::new(dict, self.data.clone()))
    }
}

/// Fit an image into a box preserving aspect ratio, centered
///
/// Returns `(width, height, x_offset, y_offset)` where the offsets are
/// relative to the box's lower-left corner.
pub fn scale_to_fit(img_w: f64, img_h: f64, box_w: f64, box_h: f64) -> (f64, f64, f64, f64) {
    if img_w <= 0.0 || img_h <= 0.0 || box_w <= 0.0 || box_h <= 0.0 {
        return (0.0, 0.0, 0.0, 0.0);
    }
    let scale = (box_w / img_w).min(box_h / img_h);
    let w = img_w * scale;
    let h = img_h * scale;
    (w, h, (box_w - w) / 2.0, (box_h - h) / 2.0)
}

fn flate_compress(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

/// Scan JPEG segment markers for the start-of-frame header, which
/// carries the pixel dimensions and component count
fn jpeg_dimensions(data: &[u8]) -> Result<(u32, u32, u8)> {
    let err = || FormError::ImageError("Malformed JPEG header".to_string());

    if data.len() < 4 || data[0] != 0xFF || data[1] != 0xD8 {
        return Err(err());
    }

    let mut pos = 2;
    while pos + 4 <= data.len() {
        if data[pos] != 0xFF {
            pos += 1;
            continue;
        }
        let marker = data[pos + 1];
        // Standalone markers carry no length word.
        if marker == 0xFF || (0xD0..=0xD9).contains(&marker) || marker == 0x01 {
            pos += 2;
            continue;
        }
        let length = u16::from_be_bytes([data[pos + 2], data[pos + 3]]) as usize;
        let is_sof = matches!(marker, 0xC0..=0xCF) && !matches!(marker, 0xC4 | 0xC8 | 0xCC);
        if is_sof {
            if pos + 9 >= data.len() {
                return Err(err());
            }
            let height = u16::from_be_bytes([data[pos + 5], data[pos + 6]]) as u32;
            let width = u16::from_be_bytes([data[pos + 7], data[pos + 8]]) as u32;
            let components = data[pos + 9];
            return Ok((width, height, components));
        }
        pos += 2 + length;
    }
    Err(err())
}
