//! AcroForm document wrapper

use crate::field::{classify_field, Align, FieldHandle, FieldKind, Rect};
use crate::image::ImageXObject;
use crate::{FormError, Result};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, StringFormat};
use std::collections::HashMap;

/// AcroForm document wrapper providing high-level field operations
///
/// Each instance owns an independent document graph; two concurrent
/// fill passes must load their own copies since flattening is
/// destructive.
pub struct FormDocument {
    /// The underlying lopdf document
    inner: Document,
    /// Enumerated interactive fields, in `/Fields` order
    fields: Vec<FieldHandle>,
    /// Capability-probe results for fields with an unknown declared type
    kind_cache: HashMap<String, FieldKind>,
    /// Next image resource number
    next_image_resource: u32,
    /// Lazily created Helvetica font object for appearance streams
    helv_id: Option<ObjectId>,
}

impl FormDocument {
    /// Open a PDF document from bytes
    ///
    /// # Arguments
    /// * `data` - PDF file bytes
    pub fn open_from_bytes(data: &[u8]) -> Result<Self> {
        let inner = Document::load_mem(data).map_err(|e| FormError::OpenError(e.to_string()))?;
        let fields = collect_fields(&inner);

        Ok(Self {
            inner,
            fields,
            kind_cache: HashMap::new(),
            next_image_resource: 1,
            helv_id: None,
        })
    }

    /// Get the number of pages in the document
    pub fn page_count(&self) -> usize {
        self.inner.get_pages().len()
    }

    /// Get all page object IDs in page order
    pub fn page_ids(&self) -> Vec<ObjectId> {
        self.inner.get_pages().values().copied().collect()
    }

    /// All enumerated field handles
    pub fn fields(&self) -> &[FieldHandle] {
        &self.fields
    }

    /// All field names, in `/Fields` order
    pub fn field_names(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.name.clone()).collect()
    }

    /// Whether a field with this exact name exists
    pub fn has_field(&self, name: &str) -> bool {
        self.fields.iter().any(|f| f.name == name)
    }

    /// Look up a field handle by exact name
    pub fn field(&self, name: &str) -> Option<&FieldHandle> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Declared type of a field, straight from `/FT`
    pub fn declared_kind(&self, name: &str) -> Option<FieldKind> {
        self.field(name).map(|f| f.declared)
    }

    /// Effective type of a field, with `Unknown` resolved by capability
    /// probing
    ///
    /// A widget whose `/AP /N` dictionary carries a non-`Off` state
    /// supports check/uncheck and is treated as a checkbox; otherwise a
    /// dictionary carrying text machinery (`/DA`, `/Q`, `/MaxLen`, or a
    /// string `/V`) is treated as text. The probe runs once per field
    /// and is cached for the lifetime of this document instance.
    pub fn resolved_kind(&mut self, name: &str) -> Option<FieldKind> {
        let declared = self.declared_kind(name)?;
        if declared != FieldKind::Unknown {
            return Some(declared);
        }
        if let Some(kind) = self.kind_cache.get(name) {
            return Some(*kind);
        }
        let probed = self.probe_unknown(name);
        self.kind_cache.insert(name.to_string(), probed);
        Some(probed)
    }

    fn probe_unknown(&self, name: &str) -> FieldKind {
        if self.checkbox_on_state(name).is_some() {
            return FieldKind::Checkbox;
        }

        let Some(handle) = self.field(name) else {
            return FieldKind::Unknown;
        };
        let Ok(dict) = self.dict_at(handle.field_id) else {
            return FieldKind::Unknown;
        };

        let text_capable = dict.has(b"DA")
            || dict.has(b"Q")
            || dict.has(b"MaxLen")
            || matches!(dict.get(b"V"), Ok(Object::String(..)));
        if text_capable {
            FieldKind::Text
        } else {
            FieldKind::Unknown
        }
    }

    /// Get the current text value of a field
    pub fn text_value(&self, name: &str) -> Option<String> {
        let handle = self.field(name)?;
        let dict = self.dict_at(handle.field_id).ok()?;
        match self.resolve(dict.get(b"V").ok()?) {
            Object::String(bytes, _) => Some(pdf_string_to_string(bytes)),
            _ => None,
        }
    }

    /// Set the text value of a field
    ///
    /// Stale `/AP` streams on the widgets are dropped so the value is
    /// not shadowed by an old appearance; run
    /// [`force_appearances`](crate::force_appearances) after all values
    /// are written and before flattening.
    pub fn set_text_value(&mut self, name: &str, value: &str) -> Result<()> {
        let handle = self.require_field(name)?.clone();
        let dict = self.dict_at_mut(handle.field_id)?;
        dict.set(
            b"V",
            Object::String(value.as_bytes().to_vec(), StringFormat::Literal),
        );
        for widget_id in handle.widget_ids {
            if let Ok(widget) = self.dict_at_mut(widget_id) {
                widget.remove(b"AP");
            }
        }
        Ok(())
    }

    /// The field's default appearance string (`/DA`), if any
    pub fn default_appearance(&self, name: &str) -> Option<String> {
        let handle = self.field(name)?;
        let dict = self.dict_at(handle.field_id).ok()?;
        match self.resolve(dict.get(b"DA").ok()?) {
            Object::String(bytes, _) => Some(String::from_utf8_lossy(bytes).into_owned()),
            _ => None,
        }
    }

    /// Set the default appearance string (`/DA`) for a text field
    pub fn set_default_appearance(&mut self, name: &str, font_size: f32) -> Result<()> {
        let field_id = self.require_field(name)?.field_id;
        let da = format!("/Helv {font_size} Tf 0 g");
        let dict = self.dict_at_mut(field_id)?;
        dict.set(b"DA", Object::String(da.into_bytes(), StringFormat::Literal));
        Ok(())
    }

    /// Set the text alignment (`/Q` quadding) for a text field
    pub fn set_alignment(&mut self, name: &str, align: Align) -> Result<()> {
        let field_id = self.require_field(name)?.field_id;
        let dict = self.dict_at_mut(field_id)?;
        dict.set(b"Q", Object::Integer(align.quadding()));
        Ok(())
    }

    /// The export value a checkbox uses when checked: the first
    /// non-`Off` key of any widget's `/AP /N` dictionary
    pub fn checkbox_on_state(&self, name: &str) -> Option<String> {
        let handle = self.field(name)?;
        for &widget_id in &handle.widget_ids {
            let Ok(widget) = self.dict_at(widget_id) else {
                continue;
            };
            let Ok(ap) = widget.get(b"AP") else {
                continue;
            };
            let Ok(normal) = self.resolve(ap).as_dict() else {
                continue;
            };
            let Ok(states) = normal.get(b"N") else {
                continue;
            };
            if let Ok(states) = self.resolve(states).as_dict() {
                for (key, _) in states.iter() {
                    if key.as_slice() != b"Off" {
                        return Some(String::from_utf8_lossy(key).into_owned());
                    }
                }
            }
        }
        None
    }

    /// Check or uncheck a checkbox field
    ///
    /// Both the field value (`/V`) and every widget's appearance state
    /// (`/AS`) are written, since some viewers honor only one of the
    /// two mechanisms.
    pub fn set_checked(&mut self, name: &str, checked: bool) -> Result<()> {
        let on_state = self.checkbox_on_state(name).unwrap_or_else(|| "Yes".into());
        let state = if checked { on_state.as_str() } else { "Off" };

        let handle = self.require_field(name)?.clone();
        let dict = self.dict_at_mut(handle.field_id)?;
        dict.set(b"V", Object::Name(state.as_bytes().to_vec()));
        for widget_id in handle.widget_ids {
            let widget = self.dict_at_mut(widget_id)?;
            widget.set(b"AS", Object::Name(state.as_bytes().to_vec()));
        }
        Ok(())
    }

    /// Read a checkbox's logical state from `/V` (falling back to `/AS`)
    pub fn is_checked(&self, name: &str) -> bool {
        let Some(handle) = self.field(name) else {
            return false;
        };
        let Ok(dict) = self.dict_at(handle.field_id) else {
            return false;
        };
        let state = dict
            .get(b"V")
            .or_else(|_| dict.get(b"AS"))
            .map(|o| self.resolve(o));
        matches!(state, Ok(Object::Name(n)) if n.as_slice() != b"Off")
    }

    /// Export values declared by a choice field's `/Opt` array
    ///
    /// Entries are either plain strings or `[export, display]` pairs.
    pub fn choice_options(&self, name: &str) -> Vec<String> {
        let Some(handle) = self.field(name) else {
            return Vec::new();
        };
        let Ok(dict) = self.dict_at(handle.field_id) else {
            return Vec::new();
        };
        let Ok(opt) = dict.get(b"Opt") else {
            return Vec::new();
        };
        let Ok(entries) = self.resolve(opt).as_array() else {
            return Vec::new();
        };

        entries
            .iter()
            .filter_map(|entry| match self.resolve(entry) {
                Object::String(bytes, _) => Some(pdf_string_to_string(bytes)),
                Object::Array(pair) => match pair.first().map(|o| self.resolve(o)) {
                    Some(Object::String(bytes, _)) => Some(pdf_string_to_string(bytes)),
                    _ => None,
                },
                _ => None,
            })
            .collect()
    }

    /// Set a dropdown's value to one of its declared options
    pub fn set_choice_value(&mut self, name: &str, value: &str) -> Result<()> {
        let field_id = self.require_field(name)?.field_id;
        let dict = self.dict_at_mut(field_id)?;
        dict.set(
            b"V",
            Object::String(value.as_bytes().to_vec(), StringFormat::Literal),
        );
        Ok(())
    }

    /// Export values of a radio group: the union of non-`Off` `/AP /N`
    /// states across its widgets
    pub fn radio_options(&self, name: &str) -> Vec<String> {
        let Some(handle) = self.field(name) else {
            return Vec::new();
        };
        let mut options = Vec::new();
        for &widget_id in &handle.widget_ids {
            let Ok(widget) = self.dict_at(widget_id) else {
                continue;
            };
            let Some(states) = widget
                .get(b"AP")
                .ok()
                .and_then(|ap| self.resolve(ap).as_dict().ok())
                .and_then(|ap| ap.get(b"N").ok())
                .and_then(|n| self.resolve(n).as_dict().ok())
            else {
                continue;
            };
            for (key, _) in states.iter() {
                if key.as_slice() != b"Off" {
                    let state = String::from_utf8_lossy(key).into_owned();
                    if !options.contains(&state) {
                        options.push(state);
                    }
                }
            }
        }
        options
    }

    /// Select a radio group option by export value
    ///
    /// The widget carrying the chosen state gets `/AS` set to it;
    /// every other widget is turned `Off`.
    pub fn set_radio_value(&mut self, name: &str, value: &str) -> Result<()> {
        let handle = self.require_field(name)?.clone();
        let dict = self.dict_at_mut(handle.field_id)?;
        dict.set(b"V", Object::Name(value.as_bytes().to_vec()));

        for widget_id in handle.widget_ids {
            let has_state = self
                .dict_at(widget_id)
                .ok()
                .and_then(|w| w.get(b"AP").ok().map(|ap| self.resolve(ap).clone()))
                .and_then(|ap| ap.as_dict().ok().and_then(|d| d.get(b"N").ok().cloned()))
                .and_then(|n| self.resolve(&n).as_dict().ok().map(|d| d.has(value.as_bytes())))
                .unwrap_or(false);
            let state = if has_state { value.as_bytes() } else { b"Off" };
            let widget = self.dict_at_mut(widget_id)?;
            widget.set(b"AS", Object::Name(state.to_vec()));
        }
        Ok(())
    }

    /// Rectangle of the field's first widget
    pub fn widget_rect(&self, name: &str) -> Option<Rect> {
        let handle = self.field(name)?;
        for &widget_id in &handle.widget_ids {
            let Ok(widget) = self.dict_at(widget_id) else {
                continue;
            };
            if let Some(rect) = self.rect_from_dict(widget) {
                return Some(rect);
            }
        }
        None
    }

    pub(crate) fn rect_from_dict(&self, dict: &Dictionary) -> Option<Rect> {
        let rect = self.resolve(dict.get(b"Rect").ok()?).as_array().ok()?;
        if rect.len() < 4 {
            return None;
        }
        let mut coords = [0.0f64; 4];
        for (i, obj) in rect.iter().take(4).enumerate() {
            coords[i] = object_to_f64(self.resolve(obj))?;
        }
        Some(Rect::new(coords[0], coords[1], coords[2], coords[3]))
    }

    /// Host page of the field's first widget, via `/P` or an `/Annots`
    /// scan
    pub fn widget_page(&self, name: &str) -> Option<ObjectId> {
        let handle = self.field(name)?;
        for &widget_id in &handle.widget_ids {
            if let Ok(widget) = self.dict_at(widget_id) {
                if let Ok(Object::Reference(page_id)) = widget.get(b"P") {
                    return Some(*page_id);
                }
            }
        }
        // No /P entry; find the page whose /Annots references a widget.
        for page_id in self.page_ids() {
            let Ok(page) = self.dict_at(page_id) else {
                continue;
            };
            let Ok(annots) = page.get(b"Annots") else {
                continue;
            };
            let Ok(annots) = self.resolve(annots).as_array() else {
                continue;
            };
            for annot in annots {
                if let Object::Reference(id) = annot {
                    if handle.widget_ids.contains(id) {
                        return Some(page_id);
                    }
                }
            }
        }
        None
    }

    /// Stamp an image XObject onto a page at an absolute position
    ///
    /// # Arguments
    /// * `page_id` - Host page object id
    /// * `xobject` - Decoded image
    /// * `x`, `y` - Lower-left corner in PDF coordinates
    /// * `width`, `height` - Display size in points
    pub fn stamp_image(
        &mut self,
        page_id: ObjectId,
        xobject: ImageXObject,
        x: f64,
        y: f64,
        width: f64,
        height: f64,
    ) -> Result<()> {
        let image_id = xobject.add_to_document(&mut self.inner);

        let resource_name = format!("Im{}", self.next_image_resource);
        self.next_image_resource += 1;
        self.add_xobject_to_page_resources(page_id, &resource_name, image_id)?;

        let operators =
            format!("\nq\n{width:.4} 0 0 {height:.4} {x:.4} {y:.4} cm\n/{resource_name} Do\nQ\n");
        self.append_to_page_content(page_id, operators.as_bytes())
    }

    /// Add an XObject reference to a page's Resources dictionary
    pub(crate) fn add_xobject_to_page_resources(
        &mut self,
        page_id: ObjectId,
        resource_name: &str,
        object_id: ObjectId,
    ) -> Result<()> {
        let page_dict = self.dict_at(page_id)?.clone();

        let mut resources_dict = match page_dict.get(b"Resources") {
            Ok(resources) => match self.resolve(resources).as_dict() {
                Ok(dict) => dict.clone(),
                Err(_) => Dictionary::new(),
            },
            Err(_) => Dictionary::new(),
        };

        let mut xobject_dict = match resources_dict.get(b"XObject") {
            Ok(xobject) => match self.resolve(xobject).as_dict() {
                Ok(dict) => dict.clone(),
                Err(_) => Dictionary::new(),
            },
            Err(_) => Dictionary::new(),
        };
        xobject_dict.set(resource_name.as_bytes(), Object::Reference(object_id));
        resources_dict.set(b"XObject", Object::Dictionary(xobject_dict));

        let mut new_page_dict = page_dict;
        new_page_dict.set(b"Resources", Object::Dictionary(resources_dict));
        self.inner.objects.insert(page_id, new_page_dict.into());
        Ok(())
    }

    /// Append content operators to a page's content stream
    ///
    /// Handles single streams, references, and arrays of streams.
    pub(crate) fn append_to_page_content(
        &mut self,
        page_id: ObjectId,
        content: &[u8],
    ) -> Result<()> {
        let page_dict = self.dict_at(page_id)?.clone();

        let existing_content = match page_dict.get(b"Contents") {
            Ok(contents) => self.collect_stream_content(contents),
            Err(_) => Vec::new(),
        };

        let mut new_content = existing_content;
        new_content.extend_from_slice(content);

        let new_stream = lopdf::Stream::new(Dictionary::new(), new_content);
        let stream_id = self.inner.add_object(new_stream);

        let mut new_page_dict = page_dict;
        new_page_dict.set(b"Contents", Object::Reference(stream_id));
        self.inner.objects.insert(page_id, new_page_dict.into());
        Ok(())
    }

    fn collect_stream_content(&self, contents: &Object) -> Vec<u8> {
        match contents {
            Object::Stream(stream) => stream
                .decompressed_content()
                .unwrap_or_else(|_| stream.content.clone()),
            Object::Reference(ref_id) => {
                if let Ok(Object::Stream(stream)) = self.inner.get_object(*ref_id) {
                    stream
                        .decompressed_content()
                        .unwrap_or_else(|_| stream.content.clone())
                } else {
                    Vec::new()
                }
            }
            Object::Array(arr) => {
                let mut combined = Vec::new();
                for obj in arr {
                    combined.extend_from_slice(&self.collect_stream_content(obj));
                }
                combined
            }
            _ => Vec::new(),
        }
    }

    /// Serialize the document to bytes
    ///
    /// Uses the classic cross-reference table; object streams are never
    /// emitted, for compatibility with the widest range of viewers.
    pub fn save_to_bytes(&mut self) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        self.inner
            .save_to(&mut buffer)
            .map_err(|e| FormError::SaveError(e.to_string()))?;
        Ok(buffer)
    }

    /// Get a reference to the underlying lopdf document
    pub fn inner(&self) -> &Document {
        &self.inner
    }

    /// Get a mutable reference to the underlying lopdf document
    pub fn inner_mut(&mut self) -> &mut Document {
        &mut self.inner
    }

    /// Clone the underlying document graph (used to snapshot the
    /// still-interactive form before destructive flattening)
    pub fn snapshot(&self) -> Document {
        self.inner.clone()
    }

    /// Restore a previously taken snapshot
    pub fn restore(&mut self, snapshot: Document) {
        self.inner = snapshot;
        self.fields = collect_fields(&self.inner);
    }

    pub(crate) fn require_field(&self, name: &str) -> Result<&FieldHandle> {
        self.field(name)
            .ok_or_else(|| FormError::FieldNotFound(name.to_string()))
    }

    /// Drop a field from the enumeration after it has been flattened
    pub(crate) fn forget_field(&mut self, name: &str) {
        self.fields.retain(|f| f.name != name);
    }

    /// Remove a widget annotation from its page's `/Annots` array
    pub(crate) fn remove_widget_annotation(&mut self, page_id: ObjectId, widget_id: ObjectId) {
        let Ok(page_dict) = self.dict_at(page_id) else {
            return;
        };
        let mut page_dict = page_dict.clone();
        let Ok(annots) = page_dict.get(b"Annots") else {
            return;
        };
        let Ok(annots) = self.resolve(annots).as_array() else {
            return;
        };
        let filtered: Vec<Object> = annots
            .iter()
            .filter(|obj| !matches!(obj, Object::Reference(id) if *id == widget_id))
            .cloned()
            .collect();
        page_dict.set(b"Annots", Object::Array(filtered));
        self.inner.objects.insert(page_id, page_dict.into());
    }

    /// The AcroForm dictionary, cloned (write back via
    /// [`set_acroform_dict`](Self::set_acroform_dict))
    pub(crate) fn acroform_dict(&self) -> Option<Dictionary> {
        let catalog = self.catalog_dict()?;
        let acroform = catalog.get(b"AcroForm").ok()?;
        self.resolve(acroform).as_dict().ok().cloned()
    }

    /// Write back an updated AcroForm dictionary, whether it is stored
    /// inline in the catalog or as an indirect object
    pub(crate) fn set_acroform_dict(&mut self, dict: Dictionary) -> Result<()> {
        let catalog_id = self.catalog_id()?;
        let catalog = self.dict_at(catalog_id)?.clone();
        match catalog.get(b"AcroForm") {
            Ok(Object::Reference(acroform_id)) => {
                self.inner.objects.insert(*acroform_id, dict.into());
            }
            _ => {
                let mut new_catalog = catalog;
                new_catalog.set(b"AcroForm", Object::Dictionary(dict));
                self.inner.objects.insert(catalog_id, new_catalog.into());
            }
        }
        Ok(())
    }

    /// Remove the form's top-level definition from the catalog
    pub(crate) fn remove_acroform(&mut self) -> Result<()> {
        let catalog_id = self.catalog_id()?;
        let mut catalog = self.dict_at(catalog_id)?.clone();
        if let Some(Object::Reference(acroform_id)) = catalog.remove(b"AcroForm") {
            self.inner.objects.remove(&acroform_id);
        }
        self.inner.objects.insert(catalog_id, catalog.into());
        Ok(())
    }

    fn catalog_id(&self) -> Result<ObjectId> {
        self.inner
            .trailer
            .get(b"Root")
            .map_err(|_| FormError::ParseError("Document trailer missing Root entry".to_string()))?
            .as_reference()
            .map_err(|_| FormError::ParseError("Root is not a reference".to_string()))
    }

    fn catalog_dict(&self) -> Option<&Dictionary> {
        let catalog_id = self.catalog_id().ok()?;
        self.dict_at(catalog_id).ok()
    }

    /// Lazily create the standard Helvetica font used by synthesized
    /// appearance streams, registering it in the AcroForm `/DR`
    pub(crate) fn ensure_helv_font(&mut self) -> Result<ObjectId> {
        if let Some(id) = self.helv_id {
            return Ok(id);
        }
        let font_id = self.inner.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => "WinAnsiEncoding",
        });
        self.helv_id = Some(font_id);

        if let Some(mut acroform) = self.acroform_dict() {
            let mut dr = match acroform.get(b"DR") {
                Ok(dr) => self.resolve(dr).as_dict().cloned().unwrap_or_default(),
                Err(_) => Dictionary::new(),
            };
            let mut fonts = match dr.get(b"Font") {
                Ok(fonts) => self.resolve(fonts).as_dict().cloned().unwrap_or_default(),
                Err(_) => Dictionary::new(),
            };
            fonts.set(b"Helv", Object::Reference(font_id));
            dr.set(b"Font", Object::Dictionary(fonts));
            acroform.set(b"DR", Object::Dictionary(dr));
            self.set_acroform_dict(acroform)?;
        }
        Ok(font_id)
    }

    pub(crate) fn dict_at(&self, id: ObjectId) -> Result<&Dictionary> {
        self.inner
            .get_object(id)?
            .as_dict()
            .map_err(|_| FormError::ParseError("Object is not a dictionary".to_string()))
    }

    pub(crate) fn dict_at_mut(&mut self, id: ObjectId) -> Result<&mut Dictionary> {
        self.inner
            .get_object_mut(id)?
            .as_dict_mut()
            .map_err(|_| FormError::ParseError("Object is not a dictionary".to_string()))
    }

    /// Follow reference chains to the underlying object
    pub(crate) fn resolve<'a>(&'a self, obj: &'a Object) -> &'a Object {
        let mut current = obj;
        // Reference chains in real documents are shallow; cap the walk.
        for _ in 0..10 {
            match current {
                Object::Reference(id) => match self.inner.get_object(*id) {
                    Ok(next) => current = next,
                    Err(_) => return current,
                },
                _ => return current,
            }
        }
        current
    }
}

/// Decode a PDF text string (UTF-16BE with BOM, or PDFDocEncoding
/// approximated as Latin-1/UTF-8)
pub(crate) fn pdf_string_to_string(bytes: &[u8]) -> String {
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let units: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    String::from_utf8_lossy(bytes).into_owned()
}

fn object_to_f64(obj: &Object) -> Option<f64> {
    obj.as_f32()
        .map(|v| v as f64)
        .ok()
        .or_else(|| obj.as_i64().ok().map(|v| v as f64))
}

/// Enumerate all terminal fields reachable from `/Root /AcroForm /Fields`
fn collect_fields(doc: &Document) -> Vec<FieldHandle> {
    let mut out = Vec::new();

    let Some(fields) = acroform_fields(doc) else {
        return out;
    };
    for entry in fields {
        if let Object::Reference(id) = entry {
            walk_field(doc, id, "", &mut out);
        }
    }
    out
}

fn acroform_fields(doc: &Document) -> Option<Vec<Object>> {
    let root_id = doc.trailer.get(b"Root").ok()?.as_reference().ok()?;
    let catalog = doc.get_object(root_id).ok()?.as_dict().ok()?;
    let acroform = resolve_in(doc, catalog.get(b"AcroForm").ok()?);
    let acroform = acroform.as_dict().ok()?;
    let fields = resolve_in(doc, acroform.get(b"Fields").ok()?);
    fields.as_array().ok().cloned()
}

fn resolve_in<'a>(doc: &'a Document, obj: &'a Object) -> &'a Object {
    let mut current = obj;
    for _ in 0..10 {
        match current {
            Object::Reference(id) => match doc.get_object(*id) {
                Ok(next) => current = next,
                Err(_) => return current,
            },
            _ => return current,
        }
    }
    current
}

fn walk_field(doc: &Document, id: ObjectId, prefix: &str, out: &mut Vec<FieldHandle>) {
    let Ok(dict) = doc.get_object(id).and_then(|o| o.as_dict()) else {
        return;
    };

    let partial = match dict.get(b"T") {
        Ok(Object::String(bytes, _)) => Some(pdf_string_to_string(bytes)),
        _ => None,
    };
    let name = match (&partial, prefix.is_empty()) {
        (Some(t), true) => t.clone(),
        (Some(t), false) => format!("{prefix}.{t}"),
        (None, _) => prefix.to_string(),
    };

    let kid_ids: Vec<ObjectId> = dict
        .get(b"Kids")
        .ok()
        .map(|kids| resolve_in(doc, kids))
        .and_then(|kids| kids.as_array().ok())
        .map(|kids| {
            kids.iter()
                .filter_map(|k| match k {
                    Object::Reference(id) => Some(*id),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default();

    if kid_ids.is_empty() {
        if !name.is_empty() {
            out.push(FieldHandle {
                name,
                field_id: id,
                declared: classify_field(dict),
                widget_ids: vec![id],
            });
        }
        return;
    }

    // Kids without their own /T are widget annotations of this field;
    // kids with /T are sub-fields that must be walked with the
    // qualified prefix.
    let kids_are_widgets = kid_ids.iter().all(|kid_id| {
        doc.get_object(*kid_id)
            .and_then(|o| o.as_dict())
            .map(|d| !d.has(b"T"))
            .unwrap_or(true)
    });

    if kids_are_widgets {
        if !name.is_empty() {
            out.push(FieldHandle {
                name,
                field_id: id,
                declared: classify_field(dict),
                widget_ids: kid_ids,
            });
        }
    } else {
        for kid_id in kid_ids {
            walk_field(doc, kid_id, &name, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pdf_string_utf16() {
        let bytes = [0xFE, 0xFF, 0x00, 0x48, 0x00, 0x69];
        assert_eq!(pdf_string_to_string(&bytes), "Hi");
    }

    #[test]
    fn test_pdf_string_latin() {
        assert_eq!(pdf_string_to_string(b"Student Name"), "Student Name");
    }
}
