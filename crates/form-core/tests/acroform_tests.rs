//! Integration tests exercising field enumeration, value writing,
//! appearance regeneration and flattening against in-memory AcroForm
//! documents.

use form_core::{flatten_form, force_appearances, FieldKind, FlattenMode, FormDocument, ImageXObject};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};
use pretty_assertions::assert_eq;

/// Builds a single-page document with an AcroForm, accumulating field
/// and annotation references until `finish`.
struct FormBuilder {
    doc: Document,
    page_id: ObjectId,
    acroform_id: ObjectId,
    field_refs: Vec<Object>,
    annot_refs: Vec<Object>,
}

impl FormBuilder {
    fn new() -> Self {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => Object::Reference(pages_id),
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![Object::Reference(page_id)],
                "Count" => 1,
            }),
        );
        let acroform_id = doc.add_object(dictionary! {
            "Fields" => Object::Array(Vec::new()),
        });
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => Object::Reference(pages_id),
            "AcroForm" => Object::Reference(acroform_id),
        });
        doc.trailer.set("Root", Object::Reference(catalog_id));

        Self {
            doc,
            page_id,
            acroform_id,
            field_refs: Vec::new(),
            annot_refs: Vec::new(),
        }
    }

    /// Add a merged field/widget dictionary, wiring `/P` and `/Annots`
    fn add_field(&mut self, mut dict: Dictionary) -> ObjectId {
        dict.set("Type", "Annot");
        dict.set("Subtype", "Widget");
        dict.set("P", Object::Reference(self.page_id));
        let id = self.doc.add_object(dict);
        self.field_refs.push(Object::Reference(id));
        self.annot_refs.push(Object::Reference(id));
        id
    }

    /// Add a field dictionary that is NOT attached to any page
    fn add_orphan_field(&mut self, dict: Dictionary) -> ObjectId {
        let id = self.doc.add_object(dict);
        self.field_refs.push(Object::Reference(id));
        id
    }

    /// Add a form XObject appearance stream
    fn add_appearance(&mut self, width: i64, height: i64, content: &[u8]) -> ObjectId {
        self.doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Form",
                "BBox" => vec![0.into(), 0.into(), width.into(), height.into()],
            },
            content.to_vec(),
        ))
    }

    fn finish(mut self) -> Vec<u8> {
        let field_refs = std::mem::take(&mut self.field_refs);
        if let Ok(acroform) = self
            .doc
            .get_object_mut(self.acroform_id)
            .and_then(|o| o.as_dict_mut())
        {
            acroform.set("Fields", field_refs);
        }
        let annot_refs = std::mem::take(&mut self.annot_refs);
        let page_id = self.page_id;
        if let Ok(page) = self.doc.get_object_mut(page_id).and_then(|o| o.as_dict_mut()) {
            page.set("Annots", annot_refs);
        }
        let mut bytes = Vec::new();
        self.doc.save_to(&mut bytes).expect("save in-memory document");
        bytes
    }
}

fn text_field(name: &str) -> Dictionary {
    dictionary! {
        "FT" => "Tx",
        "T" => Object::string_literal(name),
        "Rect" => vec![100.into(), 700.into(), 300.into(), 730.into()],
        "DA" => Object::string_literal("/Helv 12 Tf 0 g"),
    }
}

fn checkbox_field(builder: &mut FormBuilder, name: &str, on_state: &str) -> Dictionary {
    let on = builder.add_appearance(20, 20, b"q 0 g BT ET Q");
    let off = builder.add_appearance(20, 20, b"");
    let mut states = Dictionary::new();
    states.set(on_state.as_bytes(), Object::Reference(on));
    states.set("Off", Object::Reference(off));
    dictionary! {
        "FT" => "Btn",
        "T" => Object::string_literal(name),
        "Rect" => vec![100.into(), 650.into(), 120.into(), 670.into()],
        "AP" => dictionary! { "N" => Object::Dictionary(states) },
        "AS" => Object::Name(b"Off".to_vec()),
        "V" => Object::Name(b"Off".to_vec()),
    }
}

fn sample_jpeg() -> Vec<u8> {
    use image::{codecs::jpeg::JpegEncoder, ExtendedColorType, ImageEncoder, Rgb, RgbImage};
    let img = RgbImage::from_pixel(30, 10, Rgb([50, 90, 130]));
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, 85)
        .write_image(img.as_raw(), 30, 10, ExtendedColorType::Rgb8)
        .unwrap();
    out
}

#[test]
fn test_enumerates_fields_in_order() {
    let mut b = FormBuilder::new();
    b.add_field(text_field("Student Name"));
    let cb = checkbox_field(&mut b, "Language Esl", "On");
    b.add_field(cb);
    b.add_field(dictionary! {
        "FT" => "Sig",
        "T" => Object::string_literal("Principle Signature"),
        "Rect" => vec![100.into(), 100.into(), 300.into(), 160.into()],
    });
    let bytes = b.finish();

    let doc = FormDocument::open_from_bytes(&bytes).unwrap();
    assert_eq!(
        doc.field_names(),
        vec!["Student Name", "Language Esl", "Principle Signature"]
    );
    assert_eq!(doc.declared_kind("Student Name"), Some(FieldKind::Text));
    assert_eq!(doc.declared_kind("Language Esl"), Some(FieldKind::Checkbox));
    assert_eq!(
        doc.declared_kind("Principle Signature"),
        Some(FieldKind::Signature)
    );
    assert!(!doc.has_field("Missing"));
}

#[test]
fn test_resolved_kind_probes_missing_type() {
    let mut b = FormBuilder::new();
    // No /FT, but a non-Off appearance state: behaves like a checkbox.
    let on = b.add_appearance(20, 20, b"q BT ET Q");
    b.add_field(dictionary! {
        "T" => Object::string_literal("mystery_check"),
        "Rect" => vec![10.into(), 10.into(), 30.into(), 30.into()],
        "AP" => dictionary! { "N" => dictionary! { "X" => Object::Reference(on) } },
    });
    // No /FT, but text machinery: behaves like a text field.
    b.add_field(dictionary! {
        "T" => Object::string_literal("mystery_text"),
        "Rect" => vec![10.into(), 40.into(), 200.into(), 60.into()],
        "DA" => Object::string_literal("/Helv 10 Tf 0 g"),
    });
    // Neither capability.
    b.add_field(dictionary! {
        "T" => Object::string_literal("mystery_none"),
        "Rect" => vec![10.into(), 70.into(), 30.into(), 90.into()],
    });
    let bytes = b.finish();

    let mut doc = FormDocument::open_from_bytes(&bytes).unwrap();
    assert_eq!(doc.declared_kind("mystery_check"), Some(FieldKind::Unknown));
    assert_eq!(doc.resolved_kind("mystery_check"), Some(FieldKind::Checkbox));
    assert_eq!(doc.resolved_kind("mystery_text"), Some(FieldKind::Text));
    assert_eq!(doc.resolved_kind("mystery_none"), Some(FieldKind::Unknown));
    // Second lookup hits the cache and agrees.
    assert_eq!(doc.resolved_kind("mystery_check"), Some(FieldKind::Checkbox));
}

#[test]
fn test_text_value_and_forced_appearance() {
    let mut b = FormBuilder::new();
    b.add_field(text_field("Student Name"));
    let bytes = b.finish();

    let mut doc = FormDocument::open_from_bytes(&bytes).unwrap();
    doc.set_text_value("Student Name", "Jane (Doe)").unwrap();
    assert_eq!(doc.text_value("Student Name").as_deref(), Some("Jane (Doe)"));

    force_appearances(&mut doc);

    let widget_id = doc.field("Student Name").unwrap().widget_ids[0];
    let widget = doc
        .inner()
        .get_object(widget_id)
        .unwrap()
        .as_dict()
        .unwrap();
    let ap = widget.get(b"AP").unwrap().as_dict().unwrap();
    let stream_id = ap.get(b"N").unwrap().as_reference().unwrap();
    let stream = match doc.inner().get_object(stream_id).unwrap() {
        Object::Stream(s) => s,
        other => panic!("expected appearance stream, got {other:?}"),
    };
    let content = String::from_utf8_lossy(&stream.content);
    assert!(content.contains("(Jane \\(Doe\\)) Tj"), "content: {content}");
    assert!(content.contains("/Helv 12.00 Tf"));
}

#[test]
fn test_appearance_pass_survives_broken_field() {
    let mut b = FormBuilder::new();
    b.add_field(text_field("Student Name"));
    // Checkbox whose only widget reference points at nothing.
    let dangling = b.doc.new_object_id();
    b.add_orphan_field(dictionary! {
        "FT" => "Btn",
        "T" => Object::string_literal("Glitch Check"),
        "Kids" => vec![Object::Reference(dangling)],
    });
    let bytes = b.finish();

    let mut doc = FormDocument::open_from_bytes(&bytes).unwrap();
    doc.set_text_value("Student Name", "Alex Kim").unwrap();

    let failed = force_appearances(&mut doc);
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].0, "Glitch Check");

    // The healthy field still got its regenerated appearance.
    let widget_id = doc.field("Student Name").unwrap().widget_ids[0];
    let widget = doc
        .inner()
        .get_object(widget_id)
        .unwrap()
        .as_dict()
        .unwrap();
    assert!(widget.has(b"AP"));
}

#[test]
fn test_checkbox_respects_declared_on_state() {
    let mut b = FormBuilder::new();
    let cb = checkbox_field(&mut b, "Homework Done", "Ticked");
    b.add_field(cb);
    let bytes = b.finish();

    let mut doc = FormDocument::open_from_bytes(&bytes).unwrap();
    assert_eq!(doc.checkbox_on_state("Homework Done").as_deref(), Some("Ticked"));
    assert!(!doc.is_checked("Homework Done"));

    doc.set_checked("Homework Done", true).unwrap();
    assert!(doc.is_checked("Homework Done"));

    let widget_id = doc.field("Homework Done").unwrap().widget_ids[0];
    let widget = doc
        .inner()
        .get_object(widget_id)
        .unwrap()
        .as_dict()
        .unwrap();
    assert_eq!(widget.get(b"V").unwrap(), &Object::Name(b"Ticked".to_vec()));
    assert_eq!(widget.get(b"AS").unwrap(), &Object::Name(b"Ticked".to_vec()));

    doc.set_checked("Homework Done", false).unwrap();
    assert!(!doc.is_checked("Homework Done"));
}

#[test]
fn test_choice_options_mixed_entries() {
    let mut b = FormBuilder::new();
    b.add_field(dictionary! {
        "FT" => "Ch",
        "T" => Object::string_literal("Grade"),
        "Rect" => vec![100.into(), 600.into(), 200.into(), 620.into()],
        "Opt" => vec![
            Object::string_literal("A"),
            Object::Array(vec![
                Object::string_literal("B"),
                Object::string_literal("B (Good)"),
            ]),
            Object::string_literal("C"),
        ],
    });
    let bytes = b.finish();

    let mut doc = FormDocument::open_from_bytes(&bytes).unwrap();
    assert_eq!(doc.choice_options("Grade"), vec!["A", "B", "C"]);

    doc.set_choice_value("Grade", "B").unwrap();
    assert_eq!(doc.text_value("Grade").as_deref(), Some("B"));
}

#[test]
fn test_radio_group_selection() {
    let mut b = FormBuilder::new();
    let parent_id = b.doc.new_object_id();
    let on1 = b.add_appearance(16, 16, b"q BT ET Q");
    let on2 = b.add_appearance(16, 16, b"q BT ET Q");
    let w1 = b.doc.add_object(dictionary! {
        "Type" => "Annot",
        "Subtype" => "Widget",
        "Parent" => Object::Reference(parent_id),
        "P" => Object::Reference(b.page_id),
        "Rect" => vec![100.into(), 500.into(), 116.into(), 516.into()],
        "AP" => dictionary! { "N" => dictionary! { "Term1" => Object::Reference(on1) } },
        "AS" => Object::Name(b"Off".to_vec()),
    });
    let w2 = b.doc.add_object(dictionary! {
        "Type" => "Annot",
        "Subtype" => "Widget",
        "Parent" => Object::Reference(parent_id),
        "P" => Object::Reference(b.page_id),
        "Rect" => vec![130.into(), 500.into(), 146.into(), 516.into()],
        "AP" => dictionary! { "N" => dictionary! { "Term2" => Object::Reference(on2) } },
        "AS" => Object::Name(b"Off".to_vec()),
    });
    b.doc.objects.insert(
        parent_id,
        Object::Dictionary(dictionary! {
            "FT" => "Btn",
            "T" => Object::string_literal("Reporting Term"),
            "Ff" => 1i64 << 15,
            "Kids" => vec![Object::Reference(w1), Object::Reference(w2)],
        }),
    );
    b.field_refs.push(Object::Reference(parent_id));
    b.annot_refs.push(Object::Reference(w1));
    b.annot_refs.push(Object::Reference(w2));
    let bytes = b.finish();

    let mut doc = FormDocument::open_from_bytes(&bytes).unwrap();
    assert_eq!(doc.declared_kind("Reporting Term"), Some(FieldKind::Radio));
    assert_eq!(doc.radio_options("Reporting Term"), vec!["Term1", "Term2"]);

    doc.set_radio_value("Reporting Term", "Term2").unwrap();
    let handle = doc.field("Reporting Term").unwrap().clone();
    assert_eq!(handle.widget_ids.len(), 2);
    let as1 = doc
        .inner()
        .get_object(handle.widget_ids[0])
        .unwrap()
        .as_dict()
        .unwrap()
        .get(b"AS")
        .unwrap()
        .clone();
    let as2 = doc
        .inner()
        .get_object(handle.widget_ids[1])
        .unwrap()
        .as_dict()
        .unwrap()
        .get(b"AS")
        .unwrap()
        .clone();
    assert_eq!(as1, Object::Name(b"Off".to_vec()));
    assert_eq!(as2, Object::Name(b"Term2".to_vec()));
}

#[test]
fn test_flatten_bulk_removes_interactive_layer() {
    let mut b = FormBuilder::new();
    b.add_field(text_field("Student Name"));
    let cb = checkbox_field(&mut b, "Language Esl", "On");
    b.add_field(cb);
    let bytes = b.finish();

    let mut doc = FormDocument::open_from_bytes(&bytes).unwrap();
    doc.set_text_value("Student Name", "Alex Kim").unwrap();
    doc.set_checked("Language Esl", true).unwrap();
    force_appearances(&mut doc);

    let outcome = flatten_form(&mut doc).unwrap();
    assert_eq!(outcome.mode, FlattenMode::Bulk);
    assert!(outcome.is_clean());

    let flat = doc.save_to_bytes().unwrap();
    let reloaded = Document::load_mem(&flat).unwrap();
    let root_id = reloaded.trailer.get(b"Root").unwrap().as_reference().unwrap();
    let catalog = reloaded.get_object(root_id).unwrap().as_dict().unwrap();
    assert!(!catalog.has(b"AcroForm"));

    let reopened = FormDocument::open_from_bytes(&flat).unwrap();
    assert!(reopened.field_names().is_empty());

    let page_id = reopened.page_ids()[0];
    let content = reloaded.get_page_content(page_id).unwrap();
    let content = String::from_utf8_lossy(&content);
    assert!(content.contains("Do"), "appearances stamped: {content}");
}

#[test]
fn test_flatten_falls_back_to_per_field() {
    let mut b = FormBuilder::new();
    b.add_field(text_field("Student Name"));
    // Widget with a stampable appearance but no host page anywhere.
    let ap = b.add_appearance(200, 30, b"q BT (orphan) Tj ET Q");
    b.add_orphan_field(dictionary! {
        "FT" => "Tx",
        "T" => Object::string_literal("Orphan"),
        "Rect" => vec![0.into(), 0.into(), 200.into(), 30.into()],
        "AP" => dictionary! { "N" => Object::Reference(ap) },
    });
    let bytes = b.finish();

    let mut doc = FormDocument::open_from_bytes(&bytes).unwrap();
    doc.set_text_value("Student Name", "Alex Kim").unwrap();
    force_appearances(&mut doc);

    let outcome = flatten_form(&mut doc).unwrap();
    assert_eq!(outcome.mode, FlattenMode::PerField);
    assert_eq!(outcome.failed_fields.len(), 1);
    assert_eq!(outcome.failed_fields[0].0, "Orphan");

    // The healthy field is flattened and the form definition is gone.
    let flat = doc.save_to_bytes().unwrap();
    let reloaded = FormDocument::open_from_bytes(&flat).unwrap();
    assert!(reloaded.field_names().is_empty());
}

#[test]
fn test_stamp_image_onto_page() {
    let mut b = FormBuilder::new();
    let bytes = b.finish();

    let mut doc = FormDocument::open_from_bytes(&bytes).unwrap();
    let page_id = doc.page_ids()[0];
    let xobj = ImageXObject::from_bytes(&sample_jpeg()).unwrap();
    assert_eq!((xobj.width, xobj.height), (30, 10));

    doc.stamp_image(page_id, xobj, 100.0, 500.0, 120.0, 40.0).unwrap();

    let saved = doc.save_to_bytes().unwrap();
    let reloaded = Document::load_mem(&saved).unwrap();
    let content = reloaded.get_page_content(page_id).unwrap();
    let content = String::from_utf8_lossy(&content);
    assert!(content.contains("/Im1 Do"), "content: {content}");
}

#[test]
fn test_widget_rect_and_page() {
    let mut b = FormBuilder::new();
    b.add_field(text_field("Student Name"));
    let bytes = b.finish();

    let doc = FormDocument::open_from_bytes(&bytes).unwrap();
    let rect = doc.widget_rect("Student Name").unwrap();
    assert_eq!(rect.width(), 200.0);
    assert_eq!(rect.height(), 30.0);
    assert_eq!(doc.widget_page("Student Name"), Some(doc.page_ids()[0]));
}
