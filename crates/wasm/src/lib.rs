//! WebAssembly bindings for the report-card filling engine
//!
//! Browser callers hand in template bytes once, then fill records as
//! JSON strings and get PDF bytes back as `Uint8Array`. The diagnostic
//! report of the most recent fill is exposed as a plain JS object.

use form_core::FormDocument;
use reportcard::{
    copy_term1_to_term2, merge, separate, FillMode, FillReport, FormRecord, ReportFiller, Term,
    TemplateProfile,
};
use wasm_bindgen::prelude::*;

fn to_js_error(e: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&e.to_string())
}

fn parse_record(json: &str) -> Result<FormRecord, JsValue> {
    FormRecord::from_json_str(json).map_err(to_js_error)
}

fn parse_term(term: u32) -> Result<Term, JsValue> {
    match term {
        1 => Ok(Term::Term1),
        2 => Ok(Term::Term2),
        other => Err(JsValue::from_str(&format!("invalid term {other}"))),
    }
}

/// Fills one report-card template from JSON records
#[wasm_bindgen]
pub struct ReportCardFiller {
    template: Vec<u8>,
    signature_font: Option<Vec<u8>>,
    last_report: Option<FillReport>,
}

#[wasm_bindgen]
impl ReportCardFiller {
    /// Load a template from PDF bytes
    #[wasm_bindgen(constructor)]
    pub fn new(template: &[u8]) -> Result<ReportCardFiller, JsValue> {
        // Validate up front so a bad template fails at construction,
        // not on the first fill.
        FormDocument::open_from_bytes(template).map_err(to_js_error)?;
        Ok(ReportCardFiller {
            template: template.to_vec(),
            signature_font: None,
            last_report: None,
        })
    }

    /// Supply the cursive font used for typed signatures
    #[wasm_bindgen(js_name = setSignatureFont)]
    pub fn set_signature_font(&mut self, font: &[u8]) {
        self.signature_font = Some(font.to_vec());
    }

    /// Number of pages in the template
    #[wasm_bindgen(js_name = pageCount)]
    pub fn page_count(&self) -> Result<usize, JsValue> {
        let doc = FormDocument::open_from_bytes(&self.template).map_err(to_js_error)?;
        Ok(doc.page_count())
    }

    /// Field names the template declares, in document order
    #[wasm_bindgen(js_name = fieldNames)]
    pub fn field_names(&self) -> Result<js_sys::Array, JsValue> {
        let doc = FormDocument::open_from_bytes(&self.template).map_err(to_js_error)?;
        Ok(doc
            .field_names()
            .iter()
            .map(|name| JsValue::from_str(name))
            .collect())
    }

    /// Fill and flatten: the downloadable document
    pub fn fill(&mut self, record_json: &str) -> Result<Vec<u8>, JsValue> {
        self.run(record_json, FillMode::Download)
    }

    /// Fill without flattening: the live-preview document
    pub fn preview(&mut self, record_json: &str) -> Result<Vec<u8>, JsValue> {
        self.run(record_json, FillMode::Preview)
    }

    /// Diagnostic report of the most recent fill, or null
    #[wasm_bindgen(js_name = lastReport)]
    pub fn last_report(&self) -> JsValue {
        match &self.last_report {
            Some(report) => serde_wasm_bindgen::to_value(report).unwrap_or(JsValue::NULL),
            None => JsValue::NULL,
        }
    }

    fn run(&mut self, record_json: &str, mode: FillMode) -> Result<Vec<u8>, JsValue> {
        let record = parse_record(record_json)?;
        let mut filler = ReportFiller::new(self.template.clone(), TemplateProfile::default());
        if let Some(font) = &self.signature_font {
            filler = filler.with_signature_font(font.clone());
        }
        let output = filler.fill(&record, mode).map_err(to_js_error)?;
        self.last_report = Some(output.report);
        Ok(output.bytes)
    }
}

/// Split a record into `{ term, shared }` for the given term (1 or 2)
#[wasm_bindgen(js_name = separateTerm)]
pub fn separate_term(record_json: &str, term: u32) -> Result<JsValue, JsValue> {
    let record = parse_record(record_json)?;
    let (term_bucket, shared) = separate(&record, parse_term(term)?);

    let out = js_sys::Object::new();
    js_sys::Reflect::set(
        &out,
        &JsValue::from_str("term"),
        &JsValue::from_str(&term_bucket.to_json_string().map_err(to_js_error)?),
    )?;
    js_sys::Reflect::set(
        &out,
        &JsValue::from_str("shared"),
        &JsValue::from_str(&shared.to_json_string().map_err(to_js_error)?),
    )?;
    Ok(out.into())
}

/// Merge term buckets back into one record; the active term wins
/// collisions
#[wasm_bindgen(js_name = mergeTerms)]
pub fn merge_terms(
    active_json: &str,
    shared_json: &str,
    other_json: &str,
) -> Result<String, JsValue> {
    let active = parse_record(active_json)?;
    let shared = parse_record(shared_json)?;
    let other = parse_record(other_json)?;
    merge(&active, &shared, &other)
        .to_json_string()
        .map_err(to_js_error)
}

/// Rewrite a record's term-1 keys to term 2, preserving token case
#[wasm_bindgen(js_name = copyTerm1ToTerm2)]
pub fn copy_term1_to_term2_record(record_json: &str) -> Result<String, JsValue> {
    let record = parse_record(record_json)?;
    copy_term1_to_term2(&record)
        .to_json_string()
        .map_err(to_js_error)
}

#[wasm_bindgen(start)]
pub fn start() {
    console_error_panic_hook::set_once();
}
