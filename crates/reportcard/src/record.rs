//! Submitted record model
//!
//! A record is the key/value payload a caller submits for one report
//! card. Key order matters: later keys overwrite earlier writes to the
//! same physical field, so the record preserves insertion order instead
//! of using a hash map.

use crate::{ReportError, Result};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// How a signature payload should be interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignatureKind {
    /// The signer's name, to be rendered in a cursive font
    Typed,
    /// A captured signature image, as a base64 data URL
    Drawn,
}

/// A signature payload attached to a record key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignatureValue {
    pub kind: SignatureKind,
    pub payload: String,
}

/// One submitted value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FormValue {
    Bool(bool),
    Number(f64),
    Signature(SignatureValue),
    Text(String),
}

impl FormValue {
    /// Render the value as text, the way it should appear in a text
    /// field
    ///
    /// Integral numbers drop the trailing `.0`.
    pub fn as_text(&self) -> String {
        match self {
            FormValue::Text(s) => s.clone(),
            FormValue::Bool(b) => b.to_string(),
            FormValue::Number(n) => {
                if n.fract() == 0.0 && n.is_finite() {
                    format!("{}", *n as i64)
                } else {
                    n.to_string()
                }
            }
            FormValue::Signature(sig) => sig.payload.clone(),
        }
    }

    /// Whether the value reads as "checked" for a checkbox field
    ///
    /// Strings match a small case-insensitive vocabulary; numbers are
    /// truthy only at exactly `1`.
    pub fn is_truthy(&self) -> bool {
        match self {
            FormValue::Bool(b) => *b,
            FormValue::Number(n) => *n == 1.0,
            FormValue::Text(s) => {
                matches!(
                    s.trim().to_lowercase().as_str(),
                    "true" | "yes" | "1" | "checked" | "x" | "on"
                )
            }
            FormValue::Signature(_) => false,
        }
    }
}

/// Ordered key/value map of submitted field values
///
/// Insertion order is preserved; inserting an existing key overwrites
/// its value in place without moving it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormRecord {
    entries: Vec<(String, FormValue)>,
}

impl FormRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a record from a JSON object, preserving key order
    pub fn from_json_str(json: &str) -> Result<Self> {
        let record: FormRecord =
            serde_json::from_str(json).map_err(|e| ReportError::InvalidRecord(e.to_string()))?;
        Ok(record)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Insert or overwrite a key, preserving its original position when
    /// it already exists
    pub fn insert(&mut self, key: impl Into<String>, value: FormValue) {
        let key = key.into();
        if let Some(entry) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            entry.1 = value;
        } else {
            self.entries.push((key, value));
        }
    }

    pub fn get(&self, key: &str) -> Option<&FormValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FormValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, FormValue)> for FormRecord {
    fn from_iter<I: IntoIterator<Item = (String, FormValue)>>(iter: I) -> Self {
        let mut record = FormRecord::new();
        for (key, value) in iter {
            record.insert(key, value);
        }
        record
    }
}

impl Serialize for FormRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for FormRecord {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct RecordVisitor;

        impl<'de> Visitor<'de> for RecordVisitor {
            type Value = FormRecord;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a JSON object of field values")
            }

            fn visit_map<A: MapAccess<'de>>(
                self,
                mut access: A,
            ) -> std::result::Result<FormRecord, A::Error> {
                let mut record = FormRecord::new();
                while let Some((key, value)) = access.next_entry::<String, FormValue>()? {
                    record.insert(key, value);
                }
                Ok(record)
            }
        }

        deserializer.deserialize_map(RecordVisitor)
    }
}
