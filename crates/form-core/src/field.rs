//! Field handles and type classification

use lopdf::{Dictionary, Object, ObjectId};

// Field flag bits from the PDF spec (table 226/229).
const FF_RADIO: i64 = 1 << 15;
const FF_PUSHBUTTON: i64 = 1 << 16;

/// Declared type of an interactive field
///
/// `Unknown` covers fields whose `/FT` entry is missing or unreadable;
/// it is resolved once per document by capability probing (see
/// [`FormDocument::resolved_kind`](crate::FormDocument::resolved_kind))
/// and never special-cased by field name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Checkbox,
    Dropdown,
    Radio,
    Signature,
    Unknown,
}

/// Text alignment for field values (`/Q` quadding)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Align {
    #[default]
    Left,
    Center,
    Right,
}

impl Align {
    /// Quadding value for the `/Q` entry
    pub fn quadding(self) -> i64 {
        match self {
            Align::Left => 0,
            Align::Center => 1,
            Align::Right => 2,
        }
    }
}

/// Widget rectangle in PDF user space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl Rect {
    /// Build a rect from `/Rect` array coordinates, normalizing so that
    /// `(x1, y1)` is the lower-left corner.
    pub fn new(a: f64, b: f64, c: f64, d: f64) -> Self {
        Self {
            x1: a.min(c),
            y1: b.min(d),
            x2: a.max(c),
            y2: b.max(d),
        }
    }

    pub fn width(&self) -> f64 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f64 {
        self.y2 - self.y1
    }
}

/// Reference to one interactive field in a loaded document
///
/// A field may be represented by several widget annotations (e.g. a
/// radio group); for the common merged field/widget dictionary the
/// field id doubles as the single widget id.
#[derive(Debug, Clone)]
pub struct FieldHandle {
    /// Fully-qualified field name (`/T`, parent names joined with `.`)
    pub name: String,
    /// Object id of the field dictionary
    pub field_id: ObjectId,
    /// Declared type from `/FT` and `/Ff`
    pub declared: FieldKind,
    /// Widget annotation ids (often just the field id itself)
    pub widget_ids: Vec<ObjectId>,
}

/// Classify a field dictionary from its `/FT` and `/Ff` entries
pub(crate) fn classify_field(dict: &Dictionary) -> FieldKind {
    let ft = match dict.get(b"FT") {
        Ok(Object::Name(name)) => name.as_slice(),
        _ => return FieldKind::Unknown,
    };

    let flags = dict
        .get(b"Ff")
        .ok()
        .and_then(|o| o.as_i64().ok())
        .unwrap_or(0);

    match ft {
        b"Tx" => FieldKind::Text,
        b"Ch" => FieldKind::Dropdown,
        b"Sig" => FieldKind::Signature,
        b"Btn" if flags & FF_PUSHBUTTON != 0 => FieldKind::Unknown,
        b"Btn" if flags & FF_RADIO != 0 => FieldKind::Radio,
        b"Btn" => FieldKind::Checkbox,
        _ => FieldKind::Unknown,
    }
}
