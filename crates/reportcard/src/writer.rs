//! Type-aware field value writing
//!
//! One submitted value, one physical field, one write strategy per
//! effective field type. Writes never abort the surrounding fill pass:
//! anything that cannot land is reported back as a [`WriteOutcome`] and
//! logged.

use crate::record::FormValue;
use form_core::{Align, FieldKind, FormDocument};

/// How a single field write ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Written,
    /// Dropdown/radio value matched none of the field's options
    NoMatchingOption,
    /// The field's effective type supports no write for this value
    Unsupported,
}

/// Write one value into one field, dispatching on the field's effective
/// type
///
/// Signature payloads are not handled here; the engine routes them to
/// the signature embedder before the write pass.
pub fn write_value(doc: &mut FormDocument, name: &str, value: &FormValue) -> WriteOutcome {
    if matches!(value, FormValue::Signature(_)) {
        return WriteOutcome::Unsupported;
    }

    let Some(kind) = doc.resolved_kind(name) else {
        return WriteOutcome::Unsupported;
    };

    match kind {
        FieldKind::Text => write_text(doc, name, value),
        FieldKind::Checkbox => match doc.set_checked(name, value.is_truthy()) {
            Ok(()) => WriteOutcome::Written,
            Err(e) => {
                log::warn!("checkbox write failed for '{name}': {e}");
                WriteOutcome::Unsupported
            }
        },
        FieldKind::Dropdown => write_choice(doc, name, value),
        FieldKind::Radio => write_radio(doc, name, value),
        // A declared signature field holding a plain value degrades to
        // a text write.
        FieldKind::Signature => write_text(doc, name, value),
        FieldKind::Unknown => {
            log::warn!("field '{name}' has no writable type");
            WriteOutcome::Unsupported
        }
    }
}

fn write_text(doc: &mut FormDocument, name: &str, value: &FormValue) -> WriteOutcome {
    if let Err(e) = doc.set_text_value(name, &value.as_text()) {
        log::warn!("text write failed for '{name}': {e}");
        return WriteOutcome::Unsupported;
    }
    // Free-text fields read naturally flush left; short data slots
    // (grades, dates, day counts) sit centered in their boxes.
    let align = alignment_for(name);
    let _ = doc.set_alignment(name, align);
    if doc.default_appearance(name).is_none() {
        let _ = doc.set_default_appearance(name, 10.0);
    }
    WriteOutcome::Written
}

fn alignment_for(name: &str) -> Align {
    let lower = name.to_lowercase();
    const LEFT_HINTS: [&str; 8] = [
        "name", "comment", "strength", "goal", "address", "school", "signature", "board",
    ];
    if LEFT_HINTS.iter().any(|hint| lower.contains(hint)) {
        Align::Left
    } else {
        Align::Center
    }
}

fn write_choice(doc: &mut FormDocument, name: &str, value: &FormValue) -> WriteOutcome {
    let options = doc.choice_options(name);
    let Some(matched) = match_option(&options, &value.as_text()) else {
        log::warn!(
            "value '{}' matches no option of dropdown '{name}' ({options:?})",
            value.as_text()
        );
        return WriteOutcome::NoMatchingOption;
    };
    match doc.set_choice_value(name, &matched) {
        Ok(()) => WriteOutcome::Written,
        Err(e) => {
            log::warn!("dropdown write failed for '{name}': {e}");
            WriteOutcome::Unsupported
        }
    }
}

fn write_radio(doc: &mut FormDocument, name: &str, value: &FormValue) -> WriteOutcome {
    let options = doc.radio_options(name);
    let Some(matched) = match_option(&options, &value.as_text()) else {
        log::warn!(
            "value '{}' matches no option of radio group '{name}' ({options:?})",
            value.as_text()
        );
        return WriteOutcome::NoMatchingOption;
    };
    match doc.set_radio_value(name, &matched) {
        Ok(()) => WriteOutcome::Written,
        Err(e) => {
            log::warn!("radio write failed for '{name}': {e}");
            WriteOutcome::Unsupported
        }
    }
}

/// Exact option match first, case-insensitive second
fn match_option(options: &[String], wanted: &str) -> Option<String> {
    if let Some(exact) = options.iter().find(|o| *o == wanted) {
        return Some(exact.clone());
    }
    options
        .iter()
        .find(|o| o.eq_ignore_ascii_case(wanted))
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_match_option_prefers_exact() {
        let options = vec!["a".to_string(), "A".to_string()];
        assert_eq!(match_option(&options, "A").as_deref(), Some("A"));
        assert_eq!(match_option(&options, "a").as_deref(), Some("a"));
    }

    #[test]
    fn test_match_option_case_insensitive_fallback() {
        let options = vec!["Term 1".to_string(), "Term 2".to_string()];
        assert_eq!(match_option(&options, "term 2").as_deref(), Some("Term 2"));
        assert_eq!(match_option(&options, "Term 3"), None);
    }

    #[test]
    fn test_alignment_keywords() {
        assert_eq!(alignment_for("Student Name"), Align::Left);
        assert_eq!(alignment_for("Teacher Comments"), Align::Left);
        assert_eq!(alignment_for("Days Absent"), Align::Center);
        assert_eq!(alignment_for("Grade"), Align::Center);
    }
}
