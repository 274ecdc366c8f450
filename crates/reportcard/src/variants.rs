//! Field-name variant resolution
//!
//! Real templates disagree about what the same logical field is called:
//! `languageESL` appears as "Language Esl", "ESL" or "LANGUAGE ESL"
//! depending on who authored the form, and some carry outright typos
//! ("Responsibiity", "Principle Signature") that must be matched
//! verbatim. The resolver turns one logical key into an ordered
//! candidate list: declared synonyms from the embedded table first,
//! then mechanical case transforms. It is pure and deterministic; the
//! caller probes the candidates against the document's actual field
//! names.

use serde::Deserialize;
use std::collections::HashMap;
use std::sync::OnceLock;

static VARIANT_TABLE: OnceLock<VariantTable> = OnceLock::new();

#[derive(Debug, Deserialize)]
struct VariantTable {
    synonyms: HashMap<String, Vec<String>>,
    signature_synonyms: HashMap<String, Vec<String>>,
}

fn table() -> &'static VariantTable {
    VARIANT_TABLE.get_or_init(|| {
        serde_json::from_str(include_str!("../data/field-variants.json"))
            .expect("embedded variant table is valid JSON")
    })
}

/// Ordered candidate field names for a logical key
///
/// Order: the key itself, declared synonyms, then mechanical
/// transforms (spaced Title Case, PascalCase, ALL CAPS, separators
/// stripped, camelCase), de-duplicated first-seen. An empty key yields
/// an empty list.
pub fn resolve_variants(key: &str) -> Vec<String> {
    if key.is_empty() {
        return Vec::new();
    }

    let mut candidates = vec![key.to_string()];
    if let Some(synonyms) = table().synonyms.get(key) {
        candidates.extend(synonyms.iter().cloned());
    }
    candidates.extend(mechanical_variants(key));
    dedup_first_seen(candidates)
}

/// Candidate names for a signature key: signature synonyms first, then
/// the general resolution
pub fn resolve_signature_variants(key: &str) -> Vec<String> {
    if key.is_empty() {
        return Vec::new();
    }

    let mut candidates = Vec::new();
    if let Some(synonyms) = table().signature_synonyms.get(key) {
        candidates.extend(synonyms.iter().cloned());
    }
    candidates.extend(resolve_variants(key));
    dedup_first_seen(candidates)
}

fn mechanical_variants(key: &str) -> Vec<String> {
    let words = split_words(key);
    if words.is_empty() {
        return Vec::new();
    }

    let title: Vec<String> = words.iter().map(|w| title_case(w)).collect();
    let spaced_title = title.join(" ");
    let pascal = title.concat();
    let all_caps = words
        .iter()
        .map(|w| w.to_uppercase())
        .collect::<Vec<_>>()
        .join(" ");
    let stripped: String = key.chars().filter(|c| *c != '_' && *c != '-').collect();
    let camel = {
        let mut out = words[0].to_lowercase();
        for word in &title[1..] {
            out.push_str(word);
        }
        out
    };

    dedup_first_seen(vec![spaced_title, pascal, all_caps, stripped, camel])
}

/// Split a key into words on separators and camel-case boundaries
///
/// An uppercase run followed by a lowercase letter splits before its
/// last capital, so `ESLClass` becomes `ESL` + `Class`.
fn split_words(key: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let chars: Vec<char> = key.chars().collect();

    for (i, &ch) in chars.iter().enumerate() {
        if ch == '_' || ch == '-' || ch == ' ' {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            continue;
        }
        if ch.is_uppercase() && !current.is_empty() {
            let prev = chars[i - 1];
            let next_lower = chars.get(i + 1).is_some_and(|c| c.is_lowercase());
            if prev.is_lowercase() || prev.is_ascii_digit() || (prev.is_uppercase() && next_lower) {
                words.push(std::mem::take(&mut current));
            }
        }
        current.push(ch);
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(|c| c.to_lowercase())).collect(),
        None => String::new(),
    }
}

fn dedup_first_seen(candidates: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    candidates
        .into_iter()
        .filter(|c| !c.is_empty() && seen.insert(c.clone()))
        .collect()
}
