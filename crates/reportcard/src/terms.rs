//! Term-scoped record keys
//!
//! Report cards cover two reporting terms. Keys carrying a
//! `report1`/`term1` or `report2`/`term2` token (any case) belong to
//! that term; everything else is shared. These helpers are pure
//! key-level functions: no document access, no value inspection.

use crate::record::FormRecord;

/// A reporting term
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Term {
    Term1,
    Term2,
}

/// Which bucket a record key falls in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TermBucket {
    Term1,
    Term2,
    Shared,
}

/// Classify a key by its term token, case-insensitively
///
/// Term-1 tokens are checked first, so a pathological key carrying both
/// lands in term 1.
pub fn classify(key: &str) -> TermBucket {
    let lower = key.to_lowercase();
    if lower.contains("report1") || lower.contains("term1") {
        TermBucket::Term1
    } else if lower.contains("report2") || lower.contains("term2") {
        TermBucket::Term2
    } else {
        TermBucket::Shared
    }
}

/// Split a record into the active term's keys and the shared keys,
/// dropping the other term's keys
pub fn separate(record: &FormRecord, term: Term) -> (FormRecord, FormRecord) {
    let active = match term {
        Term::Term1 => TermBucket::Term1,
        Term::Term2 => TermBucket::Term2,
    };
    let mut term_bucket = FormRecord::new();
    let mut shared = FormRecord::new();
    for (key, value) in record.iter() {
        match classify(key) {
            bucket if bucket == active => term_bucket.insert(key, value.clone()),
            TermBucket::Shared => shared.insert(key, value.clone()),
            _ => {}
        }
    }
    (term_bucket, shared)
}

/// Recombine buckets into one record: shared first, then the other
/// term, then the active term — later inserts win on key collision
pub fn merge(active_term: &FormRecord, shared: &FormRecord, other_term: &FormRecord) -> FormRecord {
    let mut merged = FormRecord::new();
    for (key, value) in shared.iter() {
        merged.insert(key, value.clone());
    }
    for (key, value) in other_term.iter() {
        merged.insert(key, value.clone());
    }
    for (key, value) in active_term.iter() {
        merged.insert(key, value.clone());
    }
    merged
}

/// Produce a term-2 record from a record's term-1 keys
///
/// Each `report1`/`term1` token is rewritten to its term-2 counterpart
/// preserving the token's case pattern; shared keys are copied
/// unchanged; keys already scoped to term 2 are dropped.
pub fn copy_term1_to_term2(record: &FormRecord) -> FormRecord {
    let mut out = FormRecord::new();
    for (key, value) in record.iter() {
        match classify(key) {
            TermBucket::Term1 => out.insert(rewrite_term_tokens(key), value.clone()),
            TermBucket::Shared => out.insert(key, value.clone()),
            TermBucket::Term2 => {}
        }
    }
    out
}

fn rewrite_term_tokens(key: &str) -> String {
    let rewritten = replace_token_preserving_case(key, "report1", "report2");
    replace_token_preserving_case(&rewritten, "term1", "term2")
}

/// Replace every case-insensitive occurrence of `from` with `to`,
/// restyled to the case pattern of the matched text (UPPER, lower, or
/// Capitalized)
///
/// Matching is char-wise; lowercasing a char can change its byte
/// length, so byte offsets into a lowercased copy are not usable as
/// indices into the original.
fn replace_token_preserving_case(haystack: &str, from: &str, to: &str) -> String {
    let chars: Vec<char> = haystack.chars().collect();
    let token: Vec<char> = from.chars().collect();
    let mut out = String::with_capacity(haystack.len());
    let mut i = 0;
    while i < chars.len() {
        if token_matches_at(&chars, i, &token) {
            let sample: String = chars[i..i + token.len()].iter().collect();
            out.push_str(&apply_case_pattern(&sample, to));
            i += token.len();
        } else {
            out.push(chars[i]);
            i += 1;
        }
    }
    out
}

fn token_matches_at(chars: &[char], at: usize, token: &[char]) -> bool {
    chars.len() - at >= token.len()
        && chars[at..at + token.len()]
            .iter()
            .zip(token)
            .all(|(a, b)| a.to_lowercase().eq(b.to_lowercase()))
}

fn apply_case_pattern(sample: &str, word: &str) -> String {
    let letters: Vec<char> = sample.chars().filter(|c| c.is_alphabetic()).collect();
    if !letters.is_empty() && letters.iter().all(|c| c.is_uppercase()) {
        word.to_uppercase()
    } else if letters.first().is_some_and(|c| c.is_uppercase()) {
        let mut chars = word.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    } else {
        word.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::FormValue;
    use pretty_assertions::assert_eq;

    fn text(v: &str) -> FormValue {
        FormValue::Text(v.to_string())
    }

    #[test]
    fn test_classify_tokens() {
        assert_eq!(classify("mathMarkReport1"), TermBucket::Term1);
        assert_eq!(classify("mathMarkReport2"), TermBucket::Term2);
        assert_eq!(classify("HIFDHTERM1"), TermBucket::Term1);
        assert_eq!(classify("TERM2_ABSENT"), TermBucket::Term2);
        assert_eq!(classify("teacher"), TermBucket::Shared);
        // Term-1 token wins when both appear.
        assert_eq!(classify("term1_vs_term2"), TermBucket::Term1);
    }

    #[test]
    fn test_separate_then_merge_round_trips() {
        let mut record = FormRecord::new();
        record.insert("studentName", text("Jane"));
        record.insert("mathMarkReport1", text("A"));
        record.insert("mathMarkReport2", text("B"));
        record.insert("readingMarkTerm1", text("C"));

        let (term1, shared) = separate(&record, Term::Term1);
        let merged = merge(&term1, &shared, &FormRecord::new());

        assert_eq!(merged.get("studentName"), Some(&text("Jane")));
        assert_eq!(merged.get("mathMarkReport1"), Some(&text("A")));
        assert_eq!(merged.get("readingMarkTerm1"), Some(&text("C")));
        assert!(!merged.contains_key("mathMarkReport2"));
        assert_eq!(merged.len(), 3);
    }

    #[test]
    fn test_separate_drops_other_term() {
        let mut record = FormRecord::new();
        record.insert("studentName", text("Jane"));
        record.insert("report1Comments", text("good"));
        record.insert("report2Comments", text("better"));

        let (term, shared) = separate(&record, Term::Term2);
        assert_eq!(term.keys().collect::<Vec<_>>(), vec!["report2Comments"]);
        assert_eq!(shared.keys().collect::<Vec<_>>(), vec!["studentName"]);
    }

    #[test]
    fn test_merge_active_term_wins() {
        let mut shared = FormRecord::new();
        shared.insert("studentName", text("Jane"));
        shared.insert("grade", text("3"));
        let mut other = FormRecord::new();
        other.insert("grade", text("4"));
        let mut active = FormRecord::new();
        active.insert("grade", text("5"));

        let merged = merge(&active, &shared, &other);
        assert_eq!(merged.get("grade"), Some(&text("5")));
        assert_eq!(merged.get("studentName"), Some(&text("Jane")));
    }

    #[test]
    fn test_copy_rewrites_tokens_preserving_case() {
        let mut record = FormRecord::new();
        record.insert("report1Comments", text("good"));
        record.insert("TERM1_ABSENT", text("3"));
        record.insert("Term1Late", text("1"));
        record.insert("studentName", text("Jane"));
        record.insert("report2Comments", text("stale"));

        let copied = copy_term1_to_term2(&record);
        let keys: Vec<&str> = copied.keys().collect();
        assert_eq!(
            keys,
            vec!["report2Comments", "TERM2_ABSENT", "Term2Late", "studentName"]
        );
        // The copied term-1 value replaces the stray term-2 input,
        // which was dropped before the rewrite landed on its key.
        assert_eq!(copied.get("report2Comments"), Some(&text("good")));
    }

    #[test]
    fn test_copy_keeps_distinct_casings_distinct() {
        let mut record = FormRecord::new();
        record.insert("languageMarkReport1", text("A"));
        record.insert("LanguageMarkReport1", text("B"));

        let copied = copy_term1_to_term2(&record);
        assert_eq!(copied.get("languageMarkReport2"), Some(&text("A")));
        assert_eq!(copied.get("LanguageMarkReport2"), Some(&text("B")));
        assert_eq!(copied.len(), 2);
    }

    #[test]
    fn test_copy_handles_non_ascii_keys() {
        // 'İ' grows from two bytes to three under to_lowercase.
        let mut record = FormRecord::new();
        record.insert("İTERM1", text("3"));
        record.insert("mañanaReport1", text("late"));

        let copied = copy_term1_to_term2(&record);
        assert_eq!(copied.get("İTERM2"), Some(&text("3")));
        assert_eq!(copied.get("mañanaReport2"), Some(&text("late")));
    }

    #[test]
    fn test_copy_leaves_shared_untouched() {
        let mut record = FormRecord::new();
        record.insert("teacherName", text("Ms. Rivera"));
        let copied = copy_term1_to_term2(&record);
        assert_eq!(copied.get("teacherName"), Some(&text("Ms. Rivera")));
    }
}
