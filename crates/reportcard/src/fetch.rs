//! Template loading with retry
//!
//! Templates live behind some store the caller provides (disk, HTTP
//! proxy, browser cache). Transient fetch failures are retried with
//! exponential backoff up to a small fixed ceiling; the last error
//! surfaces once the ceiling is hit.

use crate::{ReportError, Result};
use std::collections::HashMap;
use std::time::Duration;

/// Source of template bytes, keyed by an opaque reference
pub trait TemplateStore {
    fn fetch(&self, reference: &str) -> Result<Vec<u8>>;
}

/// Backoff schedule for [`fetch_with_retry`]
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(250),
        }
    }
}

impl RetryPolicy {
    /// Delay before the given retry (zero-based): doubles per attempt
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt)
    }
}

/// Fetch a template, retrying transient failures per the policy
pub fn fetch_with_retry(
    store: &dyn TemplateStore,
    reference: &str,
    policy: RetryPolicy,
) -> Result<Vec<u8>> {
    let attempts = policy.max_attempts.max(1);
    let mut last_error = None;
    for attempt in 0..attempts {
        if attempt > 0 {
            std::thread::sleep(policy.delay_for(attempt - 1));
        }
        match store.fetch(reference) {
            Ok(bytes) => return Ok(bytes),
            Err(e) => {
                log::warn!(
                    "template fetch '{reference}' attempt {}/{attempts} failed: {e}",
                    attempt + 1
                );
                last_error = Some(e);
            }
        }
    }
    Err(last_error
        .unwrap_or_else(|| ReportError::FetchError(format!("no attempts made for '{reference}'"))))
}

/// In-memory store for tests and wasm callers that preload bytes
#[derive(Debug, Default)]
pub struct MemoryStore {
    templates: HashMap<String, Vec<u8>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, reference: impl Into<String>, bytes: Vec<u8>) {
        self.templates.insert(reference.into(), bytes);
    }
}

impl TemplateStore for MemoryStore {
    fn fetch(&self, reference: &str) -> Result<Vec<u8>> {
        self.templates
            .get(reference)
            .cloned()
            .ok_or_else(|| ReportError::FetchError(format!("unknown template '{reference}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    /// Fails a fixed number of times before succeeding.
    struct FlakyStore {
        failures_left: Cell<u32>,
        calls: Cell<u32>,
    }

    impl TemplateStore for FlakyStore {
        fn fetch(&self, _reference: &str) -> Result<Vec<u8>> {
            self.calls.set(self.calls.get() + 1);
            let left = self.failures_left.get();
            if left > 0 {
                self.failures_left.set(left - 1);
                Err(ReportError::FetchError("transient".to_string()))
            } else {
                Ok(vec![1, 2, 3])
            }
        }
    }

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(1),
        }
    }

    #[test]
    fn test_succeeds_after_transient_failures() {
        let store = FlakyStore {
            failures_left: Cell::new(2),
            calls: Cell::new(0),
        };
        let bytes = fetch_with_retry(&store, "t", fast_policy(3)).unwrap();
        assert_eq!(bytes, vec![1, 2, 3]);
        assert_eq!(store.calls.get(), 3);
    }

    #[test]
    fn test_ceiling_surfaces_last_error() {
        let store = FlakyStore {
            failures_left: Cell::new(10),
            calls: Cell::new(0),
        };
        let err = fetch_with_retry(&store, "t", fast_policy(3)).unwrap_err();
        assert!(matches!(err, ReportError::FetchError(_)));
        assert_eq!(store.calls.get(), 3);
    }

    #[test]
    fn test_backoff_doubles() {
        let policy = fast_policy(4);
        assert_eq!(policy.delay_for(0), Duration::from_millis(1));
        assert_eq!(policy.delay_for(1), Duration::from_millis(2));
        assert_eq!(policy.delay_for(2), Duration::from_millis(4));
    }

    #[test]
    fn test_memory_store() {
        let mut store = MemoryStore::new();
        store.insert("grade3", vec![9]);
        assert_eq!(store.fetch("grade3").unwrap(), vec![9]);
        assert!(store.fetch("grade4").is_err());
    }
}
