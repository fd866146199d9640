//! Token usage records and their aggregation across attempts.
//!
//! Providers report usage under their own keys (`input_tokens`,
//! `prompt_tokens`, `cache_read_input_tokens`, ...), so a [`Usage`] is an
//! open mapping from key to count rather than a fixed struct. Aggregation is
//! a key-wise sum.
//!
//! # Examples
//!
//! ```
//! use rig_instruct::usage::{Metadata, Usage};
//!
//! let first = Usage::from_iter([("input_tokens", 100), ("output_tokens", 50)]);
//! let second = Usage::from_iter([("input_tokens", 120), ("output_tokens", 45)]);
//!
//! let metadata = Metadata::from_attempts(vec![first, second]);
//! assert_eq!(metadata.total.get("input_tokens"), Some(220));
//! assert_eq!(metadata.total.get("output_tokens"), Some(95));
//! assert_eq!(metadata.attempts.len(), 2);
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::AddAssign;

/// Token counts reported by a provider for a single request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Usage(BTreeMap<String, u64>);

impl Usage {
    /// Creates an empty usage record.
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Sets the count for `key`, replacing any previous value.
    pub fn insert(&mut self, key: impl Into<String>, count: u64) {
        self.0.insert(key.into(), count);
    }

    /// Builder-style variant of [`Usage::insert`].
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, count: u64) -> Self {
        self.insert(key, count);
        self
    }

    /// Returns the count recorded under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<u64> {
        self.0.get(key).copied()
    }

    /// Returns `true` if no counts were recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of distinct keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterates over `(key, count)` pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Adds every count in `other` to this record, key by key.
    ///
    /// Keys missing on either side are treated as zero. Sums saturate.
    pub fn merge(&mut self, other: &Self) {
        for (key, count) in &other.0 {
            let entry = self.0.entry(key.clone()).or_insert(0);
            *entry = entry.saturating_add(*count);
        }
    }
}

impl AddAssign<&Self> for Usage {
    fn add_assign(&mut self, rhs: &Self) {
        self.merge(rhs);
    }
}

impl<K: Into<String>> FromIterator<(K, u64)> for Usage {
    fn from_iter<I: IntoIterator<Item = (K, u64)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

/// Usage aggregated over every attempt of one `instruct` call.
///
/// `attempts` is in chronological order and `total` is always the key-wise
/// sum of `attempts`; construct through [`Metadata::from_attempts`] to keep
/// the two in step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    /// Key-wise sum of all attempts.
    pub total: Usage,
    /// One record per attempt, oldest first.
    pub attempts: Vec<Usage>,
}

impl Metadata {
    /// Builds metadata from per-attempt records, computing the total.
    #[must_use]
    pub fn from_attempts(attempts: Vec<Usage>) -> Self {
        let total = attempts.iter().fold(Usage::new(), |mut acc, usage| {
            acc += usage;
            acc
        });
        Self { total, attempts }
    }

    /// Number of attempts recorded.
    #[must_use]
    pub fn attempt_count(&self) -> usize {
        self.attempts.len()
    }
}

/// Estimate token count from text using the 4-chars-per-token heuristic.
///
/// Counts chars rather than bytes and rounds up.
///
/// # Examples
///
/// ```
/// use rig_instruct::usage::estimate_tokens;
///
/// assert_eq!(estimate_tokens("hello"), 2);
/// assert_eq!(estimate_tokens("hello world"), 3);
/// ```
#[must_use]
pub fn estimate_tokens(text: &str) -> u64 {
    text.chars().count().div_ceil(4) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_merge_sums_shared_keys_and_keeps_disjoint_ones() {
        let mut usage = Usage::from_iter([("input_tokens", 10), ("output_tokens", 5)]);
        usage.merge(&Usage::from_iter([("input_tokens", 7), ("cached_tokens", 3)]));

        assert_eq!(usage.get("input_tokens"), Some(17));
        assert_eq!(usage.get("output_tokens"), Some(5));
        assert_eq!(usage.get("cached_tokens"), Some(3));
    }

    #[test]
    fn test_merge_saturates() {
        let mut usage = Usage::new().with("input_tokens", u64::MAX);
        usage += &Usage::new().with("input_tokens", 1);
        assert_eq!(usage.get("input_tokens"), Some(u64::MAX));
    }

    #[test]
    fn test_metadata_of_empty_records_stays_empty() {
        let metadata = Metadata::from_attempts(vec![Usage::new(), Usage::new(), Usage::new()]);
        assert!(metadata.total.is_empty());
        assert_eq!(metadata.attempt_count(), 3);
        assert!(metadata.attempts.iter().all(Usage::is_empty));
    }

    #[test]
    fn test_metadata_serializes_as_total_and_attempts() {
        let metadata = Metadata::from_attempts(vec![
            Usage::from_iter([("input_tokens", 100), ("output_tokens", 50)]),
        ]);

        assert_eq!(
            serde_json::to_value(&metadata).unwrap(),
            json!({
                "total": {"input_tokens": 100, "output_tokens": 50},
                "attempts": [{"input_tokens": 100, "output_tokens": 50}]
            })
        );
    }

    #[test]
    fn test_estimate_tokens() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("a"), 1);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcde"), 2);
    }

    #[test]
    fn test_estimate_tokens_counts_chars_not_bytes() {
        assert_eq!(estimate_tokens("你好"), 1);
        assert_eq!(estimate_tokens("hello 世界"), 2);
    }
}
