//! Identifier index with unique-prefix resolution.

use std::collections::BTreeSet;
use std::ops::Bound;
use std::sync::RwLock;

use podlite_shared::errors::{PodliteError, PodliteResult};

/// Index of reserved identifiers supporting partial-ID lookups.
///
/// Clients may address sandboxes and containers by any unambiguous prefix
/// of their full identifier. An exact match always wins, so a full
/// identifier resolves to itself even when it prefixes nothing else.
#[derive(Debug, Default)]
pub struct IdIndex {
    ids: RwLock<BTreeSet<String>>,
}

impl IdIndex {
    /// Create a new empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `id` to the index.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyExists` if the identifier is already indexed.
    pub fn reserve(&self, id: &str) -> PodliteResult<()> {
        let mut ids = self
            .ids
            .write()
            .map_err(|e| PodliteError::Internal(format!("id index lock poisoned: {e}")))?;

        if !ids.insert(id.to_string()) {
            return Err(PodliteError::AlreadyExists(format!("identifier {id}")));
        }
        Ok(())
    }

    /// Remove `id` from the index. Unknown identifiers are a no-op.
    pub fn release(&self, id: &str) -> PodliteResult<()> {
        let mut ids = self
            .ids
            .write()
            .map_err(|e| PodliteError::Internal(format!("id index lock poisoned: {e}")))?;

        ids.remove(id);
        Ok(())
    }

    /// Whether `id` is indexed (exact match only).
    pub fn contains(&self, id: &str) -> PodliteResult<bool> {
        let ids = self
            .ids
            .read()
            .map_err(|e| PodliteError::Internal(format!("id index lock poisoned: {e}")))?;

        Ok(ids.contains(id))
    }

    /// Resolve a possibly-partial identifier to the unique full identifier.
    ///
    /// # Errors
    ///
    /// - `Validation` for an empty input or an ambiguous prefix
    /// - `NotFound` when nothing matches
    pub fn resolve(&self, prefix: &str) -> PodliteResult<String> {
        if prefix.is_empty() {
            return Err(PodliteError::Validation("identifier is empty".to_string()));
        }

        let ids = self
            .ids
            .read()
            .map_err(|e| PodliteError::Internal(format!("id index lock poisoned: {e}")))?;

        if ids.contains(prefix) {
            return Ok(prefix.to_string());
        }

        let mut matches = ids
            .range::<str, _>((Bound::Included(prefix), Bound::Unbounded))
            .take_while(|id| id.starts_with(prefix));

        match (matches.next(), matches.next()) {
            (None, _) => Err(PodliteError::NotFound(format!("identifier {prefix}"))),
            (Some(id), None) => Ok(id.clone()),
            (Some(_), Some(_)) => Err(PodliteError::Validation(format!(
                "identifier prefix {prefix} is ambiguous"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_reserve_and_resolve_exact() {
        let index = IdIndex::new();
        index.reserve("abcdef123456").unwrap();

        assert_eq!(index.resolve("abcdef123456").unwrap(), "abcdef123456");
        assert!(index.contains("abcdef123456").unwrap());
    }

    #[test]
    fn test_reserve_duplicate_fails() {
        let index = IdIndex::new();
        index.reserve("abcdef123456").unwrap();

        let result = index.reserve("abcdef123456");
        assert!(result.is_err());
    }

    #[test]
    fn test_resolve_prefix() {
        let index = IdIndex::new();
        index.reserve("abcdef123456").unwrap();
        index.reserve("fedcba654321").unwrap();

        assert_eq!(index.resolve("abc").unwrap(), "abcdef123456");
        assert_eq!(index.resolve("fed").unwrap(), "fedcba654321");
    }

    #[test]
    fn test_resolve_ambiguous_prefix() {
        let index = IdIndex::new();
        index.reserve("abc111").unwrap();
        index.reserve("abc222").unwrap();

        let result = index.resolve("abc");
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("ambiguous"));
    }

    #[test]
    fn test_resolve_exact_wins_over_prefix() {
        let index = IdIndex::new();
        index.reserve("abc").unwrap();
        index.reserve("abc111").unwrap();

        // "abc" matches both as a prefix, but is itself indexed
        assert_eq!(index.resolve("abc").unwrap(), "abc");
    }

    #[test]
    fn test_resolve_empty_is_error() {
        let index = IdIndex::new();
        let result = index.resolve("");
        assert!(result.is_err());
    }

    #[test]
    fn test_resolve_unknown_is_not_found() {
        let index = IdIndex::new();
        index.reserve("abc111").unwrap();

        let result = index.resolve("zzz");
        assert!(matches!(result, Err(PodliteError::NotFound(_))));
    }

    #[test]
    fn test_release_stops_matching() {
        let index = IdIndex::new();
        index.reserve("abc111").unwrap();
        index.release("abc111").unwrap();

        assert!(index.resolve("abc").is_err());
        assert!(!index.contains("abc111").unwrap());
    }

    proptest! {
        // Any reserved identifier must resolve from its own full form,
        // regardless of what else is indexed.
        #[test]
        fn prop_full_id_resolves_to_itself(
            ids in proptest::collection::hash_set("[0-9a-f]{16}", 1..8)
        ) {
            let index = IdIndex::new();
            for id in &ids {
                index.reserve(id).unwrap();
            }
            for id in &ids {
                prop_assert_eq!(index.resolve(id).unwrap(), id.clone());
            }
        }
    }
}
