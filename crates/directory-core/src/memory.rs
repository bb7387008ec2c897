//! In-memory directory used by tests and single-process deployments

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::directory::{ContactDirectory, LookupOutcome};
use crate::error::DirectoryResult;

/// Process-local [`ContactDirectory`] backed by a map
///
/// Useful for tests and demos where persistence across restarts does not
/// matter. Same last-write-wins semantics as the SQLite store.
#[derive(Default)]
pub struct MemoryDirectory {
    records: RwLock<HashMap<String, bool>>,
}

impl MemoryDirectory {
    /// Create an empty directory
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a directory pre-seeded with records, for tests
    pub fn with_records<I>(records: I) -> Self
    where
        I: IntoIterator<Item = (String, bool)>,
    {
        Self {
            records: RwLock::new(records.into_iter().collect()),
        }
    }

    /// Number of stored records
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Whether the directory holds no records
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

#[async_trait]
impl ContactDirectory for MemoryDirectory {
    async fn lookup(&self, phone_key: &str) -> DirectoryResult<LookupOutcome> {
        Ok(match self.records.read().get(phone_key) {
            Some(&technical) => LookupOutcome::known(technical),
            None => LookupOutcome::unknown(),
        })
    }

    async fn upsert(&self, phone_key: &str, technical: bool) -> DirectoryResult<()> {
        self.records.write().insert(phone_key.to_string(), technical);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn upsert_then_lookup_round_trips() {
        let dir = MemoryDirectory::new();
        dir.upsert("+15551234567", true).await.unwrap();

        let outcome = dir.lookup("+15551234567").await.unwrap();
        assert_eq!(outcome, LookupOutcome::known(true));
    }

    #[tokio::test]
    async fn later_upsert_overwrites() {
        let dir = MemoryDirectory::new();
        dir.upsert("+15551234567", true).await.unwrap();
        dir.upsert("+15551234567", false).await.unwrap();

        let outcome = dir.lookup("+15551234567").await.unwrap();
        assert_eq!(outcome, LookupOutcome::known(false));
        assert_eq!(dir.len(), 1);
    }

    #[tokio::test]
    async fn missing_key_is_unknown() {
        let dir = MemoryDirectory::new();
        let outcome = dir.lookup("+15559990000").await.unwrap();
        assert_eq!(outcome, LookupOutcome::unknown());
    }
}
