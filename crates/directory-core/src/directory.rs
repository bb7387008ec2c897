//! Directory trait and the best-effort access wrappers

use async_trait::async_trait;
use tracing::warn;

use crate::error::DirectoryResult;

/// Result of a directory lookup
///
/// `tech_competence` carries the stored category when `found` is true:
/// `Some(true)` for a technical caller, `Some(false)` for a non-technical
/// one. An unknown caller is `found = false`, `tech_competence = None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LookupOutcome {
    /// Whether a record exists for the phone key
    pub found: bool,
    /// Stored competence flag, present only when found
    pub tech_competence: Option<bool>,
}

impl LookupOutcome {
    /// Outcome for a phone key with a stored categorization
    pub fn known(technical: bool) -> Self {
        Self {
            found: true,
            tech_competence: Some(technical),
        }
    }

    /// Outcome for a phone key with no record (or a failed lookup)
    pub fn unknown() -> Self {
        Self {
            found: false,
            tech_competence: None,
        }
    }
}

/// Persistence seam for caller competence records
///
/// Implementations are injected into the chat and voice flows; the flows
/// themselves only ever go through [`lookup_or_unknown`] and
/// [`upsert_best_effort`], which apply the degradation contract.
#[async_trait]
pub trait ContactDirectory: Send + Sync {
    /// Look up the stored competence for a phone key
    async fn lookup(&self, phone_key: &str) -> DirectoryResult<LookupOutcome>;

    /// Insert or overwrite the competence for a phone key (last write wins)
    async fn upsert(&self, phone_key: &str, technical: bool) -> DirectoryResult<()>;
}

/// Look up a phone key, degrading any storage failure to "not found"
///
/// Guarantees the triage path stays available when the store is down.
pub async fn lookup_or_unknown(directory: &dyn ContactDirectory, phone_key: &str) -> LookupOutcome {
    match directory.lookup(phone_key).await {
        Ok(outcome) => outcome,
        Err(e) => {
            warn!("directory lookup failed for {}: {}, treating as unknown", phone_key, e);
            LookupOutcome::unknown()
        }
    }
}

/// Write a categorization, logging and dropping any storage failure
///
/// The routing decision that triggered the write must never be blocked or
/// failed by it.
pub async fn upsert_best_effort(directory: &dyn ContactDirectory, phone_key: &str, technical: bool) {
    if phone_key.is_empty() {
        return;
    }
    if let Err(e) = directory.upsert(phone_key, technical).await {
        warn!("failed to persist categorization for {}: {}", phone_key, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DirectoryError;

    /// Directory stub whose operations always fail
    struct DownDirectory;

    #[async_trait]
    impl ContactDirectory for DownDirectory {
        async fn lookup(&self, _phone_key: &str) -> DirectoryResult<LookupOutcome> {
            Err(DirectoryError::malformed_record("n/a"))
        }

        async fn upsert(&self, _phone_key: &str, _technical: bool) -> DirectoryResult<()> {
            Err(DirectoryError::malformed_record("n/a"))
        }
    }

    #[tokio::test]
    async fn failed_lookup_degrades_to_unknown() {
        let outcome = lookup_or_unknown(&DownDirectory, "+15550001111").await;
        assert_eq!(outcome, LookupOutcome::unknown());
    }

    #[tokio::test]
    async fn failed_upsert_is_swallowed() {
        // Must not panic or propagate
        upsert_best_effort(&DownDirectory, "+15550001111", true).await;
    }

    #[tokio::test]
    async fn empty_phone_key_skips_upsert() {
        upsert_best_effort(&DownDirectory, "", true).await;
    }
}
