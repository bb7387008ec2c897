//! # Contact Directory for Helpline
//!
//! Best-effort persistence of a caller's inferred competence, keyed by the
//! phone identifier the caller supplied. The directory is consulted once at
//! contact start (a hit lets the contact skip triage) and written once when
//! triage categorizes the caller.
//!
//! ## Degradation Contract
//!
//! Storage is never allowed to block support delivery:
//!
//! - a failed lookup is reported as "not found", so the contact falls back
//!   to the triage path;
//! - a failed upsert is logged and dropped, so the routing decision that
//!   triggered it still completes.
//!
//! Callers that want those semantics use [`lookup_or_unknown`] and
//! [`upsert_best_effort`] rather than the raw [`ContactDirectory`] methods.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use helpline_directory_core::{ContactDirectory, SqliteDirectory, lookup_or_unknown};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let directory = SqliteDirectory::connect("sqlite:helpline.db").await?;
//! let outcome = lookup_or_unknown(&directory, "+15551234567").await;
//! if outcome.found {
//!     println!("known caller, technical = {:?}", outcome.tech_competence);
//! }
//! # Ok(())
//! # }
//! ```

mod directory;
mod error;
mod memory;
mod sqlite;

pub use directory::{lookup_or_unknown, upsert_best_effort, ContactDirectory, LookupOutcome};
pub use error::{DirectoryError, DirectoryResult};
pub use memory::MemoryDirectory;
pub use sqlite::SqliteDirectory;
