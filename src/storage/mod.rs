//! Persistent archive of enriched items.
//!
//! The archive is a single pretty-printed JSON array, rewritten atomically
//! at the end of each run.

mod archive;
mod types;

pub use archive::ArchiveStore;
pub use types::{ArchiveError, ArchivedItem, Category, DATE_FORMAT};
