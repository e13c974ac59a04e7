//! Feed retrieval and entry normalization.
//!
//! - [`fetcher`] - HTTP fetching with retry, backoff and a size limit
//! - [`parser`] - RSS/Atom parsing using the `feed-rs` crate
//! - [`normalize`] - raw entry → canonical [`NormalizedEntry`]
//!
//! ```ignore
//! use robonews::feed::{fetch_entries, normalize};
//!
//! let raw = fetch_entries(&client, &source, &policy).await?;
//! let entries: Vec<_> = raw
//!     .into_iter()
//!     .filter_map(|e| normalize(e, &source, now).ok())
//!     .collect();
//! ```

mod fetcher;
mod normalize;
mod parser;

pub use fetcher::{build_client, fetch_entries, FetchError, FetchPolicy};
pub use normalize::{normalize, NormalizeError, NormalizedEntry, TimestampSource};
pub use parser::{parse_feed, RawEntry};
