//! Utility functions shared by the pipeline stages.
//!
//! - **Text processing**: HTML-to-text cleanup, control-character stripping
//!   and display-width truncation
//! - **Filesystem**: atomic write-then-rename for the archive and the
//!   economy batch file

mod fs;
mod text;

pub use fs::write_atomic;
pub use text::{clean_html, display_width, strip_control_chars, truncate_to_width};
