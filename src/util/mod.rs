//! Utility functions for common operations.
//!
//! - **Terminal safety**: strip control sequences from feed-supplied text
//! - **Dates**: human-readable rendering of raw `published` strings
//! - **Storage naming**: file names for stored feed contents

mod date;
mod text;

pub use date::format_date;
pub use text::{content_file_name, strip_control_chars};
