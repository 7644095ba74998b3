//! Output formatting
//!
//! - `text`: end-of-run summary on stdout
//! - `json`: machine-readable run summary
//! - `csv`: per-interval time series

pub mod csv;
pub mod json;
pub mod text;
