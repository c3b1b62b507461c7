//! Output generation for extraction results.
//!
//! # Submodules
//!
//! - [`json`]: writes the ordered review records to a timestamped JSON file

pub mod json;
