//! External merge sort for `key:value` text files
//!
//! Sorts files larger than memory by splitting them into sorted runs on disk
//! and k-way merging the runs into one output. Records are ordered by their
//! unsigned 64-bit key; records with equal keys keep their input order.

#![deny(unsafe_code)]
#![warn(clippy::all)]

pub mod error;
pub mod config;

// Sorting pipeline, leaf first
pub mod record;
pub mod run;
pub mod run_builder;
pub mod run_reader;
pub mod merge;
pub mod external_sort;

pub mod generate;
pub mod logging;

// Re-export commonly used types
pub use config::{SortConfig, SortConfigBuilder};
pub use error::{SortError, SortResult};
pub use external_sort::{ExternalSort, OutputStrategy, SortPhase, SortStats};
pub use record::Record;

/// Exit codes
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;
pub const SORT_FAILURE: i32 = 2;

/// Sort `config.input` into `config.output`
pub fn sort(config: &SortConfig) -> SortResult<SortStats> {
    ExternalSort::new(config.clone())?.sort()
}
