//! csvcombine: merges the per-machine CSV files of one day's partition into a
//! single `combined_data.csv` per subdirectory.
//!
//! Blob layout:
//!
//! ```text
//! {yyyy}/{mm}/{dd}/{machine}/*.csv            inputs
//! {yyyy}/{mm}/{dd}/{machine}/combined_data.csv  output
//! ```
//!
//! The pieces are usable on their own: [`discover::discover`] lists a day's
//! subdirectories, [`combine::combine`] merges one directory, and
//! [`job::run_for_date`] drives both for a whole day. Every component takes
//! its [`storage::BlobStore`] as an argument.

pub mod combine;
pub mod config;
pub mod discover;
pub mod error;
pub mod init;
pub mod job;
pub mod partition;
pub mod schedule;
pub mod storage;

#[cfg(test)]
mod test_support;

pub use error::ErrorCode;
