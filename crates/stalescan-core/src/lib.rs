//! Core types for stalescan.
//!
//! This crate provides the data model shared by the scanning engine and the
//! command-line front end: scan configuration, per-directory aggregates,
//! match records, scan results, and the error taxonomy.

mod config;
mod error;
mod record;
mod result;

pub use config::{ScanConfig, ScanConfigBuilder, TimeBasis};
pub use error::{ScanError, ScanWarning, WarningKind};
pub use record::{DirAggregate, InodeInfo, MatchRecord};
pub use result::{ScanResult, ScanStats, SortOrder};
