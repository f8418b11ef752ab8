//! Prostation - a factory scan-station ledger
//!
//! An operator scans a unit code at a workstation; the system validates
//! it against the active stage's rules and records the outcome for
//! reporting. This library provides:
//! - The multi-stage scan validation engine (pure, side-effect free)
//! - Data models for stages, scan records and unit progress
//! - Database operations and migrations
//! - Repository layer for data access
//! - CLI command parsing and execution
//! - CSV report generation
//!
//! # Example
//!
//! ```no_run
//! use prostation::cli::run;
//!
//! fn main() {
//!     if let Err(e) = run() {
//!         eprintln!("Error: {}", e);
//!         std::process::exit(1);
//!     }
//! }
//! ```

pub mod cli;
pub mod db;
pub mod engine;
pub mod models;
pub mod repo;
