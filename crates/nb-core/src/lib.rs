//! Node Bench Core Library
//!
//! This library provides the core functionality for auditing a Kubernetes
//! worker node against the CIS benchmark:
//! - Process location and argument-vector flag resolution
//! - File predicates over permissions, ownership and directory trees
//! - The check registry, runner and benchmark content
//! - Configuration, logging, report output and exit codes
//!
//! The binary entry point is in `main.rs`.

pub mod bench;
pub mod benchmarks;
pub mod bounded;
pub mod config;
pub mod exit_codes;
pub mod flags;
pub mod logging;
pub mod output;
pub mod predicate;
pub mod process;

// Re-export test utilities for integration tests
#[cfg(any(test, feature = "test-utils"))]
pub mod mock_process;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_log;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
