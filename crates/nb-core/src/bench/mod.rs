//! Check registry and runner.
//!
//! Benchmark content is a list of [`CheckGroup`]s. Items in a group share a
//! target process and a subject (a flag-derived file, a fixed path, a
//! directory tree or the process's flags), so each prerequisite is resolved
//! once per group. The [`Runner`] records exactly one [`CheckOutcome`] per
//! focused item, in declaration order.

pub mod focus;
pub mod item;
pub mod outcome;
pub mod registry;
pub mod report;
pub mod runner;

pub use focus::Focus;
pub use item::{Check, CheckGroup, CheckItem, NodeProcess, ProcessNames, Subject};
pub use outcome::{CheckOutcome, MissingProcessPolicy, SkipReason, Status};
pub use registry::{Registry, RegistryError};
pub use report::{ItemReport, RunReport, Summary};
pub use runner::Runner;
