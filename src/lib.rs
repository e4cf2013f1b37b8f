//! provwatch: deployment provenance watchdog.
//!
//! Scans a source tree for suspicious constructs, verifies it against a
//! digest baseline, cross-checks it with the deployed copy, and raises a
//! single alert when any check fails.

pub mod alert;
pub mod cli;
pub mod core;
pub mod tripwire;
