//! Core monitor logic. Config types, parsing, baselines, run orchestration.

pub mod baseline;
pub mod error;
pub mod monitor;
pub mod parser;
pub mod types;
