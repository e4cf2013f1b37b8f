//! Tripwire. Tree walking, streaming digests, drift and keyword detection.

pub mod crosstree;
pub mod drift;
pub mod eventlog;
pub mod hasher;
pub mod pool;
pub mod scanner;
pub mod walker;
