//! Digram Stats - per-mode statistics on pairs of consecutive editor commands.
//!
//! This library provides the counter store, the recorder that turns raw
//! command notifications into digram counts, and the lock-file-guarded
//! persistence that lets any number of editor processes share one stats
//! file without losing or double-counting anything.

pub mod config;
pub mod persistence;
pub mod recorder;
pub mod report;
pub mod store;
pub mod tracker;
pub mod types;

#[cfg(test)]
pub mod test_utils;
