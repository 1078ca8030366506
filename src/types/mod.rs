//! Core domain types for digram tracking.
//!
//! Everything here is a small value type: validated names for commands
//! and modes, and the composite keys the counter table is indexed by.

pub mod digram;
pub mod names;

// Re-export commonly used types at the module level
pub use digram::{Digram, DigramKey};
pub use names::{CommandName, InvalidName, ModeName};
