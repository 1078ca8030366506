//! Persistence layer for the shared digram stats file.
//!
//! This module keeps one flat file of digram counts shared by any
//! number of editor processes, guarded by a cooperative lock file.
//!
//! # Architecture
//!
//! - **Lock file**: exclusive-create mutual exclusion, pid-stamped for
//!   stale-lock reclamation
//! - **Format**: a sorted Lisp association list, one record per line
//! - **Log**: merge-and-rewrite of each process's in-memory delta into
//!   the shared file
//!
//! # File Layout
//!
//! ```text
//! <state_dir>/
//!   digrams        # ((((mode . predecessor) . command) . count) ...)
//!   digrams.lock   # pid of the process currently writing
//!   digrams.tmp    # staging file, renamed over `digrams` on save
//! ```
//!
//! # Crash Safety
//!
//! The stats file is rewritten atomically via write-to-temp-then-rename,
//! so readers only ever see a complete file. A writer that dies inside
//! its critical section leaves a lock file behind; the next claimant
//! notices the dead pid and reclaims it. Deltas live in process memory
//! until a save succeeds, so a crash costs at most the unsaved delta,
//! never previously persisted history.

pub mod format;
pub mod lock;
pub mod log;

pub use format::FormatError;
pub use lock::LockGuard;
pub use log::{DeleteOutcome, PersistentLog, Result, SaveOutcome, SavePolicy, StoreError};
