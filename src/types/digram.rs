//! Key types for the digram count table.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::names::{CommandName, ModeName};

/// Full key under which a digram observation is counted: the pair of
/// consecutive commands plus the mode the second one ran in.
///
/// The derived `Ord` sorts by mode, then predecessor, then command,
/// which is the order records appear in the persisted stats file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DigramKey {
    pub mode: ModeName,
    pub predecessor: CommandName,
    pub command: CommandName,
}

impl DigramKey {
    pub fn new(mode: ModeName, predecessor: CommandName, command: CommandName) -> Self {
        DigramKey {
            mode,
            predecessor,
            command,
        }
    }

    /// The key with its mode stripped, for mode-agnostic aggregation.
    pub fn digram(&self) -> Digram {
        Digram {
            predecessor: self.predecessor.clone(),
            command: self.command.clone(),
        }
    }
}

impl fmt::Display for DigramKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} -> {}", self.mode, self.predecessor, self.command)
    }
}

/// A pair of consecutive commands with the mode projected away.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Digram {
    pub predecessor: CommandName,
    pub command: CommandName,
}

impl Digram {
    pub fn new(predecessor: CommandName, command: CommandName) -> Self {
        Digram {
            predecessor,
            command,
        }
    }
}

impl fmt::Display for Digram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.predecessor, self.command)
    }
}
