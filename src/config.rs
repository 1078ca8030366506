//! Runtime configuration for a tracker instance.

use std::collections::HashSet;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::CommandName;

/// Commands that never take part in digram formation.
///
/// Typical entries are pure repetition noise such as `self-insert-command`
/// or scroll commands. An excluded command is dropped on observation, and
/// records mentioning one as the successor are filtered out again when an
/// existing stats file is read back, so tightening the list retroactively
/// cleans history.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExclusionList {
    commands: HashSet<CommandName>,
}

impl ExclusionList {
    pub fn new() -> Self {
        ExclusionList {
            commands: HashSet::new(),
        }
    }

    pub fn contains(&self, command: &CommandName) -> bool {
        self.commands.contains(command)
    }

    pub fn insert(&mut self, command: CommandName) {
        self.commands.insert(command);
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }
}

impl FromIterator<CommandName> for ExclusionList {
    fn from_iter<I: IntoIterator<Item = CommandName>>(iter: I) -> Self {
        ExclusionList {
            commands: iter.into_iter().collect(),
        }
    }
}

/// Where the tracker keeps its state and how it behaves around saves.
#[derive(Debug, Clone)]
pub struct Config {
    /// The shared stats file, usually in the user's state directory.
    pub stats_path: PathBuf,
    /// Lock file guarding `stats_path` against concurrent writers.
    pub lock_path: PathBuf,
    /// Commands dropped from the digram model.
    pub excluded: ExclusionList,
    /// How often a long-running host should fold its delta to disk.
    pub autosave_interval: Duration,
}

impl Config {
    /// Configuration with defaults. The lock file sits next to the
    /// stats file with a `.lock` suffix; nothing is excluded; autosave
    /// is once a minute.
    pub fn new(stats_path: impl Into<PathBuf>) -> Self {
        let stats_path = stats_path.into();
        let lock_path = default_lock_path(&stats_path);
        Config {
            stats_path,
            lock_path,
            excluded: ExclusionList::new(),
            autosave_interval: Duration::from_secs(60),
        }
    }

    pub fn with_lock_path(mut self, lock_path: impl Into<PathBuf>) -> Self {
        self.lock_path = lock_path.into();
        self
    }

    pub fn with_excluded(mut self, excluded: ExclusionList) -> Self {
        self.excluded = excluded;
        self
    }

    pub fn with_autosave_interval(mut self, interval: Duration) -> Self {
        self.autosave_interval = interval;
        self
    }
}

fn default_lock_path(stats_path: &Path) -> PathBuf {
    let mut os: OsString = stats_path.as_os_str().to_os_string();
    os.push(".lock");
    PathBuf::from(os)
}
