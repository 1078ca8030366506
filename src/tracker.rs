//! Host-facing facade tying the recorder, store, and persistence
//! together.
//!
//! The host integration is expected to be thin. It calls
//! [`Tracker::record_event`] once per user command and
//! [`Tracker::request_save`] from a timer and at shutdown; reporting
//! goes through [`Tracker::snapshot`]. The tracker owns the in-memory
//! delta; everything persisted lives in the shared stats file.

use std::collections::BTreeSet;

use tracing::warn;

use crate::config::Config;
use crate::persistence::{DeleteOutcome, PersistentLog, Result, SaveOutcome, SavePolicy};
use crate::recorder::EventRecorder;
use crate::store::{CounterStore, SortOrder};
use crate::types::{CommandName, Digram, DigramKey, ModeName};

/// What a [`Tracker::reset_all`] call achieved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetOutcome {
    /// In-memory counts cleared and the stats file deleted.
    Full,
    /// In-memory counts cleared, but the stats file was locked by
    /// another process and survives.
    Partial,
}

pub struct Tracker {
    config: Config,
    store: CounterStore<DigramKey>,
    recorder: EventRecorder,
    log: PersistentLog,
}

impl Tracker {
    pub fn new(config: Config) -> Self {
        let recorder = EventRecorder::new(config.excluded.clone());
        let log = PersistentLog::new(&config.stats_path, &config.lock_path);
        Tracker {
            store: CounterStore::new(),
            recorder,
            log,
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The unsaved delta accumulated since the last successful save.
    pub fn delta(&self) -> &CounterStore<DigramKey> {
        &self.store
    }

    /// Feeds one user-command notification into the digram model.
    /// `command` is `None` for commands without a name.
    pub fn record_event(&mut self, command: Option<&CommandName>, mode: &ModeName) {
        self.recorder.observe(&mut self.store, mode, command);
    }

    /// Merges the delta into the shared stats file.
    ///
    /// # Errors
    ///
    /// Propagates persistence failures; the delta is kept in memory in
    /// that case, so a later save can retry.
    pub fn request_save(&mut self, policy: SavePolicy) -> Result<SaveOutcome> {
        self.log.save(&mut self.store, &self.config.excluded, policy)
    }

    /// A merged, non-destructive view over disk history plus the live
    /// delta, reduced to digrams and ready for a formatter.
    ///
    /// With `mode` set only that mode's digrams are included, otherwise
    /// counts are summed across modes.
    ///
    /// # Errors
    ///
    /// Propagates a corrupt or unreadable stats file.
    pub fn snapshot(
        &self,
        mode: Option<&ModeName>,
        order: SortOrder,
        threshold: i64,
    ) -> Result<(u64, Vec<(Digram, u64)>)> {
        let mut merged = self.store.clone();
        self.log.load_into(&mut merged, &self.config.excluded)?;
        let reduced = match mode {
            Some(mode) => merged.filter_mode(mode),
            None => merged.group_modes(),
        };
        Ok(reduced.extract_sorted(order, threshold))
    }

    /// Every mode present in disk history or the live delta.
    ///
    /// # Errors
    ///
    /// Propagates a corrupt or unreadable stats file.
    pub fn modes(&self) -> Result<BTreeSet<ModeName>> {
        let mut merged = self.store.clone();
        self.log.load_into(&mut merged, &self.config.excluded)?;
        Ok(merged.distinct_modes())
    }

    /// Clears the in-memory delta and deletes the stats file.
    ///
    /// When another process holds the lock the file is left alone and
    /// the reset is only [`ResetOutcome::Partial`]; the in-memory delta
    /// is cleared either way.
    ///
    /// # Errors
    ///
    /// Propagates an IO failure while deleting the file.
    pub fn reset_all(&mut self) -> Result<ResetOutcome> {
        self.store.clear();
        match self.log.delete()? {
            DeleteOutcome::Deleted => Ok(ResetOutcome::Full),
            DeleteOutcome::Contended => {
                warn!(
                    lock = %self.config.lock_path.display(),
                    "stats file is locked; reset is in-memory only"
                );
                Ok(ResetOutcome::Partial)
            }
        }
    }
}
