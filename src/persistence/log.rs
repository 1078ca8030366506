//! Lock-guarded merge of in-memory deltas into the shared stats file.
//!
//! Several editor processes may share one stats file, so every write
//! follows the same discipline:
//!
//! 1. Reclaim the lock file if its owner has died, then claim it.
//! 2. Fold the on-disk history into the delta being saved.
//! 3. Rewrite the whole file through a temp-file rename.
//! 4. Clear the saved delta and release the lock.
//!
//! A process that cannot claim the lock never touches the file at all.
//! Depending on the caller it either retries after a pause (a shutdown
//! save must not lose data) or walks away and leaves the delta in
//! memory for the next autosave tick. Reads take no lock: reporting
//! parses whatever complete file the last successful rename left.
//!
//! # Corruption
//!
//! A stats file that fails to parse stops a save cold. Overwriting
//! history that merely could not be read would destroy it, so the
//! parse error propagates for the caller to surface.

use std::io;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};

use crate::config::ExclusionList;
use crate::store::CounterStore;
use crate::types::DigramKey;

use super::format::{self, FormatError};
use super::lock::{self, LockGuard};

/// How long a blocking save pauses between claim attempts.
const DEFAULT_RETRY_PAUSE: Duration = Duration::from_millis(100);

/// Errors that can occur while reading or rewriting the stats file.
#[derive(Debug, Error)]
pub enum StoreError {
    /// IO error during file operations.
    #[error("stats file IO failed: {0}")]
    Io(#[from] io::Error),

    /// The stats file exists but cannot be parsed.
    #[error("corrupt stats file: {0}")]
    Corrupt(#[from] FormatError),
}

/// Result type for persistence operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Whether a save may wait for the lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SavePolicy {
    /// Retry until the lock is claimed. For shutdown paths, where
    /// giving up would discard the delta along with the process.
    Blocking,
    /// Give up immediately if the lock is held. For periodic autosave;
    /// the delta simply stays in memory until the next tick.
    NonBlocking,
}

/// What a [`PersistentLog::save`] call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// The delta was merged to disk and cleared from the store.
    Saved,
    /// The store was empty; neither the file nor the lock was touched.
    NothingToSave,
    /// The lock was contended and the policy forbade waiting. The
    /// store is untouched.
    Deferred,
}

/// What a [`PersistentLog::delete`] call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// The stats file is gone (or never existed).
    Deleted,
    /// Another process held the lock; the file was left alone.
    Contended,
}

/// Handle on the shared stats file and its lock.
#[derive(Debug, Clone)]
pub struct PersistentLog {
    /// The stats file all processes merge into.
    stats_path: PathBuf,
    /// Lock file serializing writers of `stats_path`.
    lock_path: PathBuf,
    /// Pause between claim attempts of a blocking save.
    retry_pause: Duration,
}

impl PersistentLog {
    pub fn new(stats_path: impl Into<PathBuf>, lock_path: impl Into<PathBuf>) -> Self {
        PersistentLog {
            stats_path: stats_path.into(),
            lock_path: lock_path.into(),
            retry_pause: DEFAULT_RETRY_PAUSE,
        }
    }

    /// Overrides the pause between blocking claim attempts. Tests use
    /// this to keep contention scenarios fast.
    pub fn with_retry_pause(mut self, pause: Duration) -> Self {
        self.retry_pause = pause;
        self
    }

    pub fn stats_path(&self) -> &Path {
        &self.stats_path
    }

    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }

    /// Folds `store`'s delta into the shared stats file.
    ///
    /// On success the file holds the union of its previous records and
    /// the delta, and `store` is cleared: exactly what was persisted is
    /// what was reset, so counts are never lost or double-counted. On
    /// any failure `store` keeps its delta.
    ///
    /// # Errors
    ///
    /// Propagates `Corrupt` when the existing file cannot be parsed
    /// (the file is left untouched) and `Io` when the rewrite fails.
    pub fn save(
        &self,
        store: &mut CounterStore<DigramKey>,
        excluded: &ExclusionList,
        policy: SavePolicy,
    ) -> Result<SaveOutcome> {
        if store.is_empty() {
            return Ok(SaveOutcome::NothingToSave);
        }
        loop {
            let Some(_guard) = self.claim() else {
                match policy {
                    SavePolicy::Blocking => {
                        thread::sleep(self.retry_pause);
                        continue;
                    }
                    SavePolicy::NonBlocking => {
                        debug!(
                            lock = %self.lock_path.display(),
                            "stats file is locked, deferring save"
                        );
                        return Ok(SaveOutcome::Deferred);
                    }
                }
            };
            // Merge history into a scratch copy so a failed write
            // leaves the caller's delta intact for a later retry.
            let mut merged = store.clone();
            self.load_into(&mut merged, excluded)?;
            self.rewrite(&merged)?;
            store.clear();
            debug!(
                records = merged.len(),
                path = %self.stats_path.display(),
                "saved stats"
            );
            return Ok(SaveOutcome::Saved);
        }
    }

    /// Accumulates the stats file's records into `store`.
    ///
    /// A missing file contributes nothing. Records whose successor
    /// command is excluded are dropped, which is how a tightened
    /// exclusion list scrubs already-persisted history. The file is
    /// never modified.
    ///
    /// # Errors
    ///
    /// Propagates `Corrupt` on any parse failure; `store` is left
    /// unmodified in that case.
    pub fn load_into(
        &self,
        store: &mut CounterStore<DigramKey>,
        excluded: &ExclusionList,
    ) -> Result<()> {
        let contents = match std::fs::read_to_string(&self.stats_path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };
        for (key, count) in format::parse(&contents)? {
            if excluded.contains(&key.command) {
                continue;
            }
            store.add(key, count);
        }
        Ok(())
    }

    /// Deletes the stats file, if the lock can be claimed right now.
    pub fn delete(&self) -> Result<DeleteOutcome> {
        let Some(_guard) = self.claim() else {
            return Ok(DeleteOutcome::Contended);
        };
        match std::fs::remove_file(&self.stats_path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        debug!(path = %self.stats_path.display(), "deleted stats file");
        Ok(DeleteOutcome::Deleted)
    }

    /// Claims the lock, reclaiming it first if its owner has died, and
    /// double-checks that the pid on disk is really ours before
    /// trusting the claim. A lock file holding someone else's pid is
    /// theirs to delete, so in that case the guard is disarmed rather
    /// than released.
    fn claim(&self) -> Option<LockGuard> {
        if lock::is_stale(&self.lock_path) {
            warn!(
                lock = %self.lock_path.display(),
                owner = ?lock::current_owner(&self.lock_path),
                "removing stale lock left by a dead process"
            );
            lock::release(&self.lock_path);
        }
        let guard = lock::try_claim(&self.lock_path)?;
        match lock::current_owner(&self.lock_path) {
            Some(pid) if pid == std::process::id() => Some(guard),
            _ => {
                guard.disarm();
                None
            }
        }
    }

    /// Rewrites the stats file in full, via a temp file in the same
    /// directory so the swap is a single rename.
    fn rewrite(&self, store: &CounterStore<DigramKey>) -> Result<()> {
        if let Some(parent) = self.stats_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let tmp = tmp_path(&self.stats_path);
        std::fs::write(&tmp, format::render(store))?;
        std::fs::rename(&tmp, &self.stats_path)?;
        Ok(())
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut os = path.as_os_str().to_os_string();
    os.push(".tmp");
    PathBuf::from(os)
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;
    use crate::types::{CommandName, ModeName};

    fn key(mode: &str, predecessor: &str, command: &str) -> DigramKey {
        DigramKey::new(
            ModeName::parse(mode).unwrap(),
            CommandName::parse(predecessor).unwrap(),
            CommandName::parse(command).unwrap(),
        )
    }

    fn store_of(entries: &[(&str, &str, &str, u64)]) -> CounterStore<DigramKey> {
        entries
            .iter()
            .map(|(m, p, c, n)| (key(m, p, c), *n))
            .collect()
    }

    fn log_in(dir: &tempfile::TempDir) -> PersistentLog {
        let stats = dir.path().join("digrams");
        let lock = dir.path().join("digrams.lock");
        PersistentLog::new(stats, lock).with_retry_pause(Duration::from_millis(5))
    }

    fn no_exclusions() -> ExclusionList {
        ExclusionList::new()
    }

    // ─── Save and load ───

    #[test]
    fn save_clears_the_delta_and_round_trips() {
        let dir = tempdir().unwrap();
        let log = log_in(&dir);
        let mut store = store_of(&[("m", "a", "b", 2), ("m", "b", "c", 1)]);
        let expected = store.clone();

        let outcome = log
            .save(&mut store, &no_exclusions(), SavePolicy::NonBlocking)
            .unwrap();
        assert_eq!(outcome, SaveOutcome::Saved);
        assert!(store.is_empty(), "saved delta must be reset");
        assert!(!log.lock_path().exists(), "lock must be released");

        let mut loaded = CounterStore::new();
        log.load_into(&mut loaded, &no_exclusions()).unwrap();
        assert_eq!(loaded, expected);
    }

    #[test]
    fn saving_an_empty_store_touches_nothing() {
        let dir = tempdir().unwrap();
        let log = log_in(&dir);
        let mut store = CounterStore::new();

        let outcome = log
            .save(&mut store, &no_exclusions(), SavePolicy::Blocking)
            .unwrap();
        assert_eq!(outcome, SaveOutcome::NothingToSave);
        assert!(!log.stats_path().exists());
        assert!(!log.lock_path().exists());
    }

    #[test]
    fn successive_saves_merge_with_disk_history() {
        let dir = tempdir().unwrap();
        let log = log_in(&dir);

        let mut first = store_of(&[("m", "a", "b", 1)]);
        log.save(&mut first, &no_exclusions(), SavePolicy::Blocking)
            .unwrap();

        let mut second = store_of(&[("m", "a", "b", 2), ("m", "b", "c", 1)]);
        log.save(&mut second, &no_exclusions(), SavePolicy::Blocking)
            .unwrap();

        let mut loaded = CounterStore::new();
        log.load_into(&mut loaded, &no_exclusions()).unwrap();
        assert_eq!(loaded, store_of(&[("m", "a", "b", 3), ("m", "b", "c", 1)]));
    }

    #[test]
    fn load_from_a_missing_file_adds_nothing() {
        let dir = tempdir().unwrap();
        let log = log_in(&dir);
        let mut store = store_of(&[("m", "a", "b", 1)]);
        log.load_into(&mut store, &no_exclusions()).unwrap();
        assert_eq!(store, store_of(&[("m", "a", "b", 1)]));
    }

    #[test]
    fn load_drops_records_with_an_excluded_successor() {
        let dir = tempdir().unwrap();
        let log = log_in(&dir);
        let mut history = store_of(&[
            ("m", "a", "noise", 5),
            ("m", "noise", "b", 2),
            ("m", "a", "b", 1),
        ]);
        log.save(&mut history, &no_exclusions(), SavePolicy::Blocking)
            .unwrap();

        let excluded: ExclusionList = [CommandName::parse("noise").unwrap()]
            .into_iter()
            .collect();
        let mut loaded = CounterStore::new();
        log.load_into(&mut loaded, &excluded).unwrap();
        // Only the successor position is filtered; `noise` may still
        // appear as a predecessor in surviving records.
        assert_eq!(
            loaded,
            store_of(&[("m", "noise", "b", 2), ("m", "a", "b", 1)])
        );
    }

    #[test]
    fn zero_count_records_are_dropped_on_load() {
        let dir = tempdir().unwrap();
        let log = log_in(&dir);
        std::fs::write(log.stats_path(), "((((m . a) . b) . 0))\n").unwrap();

        let mut loaded = CounterStore::new();
        log.load_into(&mut loaded, &no_exclusions()).unwrap();
        assert!(loaded.is_empty());
    }

    // ─── Contention ───

    #[test]
    fn non_blocking_save_defers_while_the_lock_is_held() {
        let dir = tempdir().unwrap();
        let log = log_in(&dir);
        let mut store = store_of(&[("m", "a", "b", 1)]);

        let foreign = lock::try_claim(log.lock_path()).unwrap();
        let outcome = log
            .save(&mut store, &no_exclusions(), SavePolicy::NonBlocking)
            .unwrap();
        assert_eq!(outcome, SaveOutcome::Deferred);
        assert_eq!(store, store_of(&[("m", "a", "b", 1)]), "delta must survive");
        assert!(!log.stats_path().exists(), "file must not be touched");
        drop(foreign);

        let outcome = log
            .save(&mut store, &no_exclusions(), SavePolicy::NonBlocking)
            .unwrap();
        assert_eq!(outcome, SaveOutcome::Saved);
    }

    #[test]
    fn blocking_save_waits_out_the_other_writer() {
        let dir = tempdir().unwrap();
        let log = log_in(&dir);

        // The "other process" holds the lock, mid-save.
        let other = lock::try_claim(log.lock_path()).unwrap();

        let worker = {
            let log = log.clone();
            thread::spawn(move || {
                let mut delta = store_of(&[("m", "a", "b", 1), ("m", "b", "c", 4)]);
                let outcome = log
                    .save(&mut delta, &no_exclusions(), SavePolicy::Blocking)
                    .unwrap();
                (outcome, delta.is_empty())
            })
        };

        // Let the worker spin on the lock, then finish the other
        // process's save and release.
        thread::sleep(Duration::from_millis(30));
        let others_delta = store_of(&[("m", "a", "b", 2), ("m", "x", "y", 1)]);
        std::fs::write(log.stats_path(), format::render(&others_delta)).unwrap();
        drop(other);

        let (outcome, cleared) = worker.join().unwrap();
        assert_eq!(outcome, SaveOutcome::Saved);
        assert!(cleared);

        let mut merged = CounterStore::new();
        log.load_into(&mut merged, &no_exclusions()).unwrap();
        assert_eq!(
            merged,
            store_of(&[("m", "a", "b", 3), ("m", "b", "c", 4), ("m", "x", "y", 1)]),
            "the union of both deltas, nothing lost, nothing doubled"
        );
        assert!(!log.lock_path().exists());
    }

    #[cfg(unix)]
    #[test]
    fn stale_lock_is_reclaimed_before_saving() {
        let dir = tempdir().unwrap();
        let log = log_in(&dir);
        std::fs::write(log.lock_path(), "4000000000").unwrap();

        let mut store = store_of(&[("m", "a", "b", 1)]);
        let outcome = log
            .save(&mut store, &no_exclusions(), SavePolicy::NonBlocking)
            .unwrap();
        assert_eq!(outcome, SaveOutcome::Saved);
        assert!(!log.lock_path().exists());
    }

    // ─── Corruption ───

    #[test]
    fn corrupt_file_aborts_the_save_and_preserves_everything() {
        let dir = tempdir().unwrap();
        let log = log_in(&dir);
        std::fs::write(log.stats_path(), "((broken").unwrap();

        let mut store = store_of(&[("m", "a", "b", 1)]);
        let result = log.save(&mut store, &no_exclusions(), SavePolicy::Blocking);
        assert!(matches!(result, Err(StoreError::Corrupt(_))));

        let on_disk = std::fs::read_to_string(log.stats_path()).unwrap();
        assert_eq!(
            on_disk, "((broken",
            "corrupt history must not be overwritten"
        );
        assert_eq!(
            store,
            store_of(&[("m", "a", "b", 1)]),
            "the delta must survive a failed save"
        );
        assert!(
            !log.lock_path().exists(),
            "lock must be released on the error path"
        );
    }

    #[test]
    fn corrupt_file_fails_loading() {
        let dir = tempdir().unwrap();
        let log = log_in(&dir);
        std::fs::write(log.stats_path(), "not a stats file").unwrap();

        let mut store = CounterStore::new();
        let result = log.load_into(&mut store, &no_exclusions());
        assert!(matches!(result, Err(StoreError::Corrupt(_))));
        assert!(store.is_empty());
    }

    // ─── Deletion ───

    #[test]
    fn delete_removes_the_file_under_the_lock() {
        let dir = tempdir().unwrap();
        let log = log_in(&dir);
        let mut store = store_of(&[("m", "a", "b", 1)]);
        log.save(&mut store, &no_exclusions(), SavePolicy::Blocking)
            .unwrap();

        assert_eq!(log.delete().unwrap(), DeleteOutcome::Deleted);
        assert!(!log.stats_path().exists());
        assert!(!log.lock_path().exists());

        // Deleting an already-missing file is still a full delete.
        assert_eq!(log.delete().unwrap(), DeleteOutcome::Deleted);
    }

    #[test]
    fn delete_backs_off_while_the_lock_is_held() {
        let dir = tempdir().unwrap();
        let log = log_in(&dir);
        let mut store = store_of(&[("m", "a", "b", 1)]);
        log.save(&mut store, &no_exclusions(), SavePolicy::Blocking)
            .unwrap();

        let foreign = lock::try_claim(log.lock_path()).unwrap();
        assert_eq!(log.delete().unwrap(), DeleteOutcome::Contended);
        assert!(
            log.stats_path().exists(),
            "contended delete must leave the file"
        );
        drop(foreign);
    }
}
