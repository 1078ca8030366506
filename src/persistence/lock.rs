//! Cooperative lock file guarding the shared stats file.
//!
//! The lock is purely advisory: whoever manages to exclusively create
//! the lock file owns the stats file until the lock file is deleted.
//! Exclusive create is the only atomicity the protocol relies on, so it
//! works on any filesystem without `flock` support. The file holds the
//! owner's process id as a bare decimal string, which is what makes
//! orphan detection possible: a lock whose recorded owner is no longer
//! running is stale and may be deleted by the next claimant.
//!
//! Claim failures are never errors. Any I/O problem while claiming is
//! reported as "not claimed" and left to the caller's retry policy.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

/// Holds a claimed lock and deletes it when dropped.
///
/// Dropping the guard on every exit path keeps the critical section
/// scoped: a failed write inside it still releases the lock. The one
/// escape hatch is [`LockGuard::disarm`], for the case where the lock
/// file on disk turns out not to be ours after all.
#[derive(Debug)]
pub struct LockGuard {
    path: PathBuf,
    armed: bool,
}

impl LockGuard {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Forgets the lock without deleting the file on disk.
    pub fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if self.armed {
            release(&self.path);
        }
    }
}

/// Attempts to claim the lock by exclusively creating its file.
///
/// Returns `None` when the file already exists (someone else holds it)
/// or on any I/O failure, including a failed write of our pid. A lock
/// file we created but could not fill in is removed again, so it cannot
/// linger as an ownerless blocker.
pub fn try_claim(path: &Path) -> Option<LockGuard> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && std::fs::create_dir_all(parent).is_err() {
            return None;
        }
    }
    let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(file) => file,
        Err(e) => {
            if e.kind() != io::ErrorKind::AlreadyExists {
                debug!(lock = %path.display(), error = %e, "lock claim failed");
            }
            return None;
        }
    };
    if file
        .write_all(std::process::id().to_string().as_bytes())
        .is_err()
    {
        drop(file);
        release(path);
        return None;
    }
    Some(LockGuard {
        path: path.to_path_buf(),
        armed: true,
    })
}

/// Deletes the lock file. Idempotent: an absent file is fine, and any
/// other failure is logged and swallowed.
pub fn release(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => {
            debug!(lock = %path.display(), error = %e, "lock release failed");
        }
    }
}

/// The process id recorded in the lock file, if it can be read and
/// parsed. Absent, unreadable, or malformed files yield `None`.
pub fn current_owner(path: &Path) -> Option<u32> {
    let contents = std::fs::read_to_string(path).ok()?;
    contents.trim().parse().ok()
}

/// Whether the lock file exists but its owner is no longer running.
///
/// When ownership cannot be determined (missing file, malformed
/// contents, or a liveness probe that fails for any reason other than
/// "no such process") the lock is assumed live. Stealing an active lock
/// is far worse than waiting out an orphaned one.
pub fn is_stale(path: &Path) -> bool {
    match current_owner(path) {
        Some(pid) => !process_alive(pid),
        None => false,
    }
}

#[cfg(unix)]
fn process_alive(pid: u32) -> bool {
    use nix::errno::Errno;
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    // Pids outside the i32 range cannot name a running process.
    let Ok(pid) = i32::try_from(pid) else {
        return false;
    };
    match kill(Pid::from_raw(pid), None) {
        Ok(()) => true,
        Err(Errno::ESRCH) => false,
        // EPERM and friends mean the process exists but is not ours.
        Err(_) => true,
    }
}

#[cfg(not(unix))]
fn process_alive(_pid: u32) -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claim_writes_our_pid_and_excludes_others() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stats.lock");

        let guard = try_claim(&path).expect("first claim should succeed");
        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, std::process::id().to_string());
        assert_eq!(current_owner(&path), Some(std::process::id()));

        assert!(try_claim(&path).is_none(), "second claim must fail");

        drop(guard);
        assert!(!path.exists(), "dropping the guard must delete the lock");
    }

    #[test]
    fn release_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stats.lock");
        release(&path);
        release(&path);
        assert!(!path.exists());
    }

    #[test]
    fn disarm_leaves_the_file_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stats.lock");
        let guard = try_claim(&path).unwrap();
        guard.disarm();
        assert!(path.exists());
        release(&path);
    }

    #[test]
    fn owner_of_missing_or_malformed_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stats.lock");
        assert_eq!(current_owner(&path), None);

        std::fs::write(&path, "not a pid").unwrap();
        assert_eq!(current_owner(&path), None);
    }

    #[test]
    fn our_own_lock_is_not_stale() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stats.lock");
        let _guard = try_claim(&path).unwrap();
        assert!(!is_stale(&path));
    }

    #[test]
    fn missing_or_malformed_lock_is_not_stale() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stats.lock");
        assert!(!is_stale(&path));

        std::fs::write(&path, "???").unwrap();
        assert!(!is_stale(&path));
    }

    #[cfg(unix)]
    #[test]
    fn lock_owned_by_an_impossible_pid_is_stale() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stats.lock");
        // Beyond i32::MAX, so no running process can hold this id.
        std::fs::write(&path, "4000000000").unwrap();
        assert!(is_stale(&path));
    }
}
