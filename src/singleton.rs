//! Single-instance guard built on `flock(2)`.
//!
//! The lock belongs to the open file description, so the kernel drops it
//! when the owning process exits for any reason. Nothing has to clean up
//! the lock file itself; a stale file on disk is harmless.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

use nix::errno::Errno;
use nix::fcntl::{Flock, FlockArg};

use crate::error::{Result, VigiloError};

/// Exclusive lock held for the lifetime of the agent process.
#[derive(Debug)]
pub struct SingletonLock {
    path: PathBuf,
    _file: Flock<File>,
}

impl SingletonLock {
    /// Try to take the lock at `path` without blocking.
    ///
    /// Returns `Ok(None)` when another process already holds it.
    pub fn acquire<P: AsRef<Path>>(path: P) -> Result<Option<Self>> {
        let path = path.as_ref();
        let lock_error = |source: std::io::Error| VigiloError::Lock {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(lock_error)?;
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .mode(0o600)
            .open(path)
            .map_err(lock_error)?;

        let mut locked = match Flock::lock(file, FlockArg::LockExclusiveNonblock) {
            Ok(locked) => locked,
            Err((_, errno)) if errno == Errno::EWOULDBLOCK => {
                tracing::debug!("Lock {} is held by another process", path.display());
                return Ok(None);
            }
            Err((_, errno)) => return Err(lock_error(errno.into())),
        };

        // The PID is only informational, failure to record it is not fatal
        let pid = std::process::id();
        let file: &mut File = &mut locked;
        if let Err(e) = file.set_len(0).and_then(|_| write!(file, "{}", pid)) {
            tracing::warn!("Failed to record PID in {}: {}", path.display(), e);
        }

        tracing::info!("Acquired instance lock {} (PID: {})", path.display(), pid);
        Ok(Some(Self {
            path: path.to_path_buf(),
            _file: locked,
        }))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Run `body` while holding the instance lock at `path`.
///
/// Returns `Ok(None)` without calling `body` when another instance already
/// holds the lock. The lock is released once `body` returns.
pub fn with_instance_lock<T, E, F>(path: &Path, body: F) -> std::result::Result<Option<T>, E>
where
    F: FnOnce() -> std::result::Result<T, E>,
    E: From<VigiloError>,
{
    let Some(lock) = SingletonLock::acquire(path)? else {
        tracing::info!("Another Vigilo agent is already running, exiting");
        return Ok(None);
    };

    let outcome = body();
    drop(lock);
    outcome.map(Some)
}
