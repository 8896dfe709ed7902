//! Advisory file locking for the braid issue tracker.
//!
//! Each mutation of an issue holds an exclusive OS advisory lock on
//! `locks/<id>.lock`. Lock files are created lazily, removed on release,
//! and forcibly removable when stale (older than a configured age with no
//! live holder).

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};

use fs2::FileExt;

/// How long to sleep between lock acquisition attempts.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Errors that can occur during lock operations.
#[derive(Debug, thiserror::Error)]
pub enum LockError {
    /// The lock could not be acquired within the timeout.
    #[error("lock busy after {waited:?}: {path}")]
    Busy {
        /// Path of the contended lock file.
        path: PathBuf,
        /// How long the caller waited.
        waited: Duration,
    },

    /// An underlying filesystem error.
    #[error("lock I/O error: {0}")]
    Io(#[from] io::Error),
}

/// A specialized `Result` type for lock operations.
pub type Result<T> = std::result::Result<T, LockError>;

/// An exclusive advisory lock held on a lock file.
///
/// The lock is released and the lock file removed (best-effort) on drop.
#[derive(Debug)]
pub struct LockFile {
    file: File,
    path: PathBuf,
}

impl LockFile {
    /// Acquires an exclusive lock on `path`, waiting up to `timeout`.
    ///
    /// The lock file (and its parent directory) is created if missing.
    /// Returns [`LockError::Busy`] when the timeout elapses while another
    /// holder keeps the lock.
    pub fn acquire(path: &Path, timeout: Duration) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(path)?;

        let start = Instant::now();
        loop {
            match file.try_lock_exclusive() {
                Ok(()) => {
                    return Ok(Self {
                        file,
                        path: path.to_path_buf(),
                    });
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    let waited = start.elapsed();
                    if waited >= timeout {
                        return Err(LockError::Busy {
                            path: path.to_path_buf(),
                            waited,
                        });
                    }
                    std::thread::sleep(POLL_INTERVAL.min(timeout - waited));
                }
                Err(e) => return Err(LockError::Io(e)),
            }
        }
    }

    /// Path of the held lock file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for LockFile {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
        // Lazily-created lock files are removed on release. Racing removals
        // are harmless: the lock itself is what serialises writers.
        let _ = fs::remove_file(&self.path);
    }
}

/// Age of a lock file, from its modification time.
///
/// Returns `None` when the file does not exist or its mtime is unreadable.
pub fn lock_age(path: &Path) -> Option<Duration> {
    let modified = fs::metadata(path).ok()?.modified().ok()?;
    SystemTime::now().duration_since(modified).ok()
}

/// Returns `true` if the lock file is older than `max_age` and no live
/// process holds it (probed with a non-blocking acquire).
pub fn is_stale(path: &Path, max_age: Duration) -> bool {
    match lock_age(path) {
        Some(age) if age > max_age => {}
        _ => return false,
    }

    // Old enough; confirm nobody holds it.
    match OpenOptions::new().read(true).write(true).open(path) {
        Ok(file) => match file.try_lock_exclusive() {
            Ok(()) => {
                let _ = FileExt::unlock(&file);
                true
            }
            Err(_) => false,
        },
        // Already gone.
        Err(_) => false,
    }
}
