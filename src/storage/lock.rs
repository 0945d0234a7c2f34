//! Exclusive ownership of a session directory.
//!
//! An open session holds an OS advisory lock on `<root>/.evidence.lock` for
//! as long as it stays open. The operating system drops the lock when the
//! owning process exits, so a lock file left behind by a crash never blocks
//! the next open. The file also carries the owner's PID, which is only used
//! to name the holder in error messages.

use fs2::FileExt;
use std::fs::{self, File};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::error::{Result, SessionError};

/// Name of the lock file in the session root.
pub const LOCK_FILE: &str = ".evidence.lock";

/// Attempts before giving up when the lock file keeps being replaced under us.
const ACQUIRE_ATTEMPTS: usize = 3;

/// Held for as long as a controller owns the session directory.
///
/// The lock file is removed and the advisory lock released when the value
/// is dropped.
#[derive(Debug)]
pub struct SessionLock {
    root: PathBuf,
    path: PathBuf,
    file: File,
}

impl SessionLock {
    /// Takes the lock on `root`.
    ///
    /// # Errors
    ///
    /// Returns `SessionLocked` if another handle already owns the directory,
    /// or `Io` if the lock file cannot be created or locked.
    pub fn acquire(root: &Path) -> Result<Self> {
        let path = root.join(LOCK_FILE);

        for _ in 0..ACQUIRE_ATTEMPTS {
            let mut file = fs::OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(false)
                .open(&path)
                .map_err(|e| {
                    SessionError::io(format!("Failed to open lock file {}", path.display()), e)
                })?;

            match FileExt::try_lock_exclusive(&file) {
                Ok(()) => {}
                Err(e) if e.kind() == fs2::lock_contended_error().kind() => {
                    return Err(SessionError::SessionLocked {
                        path: root.to_path_buf(),
                        pid: read_pid(&mut file).unwrap_or(0),
                    });
                }
                Err(e) => {
                    return Err(SessionError::io(
                        format!("Failed to lock {}", path.display()),
                        e,
                    ))
                }
            }

            // A previous owner may have unlinked the file between our open
            // and our lock; then we hold a lock nobody else can see
            if !still_linked(&file, &path) {
                tracing::debug!("Lock file {:?} was replaced while locking, retrying", path);
                continue;
            }

            let pid = std::process::id();
            file.set_len(0)
                .and_then(|_| file.seek(SeekFrom::Start(0)))
                .and_then(|_| write!(file, "{pid}"))
                .and_then(|_| file.sync_all())
                .map_err(|e| SessionError::io("Failed to write lock file", e))?;
            tracing::debug!("Acquired session lock {:?} for PID {}", path, pid);

            return Ok(Self {
                root: root.to_path_buf(),
                path,
                file,
            });
        }

        Err(SessionError::SessionLocked {
            path: root.to_path_buf(),
            pid: fs::File::open(&path)
                .ok()
                .and_then(|mut f| read_pid(&mut f))
                .unwrap_or(0),
        })
    }

    /// PID recorded by the handle currently holding the lock on `root`, if
    /// it is held at all. Returns `Some(0)` when the holder's PID is unknown.
    pub fn holder(root: &Path) -> Option<u32> {
        let mut file = fs::OpenOptions::new()
            .read(true)
            .write(true)
            .open(root.join(LOCK_FILE))
            .ok()?;

        match FileExt::try_lock_exclusive(&file) {
            Ok(()) => {
                let _ = FileExt::unlock(&file);
                None
            }
            Err(_) => Some(read_pid(&mut file).unwrap_or(0)),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl Drop for SessionLock {
    fn drop(&mut self) {
        // Unlink while still holding the lock, then release it
        if let Err(e) = fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!("Failed to remove lock file {:?}: {}", self.path, e);
            }
        }
        if let Err(e) = FileExt::unlock(&self.file) {
            tracing::debug!("Failed to unlock {:?}: {}", self.path, e);
        }
    }
}

fn read_pid(file: &mut File) -> Option<u32> {
    let mut contents = String::new();
    file.seek(SeekFrom::Start(0)).ok()?;
    file.read_to_string(&mut contents).ok()?;
    contents.trim().parse().ok()
}

/// Whether `path` still names the file behind `file`.
fn still_linked(file: &File, path: &Path) -> bool {
    #[cfg(unix)]
    {
        use std::os::unix::fs::MetadataExt;

        match (file.metadata(), fs::metadata(path)) {
            (Ok(held), Ok(current)) => held.dev() == current.dev() && held.ino() == current.ino(),
            _ => false,
        }
    }

    #[cfg(not(unix))]
    {
        let _ = file;
        path.exists()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Barrier};
    use tempfile::tempdir;

    fn pid_on_disk(root: &Path) -> Option<u32> {
        let mut file = File::open(root.join(LOCK_FILE)).ok()?;
        read_pid(&mut file)
    }

    #[test]
    fn test_acquire_writes_own_pid() {
        let dir = tempdir().expect("Failed to create temp directory");
        let lock = SessionLock::acquire(dir.path()).expect("Failed to acquire lock");

        assert_eq!(pid_on_disk(dir.path()), Some(std::process::id()));
        assert_eq!(lock.root(), dir.path());
    }

    #[test]
    fn test_second_acquire_is_locked() {
        let dir = tempdir().expect("Failed to create temp directory");
        let _lock = SessionLock::acquire(dir.path()).expect("Failed to acquire lock");

        match SessionLock::acquire(dir.path()) {
            Err(SessionError::SessionLocked { pid, .. }) => {
                assert_eq!(pid, std::process::id())
            }
            other => panic!("Expected SessionLocked, got {other:?}"),
        }
    }

    #[test]
    fn test_drop_releases_lock() {
        let dir = tempdir().expect("Failed to create temp directory");
        {
            let _lock = SessionLock::acquire(dir.path()).expect("Failed to acquire lock");
            assert!(dir.path().join(LOCK_FILE).exists());
            assert_eq!(SessionLock::holder(dir.path()), Some(std::process::id()));
        }
        assert!(!dir.path().join(LOCK_FILE).exists());
        assert_eq!(SessionLock::holder(dir.path()), None);

        SessionLock::acquire(dir.path()).expect("Should re-acquire after release");
    }

    #[test]
    fn test_leftover_lock_file_does_not_block() {
        let dir = tempdir().expect("Failed to create temp directory");
        fs::write(dir.path().join(LOCK_FILE), "not_a_pid").unwrap();
        assert_eq!(SessionLock::holder(dir.path()), None);

        let _lock = SessionLock::acquire(dir.path()).expect("Unheld lock file should be taken");
        assert_eq!(pid_on_disk(dir.path()), Some(std::process::id()));
    }

    #[test]
    fn test_lock_file_of_dead_process_does_not_block() {
        let dir = tempdir().expect("Failed to create temp directory");
        // A PID that is far above any kernel's pid_max
        fs::write(dir.path().join(LOCK_FILE), "4294967").unwrap();

        SessionLock::acquire(dir.path()).expect("Lock of a dead process should be taken");
    }

    #[test]
    fn test_racing_acquires_have_one_winner() {
        for _ in 0..20 {
            let dir = tempdir().expect("Failed to create temp directory");
            fs::write(dir.path().join(LOCK_FILE), "4294967").unwrap();

            let threads = 8;
            let barrier = Arc::new(Barrier::new(threads));
            let handles: Vec<_> = (0..threads)
                .map(|_| {
                    let barrier = Arc::clone(&barrier);
                    let root = dir.path().to_path_buf();
                    std::thread::spawn(move || {
                        barrier.wait();
                        SessionLock::acquire(&root)
                    })
                })
                .collect();

            let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
            let winners = results.iter().filter(|r| r.is_ok()).count();
            assert_eq!(winners, 1, "exactly one acquire should win");
            for result in &results {
                match result {
                    Ok(_) => {}
                    Err(SessionError::SessionLocked { .. }) => {}
                    Err(other) => panic!("Expected SessionLocked, got {other:?}"),
                }
            }
        }
    }
}
