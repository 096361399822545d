//! Advisory file lock serializing chunk appends across processes.

use std::{
    fs::{File, OpenOptions},
    path::{Path, PathBuf},
};

use crate::error::{IoResultExt, Result};

/// Exclusive lock on a file shared by every writer of one chunk family.
///
/// `flock` locks belong to the open file description, so two handles opened
/// separately (in one process or in many) exclude each other while threads
/// sharing one handle do not. Callers pair this with an in-process mutex.
#[derive(Debug)]
pub(crate) struct FamilyLock {
    path: PathBuf,
    file: File,
}

/// Held while the exclusive lock is taken; unlocks on drop.
pub(crate) struct FamilyLockGuard<'a> {
    lock: &'a FamilyLock,
}

impl FamilyLock {
    pub(crate) fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(path)
            .at(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    /// Block until this handle holds the exclusive lock.
    pub(crate) fn acquire(&self) -> Result<FamilyLockGuard<'_>> {
        sys::lock_exclusive(&self.file).at(&self.path)?;
        Ok(FamilyLockGuard { lock: self })
    }
}

impl Drop for FamilyLockGuard<'_> {
    fn drop(&mut self) {
        // closing the descriptor also releases the lock, so a failed unlock is not fatal
        let _ = sys::unlock(&self.lock.file);
    }
}

#[cfg(unix)]
mod sys {
    use std::{fs::File, io, os::unix::io::AsRawFd};

    pub(super) fn lock_exclusive(file: &File) -> io::Result<()> {
        loop {
            // SAFETY: the descriptor stays valid for the lifetime of `file`.
            let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX) };
            if rc == 0 {
                return Ok(());
            }
            let err = io::Error::last_os_error();
            if err.kind() != io::ErrorKind::Interrupted {
                return Err(err);
            }
        }
    }

    pub(super) fn unlock(file: &File) -> io::Result<()> {
        // SAFETY: the descriptor stays valid for the lifetime of `file`.
        let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_UN) };
        if rc == 0 {
            Ok(())
        } else {
            Err(io::Error::last_os_error())
        }
    }
}

#[cfg(not(unix))]
mod sys {
    use std::{fs::File, io};

    // Without flock only the in-process mutex serializes writers.
    pub(super) fn lock_exclusive(_file: &File) -> io::Result<()> {
        Ok(())
    }

    pub(super) fn unlock(_file: &File) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::{
        sync::{
            atomic::{AtomicBool, Ordering},
            Arc,
        },
        thread,
        time::Duration,
    };

    use super::*;

    #[test]
    fn separate_handles_exclude_each_other() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join(".chunks.lock");
        let first = FamilyLock::open(&path).expect("open first");
        let second = Arc::new(FamilyLock::open(&path).expect("open second"));
        let acquired = Arc::new(AtomicBool::new(false));

        let guard = first.acquire().expect("first lock");
        let handle = {
            let second = Arc::clone(&second);
            let acquired = Arc::clone(&acquired);
            thread::spawn(move || {
                let _guard = second.acquire().expect("second lock");
                acquired.store(true, Ordering::SeqCst);
            })
        };

        thread::sleep(Duration::from_millis(50));
        assert!(
            !acquired.load(Ordering::SeqCst),
            "second handle must wait while the first holds the lock"
        );
        drop(guard);
        handle.join().expect("join");
        assert!(acquired.load(Ordering::SeqCst));
    }
}
