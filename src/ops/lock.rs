//! Cross-process store lock.
//!
//! Every mutating operation (install, uninstall, upgrade, update) holds an
//! exclusive file lock for its duration, so concurrent invocations queue up
//! instead of corrupting the store.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;
use std::time::Duration;

use fs2::FileExt;

/// Held for the lifetime of a mutating operation; released on drop (and by
/// the OS on process exit).
#[derive(Debug)]
pub struct ProcessLock {
    file: File,
}

impl ProcessLock {
    /// Acquire the lock at `path`, waiting for other instances to finish.
    ///
    /// Contention is announced once, then retried every second.
    pub fn acquire(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(path)?;

        if file.try_lock_exclusive().is_err() {
            println!("Another instance is running. Waiting…");
            loop {
                std::thread::sleep(Duration::from_secs(1));
                if file.try_lock_exclusive().is_ok() {
                    break;
                }
            }
        }

        Ok(Self { file })
    }
}

impl Drop for ProcessLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}
