use std::{
    fs::{self, File, OpenOptions},
    io,
    path::{Path, PathBuf},
    time::Duration,
};

use fs2::FileExt;
use log::{trace, warn};

const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug)]
pub enum LockError {
    IoError(io::Error),
}

pub type LockResult<T> = Result<T, LockError>;

/// Exclusive, cross-process lock for a single session.
///
/// The lock file lives in `<config dir>/lock_files/<session>.lock`. Dropping a
/// held lock releases it.
#[derive(Debug)]
pub struct SessionLock {
    path: PathBuf,
    file: Option<File>,
}

impl SessionLock {
    /// Create a new, not yet acquired, `SessionLock`
    pub fn new(config_path: &Path, session_name: &str) -> Self {
        let base = config_path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));

        Self {
            path: base
                .join("lock_files")
                .join(format!("{}.lock", session_name)),
            file: None,
        }
    }

    #[cfg(test)]
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_held(&self) -> bool {
        self.file.is_some()
    }

    /// Try to take the lock without waiting, returns whether it is now held
    pub fn try_acquire(&mut self) -> LockResult<bool> {
        if self.is_held() {
            return Ok(true);
        }

        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir).map_err(LockError::IoError)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&self.path)
            .map_err(LockError::IoError)?;

        match FileExt::try_lock_exclusive(&file) {
            Ok(()) => {
                self.file = Some(file);
                Ok(true)
            }
            Err(error) if error.kind() == fs2::lock_contended_error().kind() => Ok(false),
            Err(error) => Err(LockError::IoError(error)),
        }
    }

    /// Wait until the lock is held by this process
    pub async fn acquire(&mut self) -> LockResult<()> {
        while !self.try_acquire()? {
            trace!("Waiting for {}", self.path.display());
            tokio::time::sleep(LOCK_POLL_INTERVAL).await;
        }

        Ok(())
    }

    /// Release the lock if held, returns whether a release happened
    pub fn release(&mut self) -> bool {
        match self.file.take() {
            Some(file) => {
                if let Err(error) = FileExt::unlock(&file) {
                    warn!("Cannot unlock {}: {:?}", self.path.display(), error);
                }
                trace!("Released {}", self.path.display());
                true
            }
            None => false,
        }
    }
}

impl Drop for SessionLock {
    fn drop(&mut self) {
        self.release();
    }
}
