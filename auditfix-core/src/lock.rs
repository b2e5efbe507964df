use crate::error::FixSessionError;
use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};
use fs_err as fs;
use std::io::{ErrorKind, Write};
use tracing::{debug, warn};

pub const LOCK_FILE: &str = "fix.lock";

/// Exclusive marker for one fix session; released on drop.
#[derive(Debug)]
pub struct SessionLock {
    path: Utf8PathBuf,
}

impl SessionLock {
    pub fn acquire(state_dir: &Utf8Path) -> Result<Self, FixSessionError> {
        fs::create_dir_all(state_dir).with_context(|| format!("create {state_dir}"))?;
        let path = state_dir.join(LOCK_FILE);

        let mut file = match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
        {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(FixSessionError::SessionLocked { path });
            }
            Err(e) => return Err(anyhow::Error::new(e).context("create session lock").into()),
        };
        writeln!(file, "{}", std::process::id()).with_context(|| format!("write {path}"))?;
        debug!(lock = %path, "acquired fix session lock");
        Ok(Self { path })
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }
}

impl Drop for SessionLock {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            warn!(lock = %self.path, error = %e, "could not release fix session lock");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_session_is_refused_until_release() {
        let temp = tempfile::tempdir().expect("tempdir");
        let state = Utf8PathBuf::from_path_buf(temp.path().join(".auditfix")).expect("utf8");

        let first = SessionLock::acquire(&state).expect("first lock");
        assert!(first.path().exists());
        let err = SessionLock::acquire(&state).expect_err("second lock");
        assert!(matches!(err, FixSessionError::SessionLocked { .. }));

        drop(first);
        assert!(!state.join(LOCK_FILE).exists());
        SessionLock::acquire(&state).expect("lock after release");
    }
}
