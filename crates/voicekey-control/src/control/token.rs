//! Process-wide exclusivity token.
//!
//! The token is a lock file in the control directory holding the owner's
//! pid and signal port. Exactly one live process holds it; a holder that
//! died without releasing leaves a stale file that the next acquisition
//! attempt detects (the recorded signal port no longer answers) and
//! reclaims.

use crate::{
    ControlError,
    control::signal::probe_owner,
    error::Result as ControlResult,
};

use std::{
    fs::{self, OpenOptions},
    io::Write,
    panic::Location,
    path::{Path, PathBuf},
};

use error_location::ErrorLocation;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

/// Filesystem identity of the control plane objects.
///
/// All named objects derive from one well-known base name; the lock file is
/// `<base>.lock` inside `dir` and signal wire names are `<base>_Exit`,
/// `<base>_Listen`, and `<base>_Submit`.
#[derive(Debug, Clone)]
pub struct ControlPaths {
    dir: PathBuf,
    base_name: String,
}

impl ControlPaths {
    /// Create paths rooted at `dir` for the given base name.
    pub fn new(dir: impl Into<PathBuf>, base_name: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            base_name: base_name.into(),
        }
    }

    /// The well-known base name shared by all control objects.
    pub fn base_name(&self) -> &str {
        &self.base_name
    }

    /// Path of the exclusivity lock file.
    pub fn lock_path(&self) -> PathBuf {
        self.dir.join(format!("{}.lock", self.base_name))
    }

    /// Ensure the control directory exists.
    pub(crate) fn ensure_dir(&self) -> ControlResult<()> {
        fs::create_dir_all(&self.dir)?;
        Ok(())
    }
}

/// Owner metadata stored inside the lock file.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub(crate) struct LockRecord {
    /// Pid of the holder, for diagnostics.
    pub pid: u32,
    /// Loopback port of the holder's signal listener. Zero until the
    /// listener has bound.
    pub port: u16,
}

/// Result of one acquisition attempt.
#[derive(Debug)]
pub enum Acquisition {
    /// This process now holds the token.
    Owned {
        /// The held token; dropping it releases the lock file.
        token: ExclusivityToken,
        /// True when a dead holder's stale lock was reclaimed.
        reclaimed: bool,
    },
    /// A live owner holds the token.
    Held {
        /// The owner's recorded signal port.
        port: u16,
    },
}

/// A held process-wide exclusivity token.
///
/// Released exactly once: explicitly via [`ExclusivityToken::release`] on
/// clean shutdown, or by `Drop` as the guaranteed cleanup path.
#[derive(Debug)]
pub struct ExclusivityToken {
    path: PathBuf,
    released: bool,
}

impl ExclusivityToken {
    /// Attempt to acquire the token.
    ///
    /// A stale lock left by a dead holder (its recorded signal port no
    /// longer answers) is reclaimed and reported as an acquisition, not an
    /// error.
    #[instrument(skip(paths))]
    pub async fn try_acquire(paths: &ControlPaths) -> ControlResult<Acquisition> {
        paths.ensure_dir()?;
        let path = paths.lock_path();

        if let Some(token) = Self::try_create(&path)? {
            debug!(path = ?path, "Exclusivity token acquired");
            return Ok(Acquisition::Owned {
                token,
                reclaimed: false,
            });
        }

        // An unreadable record counts as stale: a holder that wrote garbage
        // or vanished mid-write is not a live owner.
        match Self::read_record(&path) {
            Ok(record) => {
                if probe_owner(record.port).await {
                    return Ok(Acquisition::Held { port: record.port });
                }
                warn!(
                    holder_pid = record.pid,
                    "Previous owner died holding the exclusivity token, reclaiming"
                );
            }
            Err(e) => {
                warn!(error = %e, "Unreadable lock record, reclaiming");
            }
        }

        // Losing the create race below means another process reclaimed first.
        if let Err(e) = fs::remove_file(&path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                return Err(ControlError::TokenIo {
                    reason: format!("Failed to remove stale lock: {e}"),
                    location: ErrorLocation::from(Location::caller()),
                });
            }
        }

        match Self::try_create(&path)? {
            Some(token) => {
                info!(path = ?path, "Abandoned exclusivity token reclaimed");
                Ok(Acquisition::Owned {
                    token,
                    reclaimed: true,
                })
            }
            None => {
                let record = Self::read_record(&path)?;
                Ok(Acquisition::Held { port: record.port })
            }
        }
    }

    /// Record the bound signal port so other processes can reach the owner.
    #[track_caller]
    pub fn record_port(&self, port: u16) -> ControlResult<()> {
        let record = LockRecord {
            pid: std::process::id(),
            port,
        };
        Self::write_record(&self.path, &record)
    }

    /// Release the token, removing the lock file. Idempotent.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        // A waiting process may have reclaimed the lock while this one
        // lingered in shutdown; never remove a record another pid owns.
        if let Ok(record) = Self::read_record(&self.path) {
            if record.pid != std::process::id() {
                warn!(
                    holder_pid = record.pid,
                    "Lock already reclaimed by another process, leaving it"
                );
                return;
            }
        }

        if let Err(e) = fs::remove_file(&self.path) {
            warn!(path = ?self.path, error = %e, "Failed to remove lock file on release");
        } else {
            debug!(path = ?self.path, "Exclusivity token released");
        }
    }

    fn try_create(path: &Path) -> ControlResult<Option<ExclusivityToken>> {
        let file = OpenOptions::new().write(true).create_new(true).open(path);

        let mut file = match file {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => return Ok(None),
            Err(e) => {
                return Err(ControlError::TokenIo {
                    reason: format!("Failed to create lock file: {e}"),
                    location: ErrorLocation::from(Location::caller()),
                });
            }
        };

        let record = LockRecord {
            pid: std::process::id(),
            port: 0,
        };
        let bytes = serde_json::to_vec(&record).map_err(|e| ControlError::TokenIo {
            reason: format!("Failed to encode lock record: {e}"),
            location: ErrorLocation::from(Location::caller()),
        })?;
        file.write_all(&bytes)?;
        file.sync_all()?;

        Ok(Some(ExclusivityToken {
            path: path.to_path_buf(),
            released: false,
        }))
    }

    fn read_record(path: &Path) -> ControlResult<LockRecord> {
        let contents = fs::read_to_string(path).map_err(|e| ControlError::TokenIo {
            reason: format!("Failed to read lock file: {e}"),
            location: ErrorLocation::from(Location::caller()),
        })?;

        serde_json::from_str(&contents).map_err(|e| ControlError::TokenIo {
            reason: format!("Failed to parse lock record: {e}"),
            location: ErrorLocation::from(Location::caller()),
        })
    }

    fn write_record(path: &Path, record: &LockRecord) -> ControlResult<()> {
        let bytes = serde_json::to_vec(record).map_err(|e| ControlError::TokenIo {
            reason: format!("Failed to encode lock record: {e}"),
            location: ErrorLocation::from(Location::caller()),
        })?;
        fs::write(path, bytes)?;
        Ok(())
    }
}

impl Drop for ExclusivityToken {
    fn drop(&mut self) {
        self.release();
    }
}
