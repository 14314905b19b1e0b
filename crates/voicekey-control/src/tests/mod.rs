mod coordinator;
mod token;

use crate::ControlPaths;

use std::path::PathBuf;

/// Isolated control directory for one test.
pub(crate) fn scratch_paths() -> ControlPaths {
    let dir: PathBuf = std::env::temp_dir()
        .join("voicekey-tests")
        .join(uuid::Uuid::new_v4().to_string());
    ControlPaths::new(dir, "voicekey")
}
