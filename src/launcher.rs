//! Start script probing and launching.
//!
//! The `start-server` command runs a user-provided script to boot the
//! Minecraft server. The script runs detached, its exit status is never
//! observed.

use std::{
    io,
    path::{Path, PathBuf},
    process::Stdio,
};

use log::{info, warn};
use thiserror::Error;
use tokio::{fs, process::Command};

/// Default location of the start script, relative to the working directory.
pub const DEFAULT_START_SCRIPT: &str = "start.sh";

/// Errors raised while launching the start script.
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("start script {0} not found or not executable")]
    ScriptMissing(PathBuf),
    #[error("failed to spawn start script: {0}")]
    Io(#[from] io::Error),
}

/// Start script at a fixed path.
#[derive(Debug, Clone)]
pub struct StartScript {
    path: PathBuf,
}

impl StartScript {
    pub fn new(path: impl AsRef<Path>) -> Self {
        StartScript {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the script is a regular file the bot can execute.
    pub async fn is_runnable(&self) -> bool {
        let Ok(metadata) = fs::metadata(&self.path).await else {
            return false;
        };
        if !metadata.is_file() {
            return false;
        }

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            metadata.permissions().mode() & 0o111 != 0
        }
        #[cfg(not(unix))]
        {
            true
        }
    }

    /// Spawns the script as a detached background process.
    pub async fn launch(&self) -> Result<(), LaunchError> {
        if !self.is_runnable().await {
            warn!("start script {} is missing", self.path.display());
            return Err(LaunchError::ScriptMissing(self.path.clone()));
        }

        let mut command = Command::new(program_path(&self.path));
        command
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(false);
        #[cfg(unix)]
        command.process_group(0);

        let child = command.spawn()?;
        info!(
            "launched start script {} (pid {:?})",
            self.path.display(),
            child.id()
        );

        Ok(())
    }
}

/// Path handed to the process spawner.
///
/// A bare file name would be looked up in `PATH`, it gets a `./` prefix.
fn program_path(path: &Path) -> PathBuf {
    if path.is_relative() && path.parent() == Some(Path::new("")) {
        Path::new(".").join(path)
    } else {
        path.to_path_buf()
    }
}
