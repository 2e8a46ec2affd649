//! In-place self-update.
//!
//! Two coexisting paths. The primary one is the live archive replace: a ZIP
//! attachment from the remote channel is staged next to the install and a
//! detached, elevated one-shot script swaps the files after both processes
//! are gone — the controller itself never touches the install directory.
//! The fallback is swap-on-restart: an external agent drops `<exe>.new`
//! beside the binary, and the next startup performs the rename dance and
//! relaunches. The swap check runs first thing at startup, before the
//! channel subscription exists, so the two paths cannot interleave within
//! one process lifetime.

use crate::procs::{self, LaunchError};
use crate::{exe_name, AGENT_PROCESS_NAME, SENTRY_PROCESS_NAME};
use std::fs;
use std::path::{Path, PathBuf};

/// Staged archive name inside the application root.
pub const UPDATE_ARCHIVE_FILE: &str = "update.zip";

/// Staging directory for extracted update contents.
pub const STAGING_DIR: &str = "update_staging";

/// Generated one-shot apply script.
pub const APPLY_SCRIPT_FILE: &str = "apply_update.bat";

/// Update errors.
#[derive(Debug)]
pub enum UpdateError {
    Io(String),
    Archive(String),
    Launch(String),
}

impl std::fmt::Display for UpdateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UpdateError::Io(e) => write!(f, "Update IO error: {e}"),
            UpdateError::Archive(e) => write!(f, "Update archive error: {e}"),
            UpdateError::Launch(e) => write!(f, "Update launch error: {e}"),
        }
    }
}

impl std::error::Error for UpdateError {}

impl From<std::io::Error> for UpdateError {
    fn from(e: std::io::Error) -> Self {
        UpdateError::Io(e.to_string())
    }
}

/// A completed swap waiting for the process to relaunch itself.
#[derive(Debug)]
pub struct PendingSwap {
    pub executable: PathBuf,
}

impl PendingSwap {
    /// Start the freshly swapped executable. The caller exits afterwards.
    pub fn restart(&self) -> Result<(), UpdateError> {
        std::process::Command::new(&self.executable)
            .spawn()
            .map(|_| ())
            .map_err(|e| UpdateError::Launch(e.to_string()))
    }
}

fn sibling_with_suffix(executable: &Path, suffix: &str) -> PathBuf {
    let mut name = executable.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

/// Swap-on-restart: when `<exe>.new` exists beside the running executable,
/// retire the current binary to `<exe>.old` and promote `.new`. Returns the
/// restart handle when a swap happened.
pub fn apply_pending_swap(executable: &Path) -> Result<Option<PendingSwap>, UpdateError> {
    let new_path = sibling_with_suffix(executable, ".new");
    if !new_path.exists() {
        return Ok(None);
    }

    let old_path = sibling_with_suffix(executable, ".old");
    if old_path.exists() {
        fs::remove_file(&old_path)?;
    }
    fs::rename(executable, &old_path)?;
    fs::rename(&new_path, executable)?;

    Ok(Some(PendingSwap {
        executable: executable.to_path_buf(),
    }))
}

/// Live archive replace: staging and handoff to the detached apply script.
pub struct ArchiveUpdater {
    root: PathBuf,
}

impl ArchiveUpdater {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Write the archive to disk, extract it into the staging directory
    /// (clearing any previous staging contents), and delete the archive.
    pub fn stage(&self, archive_bytes: &[u8]) -> Result<PathBuf, UpdateError> {
        let zip_path = self.root.join(UPDATE_ARCHIVE_FILE);
        fs::write(&zip_path, archive_bytes)?;

        let staging = self.root.join(STAGING_DIR);
        if staging.exists() {
            fs::remove_dir_all(&staging)?;
        }

        let extracted = fs::File::open(&zip_path)
            .map_err(|e| UpdateError::Io(e.to_string()))
            .and_then(|file| {
                zip::ZipArchive::new(file).map_err(|e| UpdateError::Archive(e.to_string()))
            })
            .and_then(|mut archive| {
                archive
                    .extract(&staging)
                    .map_err(|e| UpdateError::Archive(e.to_string()))
            });

        // The staged archive is transient either way.
        let _ = fs::remove_file(&zip_path);
        extracted?;
        Ok(staging)
    }

    /// Write the one-shot apply script: stop both processes, copy staged
    /// files over the install, clean up, restart the agent, self-delete.
    pub fn write_apply_script(&self) -> Result<PathBuf, UpdateError> {
        let script_path = self.root.join(APPLY_SCRIPT_FILE);
        let staging = self.root.join(STAGING_DIR);
        let agent_exe = exe_name(AGENT_PROCESS_NAME);
        let sentry_exe = exe_name(SENTRY_PROCESS_NAME);
        let agent_path = self.root.join(&agent_exe);

        let script = format!(
            "@echo off\r\n\
             echo Stopping processes...\r\n\
             taskkill /IM {sentry_exe} /F\r\n\
             taskkill /IM {agent_exe} /F\r\n\
             timeout /t 5 /nobreak > NUL\r\n\
             echo Copying new files...\r\n\
             xcopy \"{staging}\" \"{root}\" /E /Y /I\r\n\
             echo Cleaning up...\r\n\
             rmdir /s /q \"{staging}\"\r\n\
             echo Starting new version...\r\n\
             start \"\" \"{agent}\"\r\n\
             del \"%~f0\"\r\n",
            staging = staging.display(),
            root = self.root.display(),
            agent = agent_path.display(),
        );

        fs::write(&script_path, script)?;
        Ok(script_path)
    }

    /// Launch the apply script elevated and detached. The caller exits
    /// immediately; the script performs the restart.
    pub fn launch_apply_script(&self, script: &Path) -> Result<(), UpdateError> {
        procs::launch(script, &self.root, &[], true).map_err(|e| match e {
            LaunchError::Missing(p) => {
                UpdateError::Launch(format!("Apply script missing: {}", p.display()))
            }
            LaunchError::Spawn(msg) => UpdateError::Launch(msg),
        })
    }
}
