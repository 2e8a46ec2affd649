//! OS autostart registration for the controller.
//!
//! The registration is a Windows Task Scheduler entry: logon trigger,
//! highest run level, action launching the agent from the application root.
//! It is driven through `schtasks` so no COM plumbing is needed. The sentry
//! is the sole writer; the entry is only ever deleted by the emergency-stop
//! remote command.

use std::path::Path;

/// Name of the scheduler task that starts the agent at logon.
pub const TASK_NAME: &str = "CurfewAgentStartup";

/// Autostart registration errors.
#[derive(Debug)]
pub enum AutostartError {
    Query(String),
    Create(String),
    Delete(String),
}

impl std::fmt::Display for AutostartError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AutostartError::Query(e) => write!(f, "Autostart query failed: {e}"),
            AutostartError::Create(e) => write!(f, "Autostart create failed: {e}"),
            AutostartError::Delete(e) => write!(f, "Autostart delete failed: {e}"),
        }
    }
}

impl std::error::Error for AutostartError {}

/// Whether the registration currently exists.
#[cfg(target_os = "windows")]
pub fn is_registered() -> Result<bool, AutostartError> {
    let status = std::process::Command::new("schtasks")
        .args(["/Query", "/TN", TASK_NAME])
        .output()
        .map_err(|e| AutostartError::Query(e.to_string()))?;
    Ok(status.status.success())
}

/// Create the registration: logon trigger, highest run level, agent
/// launched from its application root.
#[cfg(target_os = "windows")]
pub fn register(agent_exe: &Path, workdir: &Path) -> Result<(), AutostartError> {
    // schtasks has no working-directory field, so the action cds first.
    let action = format!(
        "cmd /c cd /d \"{}\" && start \"\" \"{}\"",
        workdir.display(),
        agent_exe.display()
    );
    let output = std::process::Command::new("schtasks")
        .args([
            "/Create", "/F", "/TN", TASK_NAME, "/SC", "ONLOGON", "/RL", "HIGHEST", "/TR", &action,
        ])
        .output()
        .map_err(|e| AutostartError::Create(e.to_string()))?;
    if output.status.success() {
        Ok(())
    } else {
        Err(AutostartError::Create(
            String::from_utf8_lossy(&output.stderr).trim().to_string(),
        ))
    }
}

/// Delete the registration.
#[cfg(target_os = "windows")]
pub fn unregister() -> Result<(), AutostartError> {
    let output = std::process::Command::new("schtasks")
        .args(["/Delete", "/F", "/TN", TASK_NAME])
        .output()
        .map_err(|e| AutostartError::Delete(e.to_string()))?;
    if output.status.success() {
        Ok(())
    } else {
        Err(AutostartError::Delete(
            String::from_utf8_lossy(&output.stderr).trim().to_string(),
        ))
    }
}

/// On non-Windows hosts there is no scheduler store; the registration is
/// reported as present so the sentry loop has nothing to recreate.
#[cfg(not(target_os = "windows"))]
pub fn is_registered() -> Result<bool, AutostartError> {
    Ok(true)
}

#[cfg(not(target_os = "windows"))]
pub fn register(_agent_exe: &Path, _workdir: &Path) -> Result<(), AutostartError> {
    Ok(())
}

#[cfg(not(target_os = "windows"))]
pub fn unregister() -> Result<(), AutostartError> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_name_is_stable() {
        // The sentry and the emergency-stop command must agree on this name.
        assert_eq!(TASK_NAME, "CurfewAgentStartup");
    }
}
