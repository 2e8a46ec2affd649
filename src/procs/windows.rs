//! Windows implementations of the visible-window query and the elevated
//! launcher.
//!
//! The visible-window query enumerates top-level windows and records the
//! owning pid of every visible one. The launcher goes through
//! `ShellExecuteW` so the `runas` verb can request elevation the same way
//! the shell does.

use crate::procs::types::LaunchError;
use std::collections::HashSet;
use std::path::Path;
use windows::core::{HSTRING, PCWSTR};
use windows::Win32::Foundation::{BOOL, HWND, LPARAM};
use windows::Win32::UI::Shell::ShellExecuteW;
use windows::Win32::UI::WindowsAndMessaging::{
    EnumWindows, GetWindowThreadProcessId, IsWindowVisible, SW_SHOWNORMAL,
};

/// Pids of all processes owning a visible top-level window.
pub fn visible_window_pids() -> HashSet<u32> {
    unsafe extern "system" fn enum_proc(hwnd: HWND, lparam: LPARAM) -> BOOL {
        let pids = &mut *(lparam.0 as *mut HashSet<u32>);
        if IsWindowVisible(hwnd).as_bool() {
            let mut pid = 0u32;
            GetWindowThreadProcessId(hwnd, Some(&mut pid));
            if pid != 0 {
                pids.insert(pid);
            }
        }
        BOOL(1)
    }

    let mut pids = HashSet::new();
    unsafe {
        let _ = EnumWindows(Some(enum_proc), LPARAM(&mut pids as *mut _ as isize));
    }
    pids
}

/// Launch an executable via the shell, optionally with the `runas` verb.
pub fn launch(
    executable: &Path,
    workdir: &Path,
    args: &[String],
    elevated: bool,
) -> Result<(), LaunchError> {
    let verb = HSTRING::from(if elevated { "runas" } else { "open" });
    let file = HSTRING::from(executable.to_string_lossy().as_ref());
    let params = HSTRING::from(
        args.iter()
            .map(|a| format!("\"{a}\""))
            .collect::<Vec<_>>()
            .join(" "),
    );
    let dir = HSTRING::from(workdir.to_string_lossy().as_ref());

    let instance = unsafe {
        ShellExecuteW(
            HWND::default(),
            PCWSTR(verb.as_ptr()),
            PCWSTR(file.as_ptr()),
            PCWSTR(params.as_ptr()),
            PCWSTR(dir.as_ptr()),
            SW_SHOWNORMAL,
        )
    };

    // ShellExecuteW reports success with a value greater than 32.
    if instance.0 as isize > 32 {
        Ok(())
    } else {
        Err(LaunchError::Spawn(format!(
            "ShellExecuteW returned {}",
            instance.0 as isize
        )))
    }
}
