//! Windows implementation of the escape-blocking key filter.
//!
//! A dedicated thread installs a low-level keyboard hook
//! (`SetWindowsHookExW(WH_KEYBOARD_LL, ...)`) and runs a message loop. The
//! hook callback feeds every key transition through [`EscapeFilter`]; a
//! swallowed event is answered with a non-zero `LRESULT` so it never
//! reaches the OS. An unlock verdict is forwarded over a channel — the hook
//! context never touches surface or window state itself.

use crate::keyhook::filter::EscapeFilter;
use crate::keyhook::types::{FilterVerdict, KeyEvent};
use crossbeam_channel::{bounded, Receiver, Sender};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use windows::Win32::Foundation::{HWND, LPARAM, LRESULT, WPARAM};
use windows::Win32::System::Threading::GetCurrentThreadId;
use windows::Win32::UI::WindowsAndMessaging::{
    CallNextHookEx, GetMessageW, PostThreadMessageW, SetWindowsHookExW, UnhookWindowsHookEx,
    HHOOK, KBDLLHOOKSTRUCT, MSG, WH_KEYBOARD_LL, WM_KEYDOWN, WM_KEYUP, WM_QUIT, WM_SYSKEYDOWN,
    WM_SYSKEYUP,
};

/// Errors installing the keyboard filter.
#[derive(Debug)]
pub enum HookError {
    AlreadyInstalled,
    InstallFailed,
}

impl std::fmt::Display for HookError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HookError::AlreadyInstalled => write!(f, "Key filter is already installed"),
            HookError::InstallFailed => write!(f, "Failed to install keyboard hook"),
        }
    }
}

impl std::error::Error for HookError {}

thread_local! {
    static HOOK_STATE: std::cell::RefCell<Option<(EscapeFilter, Sender<()>)>> =
        const { std::cell::RefCell::new(None) };
}

unsafe extern "system" fn keyboard_hook_proc(
    n_code: i32,
    w_param: WPARAM,
    l_param: LPARAM,
) -> LRESULT {
    if n_code >= 0 {
        let kb_struct = &*(l_param.0 as *const KBDLLHOOKSTRUCT);
        let msg = w_param.0 as u32;
        let down = matches!(msg, WM_KEYDOWN | WM_SYSKEYDOWN);
        let up = matches!(msg, WM_KEYUP | WM_SYSKEYUP);

        if down || up {
            let verdict = HOOK_STATE.with(|state| {
                if let Some((filter, unlock_tx)) = state.borrow_mut().as_mut() {
                    let verdict = filter.handle(KeyEvent {
                        vk: kb_struct.vkCode,
                        down,
                    });
                    if verdict == FilterVerdict::Unlock {
                        let _ = unlock_tx.try_send(());
                    }
                    verdict
                } else {
                    FilterVerdict::Pass
                }
            });
            if verdict != FilterVerdict::Pass {
                return LRESULT(1);
            }
        }
    }
    CallNextHookEx(HHOOK::default(), n_code, w_param, l_param)
}

/// Handle to the installed filter. Dropping tears the hook down.
pub struct KeyFilter {
    running: Arc<AtomicBool>,
    hook_thread_id: Arc<AtomicU32>,
    thread_handle: Option<JoinHandle<()>>,
    unlock_rx: Receiver<()>,
}

impl KeyFilter {
    /// Install the system-wide filter. Unlock requests surface on
    /// [`KeyFilter::unlock_requests`].
    pub fn install() -> Result<Self, HookError> {
        let (unlock_tx, unlock_rx) = bounded(4);
        let running = Arc::new(AtomicBool::new(true));
        let hook_thread_id = Arc::new(AtomicU32::new(0));

        let thread_running = running.clone();
        let thread_id_slot = hook_thread_id.clone();
        let thread_handle = thread::spawn(move || {
            run_hook_loop(thread_running, thread_id_slot, unlock_tx);
        });

        Ok(Self {
            running,
            hook_thread_id,
            thread_handle: Some(thread_handle),
            unlock_rx,
        })
    }

    /// Channel carrying one message per completed unlock sequence.
    pub fn unlock_requests(&self) -> &Receiver<()> {
        &self.unlock_rx
    }

    /// Tear the hook down and stop the hook thread.
    pub fn uninstall(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        let thread_id = self.hook_thread_id.load(Ordering::SeqCst);
        if thread_id != 0 {
            unsafe {
                let _ = PostThreadMessageW(thread_id, WM_QUIT, WPARAM(0), LPARAM(0));
            }
        }
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for KeyFilter {
    fn drop(&mut self) {
        self.uninstall();
    }
}

fn run_hook_loop(running: Arc<AtomicBool>, thread_id_slot: Arc<AtomicU32>, unlock_tx: Sender<()>) {
    HOOK_STATE.with(|state| {
        *state.borrow_mut() = Some((EscapeFilter::new(), unlock_tx));
    });

    unsafe {
        thread_id_slot.store(GetCurrentThreadId(), Ordering::SeqCst);

        let hook = match SetWindowsHookExW(WH_KEYBOARD_LL, Some(keyboard_hook_proc), None, 0) {
            Ok(hook) => hook,
            Err(_) => return,
        };

        let mut msg = MSG::default();
        while running.load(Ordering::SeqCst) {
            let result = GetMessageW(&mut msg, HWND::default(), 0, 0);
            if result.0 <= 0 {
                // WM_QUIT or an error ends the loop.
                break;
            }
        }

        let _ = UnhookWindowsHookEx(hook);
    }

    HOOK_STATE.with(|state| {
        *state.borrow_mut() = None;
    });
}
