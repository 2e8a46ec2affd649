//! The sentry loop: keep the agent process and its autostart registration
//! alive.
//!
//! This is a liveness guarantee, not a decision engine — the loop ticks
//! forever, each iteration fully isolated from failures of the previous
//! one. Every fallible step logs and moves on; only external termination
//! stops the sentry.

use crate::autostart;
use crate::logging::SharedLogger;
use crate::procs::{self, LaunchError, ProcessTable};
use crate::{exe_name, AGENT_PROCESS_NAME};
use std::path::PathBuf;
use std::time::Duration;

/// Interval between sentry ticks.
pub const WATCHDOG_INTERVAL: Duration = Duration::from_secs(10);

pub struct Watchdog {
    root: PathBuf,
    logger: SharedLogger,
    table: ProcessTable,
}

impl Watchdog {
    pub fn new(root: PathBuf, logger: SharedLogger) -> Self {
        Self {
            root,
            logger,
            table: ProcessTable::new(),
        }
    }

    /// Tick forever. Never returns.
    pub fn run(&mut self) -> ! {
        loop {
            self.tick();
            std::thread::sleep(WATCHDOG_INTERVAL);
        }
    }

    /// One isolated iteration: agent liveness, then registration liveness.
    pub fn tick(&mut self) {
        self.ensure_agent_running();
        self.ensure_autostart_registered();
    }

    fn ensure_agent_running(&mut self) {
        if self.table.is_running(AGENT_PROCESS_NAME) {
            return;
        }
        self.logger.log("Agent process not found. Relaunching...");
        let agent = self.root.join(exe_name(AGENT_PROCESS_NAME));
        match procs::launch(&agent, &self.root, &[], true) {
            Ok(()) => self.logger.log("Agent relaunch command sent."),
            Err(LaunchError::Missing(path)) => self.logger.critical(&format!(
                "{} not found at {}",
                exe_name(AGENT_PROCESS_NAME),
                path.display()
            )),
            Err(e) => self.logger.log(&format!("Failed to relaunch agent: {e}")),
        }
    }

    fn ensure_autostart_registered(&mut self) {
        match autostart::is_registered() {
            Ok(true) => {}
            Ok(false) => {
                self.logger.log("Scheduler task not found. Recreating...");
                let agent = self.root.join(exe_name(AGENT_PROCESS_NAME));
                match autostart::register(&agent, &self.root) {
                    Ok(()) => self.logger.log("Scheduler task successfully recreated."),
                    Err(e) => self.logger.log(&format!("Failed to create scheduler task: {e}")),
                }
            }
            Err(e) => self.logger.log(&format!("Failed to query scheduler task: {e}")),
        }
    }
}
