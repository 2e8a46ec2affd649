//! Curfew Sentry CLI
//!
//! The watchdog process: keeps the agent and its autostart registration
//! alive. Accepts one optional positional argument — the application root
//! directory — and falls back to its own binary directory when the
//! argument is omitted or invalid.

use clap::Parser;
use curfew_agent::{
    app_root,
    logging::{create_shared_logger, SENTRY_LOG_FILE},
    watchdog::Watchdog,
    VERSION,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "curfew-sentry")]
#[command(version = VERSION)]
#[command(about = "Watchdog for the curfew agent", long_about = None)]
struct Cli {
    /// Application root directory (defaults to this binary's directory)
    root: Option<PathBuf>,
}

fn main() {
    let cli = Cli::parse();

    let root = cli
        .root
        .filter(|path| path.is_dir())
        .unwrap_or_else(app_root);

    let logger = create_shared_logger(root.join(SENTRY_LOG_FILE));
    logger.log("Sentry process started.");
    logger.log(&format!("Working directory set to: {}", root.display()));

    Watchdog::new(root, logger).run();
}
