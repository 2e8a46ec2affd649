//! Curfew Agent CLI
//!
//! The controller process: lockdown state machine, whitelist enforcement,
//! locked surface, remote command handler, and self-update.

use clap::{Parser, Subcommand};
use crossbeam_channel::bounded;
use curfew_agent::{
    app_root,
    config::SettingsStore,
    exe_name,
    kiosk::{ContentSurface, HeadlessSurface},
    logging::{create_shared_logger, SharedLogger, AGENT_LOG_FILE, SENTRY_LOG_FILE},
    procs::{self, LaunchError, ProcessTable},
    remote::{BlockingChannelClient, ChannelConfig, RemoteHandler},
    state::{Controller, StateCommand},
    updater, SENTRY_PROCESS_NAME, VERSION,
};
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "curfew-agent")]
#[command(version = VERSION)]
#[command(about = "Time-windowed access restriction agent", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the controller (default)
    Run,
    /// Show current settings and log state
    Status,
    /// Show the settings file path and contents
    Config,
}

fn main() {
    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => cmd_run(),
        Commands::Status => cmd_status(),
        Commands::Config => cmd_config(),
    }
}

fn cmd_run() {
    let root = app_root();
    let logger = create_shared_logger(root.join(AGENT_LOG_FILE));
    logger.log(&format!("Agent v{VERSION} starting."));

    // Swap-on-restart runs before anything else so the two update paths
    // cannot interleave within one process lifetime.
    if check_pending_swap(&logger) {
        return;
    }

    hide_install_dir(&root, &logger);
    launch_sentry_if_missing(&root, &logger);

    let (state_tx, state_rx) = bounded::<StateCommand>(64);

    let surface_factory =
        Box::new(|| Box::new(HeadlessSurface::new()) as Box<dyn ContentSurface>);
    let mut controller = Controller::new(root.clone(), logger.clone(), state_rx, surface_factory);

    // Orderly exit on Ctrl+C when run in a console.
    let ctrlc_tx = state_tx.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        let _ = ctrlc_tx.send(StateCommand::Shutdown);
    }) {
        logger.log(&format!("Failed to set Ctrl+C handler: {e}"));
    }

    start_remote_handler(&root, &logger, &controller, state_tx);

    controller.run();
    logger.log("Agent exited.");
}

/// Perform a pending executable swap. Returns true when the process should
/// exit because the new binary was relaunched.
fn check_pending_swap(logger: &SharedLogger) -> bool {
    let executable = match std::env::current_exe() {
        Ok(path) => path,
        Err(e) => {
            logger.log(&format!("Could not resolve own executable: {e}"));
            return false;
        }
    };
    match updater::apply_pending_swap(&executable) {
        Ok(Some(swap)) => {
            logger.log("Found pending update file. Update applied, restarting...");
            if let Err(e) = swap.restart() {
                logger.log(&format!("Failed to restart after swap: {e}"));
            }
            true
        }
        Ok(None) => false,
        Err(e) => {
            logger.log(&format!("Failed to apply pending update: {e}"));
            false
        }
    }
}

fn launch_sentry_if_missing(root: &Path, logger: &SharedLogger) {
    let mut table = ProcessTable::new();
    if table.is_running(SENTRY_PROCESS_NAME) {
        return;
    }
    let sentry = root.join(exe_name(SENTRY_PROCESS_NAME));
    let root_arg = root.to_string_lossy().to_string();
    match procs::launch(&sentry, root, &[root_arg], true) {
        Ok(()) => logger.log("Sentry process was not running. Started it."),
        Err(LaunchError::Missing(path)) => logger.critical(&format!(
            "{} not found at {}",
            exe_name(SENTRY_PROCESS_NAME),
            path.display()
        )),
        Err(e) => logger.log(&format!("Failed to launch sentry: {e}")),
    }
}

fn start_remote_handler(
    root: &Path,
    logger: &SharedLogger,
    controller: &Controller,
    state_tx: crossbeam_channel::Sender<StateCommand>,
) {
    let store = SettingsStore::new(root);
    let settings = match store.load() {
        Ok(settings) => settings,
        Err(e) => {
            logger.log(&format!("Failed to read settings: {e}. Remote channel disabled."));
            return;
        }
    };
    if settings.api_token.is_empty() {
        logger.log("API_TOKEN is not set. Remote channel disabled.");
        return;
    }

    match BlockingChannelClient::new(ChannelConfig::new(settings.api_token)) {
        Ok(client) => {
            let cancel = Arc::new(AtomicBool::new(false));
            RemoteHandler::new(
                client,
                root.to_path_buf(),
                logger.clone(),
                controller.mirror(),
                state_tx,
                cancel,
            )
            .spawn();
        }
        Err(e) => logger.log(&format!("Failed to initialize remote channel: {e}")),
    }
}

/// Hide the install directory once, marked by a flag file.
#[cfg(target_os = "windows")]
fn hide_install_dir(root: &Path, logger: &SharedLogger) {
    let flag = root.join(".hidden_flag");
    if flag.exists() {
        return;
    }
    let result = std::process::Command::new("attrib")
        .arg("+h")
        .arg(root)
        .output();
    match result {
        Ok(output) if output.status.success() => {
            let _ = std::fs::write(&flag, b"");
            logger.log("Application folder has been hidden.");
        }
        Ok(output) => logger.log(&format!(
            "Could not hide application folder: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        )),
        Err(e) => logger.log(&format!("Could not hide application folder: {e}")),
    }
}

#[cfg(not(target_os = "windows"))]
fn hide_install_dir(_root: &Path, _logger: &SharedLogger) {}

fn cmd_status() {
    let root = app_root();
    let store = SettingsStore::new(&root);

    println!("Curfew Agent v{VERSION}");
    println!("======================");
    println!();

    match store.load() {
        Ok(settings) => {
            println!("Mode: {}", settings.mode.as_str());
            println!(
                "Window: {} to {}",
                settings.start_time.format("%H:%M"),
                settings.end_time.format("%H:%M")
            );
            println!(
                "Remote channel: {}",
                if settings.api_token.is_empty() {
                    "disabled (no API_TOKEN)"
                } else {
                    "configured"
                }
            );
            println!("Links: {}", settings.links.len());
        }
        Err(e) => println!("Could not read settings: {e}"),
    }

    println!();
    for (label, file) in [("Agent log", AGENT_LOG_FILE), ("Sentry log", SENTRY_LOG_FILE)] {
        let path = root.join(file);
        match std::fs::metadata(&path) {
            Ok(meta) => println!("{label}: {} ({} bytes)", path.display(), meta.len()),
            Err(_) => println!("{label}: not found"),
        }
    }
}

fn cmd_config() {
    let root = app_root();
    let store = SettingsStore::new(&root);

    println!("Settings file: {}", store.path().display());
    println!();
    match std::fs::read_to_string(store.path()) {
        Ok(content) => println!("{content}"),
        Err(_) => println!("(no settings file yet)"),
    }
}
