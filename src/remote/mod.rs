//! Remote command handling over the messaging channel.
//!
//! A dedicated thread long-polls the channel and dispatches each inbound
//! event: text messages are parsed into a closed [`RemoteCommand`]
//! enumeration at the boundary (unknown verbs become an explicit variant,
//! never a silent no-op), ZIP attachments trigger the live update path.
//! Errors while handling one event are caught, logged, and answered with a
//! failure reply — the subscription loop never dies. Duplicate deliveries
//! are tolerated: every command is idempotent or harmless to repeat.

pub mod transport;

pub use transport::{
    BlockingChannelClient, ChannelClient, ChannelConfig, Document, Message, TransportError, Update,
};

use crate::autostart;
use crate::config::{parse_time, SettingsStore};
use crate::logging::{self, SharedLogger, LOG_TAIL_LIMIT};
use crate::procs::ProcessTable;
use crate::state::{StateCommand, StatusMirror};
use crate::updater::ArchiveUpdater;
use crate::SENTRY_PROCESS_NAME;
use chrono::NaiveTime;
use crossbeam_channel::Sender;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// A remote command, totally mapped from the inbound verb string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteCommand {
    KillAll,
    StartLock,
    StopLock,
    Status,
    AddLink(String),
    RemoveLink(usize),
    SetTime(NaiveTime, NaiveTime),
    GetLog,
    GetGuardianLog,
    Help,
    /// Recognized verb with unusable arguments; carries the usage hint.
    BadArgs(&'static str),
    /// Anything else.
    Unknown(String),
}

impl RemoteCommand {
    /// Tokenize one inbound text message. Verbs are case-insensitive and
    /// accepted with or without a leading slash.
    pub fn parse(text: &str) -> Self {
        let mut parts = text.split_whitespace();
        let verb = match parts.next() {
            Some(v) => v.trim_start_matches('/').to_ascii_lowercase(),
            None => return RemoteCommand::Unknown(String::new()),
        };
        let args: Vec<&str> = parts.collect();

        match verb.as_str() {
            "kill_all" => RemoteCommand::KillAll,
            "start_lock" => RemoteCommand::StartLock,
            "stop_lock" => RemoteCommand::StopLock,
            "status" => RemoteCommand::Status,
            "help" => RemoteCommand::Help,
            "getlog" => RemoteCommand::GetLog,
            "getguardianlog" => RemoteCommand::GetGuardianLog,
            "addlink" => match args.first() {
                Some(url) => RemoteCommand::AddLink(url.to_string()),
                None => RemoteCommand::BadArgs("Usage: /addlink <URL>"),
            },
            "removelink" => match args.first().and_then(|a| a.parse::<usize>().ok()) {
                Some(n) if n > 0 => RemoteCommand::RemoveLink(n),
                _ => RemoteCommand::BadArgs("Usage: /removelink <number>"),
            },
            "settime" => {
                let start = args.first().and_then(|a| parse_time(a));
                let end = args.get(1).and_then(|a| parse_time(a));
                match (start, end) {
                    (Some(s), Some(e)) => RemoteCommand::SetTime(s, e),
                    _ => RemoteCommand::BadArgs("Usage: /settime <start HH:mm> <end HH:mm>"),
                }
            }
            _ => RemoteCommand::Unknown(verb),
        }
    }
}

const HELP_TEXT: &str = "Available commands:\n\
    /start_lock - Start lockdown now\n\
    /stop_lock - Stop lockdown now\n\
    /status - Show current status and settings\n\
    /addlink <URL> - Add a link\n\
    /removelink <number> - Remove a link by its /status number\n\
    /settime <start HH:mm> <end HH:mm> - Set the restriction window\n\
    /getlog - Fetch the agent log\n\
    /getguardianlog - Fetch the sentry log\n\
    /kill_all - EMERGENCY SHUTDOWN\n\n\
    To update, send a ZIP archive with the application files.";

/// Bounded exponential backoff for polling errors: 1s doubling to 60s,
/// reset on the first success.
#[derive(Debug)]
pub struct PollBackoff {
    current: Duration,
}

impl PollBackoff {
    const INITIAL: Duration = Duration::from_secs(1);
    const MAX: Duration = Duration::from_secs(60);

    pub fn new() -> Self {
        Self {
            current: Self::INITIAL,
        }
    }

    /// Delay to sleep after a failure; doubles for the next one.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = (self.current * 2).min(Self::MAX);
        delay
    }

    pub fn reset(&mut self) {
        self.current = Self::INITIAL;
    }
}

impl Default for PollBackoff {
    fn default() -> Self {
        Self::new()
    }
}

/// The remote command handler thread.
pub struct RemoteHandler {
    client: BlockingChannelClient,
    store: SettingsStore,
    root: PathBuf,
    logger: SharedLogger,
    mirror: Arc<StatusMirror>,
    state_tx: Sender<StateCommand>,
    cancel: Arc<AtomicBool>,
}

impl RemoteHandler {
    pub fn new(
        client: BlockingChannelClient,
        root: PathBuf,
        logger: SharedLogger,
        mirror: Arc<StatusMirror>,
        state_tx: Sender<StateCommand>,
        cancel: Arc<AtomicBool>,
    ) -> Self {
        let store = SettingsStore::new(&root);
        Self {
            client,
            store,
            root,
            logger,
            mirror,
            state_tx,
            cancel,
        }
    }

    /// Start the subscription loop on its own thread.
    pub fn spawn(self) -> std::thread::JoinHandle<()> {
        std::thread::spawn(move || self.run())
    }

    fn run(self) {
        if let Err(e) = self.client.delete_webhook() {
            self.logger.log(&format!("Failed to clear webhook: {e}"));
        }
        self.logger.log(&format!(
            "Remote channel subscribed as {}.",
            self.client.device_id()
        ));

        let mut offset = 0i64;
        let mut backoff = PollBackoff::new();
        while !self.cancel.load(Ordering::SeqCst) {
            match self.client.get_updates(offset) {
                Ok(updates) => {
                    backoff.reset();
                    for update in updates {
                        offset = offset.max(update.update_id + 1);
                        if let Some(message) = update.message {
                            self.handle_message(message);
                        }
                    }
                }
                Err(e) => {
                    self.logger.log(&format!("Polling error: {e}"));
                    std::thread::sleep(backoff.next_delay());
                }
            }
        }
    }

    /// Handle one inbound event. Never panics the loop: any error is logged
    /// and answered with a generic failure reply.
    fn handle_message(&self, message: Message) {
        let chat_id = message.chat.id;
        let outcome = if let Some(document) = &message.document {
            self.handle_document(chat_id, document)
        } else if let Some(text) = &message.text {
            self.dispatch(chat_id, RemoteCommand::parse(text))
        } else {
            Ok(())
        };

        if let Err(e) = outcome {
            self.logger.log(&format!("Error handling remote event: {e}"));
            let _ = self
                .client
                .send_message(chat_id, "An internal error occurred while handling your request.");
        }
    }

    fn dispatch(
        &self,
        chat_id: i64,
        command: RemoteCommand,
    ) -> Result<(), Box<dyn std::error::Error>> {
        match command {
            RemoteCommand::KillAll => self.emergency_shutdown(chat_id),
            RemoteCommand::StartLock => {
                self.state_tx.send(StateCommand::StartLockdown { manual: true })?;
                self.client.send_message(chat_id, "Lockdown started by force.")?;
                Ok(())
            }
            RemoteCommand::StopLock => {
                self.state_tx.send(StateCommand::StopLockdown { manual: true })?;
                self.client.send_message(chat_id, "Lockdown stopped.")?;
                Ok(())
            }
            RemoteCommand::Status => {
                self.client.send_message(chat_id, &self.status_text()?)?;
                Ok(())
            }
            RemoteCommand::AddLink(url) => {
                match self.store.append_link(&url) {
                    Ok(()) => {
                        self.state_tx.send(StateCommand::ReloadSettings)?;
                        self.client.send_message(chat_id, "Link added.")?;
                    }
                    Err(e) => {
                        self.client
                            .send_message(chat_id, &format!("Link rejected: {e}"))?;
                    }
                }
                Ok(())
            }
            RemoteCommand::RemoveLink(index) => {
                match self.store.remove_link(index) {
                    Ok(()) => {
                        self.state_tx.send(StateCommand::ReloadSettings)?;
                        self.client.send_message(chat_id, "Link removed.")?;
                    }
                    Err(e) => {
                        self.client
                            .send_message(chat_id, &format!("Could not remove link: {e}"))?;
                    }
                }
                Ok(())
            }
            RemoteCommand::SetTime(start, end) => {
                self.store.set_window(start, end)?;
                self.state_tx.send(StateCommand::ReloadSettings)?;
                self.client.send_message(
                    chat_id,
                    &format!(
                        "New window set: {} to {}.",
                        start.format("%H:%M"),
                        end.format("%H:%M")
                    ),
                )?;
                Ok(())
            }
            RemoteCommand::GetLog => {
                self.send_log_tail(chat_id, logging::AGENT_LOG_FILE, "Log")
            }
            RemoteCommand::GetGuardianLog => {
                self.send_log_tail(chat_id, logging::SENTRY_LOG_FILE, "Sentry log")
            }
            RemoteCommand::Help => {
                self.client.send_message(chat_id, HELP_TEXT)?;
                Ok(())
            }
            RemoteCommand::BadArgs(usage) => {
                self.client
                    .send_message(chat_id, &format!("Invalid format. {usage}"))?;
                Ok(())
            }
            RemoteCommand::Unknown(_) => {
                self.client
                    .send_message(chat_id, "Unknown command. Use /help for the command list.")?;
                Ok(())
            }
        }
    }

    fn status_text(&self) -> Result<String, Box<dyn std::error::Error>> {
        let settings = self.store.load()?;
        let mut status = format!(
            "Status: {}\nMode: {}\nWindow: {} to {}\nLinks:\n",
            if self.mirror.is_active() {
                "ACTIVE"
            } else {
                "INACTIVE"
            },
            settings.mode.as_str(),
            settings.start_time.format("%H:%M"),
            settings.end_time.format("%H:%M"),
        );
        for (i, link) in settings.links.iter().enumerate() {
            status.push_str(&format!("{}. {}\n", i + 1, link));
        }
        Ok(status)
    }

    fn send_log_tail(
        &self,
        chat_id: i64,
        file_name: &str,
        label: &str,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let reply = match logging::read_tail(&self.root.join(file_name), LOG_TAIL_LIMIT) {
            logging::LogTail::Missing => format!("{label} file not found."),
            logging::LogTail::Empty => format!("{label} file is empty."),
            logging::LogTail::Content(tail) => tail,
        };
        self.client.send_message(chat_id, &reply)?;
        Ok(())
    }

    /// `kill_all`: delete the autostart registration, terminate the sentry,
    /// acknowledge, and exit the controller process.
    fn emergency_shutdown(&self, chat_id: i64) -> Result<(), Box<dyn std::error::Error>> {
        self.client
            .send_message(chat_id, "EMERGENCY SHUTDOWN. Stopping all processes...")?;
        self.logger.log("EMERGENCY SHUTDOWN INITIATED VIA REMOTE CHANNEL.");
        self.cancel.store(true, Ordering::SeqCst);

        if let Err(e) = autostart::unregister() {
            self.logger.log(&format!("Could not delete autostart task: {e}"));
        }

        let mut table = ProcessTable::new();
        if table.kill_by_name(SENTRY_PROCESS_NAME) == 0 {
            self.logger.log("No sentry process found to terminate.");
        }

        std::process::exit(0);
    }

    /// A document event matching the archive naming rule triggers the live
    /// update path; anything else is ignored.
    fn handle_document(
        &self,
        chat_id: i64,
        document: &Document,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let is_archive = document
            .file_name
            .as_deref()
            .map(|name| name.to_ascii_lowercase().ends_with(".zip"))
            .unwrap_or(false);
        if !is_archive {
            return Ok(());
        }

        self.client
            .send_message(chat_id, "Update archive received. Starting update...")?;

        let updater = ArchiveUpdater::new(self.root.clone());
        let staged = self
            .client
            .download_document(&document.file_id)
            .map_err(|e| e.to_string())
            .and_then(|bytes| {
                let _ = self
                    .client
                    .send_message(chat_id, "Archive downloaded. Extracting...");
                updater.stage(&bytes).map_err(|e| e.to_string())
            });

        match staged {
            Ok(_) => {
                let script = updater.write_apply_script()?;
                updater.launch_apply_script(&script)?;
                self.client.send_message(
                    chat_id,
                    "Update script launched. The application will restart.",
                )?;
                self.logger.log("Update script launched. Agent is exiting.");
                std::process::exit(0);
            }
            Err(e) => {
                self.logger.log(&format!("Error during archive update: {e}"));
                self.client
                    .send_message(chat_id, &format!("Update from archive failed: {e}"))?;
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_parse_plain_verbs() {
        assert_eq!(RemoteCommand::parse("/kill_all"), RemoteCommand::KillAll);
        assert_eq!(RemoteCommand::parse("/start_lock"), RemoteCommand::StartLock);
        assert_eq!(RemoteCommand::parse("stop_lock"), RemoteCommand::StopLock);
        assert_eq!(RemoteCommand::parse("/STATUS"), RemoteCommand::Status);
        assert_eq!(RemoteCommand::parse("/help"), RemoteCommand::Help);
        assert_eq!(RemoteCommand::parse("/getlog"), RemoteCommand::GetLog);
        assert_eq!(
            RemoteCommand::parse("/getguardianlog"),
            RemoteCommand::GetGuardianLog
        );
    }

    #[test]
    fn test_parse_addlink() {
        assert_eq!(
            RemoteCommand::parse("/addlink https://youtu.be/xyz"),
            RemoteCommand::AddLink("https://youtu.be/xyz".to_string())
        );
        assert!(matches!(
            RemoteCommand::parse("/addlink"),
            RemoteCommand::BadArgs(_)
        ));
    }

    #[test]
    fn test_parse_removelink() {
        assert_eq!(RemoteCommand::parse("/removelink 3"), RemoteCommand::RemoveLink(3));
        assert!(matches!(
            RemoteCommand::parse("/removelink zero"),
            RemoteCommand::BadArgs(_)
        ));
        assert!(matches!(
            RemoteCommand::parse("/removelink 0"),
            RemoteCommand::BadArgs(_)
        ));
    }

    #[test]
    fn test_parse_settime() {
        assert_eq!(
            RemoteCommand::parse("/settime 21:30 06:45"),
            RemoteCommand::SetTime(t(21, 30), t(6, 45))
        );
        assert!(matches!(
            RemoteCommand::parse("/settime 25:00 06:45"),
            RemoteCommand::BadArgs(_)
        ));
        assert!(matches!(
            RemoteCommand::parse("/settime 21:30"),
            RemoteCommand::BadArgs(_)
        ));
    }

    #[test]
    fn test_parse_unknown_is_explicit() {
        assert_eq!(
            RemoteCommand::parse("/frobnicate now"),
            RemoteCommand::Unknown("frobnicate".to_string())
        );
        assert_eq!(RemoteCommand::parse("   "), RemoteCommand::Unknown(String::new()));
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let mut backoff = PollBackoff::new();
        assert_eq!(backoff.next_delay(), Duration::from_secs(1));
        assert_eq!(backoff.next_delay(), Duration::from_secs(2));
        assert_eq!(backoff.next_delay(), Duration::from_secs(4));
        for _ in 0..10 {
            backoff.next_delay();
        }
        assert_eq!(backoff.next_delay(), Duration::from_secs(60));

        backoff.reset();
        assert_eq!(backoff.next_delay(), Duration::from_secs(1));
    }

    #[test]
    fn test_help_text_lists_every_verb() {
        for verb in [
            "/start_lock",
            "/stop_lock",
            "/status",
            "/addlink",
            "/removelink",
            "/settime",
            "/getlog",
            "/getguardianlog",
            "/kill_all",
        ] {
            assert!(HELP_TEXT.contains(verb), "help text is missing {verb}");
        }
    }
}
