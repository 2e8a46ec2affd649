//! Append-only log files for the agent and the sentry.
//!
//! Each process writes timestamped lines to its own flat file in the
//! application root. Writes are best-effort: a failing log write must never
//! propagate into the calling loop. The remote `getlog` commands read a
//! bounded tail of these files back.

use chrono::Local;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Log file written by the controller process.
pub const AGENT_LOG_FILE: &str = "agent_log.txt";

/// Log file written by the sentry process.
pub const SENTRY_LOG_FILE: &str = "sentry_log.txt";

/// Maximum number of characters returned by a tail read.
pub const LOG_TAIL_LIMIT: usize = 4000;

/// An append-only, timestamped text log.
pub struct FileLogger {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileLogger {
    /// Create a logger writing to the given file. The file is created on
    /// first write.
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            lock: Mutex::new(()),
        }
    }

    /// Append one timestamped line. Failures are swallowed.
    pub fn log(&self, message: &str) {
        let _guard = match self.lock.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        let line = format!("{} - {}\n", Local::now().format("%Y-%m-%d %H:%M:%S"), message);
        if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(&self.path) {
            let _ = file.write_all(line.as_bytes());
        }
    }

    /// Append a line marked CRITICAL. Same delivery guarantees as `log`.
    pub fn critical(&self, message: &str) {
        self.log(&format!("CRITICAL: {message}"));
    }

    /// Path of the underlying file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Thread-safe shared logger handle.
pub type SharedLogger = Arc<FileLogger>;

/// Create a shared logger for the given file.
pub fn create_shared_logger(path: PathBuf) -> SharedLogger {
    Arc::new(FileLogger::new(path))
}

/// Result of reading a log tail for the remote channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTail {
    /// The log file does not exist.
    Missing,
    /// The log file exists but holds no content.
    Empty,
    /// The last portion of the log, at most [`LOG_TAIL_LIMIT`] characters.
    Content(String),
}

/// Read the tail of a log file, truncated to `max_chars` characters.
///
/// A truncated tail is prefixed with `...` so the reader can tell content
/// was dropped.
pub fn read_tail(path: &Path, max_chars: usize) -> LogTail {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(_) => return LogTail::Missing,
    };
    if content.trim().is_empty() {
        return LogTail::Empty;
    }
    let chars: Vec<char> = content.chars().collect();
    if chars.len() > max_chars {
        let tail: String = chars[chars.len() - max_chars..].iter().collect();
        LogTail::Content(format!("...\n{tail}"))
    } else {
        LogTail::Content(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_appends_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test_log.txt");
        let logger = FileLogger::new(path.clone());

        logger.log("first");
        logger.log("second");

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("- first"));
        assert!(lines[1].ends_with("- second"));
    }

    #[test]
    fn test_critical_marks_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test_log.txt");
        let logger = FileLogger::new(path.clone());

        logger.critical("executable missing");

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("CRITICAL: executable missing"));
    }

    #[test]
    fn test_tail_missing_and_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("none.txt");
        assert_eq!(read_tail(&path, 100), LogTail::Missing);

        std::fs::write(&path, "   \n").unwrap();
        assert_eq!(read_tail(&path, 100), LogTail::Empty);
    }

    #[test]
    fn test_tail_truncates_to_limit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.txt");
        let body: String = std::iter::repeat('x').take(500).collect();
        std::fs::write(&path, &body).unwrap();

        match read_tail(&path, 100) {
            LogTail::Content(tail) => {
                assert!(tail.starts_with("...\n"));
                assert_eq!(tail.len(), 100 + 4);
            }
            other => panic!("unexpected tail: {other:?}"),
        }
    }

    #[test]
    fn test_tail_short_file_returned_whole() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("small.txt");
        std::fs::write(&path, "hello log").unwrap();

        assert_eq!(
            read_tail(&path, 100),
            LogTail::Content("hello log".to_string())
        );
    }
}
