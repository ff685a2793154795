//! Diagnostic journal.
//!
//! An append-only text file of timestamped relay events, served back by the
//! `/log` endpoint. Recording never blocks the caller and never fails: lines
//! are queued to a single writer task, and write errors only produce a local
//! `tracing` error.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Utc};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::{mpsc, oneshot};

use crate::error::JournalError;

/// Fire-and-forget sink for diagnostic events.
pub trait DiagnosticSink: Send + Sync {
    fn record(&self, message: &str);
}

enum Command {
    Append(String),
    Clear(oneshot::Sender<std::io::Result<()>>),
    Sync(oneshot::Sender<()>),
}

/// File-backed [`DiagnosticSink`]. Cloning shares the same writer.
#[derive(Clone)]
pub struct Journal {
    path: Arc<PathBuf>,
    offset: FixedOffset,
    tx: mpsc::UnboundedSender<Command>,
}

impl Journal {
    /// Open a journal at `path`, stamping lines in the given UTC offset.
    ///
    /// Spawns the writer task, so this must run inside a Tokio runtime.
    pub fn spawn(path: impl Into<PathBuf>, offset: FixedOffset) -> Self {
        let path = Arc::new(path.into());
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_writer(path.clone(), rx));

        Self { path, offset, tx }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Render one journal line, newline included.
    pub fn format_line(&self, message: &str, at: DateTime<Utc>) -> String {
        let local = at.with_timezone(&self.offset);
        format!(
            "• {} {} - {}\n",
            local.format("%B %-d, %Y at %-I:%M %p"),
            zone_label(self.offset),
            message.replace(['\r', '\n'], " ")
        )
    }

    /// Journal entries, newest first, including every record queued
    /// before the call. A missing file reads as empty.
    pub async fn entries(&self) -> Result<Vec<String>, JournalError> {
        self.sync().await?;

        let contents = match tokio::fs::read_to_string(self.path.as_path()).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        Ok(contents
            .lines()
            .filter(|line| !line.trim().is_empty())
            .rev()
            .map(str::to_string)
            .collect())
    }

    /// Delete the journal file. Records queued before the call are
    /// written (and deleted) first.
    pub async fn clear(&self) -> Result<(), JournalError> {
        let (reply, done) = oneshot::channel();
        self.tx
            .send(Command::Clear(reply))
            .map_err(|_| JournalError::WriterGone)?;
        done.await.map_err(|_| JournalError::WriterGone)??;
        Ok(())
    }

    /// Wait until every record queued so far has hit the file.
    pub async fn sync(&self) -> Result<(), JournalError> {
        let (reply, done) = oneshot::channel();
        self.tx
            .send(Command::Sync(reply))
            .map_err(|_| JournalError::WriterGone)?;
        done.await.map_err(|_| JournalError::WriterGone)
    }
}

impl DiagnosticSink for Journal {
    fn record(&self, message: &str) {
        tracing::info!("{}", message);

        let line = self.format_line(message, Utc::now());
        if self.tx.send(Command::Append(line)).is_err() {
            tracing::warn!("Journal writer stopped, dropping record");
        }
    }
}

async fn run_writer(path: Arc<PathBuf>, mut rx: mpsc::UnboundedReceiver<Command>) {
    while let Some(command) = rx.recv().await {
        match command {
            Command::Append(line) => {
                if let Err(e) = append(&path, &line).await {
                    tracing::error!(path = %path.display(), error = %e, "Error writing to log file");
                }
            }
            Command::Clear(reply) => {
                let _ = reply.send(tokio::fs::remove_file(path.as_path()).await);
            }
            Command::Sync(reply) => {
                let _ = reply.send(());
            }
        }
    }
}

async fn append(path: &Path, line: &str) -> std::io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path).await?;
    file.write_all(line.as_bytes()).await?;
    file.flush().await
}

/// In-memory sink for tests.
/// Short zone name in the `GMT+5:30` style; whole hours drop the minutes.
fn zone_label(offset: FixedOffset) -> String {
    let seconds = offset.local_minus_utc();
    if seconds == 0 {
        return "UTC".to_string();
    }
    let sign = if seconds < 0 { '-' } else { '+' };
    let minutes = seconds.unsigned_abs() / 60;
    match minutes % 60 {
        0 => format!("GMT{}{}", sign, minutes / 60),
        rest => format!("GMT{}{}:{:02}", sign, minutes / 60, rest),
    }
}

#[cfg(test)]
#[derive(Default)]
pub struct MemorySink {
    records: parking_lot::Mutex<Vec<String>>,
}

#[cfg(test)]
impl MemorySink {
    pub fn contains(&self, message: &str) -> bool {
        self.records.lock().iter().any(|r| r == message)
    }
}

#[cfg(test)]
impl DiagnosticSink for MemorySink {
    fn record(&self, message: &str) {
        self.records.lock().push(message.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ist() -> FixedOffset {
        FixedOffset::east_opt(330 * 60).unwrap()
    }

    #[tokio::test]
    async fn test_format_line_uses_configured_offset() {
        let dir = tempfile::tempdir().unwrap();
        let journal = Journal::spawn(dir.path().join("server.log"), ist());

        let at = Utc.with_ymd_and_hms(2026, 10, 18, 0, 31, 0).unwrap();
        assert_eq!(
            journal.format_line("User alice stored.", at),
            "• October 18, 2026 at 6:01 AM GMT+5:30 - User alice stored.\n"
        );
    }

    #[test]
    fn test_zone_label() {
        assert_eq!(zone_label(ist()), "GMT+5:30");
        assert_eq!(zone_label(FixedOffset::west_opt(5 * 3600).unwrap()), "GMT-5");
        assert_eq!(zone_label(FixedOffset::west_opt(9 * 3600 + 30 * 60).unwrap()), "GMT-9:30");
        assert_eq!(zone_label(FixedOffset::east_opt(0).unwrap()), "UTC");
    }

    #[tokio::test]
    async fn test_multiline_messages_stay_on_one_line() {
        let dir = tempfile::tempdir().unwrap();
        let journal = Journal::spawn(dir.path().join("server.log"), ist());

        let line = journal.format_line("{\n\"type\": 1}", Utc::now());
        assert_eq!(line.matches('\n').count(), 1);
    }

    #[tokio::test]
    async fn test_records_are_read_back_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let journal = Journal::spawn(dir.path().join("server.log"), ist());

        journal.record("first");
        journal.record("second");
        journal.sync().await.unwrap();

        let entries = journal.entries().await.unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries[0].ends_with("- second"));
        assert!(entries[1].ends_with("- first"));
    }

    #[tokio::test]
    async fn test_clear_removes_file_and_later_records_start_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("server.log");
        let journal = Journal::spawn(&path, ist());

        journal.record("before");
        journal.clear().await.unwrap();
        assert!(!path.exists());
        assert!(journal.entries().await.unwrap().is_empty());

        journal.record("after");
        journal.sync().await.unwrap();
        let entries = journal.entries().await.unwrap();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].ends_with("- after"));
    }

    #[tokio::test]
    async fn test_clear_without_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let journal = Journal::spawn(dir.path().join("missing.log"), ist());

        assert!(matches!(journal.clear().await, Err(JournalError::Io(_))));
    }

    #[tokio::test]
    async fn test_write_failure_does_not_stop_the_writer() {
        let dir = tempfile::tempdir().unwrap();
        let journal = Journal::spawn(dir.path().join("no-such-dir").join("server.log"), ist());

        journal.record("lost");
        journal.sync().await.unwrap();
        assert!(journal.entries().await.unwrap().is_empty());
    }
}
