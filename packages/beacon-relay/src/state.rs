//! Server state management.
//!
//! Two layers: a connection table (`ConnectionId` → outbound queue) for
//! every open socket, and the [`Roster`] of registered identities and
//! in-call identities. The connection table is a DashMap so writers never
//! contend; the roster sits behind a single mutex so that every routed
//! message, and every disconnect, sees and commits one consistent state.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{FixedOffset, Offset, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::calls::CallTracker;
use crate::error::{RelayError, RelayResult};
use crate::journal::{DiagnosticSink, Journal};
use crate::presence::PresenceRegistry;
use crate::protocol::{ClientMessage, Envelope};
use crate::router::{self, Delivery};

/// Default listening port.
const DEFAULT_PORT: u16 = 3000;

/// Default journal file, relative to the working directory.
const DEFAULT_LOG_FILE: &str = "server.log";

/// Default journal timestamp offset (UTC+05:30).
const DEFAULT_LOG_UTC_OFFSET_MINUTES: i32 = 330;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub port: u16,
    /// Where the diagnostic journal is appended.
    pub log_file: PathBuf,
    /// Offset used when stamping journal lines, in minutes east of UTC.
    pub log_utc_offset_minutes: i32,
}

impl RelayConfig {
    /// The journal's timestamp offset. Out-of-range values fall back to UTC.
    pub fn log_offset(&self) -> FixedOffset {
        self.log_utc_offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .unwrap_or_else(|| {
                tracing::warn!(
                    minutes = self.log_utc_offset_minutes,
                    "Invalid journal UTC offset, using UTC"
                );
                Utc.fix()
            })
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            log_file: PathBuf::from(DEFAULT_LOG_FILE),
            log_utc_offset_minutes: DEFAULT_LOG_UTC_OFFSET_MINUTES,
        }
    }
}

/// Opaque handle to one open socket. Never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A connected client's outbound queue.
pub type ClientSender = mpsc::UnboundedSender<Envelope>;

/// Registered identities plus the in-call set, guarded together.
#[derive(Debug, Default)]
pub struct Roster {
    pub presence: PresenceRegistry,
    pub calls: CallTracker,
}

/// Shared server state.
#[derive(Clone)]
pub struct RelayState {
    /// Every open socket, registered or not.
    pub connections: Arc<DashMap<ConnectionId, ClientSender>>,

    /// Identity ↔ connection bindings and call state.
    pub roster: Arc<Mutex<Roster>>,

    /// Diagnostic journal served by `/log`.
    pub journal: Journal,

    pub config: RelayConfig,
}

impl RelayState {
    /// Create relay state and start its journal writer.
    pub fn new(config: RelayConfig) -> Self {
        let journal = Journal::spawn(config.log_file.clone(), config.log_offset());
        Self {
            connections: Arc::new(DashMap::new()),
            roster: Arc::new(Mutex::new(Roster::default())),
            journal,
            config,
        }
    }

    // ── Connection Lifecycle ──────────────────────────────────────────────

    /// Add a freshly accepted socket to the connection table.
    pub fn open_connection(&self, sender: ClientSender) -> ConnectionId {
        let id = ConnectionId::new();
        self.connections.insert(id, sender);
        tracing::debug!(connection = %id, "Connection opened");
        id
    }

    /// Tear down a closed socket.
    ///
    /// Identities bound to it leave the registry and the call set before
    /// presence is recomputed, so no broadcast lists a dead connection.
    pub fn close_connection(&self, id: ConnectionId) {
        let mut roster = self.roster.lock();
        let removed = roster.presence.remove_connection(id);
        for identity in &removed {
            self.journal.record(&format!("Connection closed for {}.", identity));
            roster.calls.clear_in_call(identity);
        }
        self.connections.remove(&id);

        if !removed.is_empty() {
            let updates = router::refresh_presence(&roster, &self.journal);
            self.deliver(updates);
        }
        tracing::debug!(connection = %id, "Connection closed");
    }

    // ── Inbound Frames ────────────────────────────────────────────────────

    /// Decode and route one text frame.
    pub fn handle_text(&self, from: ConnectionId, text: &str) {
        let message = match serde_json::from_str::<ClientMessage>(text) {
            Ok(message) => message,
            Err(e) => return self.reject(from, text, e.into()),
        };

        self.journal.record(&format!("Received message: {}", text));
        self.journal.record(&format!("Received Type: {}", message.kind()));

        let mut roster = self.roster.lock();
        let deliveries = router::route(&mut roster, from, message, &self.journal);
        self.deliver(deliveries);
    }

    /// Binary frames are accepted when they hold UTF-8 JSON.
    pub fn handle_binary(&self, from: ConnectionId, bytes: &[u8]) {
        match std::str::from_utf8(bytes) {
            Ok(text) => self.handle_text(from, text),
            Err(e) => self.reject(from, &String::from_utf8_lossy(bytes), e.into()),
        }
    }

    /// Report an undecodable frame to its sender. The connection stays open.
    fn reject(&self, from: ConnectionId, raw: &str, error: RelayError) {
        tracing::warn!(connection = %from, error = %error, "Failed to parse client message");
        self.journal.record(&format!("Received message: {}", raw));
        self.journal.record(&format!("Error : {}", error));

        if let Err(e) = self.send_to_connection(from, Envelope::internal_error()) {
            tracing::debug!(error = %e, "Could not report parse failure");
        }
    }

    // ── Outbound ──────────────────────────────────────────────────────────

    /// Queue a message for one connection.
    pub fn send_to_connection(&self, to: ConnectionId, message: Envelope) -> RelayResult<()> {
        match self.connections.get(&to) {
            Some(sender) => sender.send(message).map_err(|_| RelayError::SendFailure(to)),
            None => Err(RelayError::SendFailure(to)),
        }
    }

    /// Push a batch. A failed recipient is skipped, never fatal to the rest.
    fn deliver(&self, deliveries: Vec<Delivery>) {
        for delivery in deliveries {
            if let Err(e) = self.send_to_connection(delivery.to, delivery.message) {
                tracing::warn!(error = %e, "Dropping outbound message");
            }
        }
    }

    // ── Queries ───────────────────────────────────────────────────────────

    /// Registered identities in registration order.
    pub fn registered_identities(&self) -> Vec<String> {
        self.roster.lock().presence.identities()
    }

    pub fn is_in_call(&self, identity: &str) -> bool {
        self.roster.lock().calls.is_in_call(identity)
    }

    /// Number of registered identities.
    pub fn online_count(&self) -> usize {
        self.roster.lock().presence.len()
    }

    /// Number of open sockets, registered or not.
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }
}
