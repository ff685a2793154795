//! Beacon Relay
//!
//! A WebSocket signaling relay for peer-to-peer calls. Clients register a
//! name, see who else is available, and exchange SDP offers, answers and
//! ICE candidates through the relay. Media never passes through it.
//!
//! - [`presence`]: identity → connection registry
//! - [`calls`]: who is currently in a call
//! - [`router`]: per-message protocol dispatch
//! - [`broadcast`]: personalized `online_users` lists
//! - [`journal`]: append-only diagnostic log behind `/log`

pub mod api;
pub mod broadcast;
pub mod calls;
pub mod error;
pub mod handler;
pub mod journal;
pub mod presence;
pub mod protocol;
pub mod router;
pub mod state;

pub use error::{JournalError, RelayError, RelayResult};
pub use state::{RelayConfig, RelayState};
