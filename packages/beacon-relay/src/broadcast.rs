//! Presence broadcasting.
//!
//! Every registered user gets their own `online_users` list: all other
//! registered identities that are not in a call. Rosters are small, so the
//! lists are rebuilt from scratch on each change.

use crate::calls::CallTracker;
use crate::presence::PresenceRegistry;
use crate::protocol::ServerMessage;
use crate::router::Delivery;

/// The identities `viewer` should see as available.
pub fn available_for(viewer: &str, presence: &PresenceRegistry, calls: &CallTracker) -> Vec<String> {
    presence
        .entries()
        .iter()
        .filter(|entry| entry.identity != viewer && !calls.is_in_call(&entry.identity))
        .map(|entry| entry.identity.clone())
        .collect()
}

/// One `online_users` delivery per registered user.
pub fn presence_updates(presence: &PresenceRegistry, calls: &CallTracker) -> Vec<Delivery> {
    presence
        .entries()
        .iter()
        .map(|entry| Delivery {
            to: entry.connection,
            message: ServerMessage::OnlineUsers {
                data: available_for(&entry.identity, presence, calls),
            }
            .into(),
        })
        .collect()
}
