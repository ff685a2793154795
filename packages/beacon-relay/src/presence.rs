//! Presence registry.
//!
//! Maps client-chosen identities to the connection that registered them.
//! Identities are compared byte-for-byte; no trimming or case folding.
//! Entries keep registration order so presence lists are stable.

use crate::error::{RelayError, RelayResult};
use crate::state::ConnectionId;

/// A registered identity and the connection that owns it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserEntry {
    pub identity: String,
    pub connection: ConnectionId,
}

/// Who is connected right now.
#[derive(Debug, Default)]
pub struct PresenceRegistry {
    entries: Vec<UserEntry>,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `identity` to `connection`.
    ///
    /// An identity that is already present is never overwritten; the
    /// registry is left untouched and `AlreadyExists` is returned.
    pub fn register(&mut self, identity: &str, connection: ConnectionId) -> RelayResult<()> {
        if self.contains(identity) {
            return Err(RelayError::AlreadyExists(identity.to_string()));
        }

        self.entries.push(UserEntry {
            identity: identity.to_string(),
            connection,
        });
        tracing::info!(identity = identity, connection = %connection, "User registered");
        Ok(())
    }

    /// Resolve an identity to its entry.
    pub fn lookup(&self, identity: &str) -> RelayResult<&UserEntry> {
        self.entries
            .iter()
            .find(|entry| entry.identity == identity)
            .ok_or_else(|| RelayError::TargetNotFound(identity.to_string()))
    }

    pub fn contains(&self, identity: &str) -> bool {
        self.entries.iter().any(|entry| entry.identity == identity)
    }

    /// Drop every entry bound to `connection` and return the identities
    /// that went away. Usually zero or one.
    pub fn remove_connection(&mut self, connection: ConnectionId) -> Vec<String> {
        let mut removed = Vec::new();
        self.entries.retain(|entry| {
            if entry.connection == connection {
                removed.push(entry.identity.clone());
                false
            } else {
                true
            }
        });

        for identity in &removed {
            tracing::info!(identity = identity.as_str(), connection = %connection, "User unregistered");
        }
        removed
    }

    /// All entries in registration order.
    pub fn entries(&self) -> &[UserEntry] {
        &self.entries
    }

    /// Registered identities in registration order.
    pub fn identities(&self) -> Vec<String> {
        self.entries.iter().map(|entry| entry.identity.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_lookup() {
        let mut registry = PresenceRegistry::new();
        let conn = ConnectionId::new();

        registry.register("alice", conn).unwrap();

        let entry = registry.lookup("alice").unwrap();
        assert_eq!(entry.identity, "alice");
        assert_eq!(entry.connection, conn);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_duplicate_register_keeps_first_connection() {
        let mut registry = PresenceRegistry::new();
        let first = ConnectionId::new();
        let second = ConnectionId::new();

        registry.register("alice", first).unwrap();
        let err = registry.register("alice", second).unwrap_err();

        assert!(matches!(err, RelayError::AlreadyExists(ref name) if name == "alice"));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.lookup("alice").unwrap().connection, first);
    }

    #[test]
    fn test_identities_are_not_normalized() {
        let mut registry = PresenceRegistry::new();
        registry.register("Alice", ConnectionId::new()).unwrap();
        registry.register("alice ", ConnectionId::new()).unwrap();

        assert!(registry.lookup("alice").is_err());
        assert_eq!(registry.identities(), vec!["Alice", "alice "]);
    }

    #[test]
    fn test_lookup_unknown_is_target_not_found() {
        let registry = PresenceRegistry::new();
        let err = registry.lookup("carol").unwrap_err();
        assert!(matches!(err, RelayError::TargetNotFound(ref name) if name == "carol"));
    }

    #[test]
    fn test_remove_connection_drops_only_its_entries() {
        let mut registry = PresenceRegistry::new();
        let alice = ConnectionId::new();
        let bob = ConnectionId::new();
        registry.register("alice", alice).unwrap();
        registry.register("bob", bob).unwrap();

        assert_eq!(registry.remove_connection(alice), vec!["alice"]);
        assert!(!registry.contains("alice"));
        assert!(registry.contains("bob"));

        assert!(registry.remove_connection(alice).is_empty());
    }

    #[test]
    fn test_registration_order_is_preserved() {
        let mut registry = PresenceRegistry::new();
        for name in ["carol", "alice", "bob"] {
            registry.register(name, ConnectionId::new()).unwrap();
        }
        assert_eq!(registry.identities(), vec!["carol", "alice", "bob"]);
    }
}
