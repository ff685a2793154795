//! Call-state tracking.
//!
//! A flat set of identities that are "in a call". There is no pairing:
//! the set only hides its members from presence lists and never gates
//! whether a signal is forwarded.

use std::collections::HashSet;

#[derive(Debug, Default)]
pub struct CallTracker {
    in_call: HashSet<String>,
}

impl CallTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotent.
    pub fn mark_in_call(&mut self, identity: &str) {
        if self.in_call.insert(identity.to_string()) {
            tracing::debug!(identity = identity, "Marked in call");
        }
    }

    /// Idempotent.
    pub fn clear_in_call(&mut self, identity: &str) {
        if self.in_call.remove(identity) {
            tracing::debug!(identity = identity, "Cleared from call");
        }
    }

    pub fn is_in_call(&self, identity: &str) -> bool {
        self.in_call.contains(identity)
    }

    /// Members in sorted order, for diagnostics.
    pub fn members(&self) -> Vec<String> {
        let mut members: Vec<String> = self.in_call.iter().cloned().collect();
        members.sort();
        members
    }

    pub fn len(&self) -> usize {
        self.in_call.len()
    }

    pub fn is_empty(&self) -> bool {
        self.in_call.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mark_is_idempotent() {
        let mut calls = CallTracker::new();
        calls.mark_in_call("alice");
        calls.mark_in_call("alice");

        assert!(calls.is_in_call("alice"));
        assert_eq!(calls.len(), 1);
    }

    #[test]
    fn test_clear_is_idempotent() {
        let mut calls = CallTracker::new();
        calls.mark_in_call("alice");
        calls.clear_in_call("alice");
        calls.clear_in_call("alice");
        calls.clear_in_call("never-added");

        assert!(!calls.is_in_call("alice"));
        assert!(calls.is_empty());
    }

    #[test]
    fn test_unrelated_calls_share_one_set() {
        let mut calls = CallTracker::new();
        calls.mark_in_call("alice");
        calls.mark_in_call("bob");
        calls.mark_in_call("carol");
        calls.mark_in_call("dave");

        calls.clear_in_call("alice");
        assert_eq!(calls.members(), vec!["bob", "carol", "dave"]);
    }
}
