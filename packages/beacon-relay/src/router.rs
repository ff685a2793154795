//! Message routing.
//!
//! Turns one decoded [`ClientMessage`] into roster mutations and a batch of
//! outbound deliveries. Routing is stateless per message: the relay has no
//! notion of which offer belongs to which call, so any client may address
//! any target at any time.
//!
//! Target resolution failures are deliberately asymmetric. `start_call`
//! answers the caller with an "offline" response; every other routed type
//! is dropped without a reply.

use serde_json::Value;

use crate::broadcast;
use crate::error::{RelayError, RelayResult};
use crate::journal::DiagnosticSink;
use crate::protocol::{ClientMessage, Envelope, IceCandidate, ServerMessage, TARGET_OFFLINE, TARGET_READY};
use crate::state::{ConnectionId, Roster};

/// A message addressed to one connection.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub to: ConnectionId,
    pub message: Envelope,
}

impl Delivery {
    fn new(to: ConnectionId, message: ServerMessage) -> Self {
        Self {
            to,
            message: message.into(),
        }
    }
}

/// What a handler produced before presence is recomputed.
#[derive(Debug, Default)]
struct Routed {
    deliveries: Vec<Delivery>,
    presence_changed: bool,
}

impl Routed {
    fn reply(delivery: Delivery) -> Self {
        Self {
            deliveries: vec![delivery],
            presence_changed: false,
        }
    }

    fn changed(deliveries: Vec<Delivery>) -> Self {
        Self {
            deliveries,
            presence_changed: true,
        }
    }
}

/// Apply `message` from connection `from` to the roster.
///
/// Returns every delivery the message causes, in send order: direct
/// replies or forwards first, then one `online_users` per registered user
/// when presence changed.
pub fn route(
    roster: &mut Roster,
    from: ConnectionId,
    message: ClientMessage,
    journal: &dyn DiagnosticSink,
) -> Vec<Delivery> {
    let kind = message.kind();

    let result = match message {
        ClientMessage::StoreUser { name } => store_user(roster, from, &name, journal),
        ClientMessage::StartCall { name, target } => start_call(roster, from, &name, &target, journal),
        ClientMessage::CreateOffer { name, target, data } => {
            forward_description(roster, &name, &target, Description::Offer(data.sdp), journal)
        }
        ClientMessage::CreateAnswer { name, target, data } => {
            forward_description(roster, &name, &target, Description::Answer(data.sdp), journal)
        }
        ClientMessage::IceCandidate { name, target, data } => {
            forward_candidate(roster, &name, &target, data, journal)
        }
        ClientMessage::EndCall { name, target } => end_call(roster, &name, &target, journal),
        ClientMessage::Unknown => {
            tracing::debug!(connection = %from, "Ignoring message with unrecognized type");
            Ok(Routed::default())
        }
    };

    match result {
        Ok(routed) => {
            let mut deliveries = routed.deliveries;
            if routed.presence_changed {
                deliveries.extend(refresh_presence(roster, journal));
            }
            deliveries
        }
        Err(RelayError::AlreadyExists(identity)) => {
            journal.record(&format!("User {} already exists.", identity));
            vec![Delivery::new(from, ServerMessage::UserAlreadyExists)]
        }
        Err(RelayError::TargetNotFound(target)) => {
            tracing::debug!(kind = kind, target = target.as_str(), "Target offline, dropping");
            Vec::new()
        }
        Err(e) => {
            tracing::warn!(kind = kind, error = %e, "Routing failed");
            Vec::new()
        }
    }
}

/// Presence deliveries for the current roster, with the usual journal lines.
pub fn refresh_presence(roster: &Roster, journal: &dyn DiagnosticSink) -> Vec<Delivery> {
    let updates = broadcast::presence_updates(&roster.presence, &roster.calls);
    journal.record(&format!("Online Users {} .", roster.presence.identities().join(",")));
    journal.record(&format!(" Users in call {} .", roster.calls.members().join(",")));
    updates
}

// ── Handlers ──────────────────────────────────────────────────────────────────

fn store_user(
    roster: &mut Roster,
    from: ConnectionId,
    name: &str,
    journal: &dyn DiagnosticSink,
) -> RelayResult<Routed> {
    roster.presence.register(name, from)?;
    journal.record(&format!("User {} stored.", name));
    Ok(Routed::changed(Vec::new()))
}

fn start_call(
    roster: &mut Roster,
    from: ConnectionId,
    name: &str,
    target: &str,
    journal: &dyn DiagnosticSink,
) -> RelayResult<Routed> {
    if roster.presence.lookup(target).is_err() {
        journal.record(TARGET_OFFLINE);
        return Ok(Routed::reply(Delivery::new(
            from,
            ServerMessage::CallResponse {
                data: TARGET_OFFLINE.to_string(),
            },
        )));
    }

    journal.record(TARGET_READY);
    roster.calls.mark_in_call(name);
    roster.calls.mark_in_call(target);

    Ok(Routed::changed(vec![Delivery::new(
        from,
        ServerMessage::CallResponse {
            data: TARGET_READY.to_string(),
        },
    )]))
}

enum Description {
    Offer(Value),
    Answer(Value),
}

fn forward_description(
    roster: &mut Roster,
    name: &str,
    target: &str,
    description: Description,
    journal: &dyn DiagnosticSink,
) -> RelayResult<Routed> {
    let to = roster.presence.lookup(target)?.connection;

    let (message, label) = match description {
        Description::Offer(sdp) => (
            ServerMessage::OfferReceived {
                name: name.to_string(),
                data: sdp,
            },
            "Offer",
        ),
        Description::Answer(sdp) => (
            ServerMessage::AnswerReceived {
                name: name.to_string(),
                data: sdp,
            },
            "Answer",
        ),
    };

    journal.record(&format!("{} sent to {} by {}.", label, target, name));
    roster.calls.mark_in_call(name);
    roster.calls.mark_in_call(target);

    Ok(Routed::changed(vec![Delivery::new(to, message)]))
}

fn forward_candidate(
    roster: &mut Roster,
    name: &str,
    target: &str,
    candidate: IceCandidate,
    journal: &dyn DiagnosticSink,
) -> RelayResult<Routed> {
    let to = roster.presence.lookup(target)?.connection;

    journal.record(&format!("ICE candidate sent to {} by {}.", target, name));
    Ok(Routed::reply(Delivery::new(
        to,
        ServerMessage::IceCandidate {
            name: name.to_string(),
            data: candidate,
        },
    )))
}

fn end_call(
    roster: &mut Roster,
    name: &str,
    target: &str,
    journal: &dyn DiagnosticSink,
) -> RelayResult<Routed> {
    let to = roster.presence.lookup(target)?.connection;

    journal.record(&format!("Call Ended by {} to {}.", name, target));
    roster.calls.clear_in_call(name);
    roster.calls.clear_in_call(target);

    Ok(Routed::changed(vec![Delivery::new(
        to,
        ServerMessage::EndCall {
            name: name.to_string(),
            data: String::new(),
        },
    )]))
}
