//! Relay protocol message definitions.
//!
//! The relay speaks a small JSON-over-WebSocket protocol. Every inbound
//! frame carries a `type` tag and the sender's `name`; session payloads
//! (SDP, ICE candidates) are opaque to the relay and forwarded as received.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Reply sent to `start_call` when the target is connected.
pub const TARGET_READY: &str = "User is online and ready for call...";

/// Reply sent to `start_call` when the target is not connected.
pub const TARGET_OFFLINE: &str = "User is not online...";

/// Body of the envelope returned for frames that cannot be decoded.
pub const INTERNAL_ERROR: &str = "An Internal Error Occurred....";

// ── Client → Relay ────────────────────────────────────────────────────────────

/// Messages sent from a client to the relay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Claim an identity for this connection.
    StoreUser { name: String },

    /// Ask whether `target` is reachable before placing a call.
    StartCall { name: String, target: String },

    /// Forward an SDP offer to `target`.
    CreateOffer {
        name: String,
        target: String,
        data: SessionDescription,
    },

    /// Forward an SDP answer to `target`.
    CreateAnswer {
        name: String,
        target: String,
        data: SessionDescription,
    },

    /// Forward a trickled ICE candidate to `target`.
    IceCandidate {
        name: String,
        target: String,
        data: IceCandidate,
    },

    /// Tell `target` the call is over.
    EndCall { name: String, target: String },

    /// Any tag the relay does not understand. Routed as a no-op.
    #[serde(other)]
    Unknown,
}

impl ClientMessage {
    /// Wire tag of this message, for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            ClientMessage::StoreUser { .. } => "store_user",
            ClientMessage::StartCall { .. } => "start_call",
            ClientMessage::CreateOffer { .. } => "create_offer",
            ClientMessage::CreateAnswer { .. } => "create_answer",
            ClientMessage::IceCandidate { .. } => "ice_candidate",
            ClientMessage::EndCall { .. } => "end_call",
            ClientMessage::Unknown => "unknown",
        }
    }
}

/// The `data` object of an offer or answer. Only `sdp` is forwarded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionDescription {
    pub sdp: Value,
}

/// An ICE candidate as exchanged by WebRTC clients.
///
/// Every member is optional; absent members are omitted when forwarded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IceCandidate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sdp_m_line_index: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sdp_mid: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sdp_candidate: Option<Value>,
}

// ── Relay → Client ────────────────────────────────────────────────────────────

/// Typed messages sent from the relay to a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// The identity in a `store_user` is already taken.
    #[serde(rename = "User Already Exists...")]
    UserAlreadyExists,

    /// Answer to `start_call`.
    CallResponse { data: String },

    /// An SDP offer from `name`.
    OfferReceived { name: String, data: Value },

    /// An SDP answer from `name`.
    AnswerReceived { name: String, data: Value },

    /// An ICE candidate from `name`.
    IceCandidate { name: String, data: IceCandidate },

    /// `name` hung up. `data` is always empty.
    EndCall { name: String, data: String },

    /// Identities currently available to call, excluding the recipient.
    OnlineUsers { data: Vec<String> },
}

/// Everything the relay can put on the wire.
///
/// Decode failures are reported with an untyped `{"Error": ...}` object,
/// which existing clients match on instead of a `type` tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Envelope {
    Message(ServerMessage),
    Fault {
        #[serde(rename = "Error")]
        error: String,
    },
}

impl Envelope {
    /// The generic envelope for frames the relay could not process.
    pub fn internal_error() -> Self {
        Envelope::Fault {
            error: INTERNAL_ERROR.to_string(),
        }
    }
}

impl From<ServerMessage> for Envelope {
    fn from(message: ServerMessage) -> Self {
        Envelope::Message(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_store_user_decodes() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"store_user","name":"alice"}"#).unwrap();
        assert_eq!(
            msg,
            ClientMessage::StoreUser {
                name: "alice".to_string()
            }
        );
        assert_eq!(msg.kind(), "store_user");
    }

    #[test]
    fn test_offer_keeps_sdp_opaque() {
        let msg: ClientMessage = serde_json::from_value(json!({
            "type": "create_offer",
            "name": "alice",
            "target": "bob",
            "data": { "sdp": "v=0\r\no=- 46117 2 IN IP4 127.0.0.1", "type": "offer" }
        }))
        .unwrap();

        match msg {
            ClientMessage::CreateOffer { name, target, data } => {
                assert_eq!(name, "alice");
                assert_eq!(target, "bob");
                assert_eq!(data.sdp, json!("v=0\r\no=- 46117 2 IN IP4 127.0.0.1"));
            }
            other => panic!("Expected CreateOffer, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_type_maps_to_noop_variant() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"wave","name":"alice","target":"bob"}"#).unwrap();
        assert_eq!(msg, ClientMessage::Unknown);
    }

    #[test]
    fn test_missing_fields_fail_to_decode() {
        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"start_call","name":"a"}"#).is_err());
        assert!(serde_json::from_str::<ClientMessage>(
            r#"{"type":"create_answer","name":"a","target":"b"}"#
        )
        .is_err());
        assert!(serde_json::from_str::<ClientMessage>(r#"{"name":"a"}"#).is_err());
        assert!(serde_json::from_str::<ClientMessage>("not json").is_err());
    }

    #[test]
    fn test_ice_candidate_field_names() {
        let msg: ClientMessage = serde_json::from_value(json!({
            "type": "ice_candidate",
            "name": "alice",
            "target": "bob",
            "data": { "sdpMLineIndex": 0, "sdpMid": "audio", "sdpCandidate": "candidate:1 1 udp" }
        }))
        .unwrap();

        let ClientMessage::IceCandidate { data, .. } = msg else {
            panic!("Expected IceCandidate");
        };
        let out = serde_json::to_value(ServerMessage::IceCandidate {
            name: "alice".to_string(),
            data,
        })
        .unwrap();
        assert_eq!(
            out,
            json!({
                "type": "ice_candidate",
                "name": "alice",
                "data": { "sdpMLineIndex": 0, "sdpMid": "audio", "sdpCandidate": "candidate:1 1 udp" }
            })
        );
    }

    #[test]
    fn test_partial_ice_candidate_omits_absent_members() {
        let candidate = IceCandidate {
            sdp_mid: Some(json!("0")),
            ..Default::default()
        };
        assert_eq!(serde_json::to_value(candidate).unwrap(), json!({ "sdpMid": "0" }));
    }

    #[test]
    fn test_server_envelopes_match_wire_format() {
        let exists = serde_json::to_value(Envelope::from(ServerMessage::UserAlreadyExists)).unwrap();
        assert_eq!(exists, json!({ "type": "User Already Exists..." }));

        let response = serde_json::to_value(Envelope::from(ServerMessage::CallResponse {
            data: TARGET_READY.to_string(),
        }))
        .unwrap();
        assert_eq!(
            response,
            json!({ "type": "call_response", "data": "User is online and ready for call..." })
        );

        let online = serde_json::to_value(Envelope::from(ServerMessage::OnlineUsers {
            data: vec!["alice".to_string()],
        }))
        .unwrap();
        assert_eq!(online, json!({ "type": "online_users", "data": ["alice"] }));

        let end = serde_json::to_value(Envelope::from(ServerMessage::EndCall {
            name: "alice".to_string(),
            data: String::new(),
        }))
        .unwrap();
        assert_eq!(end, json!({ "type": "end_call", "name": "alice", "data": "" }));
    }

    #[test]
    fn test_internal_error_envelope_has_no_type() {
        let value = serde_json::to_value(Envelope::internal_error()).unwrap();
        assert_eq!(value, json!({ "Error": "An Internal Error Occurred...." }));
    }
}
