//
// Copyright 2024 kwm-signaling Contributors
// SPDX-License-Identifier: AGPL-3.0-only
//

//! The wire envelope carried over the signaling transport.
//!
//! Every server message is a tagged record `{id, type, reply_to?,
//! ...type-specific fields}`. We model this as a struct with an
//! internally-tagged `Payload` enum so `type` stays a top-level JSON key
//! alongside the type-specific fields, the way `signaling::Message` models
//! the different kinds of peer signaling while keeping `MessageType` as a
//! cheap discriminant.

use std::fmt;

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

/// The protocol version this engine requires, sent as `v` on every envelope.
pub const REQUIRED_VERSION: u64 = 20180703;

/// A monotonically increasing per-connection sequence id.
pub type EnvelopeId = u64;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum WebRtcSubtype {
    WebrtcCall,
    WebrtcChannel,
    WebrtcHangup,
    WebrtcSignal,
    WebrtcGroup,
}

impl Serialize for WebRtcSubtype {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for WebRtcSubtype {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HelloSelf {
    pub id: String,
    pub name: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerErrorPayload {
    pub code: String,
    pub msg: String,
}

/// The contents of a `webrtc` envelope, shared by all subtypes. Not every
/// field is meaningful for every subtype; unused ones are simply absent on
/// the wire, with anything subtype-specific carried in the free-form
/// `data` value instead.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct WebRtcPayload {
    pub subtype: Option<WebRtcSubtype>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initiator: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pcid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction: Option<String>,
    #[serde(default)]
    pub v: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Payload {
    Hello {
        #[serde(rename = "self")]
        self_: HelloSelf,
    },
    Goodbye,
    Ping {
        ts: i64,
        #[serde(skip_serializing_if = "Option::is_none")]
        auth: Option<String>,
    },
    Pong {
        ts: i64,
        #[serde(skip_serializing_if = "Option::is_none")]
        auth: Option<String>,
    },
    Error {
        error: ServerErrorPayload,
    },
    Webrtc(WebRtcPayload),
    Chats(serde_json::Value),
}

impl Payload {
    pub fn type_name(&self) -> &'static str {
        match self {
            Payload::Hello { .. } => "hello",
            Payload::Goodbye => "goodbye",
            Payload::Ping { .. } => "ping",
            Payload::Pong { .. } => "pong",
            Payload::Error { .. } => "error",
            Payload::Webrtc(_) => "webrtc",
            Payload::Chats(_) => "chats",
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Envelope {
    pub id: EnvelopeId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<EnvelopeId>,
    #[serde(flatten)]
    pub payload: Payload,
}

impl Envelope {
    pub fn webrtc(&self) -> Option<&WebRtcPayload> {
        match &self.payload {
            Payload::Webrtc(w) => Some(w),
            _ => None,
        }
    }
}

impl fmt::Display for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Envelope(id={}, type={}, reply_to={:?})",
            self.id,
            self.payload.type_name(),
            self.reply_to
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_webrtc_call() {
        let env = Envelope {
            id: 1,
            reply_to: None,
            payload: Payload::Webrtc(WebRtcPayload {
                subtype: Some(WebRtcSubtype::WebrtcCall),
                target: Some("bob".into()),
                initiator: Some(true),
                v: REQUIRED_VERSION,
                ..Default::default()
            }),
        };
        let json = serde_json::to_string(&env).unwrap();
        assert!(json.contains("\"type\":\"webrtc\""));
        assert!(json.contains("\"subtype\":\"webrtc_call\""));
        let back: Envelope = serde_json::from_str(&json).unwrap();
        assert_eq!(back.webrtc().unwrap().target.as_deref(), Some("bob"));
    }

    #[test]
    fn pong_deserializes() {
        let json = r#"{"id":5,"reply_to":1,"type":"pong","ts":1000}"#;
        let env: Envelope = serde_json::from_str(json).unwrap();
        assert!(matches!(env.payload, Payload::Pong { ts: 1000, .. }));
        assert_eq!(env.reply_to, Some(1));
    }
}
