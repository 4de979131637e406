//
// Copyright 2024 kwm-signaling Contributors
// SPDX-License-Identifier: AGPL-3.0-only
//

//! Event dispatch: a tagged union of event kinds delivered through a
//! single handler table the application supplies as an `EventSink`.

use crate::error::Error;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TransportState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
    Closing,
}

#[derive(Clone, Debug)]
pub struct TurnChanged {
    pub uris: Vec<String>,
}

#[derive(Clone, Debug)]
pub enum Event {
    /// Transport state transition.
    StateChanged { connected: bool, state: TransportState },
    /// A non-fatal background error: TURN refresh, transport, or permission.
    Error { code: String, msg: String },
    /// A refreshed TURN configuration arrived; returning `false` from the
    /// handler cancels replacing the Peer Factory's ICE server list.
    TurnChanged(TurnChanged),
    /// A remote caller is ringing (`webrtc_call` with initiator=true).
    IncomingCall { peer: String },
    /// Our outgoing call was accepted.
    OutgoingCall { peer: String },
    /// Our outgoing call was rejected.
    AbortCall { peer: String, reason: String },
    /// A peer's call ended (`webrtc_hangup`).
    Hangup { peer: String, payload: Option<serde_json::Value> },
    /// The server sent an `error` envelope unrelated to any pending reply.
    ServerError { code: String, msg: String },
}

pub trait EventSink: Send + Sync {
    /// Returns `true` to accept the new TURN configuration (the default),
    /// `false` to cancel replacing the ICE server list.
    fn on_event(&self, event: Event) -> bool {
        let _ = event;
        true
    }
}

impl From<Error> for Event {
    fn from(err: Error) -> Self {
        Event::Error {
            code: format!("{err:?}"),
            msg: err.to_string(),
        }
    }
}
