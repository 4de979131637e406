//
// Copyright 2024 kwm-signaling Contributors
// SPDX-License-Identifier: AGPL-3.0-only
//

//! Session Controller: handles `hello` and routes inbound envelopes that
//! weren't consumed as a pending reply by the Transport.

use crate::core::actor::Actor;
use crate::core::call_engine;
use crate::core::engine::EngineState;
use crate::core::envelope::{Envelope, Payload};
use crate::core::event::Event;
use crate::core::group;
use crate::core::transport::{self, TransportDelegate};

/// Routes a non-reply envelope by `type`.
pub fn on_envelope(state: &mut EngineState, _actor: &Actor<EngineState>, env: Envelope) {
    match env.payload {
        Payload::Hello { self_ } => on_hello(state, self_.id),
        Payload::Webrtc(payload) => call_engine::handle_inbound_webrtc(state, &payload),
        Payload::Chats(_) => {
            // Opaque to the core: the Chat Engine is an external collaborator.
        }
        Payload::Error { error } => {
            state.on_event(Event::ServerError {
                code: error.code,
                msg: error.msg,
            });
        }
        Payload::Goodbye => {
            transport::on_goodbye(state);
        }
        Payload::Ping { .. } | Payload::Pong { .. } => {
            // Handled entirely inside the Transport before reaching here.
        }
    }
}

/// `hello`: learns the current user id. A mismatch against a previously
/// known user triggers a local hangup of any in-progress call before the
/// new identity is adopted; a reappearance of the current user in a live
/// group's membership triggers `refreshGroup`.
fn on_hello(state: &mut EngineState, remote_user: String) {
    if let Some(existing) = &state.user {
        if *existing != remote_user {
            call_engine::do_hangup(state, None, "");
        }
    }
    let is_rejoin = state
        .group
        .as_ref()
        .map(|g| g.members.contains(&remote_user))
        .unwrap_or(false);
    state.user = Some(remote_user);
    if is_rejoin {
        group::refresh_group(state);
    }
}
