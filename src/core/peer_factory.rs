//
// Copyright 2024 kwm-signaling Contributors
// SPDX-License-Identifier: AGPL-3.0-only
//

//! Peer Factory: wraps the external `Peer` provider, binds its events back
//! to the Call Engine and P2P Controller, and handles automatic recovery.
//! Every handler callback is marshalled back onto the engine's actor
//! thread before touching `EngineState`, since a real media engine calls
//! these back from its own thread.

use std::sync::Arc;
use std::time::Duration;

use crate::core::actor::Actor;
use crate::core::engine::EngineState;
use crate::core::envelope::{Payload, WebRtcPayload, WebRtcSubtype, REQUIRED_VERSION};
use crate::core::p2p;
use crate::core::transport::{self, HasActor};
use crate::error::{Error, Result};
use crate::webrtc::peer::{
    IceConnectionState, MediaTrack, PeerConfig, PeerHandler, PeerId, SignalingState,
};

/// Creates a Peer for `peer_id`'s record with the given `initiator` flag,
/// installing local SDP transform / trickle / local-stream-inclusion per
/// `channel_config`, and binds the Peer Factory's event handler.
pub fn create_peer(state: &mut EngineState, peer_id: &str, initiator: bool) -> Result<PeerId> {
    if !state.peers.contains_key(peer_id) {
        return Err(Error::UnknownPeer);
    }
    let streams = if state.is_local_stream_target(peer_id) {
        state.local_stream.clone().into_iter().collect()
    } else {
        Vec::new()
    };
    let config = PeerConfig {
        ice_servers: Vec::new(),
        initiator,
        streams,
        recv_only_video: false,
        local_sdp_transform: state.channel_config.local_sdp_transform,
        trickle: true,
        channel_name: state.channel_config.channel_name.clone(),
        channel_config: state.channel_config.channel_config.clone(),
        offer_constraints: state.channel_config.offer_constraints.clone(),
        answer_constraints: state.channel_config.answer_constraints.clone(),
    };

    let actor = state.actor_handle();
    // The local id isn't known until `create` returns, so the handler
    // records it via `bind_local_id` right after creation (single-threaded
    // engine: no event can arrive before this function returns).
    let handler = Arc::new(EngineHandler {
        actor,
        peer: peer_id.to_string(),
        local_id: std::sync::Mutex::new(String::new()),
    });
    let pc = state.peer_provider.create(config, handler.clone())?;
    let local_id = pc.local_id().clone();
    *handler.local_id.lock().unwrap() = local_id.clone();

    state.pcs.insert(local_id.clone(), pc);
    if let Some(record) = state.peers.get_mut(peer_id) {
        record.pc = Some(local_id.clone());
    }
    Ok(local_id)
}

/// Destroys the Peer currently bound to `peer_id`, if any, clearing the
/// record's `pc` and the `pcs` registry entry.
pub fn destroy_peer(state: &mut EngineState, peer_id: &str) {
    let local_id = state.peers.get_mut(peer_id).and_then(|r| r.pc.take());
    if let Some(local_id) = local_id {
        if let Some(pc) = state.pcs.remove(&local_id) {
            pc.destroy();
        }
        p2p::on_parent_closed(state, peer_id);
    }
}

struct EngineHandler {
    actor: Actor<EngineState>,
    peer: String,
    local_id: std::sync::Mutex<PeerId>,
}

impl EngineHandler {
    fn local_id(&self) -> PeerId {
        self.local_id.lock().unwrap().clone()
    }
}

/// True when `local_id` is still the record's current pc; otherwise the
/// event belongs to a superseded pc and must be ignored.
fn is_current(state: &EngineState, peer: &str, local_id: &str) -> bool {
    state
        .peers
        .get(peer)
        .and_then(|r| r.pc.as_deref())
        .map(|pc| pc == local_id)
        .unwrap_or(false)
}

impl PeerHandler for EngineHandler {
    fn on_error(&self, _peer: &PeerId, error: crate::error::Error) {
        let actor = self.actor.clone();
        let peer = self.peer.clone();
        let local_id = self.local_id();
        actor.send(move |state: &mut EngineState| {
            if !is_current(state, &peer, &local_id) {
                return;
            }
            log::warn!("peer {peer}: error: {error}");
            let reconnect = state.peers.get(&peer).map(|r| r.reconnect).unwrap_or(false);
            if reconnect {
                schedule_recovery(state, &peer, &local_id);
            }
        });
    }

    fn on_signal(&self, _peer: &PeerId, data: serde_json::Value) {
        let actor = self.actor.clone();
        let peer = self.peer.clone();
        let local_id = self.local_id();
        actor.send(move |state: &mut EngineState| {
            if !is_current(state, &peer, &local_id) {
                return;
            }
            let channel = state.channel.clone();
            let target = state.peers.get(&peer).map(|r| r.user.clone());
            let Some(target) = target else { return };
            let actor2 = state.actor_handle();
            let result = transport::send(
                state,
                &actor2,
                move |_id| {
                    Payload::Webrtc(WebRtcPayload {
                        subtype: Some(WebRtcSubtype::WebrtcSignal),
                        target: Some(target.clone()),
                        channel: Some(channel.clone()),
                        pcid: Some(local_id.clone()),
                        v: REQUIRED_VERSION,
                        data: Some(data.clone()),
                        ..Default::default()
                    })
                },
                None,
                None,
            );
            if result.is_err() {
                let local_id = self_local_id(state, &peer);
                if let Some(local_id) = local_id {
                    schedule_recovery(state, &peer, &local_id);
                }
            }
        });
    }

    fn on_connect(&self, _peer: &PeerId) {
        let actor = self.actor.clone();
        let peer = self.peer.clone();
        let local_id = self.local_id();
        actor.send(move |state: &mut EngineState| {
            if !is_current(state, &peer, &local_id) {
                return;
            }
            state
                .p2p
                .entry(local_id.clone())
                .or_insert_with(|| {
                    let user = state
                        .peers
                        .get(&peer)
                        .map(|r| r.user.clone())
                        .unwrap_or_default();
                    let initiator = state.peers.get(&peer).map(|r| r.initiator).unwrap_or(false);
                    crate::core::p2p::P2pRecord::new(local_id.clone(), user, initiator)
                });
            if let Some(pc) = state.pcs.get(&local_id).cloned() {
                p2p::on_connect(state, &local_id, pc.as_ref());
            }
        });
    }

    fn on_close(&self, _peer: &PeerId) {
        let actor = self.actor.clone();
        let peer = self.peer.clone();
        let local_id = self.local_id();
        actor.send(move |state: &mut EngineState| {
            if let Some(record) = state.peers.get_mut(&peer) {
                if record.pc.as_deref() == Some(local_id.as_str()) {
                    record.pc = None;
                }
            }
            state.pcs.remove(&local_id);
            p2p::on_parent_closed(state, &local_id);
        });
    }

    fn on_data(&self, _peer: &PeerId, data: Vec<u8>) {
        let actor = self.actor.clone();
        let peer = self.peer.clone();
        let local_id = self.local_id();
        actor.send(move |state: &mut EngineState| {
            if !is_current(state, &peer, &local_id) {
                return;
            }
            if let Some(pc) = state.pcs.get(&local_id).cloned() {
                p2p::on_data(state, &local_id, pc.as_ref(), &data);
            }
        });
    }

    fn on_track(&self, _peer: &PeerId, _track: MediaTrack) {}
    fn on_stream(&self, _peer: &PeerId, _stream: crate::webrtc::peer::MediaStream) {}
    fn on_ice_state_change(&self, _peer: &PeerId, _state: IceConnectionState) {}
    fn on_signaling_state_change(&self, _peer: &PeerId, _state: SignalingState) {}
}

fn self_local_id(state: &EngineState, peer: &str) -> Option<PeerId> {
    state.peers.get(peer).and_then(|r| r.pc.clone())
}

/// Recovery: after 500ms, if `record.pc` is still the failed pc and
/// `record.reconnect` is true, destroy it and recreate with the
/// same `initiator`. If not initiator, emit a synthetic
/// `signal {renegotiate:true}` to unblock the remote side.
fn schedule_recovery(state: &mut EngineState, peer: &str, failed_local_id: &str) {
    let actor = state.actor_handle();
    let peer = peer.to_string();
    let failed_local_id = failed_local_id.to_string();
    actor.send_delayed(Duration::from_millis(500), move |state: &mut EngineState| {
        let Some(record) = state.peers.get(&peer) else {
            return;
        };
        if record.pc.as_deref() != Some(failed_local_id.as_str()) || !record.reconnect {
            return;
        }
        let initiator = record.initiator;
        destroy_peer(state, &peer);
        match create_peer(state, &peer, initiator) {
            Ok(new_local_id) => {
                if !initiator {
                    if let Some(pc) = state.pcs.get(&new_local_id).cloned() {
                        let _ = pc.signal(serde_json::json!({"renegotiate": true}));
                    }
                }
            }
            Err(e) => log::warn!("peer {peer}: recovery failed to recreate pc: {e}"),
        }
    });
}
