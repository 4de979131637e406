//
// Copyright 2024 kwm-signaling Contributors
// SPDX-License-Identifier: AGPL-3.0-only
//

//! Call Engine: owns the active channel, the peer table, and the
//! call/group/pipeline state machine. Produces and consumes `webrtc`
//! envelopes.

use std::time::Duration;

use crate::core::engine::{self, EngineState};
use crate::core::envelope::{
    Envelope, EnvelopeId, Payload, WebRtcPayload, WebRtcSubtype, REQUIRED_VERSION,
};
use crate::core::event::Event;
use crate::core::group::GroupState;
use crate::core::peer_factory;
use crate::core::peer_record::{PeerRecord, PIPELINE_CID};
use crate::core::transport::{self, HasActor, TransportDelegate};
use crate::error::{Error, Result};
use crate::webrtc::peer::{MediaStream, TrackKind};

/// `self >= other` under byte ordering: exactly one side of each pair is
/// the initiator, ties resolve to `true`.
pub fn compute_initiator(local_user: &str, remote_user: &str) -> bool {
    local_user >= remote_user
}

fn webrtc_envelope(payload: WebRtcPayload) -> impl FnMut(EnvelopeId) -> Payload {
    move |_id| Payload::Webrtc(payload.clone())
}

/// `profile` travels inside the free-form `data` rather than as a named
/// envelope field.
fn extract_profile(payload: &WebRtcPayload) -> Option<serde_json::Value> {
    payload.data.as_ref().and_then(|d| d.get("profile").cloned())
}

// ---------------------------------------------------------------------
// Public operations
// ---------------------------------------------------------------------

/// Places an outgoing call to `user`, creating its peer record and sending
/// the initial `webrtc_call` envelope.
pub fn do_call(state: &mut EngineState, user: String) -> Result<EnvelopeId> {
    if state.has_channel() {
        return Err(Error::AlreadyHaveChannel);
    }
    if state.peers.contains_key(&user) {
        return Err(Error::PeerAlreadyExists);
    }
    let record = PeerRecord::new(user.clone(), user.clone(), true);
    let state_nonce = record.state.clone();
    state.peers.insert(user.clone(), record);

    let actor = state.actor_handle();
    let target = user.clone();
    let reply_user = user;
    transport::send(
        state,
        &actor,
        webrtc_envelope(WebRtcPayload {
            subtype: Some(WebRtcSubtype::WebrtcCall),
            target: Some(target),
            initiator: Some(true),
            state: Some(state_nonce),
            v: REQUIRED_VERSION,
            ..Default::default()
        }),
        Some(Duration::from_secs(5)),
        Some(Box::new(move |state: &mut EngineState, reply| {
            on_do_call_reply(state, reply_user, reply);
        })),
    )
}

fn on_do_call_reply(state: &mut EngineState, user: String, reply: Result<Envelope>) {
    let env = match reply {
        Ok(env) => env,
        Err(e) => {
            state.peers.remove(&user);
            engine::report(state, Err(e));
            return;
        }
    };
    // The record may have been dropped by a concurrent local hangup while
    // the reply was in flight.
    if !state.peers.contains_key(&user) {
        return;
    }
    let Some(payload) = env.webrtc().cloned() else {
        return;
    };
    if let Some(channel) = &payload.channel {
        state.channel = channel.clone();
    }
    on_webrtc_call(state, &payload);
}

/// Accepts an incoming call from `user`, echoing its transaction id.
pub fn do_answer(state: &mut EngineState, user: &str) -> Result<()> {
    if !state.has_channel() {
        return Err(Error::NoChannel);
    }
    let record = state.peers.get(user).ok_or(Error::UnknownPeer)?.clone();
    let transaction = record.transaction.clone();
    let actor = state.actor_handle();
    transport::send(
        state,
        &actor,
        webrtc_envelope(WebRtcPayload {
            subtype: Some(WebRtcSubtype::WebrtcCall),
            target: Some(user.to_string()),
            transaction,
            v: REQUIRED_VERSION,
            data: Some(serde_json::json!({"accept": true, "state": record.ref_})),
            ..Default::default()
        }),
        None,
        None,
    )?;
    if let Some(r) = state.peers.get_mut(user) {
        r.transaction = None;
    }
    Ok(())
}

/// Rejects an incoming call from `user`: a local hangup, no hangup message.
pub fn do_reject(state: &mut EngineState, user: &str, reason: &str) -> Result<()> {
    let record = state.peers.get(user).ok_or(Error::UnknownPeer)?.clone();
    let actor = state.actor_handle();
    transport::send(
        state,
        &actor,
        webrtc_envelope(WebRtcPayload {
            subtype: Some(WebRtcSubtype::WebrtcCall),
            target: Some(user.to_string()),
            v: REQUIRED_VERSION,
            data: Some(serde_json::json!({
                "accept": false,
                "reason": reason,
                "state": record.ref_,
            })),
            ..Default::default()
        }),
        None,
        None,
    )?;
    hangup_peer_local(state, user);
    Ok(())
}

/// Joins `group`. The Group Coordinator itself is established only once
/// the reply arrives, not at request time.
pub fn do_group(state: &mut EngineState, group: String) -> Result<EnvelopeId> {
    let record = PeerRecord::new(group.clone(), group.clone(), false);
    let state_nonce = record.state.clone();

    let actor = state.actor_handle();
    transport::send(
        state,
        &actor,
        webrtc_envelope(WebRtcPayload {
            subtype: Some(WebRtcSubtype::WebrtcGroup),
            group: Some(group),
            state: Some(state_nonce),
            v: REQUIRED_VERSION,
            ..Default::default()
        }),
        Some(Duration::from_secs(5)),
        Some(Box::new(move |state: &mut EngineState, reply| {
            on_do_group_reply(state, record, reply);
        })),
    )
}

fn on_do_group_reply(state: &mut EngineState, mut record: PeerRecord, reply: Result<Envelope>) {
    let env = match reply {
        Ok(env) => env,
        Err(e) => {
            engine::report(state, Err(e));
            return;
        }
    };
    let Some(payload) = env.webrtc().cloned() else {
        return;
    };
    if let Some(hash) = &payload.hash {
        record.hash = Some(hash.clone());
    }
    state.group = Some(GroupState::new(record));
    if let Some(channel) = &payload.channel {
        state.channel = channel.clone();
    }
    if let Some(data) = payload.data.clone() {
        handle_extra_channel_data(state, data);
    }
}

/// Hangs up `user`, or the whole channel if `user` is `None`. An empty
/// `reason` is local only: the transition still occurs but no envelope is
/// sent.
pub fn do_hangup(state: &mut EngineState, user: Option<&str>, reason: &str) {
    match user {
        Some(user) => {
            if state.peers.contains_key(user) {
                send_hangup(state, user, reason);
                hangup_peer_local(state, user);
            }
        }
        None => {
            if let Some(group) = state.group.clone() {
                send_hangup(state, &group.record.user, reason);
            }
            let ids: Vec<String> = state.peers.keys().cloned().collect();
            for id in ids {
                send_hangup(state, &id, reason);
            }
            state.clear_channel();
        }
    }
}

fn send_hangup(state: &mut EngineState, peer_id: &str, reason: &str) {
    if reason.is_empty() {
        return;
    }
    let record = match state.peers.get(peer_id).cloned() {
        Some(r) => r,
        None => match state.group.as_ref().map(|g| g.record.clone()) {
            Some(r) if r.user == peer_id => r,
            _ => return,
        },
    };
    let channel = state.channel.clone();
    let reason = reason.to_string();
    let actor = state.actor_handle();
    let result = transport::send(
        state,
        &actor,
        webrtc_envelope(WebRtcPayload {
            subtype: Some(WebRtcSubtype::WebrtcHangup),
            target: Some(record.user.clone()),
            channel: Some(channel),
            state: Some(record.state.clone()),
            hash: record.hash.clone(),
            v: REQUIRED_VERSION,
            data: Some(serde_json::json!({"reason": reason})),
            ..Default::default()
        }),
        None,
        None,
    );
    engine::report(state, result.map(|_| ()));
}

fn hangup_peer_local(state: &mut EngineState, peer_id: &str) {
    peer_factory::destroy_peer(state, peer_id);
    state.peers.remove(peer_id);
}

/// Replaces the local media stream: for every peer `is_local_stream_target`
/// holds for, removes the old stream (if any) then adds the new one.
pub fn set_local_stream(state: &mut EngineState, stream: Option<MediaStream>) {
    let old_stream = state.local_stream.take();
    state.local_stream = stream.clone();

    let targets: Vec<String> = state
        .peers
        .keys()
        .filter(|id| state.is_local_stream_target(id))
        .cloned()
        .collect();
    for peer_id in targets {
        let Some(local_id) = state.peers.get(&peer_id).and_then(|r| r.pc.clone()) else {
            continue;
        };
        let Some(pc) = state.pcs.get(&local_id).cloned() else {
            continue;
        };
        if let Some(old) = &old_stream {
            let _ = pc.remove_stream(old);
        }
        if let Some(new) = &stream {
            let _ = pc.add_stream(new);
        }
    }
}

/// Enables/disables the first track of the selected kind on the local
/// stream, for every peer currently targeted by it.
pub fn mute(state: &mut EngineState, video: bool, mute: bool) {
    let kind = if video { TrackKind::Video } else { TrackKind::Audio };
    let Some(track) = state
        .local_stream
        .as_ref()
        .and_then(|s| s.tracks.iter().find(|t| t.kind == kind))
        .cloned()
    else {
        log::debug!("mute requested: kind={kind:?} mute={mute} but no matching track is attached");
        return;
    };

    let targets: Vec<String> = state
        .peers
        .keys()
        .filter(|id| state.is_local_stream_target(id))
        .cloned()
        .collect();
    for peer_id in targets {
        let Some(local_id) = state.peers.get(&peer_id).and_then(|r| r.pc.clone()) else {
            continue;
        };
        let Some(pc) = state.pcs.get(&local_id).cloned() else {
            continue;
        };
        if let Err(e) = pc.set_track_enabled(&track, !mute) {
            log::warn!("mute: failed to toggle track for {peer_id}: {e}");
        }
    }
}

// ---------------------------------------------------------------------
// Inbound `webrtc` handling
// ---------------------------------------------------------------------

pub fn handle_inbound_webrtc(state: &mut EngineState, payload: &WebRtcPayload) {
    if payload.v < REQUIRED_VERSION {
        log::warn!("dropping webrtc envelope below required version");
        return;
    }
    match payload.subtype {
        Some(WebRtcSubtype::WebrtcCall) => on_webrtc_call(state, payload),
        Some(WebRtcSubtype::WebrtcChannel) => on_webrtc_channel(state, payload),
        Some(WebRtcSubtype::WebrtcHangup) => on_webrtc_hangup(state, payload),
        Some(WebRtcSubtype::WebrtcSignal) => on_webrtc_signal(state, payload),
        Some(WebRtcSubtype::WebrtcGroup) | None => {}
    }
}

fn on_webrtc_call(state: &mut EngineState, payload: &WebRtcPayload) {
    if payload.initiator == Some(true) {
        on_incoming_call(state, payload);
    } else {
        on_outbound_call_reply(state, payload);
    }
}

fn on_incoming_call(state: &mut EngineState, payload: &WebRtcPayload) {
    let Some(source) = &payload.source else {
        return;
    };
    if state.peers.contains_key(source) && payload.target.is_none() {
        // The server is silently cancelling: the call was taken elsewhere.
        hangup_peer_local(state, source);
        return;
    }
    if state.has_channel() {
        let record = state.peers.get(source).cloned();
        let reply_state = record.map(|r| r.ref_.clone()).unwrap_or_default();
        let actor = state.actor_handle();
        let target = source.clone();
        let _ = transport::send(
            state,
            &actor,
            webrtc_envelope(WebRtcPayload {
                subtype: Some(WebRtcSubtype::WebrtcCall),
                target: Some(target),
                v: REQUIRED_VERSION,
                data: Some(serde_json::json!({
                    "accept": false,
                    "reason": "reject_busy",
                    "state": reply_state,
                })),
                ..Default::default()
            }),
            None,
            None,
        );
        return;
    }

    let mut record = PeerRecord::new(source.clone(), source.clone(), false);
    record.ref_ = payload.state.clone();
    record.hash = payload.hash.clone();
    record.transaction = payload.transaction.clone();
    record.profile = extract_profile(payload);
    state.peers.insert(source.clone(), record);
    if let Some(channel) = &payload.channel {
        state.channel = channel.clone();
    }
    if let Some(data) = payload.data.clone() {
        handle_extra_channel_data(state, data);
    }
    state.on_event(Event::IncomingCall { peer: source.clone() });
}

fn on_outbound_call_reply(state: &mut EngineState, payload: &WebRtcPayload) {
    let Some(source) = &payload.source else {
        return;
    };
    let Some(record) = state.peers.get(source).cloned() else {
        return;
    };
    let msg_state = payload
        .data
        .as_ref()
        .and_then(|d| d.get("state"))
        .and_then(|v| v.as_str());
    if msg_state != Some(record.state.as_str()) {
        return; // anti-replay: doesn't match our outbound request's nonce
    }

    let is_group_accept = record
        .group
        .as_ref()
        .zip(state.group.as_ref())
        .map(|(peer_group, group)| peer_group == &group.id)
        .unwrap_or(false);
    match (&record.hash, &payload.hash) {
        (Some(have), Some(got)) if have == got => {}
        (None, Some(_)) => {}
        (Some(_), Some(_)) if is_group_accept => {}
        _ => return, // hash mismatch, not a group exchange: drop
    }

    let accept = payload
        .data
        .as_ref()
        .and_then(|d| d.get("accept"))
        .and_then(|v| v.as_bool())
        .unwrap_or(false);
    if !accept {
        let reason = payload
            .data
            .as_ref()
            .and_then(|d| d.get("reason"))
            .and_then(|v| v.as_str())
            .unwrap_or("no reason given")
            .to_string();
        state.on_event(Event::AbortCall {
            peer: source.clone(),
            reason,
        });
        state.peers.remove(source);
        return;
    }

    let local_user = state.user.clone().unwrap_or_default();
    let initiator = compute_initiator(&local_user, &record.user);
    if let Some(r) = state.peers.get_mut(source) {
        r.ref_ = payload.state.clone();
        r.profile = extract_profile(payload);
        if let Some(hash) = &payload.hash {
            r.hash = Some(hash.clone());
        }
        r.initiator = initiator;
    }

    match peer_factory::create_peer(state, source, initiator) {
        Ok(local_id) => {
            if !initiator {
                if let Some(pc) = state.pcs.get(&local_id).cloned() {
                    let _ = pc.signal(serde_json::json!({"renegotiate": true}));
                }
            }
        }
        Err(e) => log::warn!("failed to create peer for {source}: {e}"),
    }
    state.on_event(Event::OutgoingCall { peer: source.clone() });
}

fn on_webrtc_channel(state: &mut EngineState, payload: &WebRtcPayload) {
    if state.has_channel() && payload.data.is_none() {
        return;
    }
    if let Some(channel) = &payload.channel {
        state.channel = channel.clone();
    }
    if let Some(data) = payload.data.clone() {
        handle_extra_channel_data(state, data);
    }
}

fn on_webrtc_hangup(state: &mut EngineState, payload: &WebRtcPayload) {
    if payload.channel.as_deref() != Some(state.channel.as_str()) {
        return;
    }
    let Some(source) = &payload.source else {
        return;
    };
    let Some(record) = state.peers.get(source) else {
        return;
    };
    let matches_ref = record.ref_.is_none() || record.ref_.as_deref() == payload.state.as_deref();
    if !matches_ref {
        return;
    }
    hangup_peer_local(state, source);
    state.on_event(Event::Hangup {
        peer: source.clone(),
        payload: payload.data.clone(),
    });
}

fn on_webrtc_signal(state: &mut EngineState, payload: &WebRtcPayload) {
    if payload.channel.as_deref() != Some(state.channel.as_str()) {
        return;
    }
    let Some(source) = &payload.source else {
        return;
    };
    let Some(record) = state.peers.get(source).cloned() else {
        return;
    };
    let matches_ref = record.ref_.is_none() || record.ref_.as_deref() == payload.state.as_deref();
    if !matches_ref {
        return;
    }

    if let Some(pcid) = &payload.pcid {
        if record.rpcid.as_deref() != Some(pcid.as_str()) {
            if record.rpcid.is_none() && record.pc.is_some() {
                if let Some(r) = state.peers.get_mut(source) {
                    r.rpcid = Some(pcid.clone());
                }
            } else {
                // Remote created a new pc: destroy ours so a fresh one is made.
                peer_factory::destroy_peer(state, source);
            }
        }
    }

    let has_pc = state.peers.get(source).map(|r| r.pc.is_some()).unwrap_or(false);
    if !has_pc {
        let local_user = state.user.clone().unwrap_or_default();
        let initiator = compute_initiator(&local_user, &record.user);
        if let Err(e) = peer_factory::create_peer(state, source, initiator) {
            log::warn!("failed to create peer for inbound signal from {source}: {e}");
            return;
        }
    }

    let mut data = payload.data.clone().unwrap_or(serde_json::Value::Null);
    if state.channel_config.remote_sdp_transform {
        if let Some(sdp) = data.get("sdp").cloned() {
            data["sdp"] = transform_remote_sdp(sdp);
        }
    }

    let local_id = state.peers.get(source).and_then(|r| r.pc.clone());
    if let Some(local_id) = local_id {
        if let Some(pc) = state.pcs.get(&local_id).cloned() {
            if let Err(e) = pc.signal(data) {
                log::warn!("signal delivery to {source} failed: {e}");
            }
        }
    }
}

/// Placeholder seam for a configured remote SDP transform; the transform
/// function itself is supplied by the application, out of scope here, so
/// this is the identity transform.
fn transform_remote_sdp(sdp: serde_json::Value) -> serde_json::Value {
    sdp
}

// ---------------------------------------------------------------------
// Extra channel data
// ---------------------------------------------------------------------

pub fn handle_extra_channel_data(state: &mut EngineState, data: serde_json::Value) {
    if data.get("replaced").and_then(|v| v.as_bool()).unwrap_or(false) {
        do_hangup(state, None, "");
        return;
    }
    if let Some(group_data) = data.get("group") {
        if state.group.is_some() {
            let group_id = group_data.get("group").and_then(|v| v.as_str()).map(str::to_string);
            let channel = group_data.get("channel").and_then(|v| v.as_str()).map(str::to_string);
            let members: Vec<String> = group_data
                .get("members")
                .and_then(|v| v.as_array())
                .map(|arr| arr.iter().filter_map(|m| m.as_str().map(str::to_string)).collect())
                .unwrap_or_default();
            let reset = group_data.get("reset").and_then(|v| v.as_bool()).unwrap_or(false);
            let matches = state
                .group
                .as_ref()
                .map(|g| group_id.as_deref() == Some(g.id.as_str()))
                .unwrap_or(false);
            if matches {
                crate::core::group::on_group_channel_data(state, channel, members, reset);
            }
        }
    }
    if let Some(pipeline) = data.get("pipeline") {
        let mode = pipeline.get("mode").and_then(|v| v.as_str()).unwrap_or("");
        if mode == "mcu-forward" {
            let pipeline_id = pipeline
                .get("pipeline")
                .and_then(|v| v.as_str())
                .unwrap_or(PIPELINE_CID)
                .to_string();
            let mut record = PeerRecord::new(pipeline_id.clone(), pipeline_id.clone(), false);
            record.ref_ = Some(pipeline_id.clone());
            record.hash = state.group.as_ref().and_then(|g| g.record.hash.clone());
            record.cid = Some(PIPELINE_CID.to_string());
            state.peers.insert(pipeline_id.clone(), record);
            state.channel_options.local_stream_target = Some(pipeline_id);
        } else {
            log::info!("ignoring unsupported pipeline mode {mode}");
        }
    }
}

// ---------------------------------------------------------------------
// Mesh operation
// ---------------------------------------------------------------------

/// Reconciles the peer table to a full mesh over `users`, relative to the
/// group identified by `group_record`: tears down peers no longer in the
/// set, creates and answers records for newly added ones.
pub fn do_mesh(state: &mut EngineState, users: Vec<String>, group_record: &PeerRecord) {
    if !state.has_channel() {
        engine::report(state, Err(Error::NoChannel));
        return;
    }
    let Some(local_user) = state.user.clone() else {
        engine::report(state, Err(Error::MeshWithoutSelf));
        return;
    };
    if !users.is_empty() && !users.contains(&local_user) {
        engine::report(state, Err(Error::MeshWithoutSelf));
        return;
    }

    let mesh_peer_ids: Vec<String> = state
        .peers
        .iter()
        .filter(|(_, r)| r.cid.is_none())
        .map(|(id, _)| id.clone())
        .collect();

    let added: Vec<String> = users
        .iter()
        .filter(|u| {
            *u != &local_user
                && match state.peers.get(*u) {
                    None => true,
                    Some(r) => r.pc.is_none(),
                }
        })
        .cloned()
        .collect();
    let removed: Vec<String> = mesh_peer_ids
        .into_iter()
        .filter(|id| !users.contains(id))
        .collect();

    for user in removed {
        do_hangup(state, Some(&user), "");
    }

    for user in added {
        let mut record = PeerRecord::new(user.clone(), user.clone(), false);
        record.group = Some(group_record.user.clone());
        record.hash = group_record.hash.clone();
        record.ref_ = Some(group_record.user.clone());
        record.state = group_record.user.clone();
        state.peers.insert(user.clone(), record);
        let result = do_answer(state, &user);
        engine::report(state, result);
    }
}
