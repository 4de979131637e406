//
// Copyright 2024 kwm-signaling Contributors
// SPDX-License-Identifier: AGPL-3.0-only
//

//! P2P Controller: a JSON protocol carried over each established Peer's
//! data channel, layered on top of it the same way the
//! Transport layers the server envelope protocol over the WebSocket. A
//! handshake establishes readiness, then `announce_streams` diffs drive
//! per-stream nested Peer connections routed by a per-stream token.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

use crate::core::actor::Actor;
use crate::core::engine::EngineState;
use crate::core::envelope::REQUIRED_VERSION;
use crate::core::peer_record::new_stream_token;
use crate::core::transport::HasActor;
use crate::error::{Error, Result};
use crate::webrtc::peer::{MediaStream, Peer, PeerConfig, PeerHandler, PeerId};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum P2pSubtype {
    Handshake,
    HandshakeReply,
    AnnounceStreams,
}

impl Serialize for P2pSubtype {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for P2pSubtype {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamKind {
    Screenshare,
}

impl StreamKind {
    fn as_str(&self) -> &'static str {
        match self {
            StreamKind::Screenshare => "screenshare",
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StreamAnnouncement {
    pub id: String,
    pub kind: String,
    pub token: String,
    pub v: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HandshakePayload {
    pub ts: i64,
    pub v: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply: Option<HandshakeReplyPayload>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HandshakeReplyPayload {
    pub ts: i64,
    pub v: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AnnounceStreamsPayload {
    pub streams: Vec<StreamAnnouncement>,
}

/// The data-channel envelope. `p2p` carries the handshake and
/// stream-announcement protocol; `webrtc` carries nested signaling for a
/// sub-connection, routed by `source` = stream token instead of a user id.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum P2pEnvelope {
    P2p {
        subtype: P2pSubtype,
        #[serde(flatten)]
        data: serde_json::Value,
    },
    Webrtc {
        source: String,
        v: u64,
        /// The sub-connection's local id, carried the same way `pcid` lets
        /// `on_webrtc_signal` reconcile the main call's pc.
        #[serde(skip_serializing_if = "Option::is_none", default)]
        pcid: Option<String>,
        data: serde_json::Value,
    },
}

#[derive(Clone, Debug, Default)]
pub struct StreamConnection {
    pub pc: Option<PeerId>,
    pub rpcid: Option<String>,
}

/// Per-stream state: the announced stream, its nested sub-connections, and
/// the token peers use to route signaling for it.
#[derive(Clone, Debug)]
pub struct StreamRecord {
    pub id: String,
    pub kind: StreamKind,
    pub token: String,
    pub sequence: u64,
    pub stream: Option<MediaStream>,
    pub connections: HashMap<PeerId, StreamConnection>,
    /// Mirrors `PeerRecord::reconnect`: gates automatic sub-connection
    /// recovery after an error.
    pub reconnect: bool,
}

/// Per-peer P2P Controller state, keyed by the parent Peer's local id in
/// `EngineState::p2p`.
#[derive(Clone, Debug)]
pub struct P2pRecord {
    pub id: PeerId,
    pub user: String,
    pub initiator: bool,
    pub connected: bool,
    /// Gates stream announcements: set once the handshake completes.
    pub ready: bool,
    pub sent_handshake_ts: Option<i64>,
    pub received_handshake: bool,
    /// Keyed by stream id, not token: the token is only a routing key.
    pub streams: HashMap<String, StreamRecord>,
}

impl P2pRecord {
    pub fn new(id: PeerId, user: String, initiator: bool) -> Self {
        Self {
            id,
            user,
            initiator,
            connected: false,
            ready: false,
            sent_handshake_ts: None,
            received_handshake: false,
            streams: HashMap::new(),
        }
    }
}

fn send_p2p(pc: &dyn Peer, envelope: &P2pEnvelope) {
    let _ = send_p2p_result(pc, envelope);
}

fn send_p2p_result(pc: &dyn Peer, envelope: &P2pEnvelope) -> Result<()> {
    let json = serde_json::to_string(envelope).map_err(|e| Error::RequestFailed(e.to_string()))?;
    pc.send(&json)
}

/// Called by the Peer Factory when a parent Peer fires `connect`.
pub fn on_connect(state: &mut EngineState, peer: &str, pc: &dyn Peer) {
    let Some(record) = state.p2p.get_mut(peer) else {
        return;
    };
    record.connected = true;
    let ts = now_ms();
    record.sent_handshake_ts = Some(ts);
    let reply = if record.received_handshake {
        Some(HandshakeReplyPayload { ts, v: REQUIRED_VERSION })
    } else {
        None
    };
    let has_reply = reply.is_some();
    let payload = HandshakePayload {
        ts,
        v: REQUIRED_VERSION,
        reply,
    };
    send_p2p(
        pc,
        &P2pEnvelope::P2p {
            subtype: P2pSubtype::Handshake,
            data: serde_json::to_value(payload).unwrap_or_default(),
        },
    );
    if has_reply {
        record.ready = true;
        announce_local_streams(state, peer, pc);
    }
}

fn now_ms() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

/// Dispatches an inbound data-channel frame to the handshake/announcement
/// protocol or to a routed nested-signaling callback.
pub fn on_data(state: &mut EngineState, peer: &str, pc: &dyn Peer, data: &[u8]) {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(envelope) = serde_json::from_str::<P2pEnvelope>(text) else {
        log::warn!("p2p: malformed data-channel frame from {peer}");
        return;
    };
    match envelope {
        P2pEnvelope::P2p { subtype, data } => match subtype {
            P2pSubtype::Handshake => on_handshake(state, peer, pc, data),
            P2pSubtype::HandshakeReply => on_handshake_reply(state, peer, pc, data),
            P2pSubtype::AnnounceStreams => on_announce_streams(state, peer, pc, data),
        },
        P2pEnvelope::Webrtc { source, v: _, pcid, data } => {
            on_routed_signal(state, peer, &source, pcid, data)
        }
    }
}

fn on_handshake(state: &mut EngineState, peer: &str, pc: &dyn Peer, data: serde_json::Value) {
    let Ok(incoming) = serde_json::from_value::<HandshakePayload>(data) else {
        return;
    };
    let Some(record) = state.p2p.get_mut(peer) else {
        return;
    };
    if record.ready {
        log::warn!("p2p: duplicate handshake from {peer} after ready");
        return;
    }
    record.received_handshake = true;
    if let Some(reply) = incoming.reply {
        complete_handshake_with_reply(state, peer, pc, reply);
        return;
    }
    // We received a handshake and have not sent ours yet: send it now,
    // piggybacking a handshake_reply since we've just recorded theirs.
    if record.sent_handshake_ts.is_none() {
        let ts = now_ms();
        record.sent_handshake_ts = Some(ts);
        send_p2p(
            pc,
            &P2pEnvelope::P2p {
                subtype: P2pSubtype::Handshake,
                data: serde_json::to_value(HandshakePayload {
                    ts,
                    v: REQUIRED_VERSION,
                    reply: Some(HandshakeReplyPayload {
                        ts: incoming.ts,
                        v: incoming.v,
                    }),
                })
                .unwrap_or_default(),
            },
        );
    } else {
        send_p2p(
            pc,
            &P2pEnvelope::P2p {
                subtype: P2pSubtype::HandshakeReply,
                data: serde_json::to_value(HandshakeReplyPayload {
                    ts: incoming.ts,
                    v: incoming.v,
                })
                .unwrap_or_default(),
            },
        );
    }
}

fn on_handshake_reply(state: &mut EngineState, peer: &str, pc: &dyn Peer, data: serde_json::Value) {
    let Ok(reply) = serde_json::from_value::<HandshakeReplyPayload>(data) else {
        return;
    };
    complete_handshake_with_reply(state, peer, pc, reply);
}

fn complete_handshake_with_reply(
    state: &mut EngineState,
    peer: &str,
    pc: &dyn Peer,
    reply: HandshakeReplyPayload,
) {
    let Some(record) = state.p2p.get_mut(peer) else {
        return;
    };
    if record.sent_handshake_ts != Some(reply.ts) || reply.v != REQUIRED_VERSION {
        log::warn!("p2p: handshake_reply ts/version mismatch from {peer}");
        return;
    }
    record.ready = true;
    announce_local_streams(state, peer, pc);
}

/// Sends `announce_streams` describing every locally attached stream for
/// `peer`'s Stream Records that originate locally.
fn announce_local_streams(state: &mut EngineState, peer: &str, pc: &dyn Peer) {
    let Some(record) = state.p2p.get(peer) else {
        return;
    };
    if record.streams.is_empty() {
        return;
    }
    let announcements: Vec<StreamAnnouncement> = record
        .streams
        .values()
        .map(|s| StreamAnnouncement {
            id: s.id.clone(),
            kind: s.kind.as_str().to_string(),
            token: s.token.clone(),
            v: REQUIRED_VERSION,
        })
        .collect();
    send_p2p(
        pc,
        &P2pEnvelope::P2p {
            subtype: P2pSubtype::AnnounceStreams,
            data: serde_json::to_value(AnnounceStreamsPayload { streams: announcements }).unwrap_or_default(),
        },
    );
}

/// Publishes a local stream over the P2P side-channel of every connected
/// peer ready to receive announcements (application entry point for screen
/// share, analogous to `setLocalStream` for the main call).
pub fn announce_stream(
    state: &mut EngineState,
    peer: &str,
    pc: &dyn Peer,
    stream_id: String,
    kind: StreamKind,
    stream: Option<MediaStream>,
) {
    let token = new_stream_token();
    let Some(record) = state.p2p.get_mut(peer) else {
        return;
    };
    record.streams.insert(
        stream_id.clone(),
        StreamRecord {
            id: stream_id.clone(),
            kind,
            token,
            sequence: 0,
            stream,
            connections: HashMap::new(),
            reconnect: true,
        },
    );
    let ready = record.ready;
    // The announcing side needs its own sub-connection too: the remote end
    // only learns about this stream once `announce_streams` reaches it, but
    // nothing else would ever create a pc for the stream on this side.
    create_sub_connection(state, peer, &stream_id);
    if ready {
        announce_local_streams(state, peer, pc);
    }
}

/// Publishes a local stream (e.g. a screen-share capture) to every peer
/// currently tracked by the P2P Controller, each getting its own
/// `StreamRecord`/token. Peers not yet connected pick up the announcement
/// once their handshake completes, since `announce_local_streams` is also
/// run from `on_connect`/`complete_handshake_with_reply`.
pub fn emit_local_stream(
    state: &mut EngineState,
    stream_id: String,
    kind: StreamKind,
    stream: Option<MediaStream>,
) {
    let peers: Vec<PeerId> = state.p2p.keys().cloned().collect();
    for peer in peers {
        let Some(pc) = state.pcs.get(&peer).cloned() else {
            continue;
        };
        announce_stream(state, &peer, pc.as_ref(), stream_id.clone(), kind, stream.clone());
    }
}

/// `announce_streams` arrived from the remote side: diff against the
/// existing per-(peer) stream table and create/rebind/destroy sub-Peers.
fn on_announce_streams(state: &mut EngineState, peer: &str, pc: &dyn Peer, data: serde_json::Value) {
    let Ok(announced) = serde_json::from_value::<AnnounceStreamsPayload>(data) else {
        return;
    };
    let Some(record) = state.p2p.get(peer) else {
        return;
    };
    let initiator = record.initiator;
    let mut seen = std::collections::HashSet::new();

    for item in &announced.streams {
        seen.insert(item.id.clone());
        let existing_token = state
            .p2p
            .get(peer)
            .and_then(|r| r.streams.get(&item.id))
            .map(|s| s.token.clone());

        match existing_token {
            None => {
                let kind = match item.kind.as_str() {
                    "screenshare" => StreamKind::Screenshare,
                    other => {
                        log::warn!("p2p: unrecognised stream kind {other}");
                        continue;
                    }
                };
                if let Some(r) = state.p2p.get_mut(peer) {
                    r.streams.insert(
                        item.id.clone(),
                        StreamRecord {
                            id: item.id.clone(),
                            kind,
                            token: item.token.clone(),
                            sequence: 0,
                            stream: None,
                            connections: HashMap::new(),
                            reconnect: true,
                        },
                    );
                }
                create_sub_connection(state, peer, &item.id);
                if !initiator {
                    emit_bootstrap_signal(state, peer, &item.id, pc);
                }
            }
            Some(token) if token != item.token => {
                destroy_sub_connection(state, peer, &item.id);
                if let Some(r) = state.p2p.get_mut(peer) {
                    if let Some(s) = r.streams.get_mut(&item.id) {
                        s.token = item.token.clone();
                    }
                }
                create_sub_connection(state, peer, &item.id);
            }
            Some(_) => {}
        }
    }

    let removed: Vec<String> = state
        .p2p
        .get(peer)
        .map(|r| r.streams.keys().filter(|id| !seen.contains(*id)).cloned().collect())
        .unwrap_or_default();
    for stream_id in removed {
        destroy_sub_connection(state, peer, &stream_id);
        if let Some(r) = state.p2p.get_mut(peer) {
            r.streams.remove(&stream_id);
        }
    }
}

/// Creates a dedicated Peer for a (peer, stream) pair, signaling over the
/// parent's data channel instead of the server. The parent's `initiator`
/// flag is reused; a locally attached stream is sent, otherwise (for a
/// screen-share receiver) a recv-only video transceiver is requested.
fn create_sub_connection(state: &mut EngineState, peer: &str, stream_id: &str) {
    let Some(record) = state.p2p.get(peer) else {
        return;
    };
    let initiator = record.initiator;
    let Some(stream_record) = record.streams.get(stream_id) else {
        return;
    };
    let attached = stream_record.stream.clone();
    let kind = stream_record.kind;
    let config = PeerConfig {
        initiator,
        trickle: true,
        recv_only_video: attached.is_none() && kind == StreamKind::Screenshare,
        streams: attached.into_iter().collect(),
        ..Default::default()
    };
    let actor = state.actor_handle();
    let handler = std::sync::Arc::new(SubPeerHandler {
        actor,
        parent: peer.to_string(),
        stream_id: stream_id.to_string(),
        local_id: std::sync::Mutex::new(String::new()),
    });
    match state.peer_provider.create(config, handler.clone()) {
        Ok(sub_pc) => {
            let local_id = sub_pc.local_id().clone();
            *handler.local_id.lock().unwrap() = local_id.clone();
            state.pcs.insert(local_id.clone(), sub_pc);
            if let Some(r) = state.p2p.get_mut(peer) {
                if let Some(s) = r.streams.get_mut(stream_id) {
                    s.connections.clear();
                    s.connections.insert(
                        local_id.clone(),
                        StreamConnection {
                            pc: Some(local_id),
                            rpcid: None,
                        },
                    );
                }
            }
        }
        Err(e) => log::warn!("p2p: failed to create sub-connection for {stream_id}: {e}"),
    }
}

/// Destroys every sub-Peer currently bound to (peer, stream), removing it
/// from the `pcs` registry, and clears the Stream Record's connection map.
fn destroy_sub_connection(state: &mut EngineState, peer: &str, stream_id: &str) {
    let ids: Vec<PeerId> = state
        .p2p
        .get(peer)
        .and_then(|r| r.streams.get(stream_id))
        .map(|s| s.connections.values().filter_map(|c| c.pc.clone()).collect())
        .unwrap_or_default();
    for id in ids {
        if let Some(pc) = state.pcs.remove(&id) {
            pc.destroy();
        }
    }
    if let Some(r) = state.p2p.get_mut(peer) {
        if let Some(s) = r.streams.get_mut(stream_id) {
            s.connections.clear();
        }
    }
}

fn emit_bootstrap_signal(state: &mut EngineState, peer: &str, stream_id: &str, pc: &dyn Peer) {
    let Some(token) = state
        .p2p
        .get(peer)
        .and_then(|r| r.streams.get(stream_id))
        .map(|s| s.token.clone())
    else {
        return;
    };
    send_p2p(
        pc,
        &P2pEnvelope::Webrtc {
            source: token,
            v: REQUIRED_VERSION,
            pcid: None,
            data: serde_json::json!({"renegotiate": true, "noop": true}),
        },
    );
}

/// Routes an inbound nested `webrtc` signal by its `source` stream token to
/// the (peer, stream) pair's sub-connection, reconciling `pcid` the same
/// way `on_webrtc_signal` reconciles the main call's `pcid`. `{noop:true}`
/// is a wake-up only and is dropped before reaching the sub-Peer.
fn on_routed_signal(
    state: &mut EngineState,
    peer: &str,
    token: &str,
    pcid: Option<String>,
    data: serde_json::Value,
) {
    let Some(stream_id) = state.p2p.get(peer).and_then(|r| {
        r.streams
            .values()
            .find(|s| s.token == token)
            .map(|s| s.id.clone())
    }) else {
        log::warn!("p2p: signal for unknown stream token from {peer}");
        return;
    };

    if let Some(pcid) = &pcid {
        let rpcid = state
            .p2p
            .get(peer)
            .and_then(|r| r.streams.get(&stream_id))
            .and_then(|s| s.connections.values().next())
            .and_then(|c| c.rpcid.clone());
        if rpcid.as_deref() != Some(pcid.as_str()) {
            let has_pc = state
                .p2p
                .get(peer)
                .and_then(|r| r.streams.get(&stream_id))
                .map(|s| !s.connections.is_empty())
                .unwrap_or(false);
            if rpcid.is_none() && has_pc {
                if let Some(r) = state.p2p.get_mut(peer) {
                    if let Some(s) = r.streams.get_mut(&stream_id) {
                        if let Some(conn) = s.connections.values_mut().next() {
                            conn.rpcid = Some(pcid.clone());
                        }
                    }
                }
            } else {
                // Remote created a new sub-pc: destroy ours so a fresh one
                // replaces it rather than signaling a stale connection.
                destroy_sub_connection(state, peer, &stream_id);
                create_sub_connection(state, peer, &stream_id);
            }
        }
    }

    if data.get("noop").and_then(|v| v.as_bool()).unwrap_or(false) {
        return;
    }

    let local_id = state
        .p2p
        .get(peer)
        .and_then(|r| r.streams.get(&stream_id))
        .and_then(|s| s.connections.values().next())
        .and_then(|c| c.pc.clone());
    let Some(local_id) = local_id else {
        log::warn!("p2p: signal for stream {stream_id} with no live sub-connection from {peer}");
        return;
    };
    if let Some(sub_pc) = state.pcs.get(&local_id).cloned() {
        if let Err(e) = sub_pc.signal(data) {
            log::warn!("p2p: signal delivery to sub-connection for {stream_id} failed: {e}");
        }
    }
}

/// Error returned when a routed signal names a token with no matching
/// Stream Record.
pub fn require_known_stream(state: &EngineState, peer: &str, token: &str) -> Result<()> {
    let known = state
        .p2p
        .get(peer)
        .map(|r| r.streams.values().any(|s| s.token == token))
        .unwrap_or(false);
    if known {
        Ok(())
    } else {
        Err(Error::WrongStream)
    }
}

/// Called by the Peer Factory when a parent Peer fires `close`: tears down
/// every sub-connection this P2P Record owns.
pub fn on_parent_closed(state: &mut EngineState, peer: &str) {
    state.p2p.remove(peer);
}

/// Binds a sub-Peer's events back to the (parent, stream) pair that owns
/// it, mirroring `peer_factory::EngineHandler`'s marshal-onto-actor
/// pattern: a real media engine calls these back from its own thread.
struct SubPeerHandler {
    actor: Actor<EngineState>,
    parent: PeerId,
    stream_id: String,
    local_id: std::sync::Mutex<PeerId>,
}

impl SubPeerHandler {
    fn local_id(&self) -> PeerId {
        self.local_id.lock().unwrap().clone()
    }
}

/// True when `local_id` is still the Stream Record's current sub-pc.
fn is_current_sub(state: &EngineState, parent: &str, stream_id: &str, local_id: &str) -> bool {
    state
        .p2p
        .get(parent)
        .and_then(|r| r.streams.get(stream_id))
        .map(|s| s.connections.contains_key(local_id))
        .unwrap_or(false)
}

impl PeerHandler for SubPeerHandler {
    fn on_signal(&self, _peer: &PeerId, data: serde_json::Value) {
        let actor = self.actor.clone();
        let parent = self.parent.clone();
        let stream_id = self.stream_id.clone();
        let local_id = self.local_id();
        actor.send(move |state: &mut EngineState| {
            if !is_current_sub(state, &parent, &stream_id, &local_id) {
                return;
            }
            let Some(token) = state
                .p2p
                .get(&parent)
                .and_then(|r| r.streams.get(&stream_id))
                .map(|s| s.token.clone())
            else {
                return;
            };
            let Some(parent_pc) = state.pcs.get(&parent).cloned() else {
                return;
            };
            let sent = send_p2p_result(
                parent_pc.as_ref(),
                &P2pEnvelope::Webrtc {
                    source: token,
                    v: REQUIRED_VERSION,
                    pcid: Some(local_id.clone()),
                    data,
                },
            );
            if sent.is_err() {
                schedule_sub_recovery(state, &parent, &stream_id, &local_id);
            }
        });
    }

    fn on_error(&self, _peer: &PeerId, error: crate::error::Error) {
        let actor = self.actor.clone();
        let parent = self.parent.clone();
        let stream_id = self.stream_id.clone();
        let local_id = self.local_id();
        actor.send(move |state: &mut EngineState| {
            if !is_current_sub(state, &parent, &stream_id, &local_id) {
                return;
            }
            log::warn!("p2p: sub-connection {local_id} for stream {stream_id} on {parent}: error: {error}");
            schedule_sub_recovery(state, &parent, &stream_id, &local_id);
        });
    }

    fn on_close(&self, _peer: &PeerId) {
        let actor = self.actor.clone();
        let parent = self.parent.clone();
        let stream_id = self.stream_id.clone();
        let local_id = self.local_id();
        actor.send(move |state: &mut EngineState| {
            state.pcs.remove(&local_id);
            if let Some(r) = state.p2p.get_mut(&parent) {
                if let Some(s) = r.streams.get_mut(&stream_id) {
                    s.connections.remove(&local_id);
                }
            }
        });
    }
}

/// Recovery: after 500ms, if the failed id is still the Stream Record's
/// current sub-pc and `reconnect` is true, recreate it. If the parent
/// Peer isn't the initiator, emit a synthetic bootstrap signal to unblock
/// the remote side's own sub-negotiation.
fn schedule_sub_recovery(state: &mut EngineState, parent: &str, stream_id: &str, failed_local_id: &str) {
    let actor = state.actor_handle();
    let parent = parent.to_string();
    let stream_id = stream_id.to_string();
    let failed_local_id = failed_local_id.to_string();
    actor.send_delayed(Duration::from_millis(500), move |state: &mut EngineState| {
        let Some(record) = state.p2p.get(&parent) else {
            return;
        };
        let Some(stream) = record.streams.get(&stream_id) else {
            return;
        };
        if !stream.connections.contains_key(&failed_local_id) || !stream.reconnect {
            return;
        }
        let initiator = record.initiator;
        destroy_sub_connection(state, &parent, &stream_id);
        create_sub_connection(state, &parent, &stream_id);
        if !initiator {
            if let Some(pc) = state.pcs.get(&parent).cloned() {
                emit_bootstrap_signal(state, &parent, &stream_id, pc.as_ref());
            }
        }
    });
}
