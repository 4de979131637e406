//
// Copyright 2024 kwm-signaling Contributors
// SPDX-License-Identifier: AGPL-3.0-only
//

//! The engine's top-level state: the single struct that ties the
//! Transport, the peer table, the optional Group Coordinator and the P2P
//! Controller's per-peer state together on one `Actor` thread.
//! `call_engine.rs`, `group.rs`, `session.rs`, `peer_factory.rs` and
//! `p2p.rs` are all `impl EngineState` blocks split across files, the way
//! `ringrtc::core::call_manager::CallManager` gathers call/group/http state
//! behind one handle while its behaviour lives in several modules.

use std::collections::HashMap;
use std::sync::Arc;

use crate::core::actor::Actor;
use crate::core::config::{ChannelConfig, Config};
use crate::core::envelope::Envelope;
use crate::core::event::{Event, EventSink};
use crate::core::group::GroupState;
use crate::core::p2p::P2pRecord;
use crate::core::peer_record::PeerRecord;
use crate::core::transport::{self, HasActor, Transport, TransportDelegate};
use crate::error::Result;
use crate::webrtc::peer::{IceServer, MediaStream, Peer, PeerId, PeerProvider};

/// Per-channel options: `local_stream_target`, when set, restricts the
/// local media stream to a single peer (pipeline mode).
#[derive(Clone, Debug, Default)]
pub struct ChannelOptions {
    pub local_stream_target: Option<String>,
}

pub struct EngineState {
    actor: Option<Actor<EngineState>>,
    pub transport: Transport<EngineState>,
    pub event_sink: Arc<dyn EventSink>,
    pub peer_provider: Arc<dyn PeerProvider>,
    pub channel_config: ChannelConfig,

    /// Learned from `hello`; a mismatch on a later `hello` triggers a local
    /// hangup of any in-progress call.
    pub user: Option<String>,

    pub channel: String,
    pub channel_options: ChannelOptions,
    pub peers: HashMap<String, PeerRecord>,
    pub local_stream: Option<MediaStream>,

    pub group: Option<GroupState>,

    pub p2p: HashMap<PeerId, P2pRecord>,

    /// Live `Peer` handles keyed by local id. `PeerRecord::pc`/`P2pRecord::id`
    /// only store the id, so recovery after a pc replacement is a table
    /// lookup; this is the other half of that lookup.
    pub pcs: HashMap<PeerId, Arc<dyn Peer>>,
}

impl EngineState {
    pub fn has_channel(&self) -> bool {
        !self.channel.is_empty()
    }

    /// True when the local stream should be attached to `peer`: an unset
    /// `local_stream_target` attaches to every peer, otherwise only to the
    /// named one.
    pub fn is_local_stream_target(&self, peer: &str) -> bool {
        match &self.channel_options.local_stream_target {
            None => true,
            Some(target) => target == peer,
        }
    }

    /// Clears channel-scoped state. Does not touch `user` or the transport.
    pub(crate) fn clear_channel(&mut self) {
        self.channel.clear();
        self.channel_options = ChannelOptions::default();
        self.group = None;
        self.peers.clear();
        self.p2p.clear();
    }
}

impl AsMut<Transport<EngineState>> for EngineState {
    fn as_mut(&mut self) -> &mut Transport<EngineState> {
        &mut self.transport
    }
}

impl AsRef<Transport<EngineState>> for EngineState {
    fn as_ref(&self) -> &Transport<EngineState> {
        &self.transport
    }
}

impl HasActor<EngineState> for EngineState {
    fn actor_handle(&self) -> Actor<EngineState> {
        self.actor
            .clone()
            .expect("actor handle installed before EngineState is used")
    }
}

impl TransportDelegate for EngineState {
    fn on_envelope(&mut self, actor: &Actor<Self>, env: Envelope) {
        crate::core::session::on_envelope(self, actor, env);
    }

    fn on_event(&mut self, event: Event) -> bool {
        self.event_sink.on_event(event)
    }

    fn peer_provider_set_ice_servers(&mut self, servers: Vec<IceServer>) {
        self.peer_provider.set_ice_servers(servers);
    }
}

/// The public handle applications hold. Every operation is posted onto the
/// engine's single actor thread; none of them block the caller.
#[derive(Clone)]
pub struct Engine {
    actor: Actor<EngineState>,
}

impl Engine {
    pub fn new(
        connect_endpoint: String,
        turn_endpoint: Option<String>,
        config: Config,
        channel_config: ChannelConfig,
        event_sink: Arc<dyn EventSink>,
        peer_provider: Arc<dyn PeerProvider>,
    ) -> Self {
        let (actor, _join) = Actor::new(move |self_actor| EngineState {
            actor: Some(self_actor),
            transport: Transport::new(connect_endpoint, turn_endpoint, &config),
            event_sink,
            peer_provider,
            channel_config,
            user: None,
            channel: String::new(),
            channel_options: ChannelOptions::default(),
            peers: HashMap::new(),
            local_stream: None,
            group: None,
            p2p: HashMap::new(),
            pcs: HashMap::new(),
        });
        Self { actor }
    }

    pub fn connect(&self, auth_identifier: String, auth_mode: String) {
        transport::connect(&self.actor, auth_identifier, auth_mode);
    }

    pub fn close(&self) {
        self.actor.send(transport::close);
    }

    pub fn do_call(&self, user: String) {
        self.actor.send(move |state| {
            if let Err(e) = crate::core::call_engine::do_call(state, user) {
                state.on_event(Event::from(e));
            }
        });
    }

    pub fn do_answer(&self, user: String) {
        self.actor.send(move |state| {
            if let Err(e) = crate::core::call_engine::do_answer(state, &user) {
                state.on_event(Event::from(e));
            }
        });
    }

    pub fn do_reject(&self, user: String, reason: String) {
        self.actor.send(move |state| {
            if let Err(e) = crate::core::call_engine::do_reject(state, &user, &reason) {
                state.on_event(Event::from(e));
            }
        });
    }

    pub fn do_group(&self, group: String) {
        self.actor.send(move |state| {
            if let Err(e) = crate::core::call_engine::do_group(state, group) {
                state.on_event(Event::from(e));
            }
        });
    }

    pub fn do_hangup(&self, user: Option<String>, reason: String) {
        self.actor.send(move |state| {
            crate::core::call_engine::do_hangup(state, user.as_deref(), &reason);
        });
    }

    pub fn set_local_stream(&self, stream: Option<MediaStream>) {
        self.actor.send(move |state| {
            crate::core::call_engine::set_local_stream(state, stream);
        });
    }

    pub fn mute(&self, video: bool, mute: bool) {
        self.actor.send(move |state| {
            crate::core::call_engine::mute(state, video, mute);
        });
    }

    /// Publishes an auxiliary local stream (e.g. a screen-share capture) to
    /// every peer over the P2P side-channel.
    pub fn emit_local_stream(&self, stream_id: String, kind: crate::core::p2p::StreamKind, stream: Option<MediaStream>) {
        self.actor.send(move |state| {
            crate::core::p2p::emit_local_stream(state, stream_id, kind, stream);
        });
    }
}

/// Shorthand used throughout the `impl EngineState` blocks for the common
/// "log the error as a non-fatal event" pattern used on background paths.
pub(crate) fn report(state: &mut EngineState, result: Result<()>) {
    if let Err(e) = result {
        log::warn!("background operation failed: {e}");
        state.on_event(Event::from(e));
    }
}
