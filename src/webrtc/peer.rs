//
// Copyright 2024 kwm-signaling Contributors
// SPDX-License-Identifier: AGPL-3.0-only
//

//! The external `Peer` provider capability set. Modeled after
//! `ringrtc::core::platform::Platform`: a trait an external collaborator
//! implements, with opaque associated-ish types standing in for whatever
//! the real media engine uses for streams and tracks.

use std::fmt;
use std::sync::Arc;

use crate::error::Result;

pub type PeerId = String;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TrackKind {
    Audio,
    Video,
}

/// Opaque application media stream. The engine never inspects its contents,
/// only attaches/detaches it to peers and, for `mute`, toggles one of its
/// tracks.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MediaStream {
    pub id: String,
    pub tracks: Vec<MediaTrack>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MediaTrack {
    pub id: String,
    pub kind: TrackKind,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum IceConnectionState {
    New,
    Checking,
    Connected,
    Completed,
    Failed,
    Disconnected,
    Closed,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SignalingState {
    Stable,
    HaveLocalOffer,
    HaveRemoteOffer,
    Closed,
}

/// Configuration passed to `PeerProvider::create`.
#[derive(Clone, Debug, Default)]
pub struct PeerConfig {
    pub ice_servers: Vec<IceServer>,
    pub initiator: bool,
    pub streams: Vec<MediaStream>,
    /// When true and `streams` is empty, the provider should add a
    /// recv-only transceiver instead of omitting video entirely (used by
    /// the P2P Controller's receiving side of a screen-share sub-connection).
    pub recv_only_video: bool,
    pub local_sdp_transform: bool,
    pub trickle: bool,
    pub channel_name: Option<String>,
    pub channel_config: Option<serde_json::Value>,
    pub offer_constraints: Option<serde_json::Value>,
    pub answer_constraints: Option<serde_json::Value>,
}

#[derive(Clone, Debug, Default)]
pub struct IceServer {
    pub urls: Vec<String>,
    pub username: Option<String>,
    pub credential: Option<String>,
}

/// Callbacks the Peer Factory binds to every event a `Peer` fires. Every
/// method has a no-op default so handlers can implement only what they
/// need, the way observer traits in ringrtc do.
pub trait PeerHandler: Send + Sync {
    fn on_error(&self, _peer: &PeerId, _error: crate::error::Error) {}
    fn on_signal(&self, _peer: &PeerId, _data: serde_json::Value) {}
    fn on_connect(&self, _peer: &PeerId) {}
    fn on_close(&self, _peer: &PeerId) {}
    fn on_track(&self, _peer: &PeerId, _track: MediaTrack) {}
    fn on_stream(&self, _peer: &PeerId, _stream: MediaStream) {}
    fn on_data(&self, _peer: &PeerId, _data: Vec<u8>) {}
    fn on_ice_state_change(&self, _peer: &PeerId, _state: IceConnectionState) {}
    fn on_signaling_state_change(&self, _peer: &PeerId, _state: SignalingState) {}
}

/// A single peer connection, as the engine sees it. Mirrors the
/// `simple-peer`-shaped capability set the real media engine exposes.
pub trait Peer: Send + Sync {
    fn local_id(&self) -> &PeerId;
    fn initiator(&self) -> bool;
    fn connected(&self) -> bool;
    fn destroyed(&self) -> bool;

    /// Feeds signaling data (an offer/answer/ice-candidate/renegotiate
    /// marker) into the peer.
    fn signal(&self, data: serde_json::Value) -> Result<()>;
    /// Sends a string over the peer's data channel.
    fn send(&self, data: &str) -> Result<()>;

    fn add_stream(&self, stream: &MediaStream) -> Result<()>;
    fn remove_stream(&self, stream: &MediaStream) -> Result<()>;
    fn add_track(&self, track: &MediaTrack, stream: &MediaStream) -> Result<()>;
    fn remove_track(&self, track: &MediaTrack) -> Result<()>;
    /// Enables/disables a track already attached via `add_stream`/`add_track`.
    fn set_track_enabled(&self, track: &MediaTrack, enabled: bool) -> Result<()>;

    fn destroy(&self);
}

/// Abstracts the media engine's connection factory, an external
/// collaborator the engine drives but never implements itself.
pub trait PeerProvider: Send + Sync {
    fn create(&self, config: PeerConfig, handler: Arc<dyn PeerHandler>) -> Result<Arc<dyn Peer>>;

    /// Replaces the ICE server list used for subsequently created peers,
    /// called after a TURN credential refresh.
    fn set_ice_servers(&self, servers: Vec<IceServer>);
}

impl fmt::Debug for dyn Peer {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Peer(id={}, initiator={}, connected={}, destroyed={})",
            self.local_id(),
            self.initiator(),
            self.connected(),
            self.destroyed()
        )
    }
}
