//
// Copyright 2024 kwm-signaling Contributors
// SPDX-License-Identifier: AGPL-3.0-only
//

//! Signaling and peer-coordination engine for a browser-hosted real-time
//! meetings service: a reconnecting WebSocket transport, a single-threaded
//! call/group/P2P state machine, and an abstraction over the underlying
//! media engine (`webrtc::peer::PeerProvider`).

pub mod error;

pub mod core {
    pub mod actor;
    pub mod call_engine;
    pub mod config;
    pub mod engine;
    pub mod envelope;
    pub mod event;
    pub mod group;
    pub mod p2p;
    pub mod peer_factory;
    pub mod peer_record;
    pub mod session;
    pub mod transport;
}

pub mod webrtc {
    pub mod peer;
    pub mod sim;
}

pub use core::config::{ChannelConfig, Config};
pub use core::engine::{ChannelOptions, Engine, EngineState};
pub use core::event::{Event, EventSink, TransportState, TurnChanged};
pub use core::p2p::StreamKind;
pub use error::{Error, Result};
pub use webrtc::peer::{
    IceConnectionState, IceServer, MediaStream, MediaTrack, Peer, PeerConfig, PeerHandler, PeerId,
    PeerProvider, SignalingState, TrackKind,
};
