//
// Copyright 2024 kwm-signaling Contributors
// SPDX-License-Identifier: AGPL-3.0-only
//

//! An in-memory fake `Peer`/`PeerProvider`, the non-FFI counterpart of
//! ringrtc's `feature = "sim"` backend (`webrtc::sim::peer_connection`),
//! reimplemented at the trait level instead of faking C++ FFI calls. Lets
//! tests drive the engine end to end without a real media stack.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::{Error, Result};
use crate::webrtc::peer::{
    IceServer, MediaStream, MediaTrack, Peer, PeerConfig, PeerHandler, PeerId, PeerProvider,
};

pub struct SimPeer {
    id: PeerId,
    initiator: bool,
    connected: AtomicBool,
    destroyed: AtomicBool,
    handler: Arc<dyn PeerHandler>,
    pub sent: Mutex<Vec<String>>,
    pub signals_in: Mutex<Vec<serde_json::Value>>,
    pub track_enabled: Mutex<Vec<(MediaTrack, bool)>>,
}

impl SimPeer {
    /// Test-only: simulate the peer producing an outbound signal (offer,
    /// answer, candidate, or a `{renegotiate:true}` marker).
    pub fn emit_signal(&self, data: serde_json::Value) {
        self.handler.on_signal(&self.id, data);
    }

    pub fn emit_connect(&self) {
        self.connected.store(true, Ordering::SeqCst);
        self.handler.on_connect(&self.id);
    }

    pub fn emit_close(&self) {
        self.connected.store(false, Ordering::SeqCst);
        self.destroyed.store(true, Ordering::SeqCst);
        self.handler.on_close(&self.id);
    }

    pub fn emit_error(&self, error: Error) {
        self.handler.on_error(&self.id, error);
    }

    pub fn emit_data(&self, data: Vec<u8>) {
        self.handler.on_data(&self.id, data);
    }
}

impl Peer for SimPeer {
    fn local_id(&self) -> &PeerId {
        &self.id
    }

    fn initiator(&self) -> bool {
        self.initiator
    }

    fn connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }

    fn signal(&self, data: serde_json::Value) -> Result<()> {
        if self.destroyed() {
            return Err(Error::ConnectionIsDestroyed);
        }
        self.signals_in.lock().unwrap().push(data);
        Ok(())
    }

    fn send(&self, data: &str) -> Result<()> {
        if self.destroyed() {
            return Err(Error::ConnectionIsDestroyed);
        }
        self.sent.lock().unwrap().push(data.to_string());
        Ok(())
    }

    fn add_stream(&self, _stream: &MediaStream) -> Result<()> {
        Ok(())
    }

    fn remove_stream(&self, _stream: &MediaStream) -> Result<()> {
        Ok(())
    }

    fn add_track(&self, _track: &MediaTrack, _stream: &MediaStream) -> Result<()> {
        Ok(())
    }

    fn remove_track(&self, _track: &MediaTrack) -> Result<()> {
        Ok(())
    }

    fn set_track_enabled(&self, track: &MediaTrack, enabled: bool) -> Result<()> {
        if self.destroyed() {
            return Err(Error::ConnectionIsDestroyed);
        }
        self.track_enabled.lock().unwrap().push((track.clone(), enabled));
        Ok(())
    }

    fn destroy(&self) {
        if !self.destroyed.swap(true, Ordering::SeqCst) {
            self.connected.store(false, Ordering::SeqCst);
            self.handler.on_close(&self.id);
        }
    }
}

pub struct SimPeerProvider {
    next_id: AtomicU64,
    pub created: Mutex<Vec<Arc<SimPeer>>>,
    pub ice_servers: Mutex<Vec<IceServer>>,
}

impl Default for SimPeerProvider {
    fn default() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            created: Mutex::new(Vec::new()),
            ice_servers: Mutex::new(Vec::new()),
        }
    }
}

impl SimPeerProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn peer(&self, id: &str) -> Option<Arc<SimPeer>> {
        self.created
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.id == id)
            .cloned()
    }

    pub fn last(&self) -> Option<Arc<SimPeer>> {
        self.created.lock().unwrap().last().cloned()
    }
}

impl PeerProvider for SimPeerProvider {
    fn create(&self, config: PeerConfig, handler: Arc<dyn PeerHandler>) -> Result<Arc<dyn Peer>> {
        let id = format!("sim-pc-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        let peer = Arc::new(SimPeer {
            id,
            initiator: config.initiator,
            connected: AtomicBool::new(false),
            destroyed: AtomicBool::new(false),
            handler,
            sent: Mutex::new(Vec::new()),
            signals_in: Mutex::new(Vec::new()),
            track_enabled: Mutex::new(Vec::new()),
        });
        self.created.lock().unwrap().push(peer.clone());
        Ok(peer)
    }

    fn set_ice_servers(&self, servers: Vec<IceServer>) {
        *self.ice_servers.lock().unwrap() = servers;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    struct RecordingHandler {
        signals: StdMutex<Vec<serde_json::Value>>,
    }
    impl PeerHandler for RecordingHandler {
        fn on_signal(&self, _peer: &PeerId, data: serde_json::Value) {
            self.signals.lock().unwrap().push(data);
        }
    }

    #[test]
    fn create_and_signal() {
        let provider = SimPeerProvider::new();
        let handler = Arc::new(RecordingHandler {
            signals: StdMutex::new(Vec::new()),
        });
        let peer = provider
            .create(PeerConfig::default(), handler.clone())
            .unwrap();
        peer.signal(serde_json::json!({"renegotiate": true})).unwrap();
        peer.destroy();
        assert!(peer.destroyed());
        assert!(peer.signal(serde_json::json!({})).is_err());
    }
}
