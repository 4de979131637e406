//
// Copyright 2024 kwm-signaling Contributors
// SPDX-License-Identifier: AGPL-3.0-only
//

//! Peer Record: per-peer call state held by the Call Engine.

use rand::RngCore;

use crate::webrtc::peer::PeerId;

/// Special `cid` marker used by the pipeline (MCU-forward) peer.
pub const PIPELINE_CID: &str = "mcu-forward";

/// Generates a 12-hex-char nonce, used for `state`.
pub fn new_state_nonce() -> String {
    random_hex(6)
}

/// Generates a 16-hex-char nonce, used for P2P stream routing tokens.
pub fn new_stream_token() -> String {
    random_hex(8)
}

fn random_hex(bytes: usize) -> String {
    let mut buf = vec![0u8; bytes];
    rand::thread_rng().fill_bytes(&mut buf);
    hex::encode(buf)
}

/// Keyed by `id` in the Call Engine's peer table (the remote user id for
/// normal peers, a pipeline identifier for the pipeline peer).
#[derive(Clone, Debug)]
pub struct PeerRecord {
    pub id: String,
    pub user: String,
    pub group: Option<String>,
    /// Non-empty for special peers; currently only `PIPELINE_CID`.
    pub cid: Option<String>,
    pub initiator: bool,
    /// Locally generated nonce the server binds replies to.
    pub state: String,
    /// The peer's state nonce as learned from the remote side.
    pub ref_: Option<String>,
    /// Server-issued opaque session token; must match on inbound messages.
    pub hash: Option<String>,
    /// Server-issued request id, echoed on accept/reject of an incoming call.
    pub transaction: Option<String>,
    pub pc: Option<PeerId>,
    /// Remote connection id learned from the first `webrtc_signal`.
    pub rpcid: Option<String>,
    pub profile: Option<serde_json::Value>,
    /// When true, the Peer Factory auto-recovers this peer on error.
    pub reconnect: bool,
}

impl PeerRecord {
    pub fn new(id: impl Into<String>, user: impl Into<String>, initiator: bool) -> Self {
        Self {
            id: id.into(),
            user: user.into(),
            group: None,
            cid: None,
            initiator,
            state: new_state_nonce(),
            ref_: None,
            hash: None,
            transaction: None,
            pc: None,
            rpcid: None,
            profile: None,
            reconnect: true,
        }
    }

    /// True for the special pipeline/MCU-forward peer.
    pub fn is_pipeline(&self) -> bool {
        self.cid.as_deref() == Some(PIPELINE_CID)
    }
}
