//
// Copyright 2024 kwm-signaling Contributors
// SPDX-License-Identifier: AGPL-3.0-only
//

//! Group Coordinator: given a member set for a group, drives the Call
//! Engine to converge the peer table to a full mesh.

use crate::core::call_engine;
use crate::core::engine::{self, EngineState};
use crate::core::peer_record::PeerRecord;

/// A group's coordinator state: membership plus the group-level hash/state
/// used when the server addresses the group as a whole.
#[derive(Clone, Debug)]
pub struct GroupState {
    pub id: String,
    pub channel: Option<String>,
    pub members: Vec<String>,
    pub record: PeerRecord,
}

impl GroupState {
    pub fn new(record: PeerRecord) -> Self {
        Self {
            id: record.user.clone(),
            channel: None,
            members: Vec::new(),
            record,
        }
    }
}

/// A `webrtc_channel` envelope whose `data.group.group == id` arrived.
/// Adopts `channel`, sorts `members`, and — when `reset` is set — tears the
/// mesh down before reconciling it to the new membership.
pub fn on_group_channel_data(
    state: &mut EngineState,
    channel: Option<String>,
    mut members: Vec<String>,
    reset: bool,
) {
    let Some(group) = state.group.as_mut() else {
        return;
    };
    if let Some(channel) = channel {
        group.channel = Some(channel);
    }
    members.sort();
    group.members = members.clone();

    if reset {
        let record = group.record.clone();
        call_engine::do_mesh(state, Vec::new(), &record);
    }

    let Some(group) = state.group.clone() else {
        return;
    };
    call_engine::do_mesh(state, members, &group.record);
}

/// Triggered when the current user reappears in the member set after
/// reconnection. Re-issues
/// `webrtc_group` and replays the reply through the normal inbound path.
pub fn refresh_group(state: &mut EngineState) {
    let Some(id) = state.group.as_ref().map(|g| g.id.clone()) else {
        return;
    };
    let result = call_engine::do_group(state, id).map(|_| ());
    engine::report(state, result);
}
