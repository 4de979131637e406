//
// Copyright 2024 kwm-signaling Contributors
// SPDX-License-Identifier: AGPL-3.0-only
//

mod common;

use std::time::Duration;

use kwm_signaling::core::envelope::REQUIRED_VERSION;

use common::{start_engine, TestServer};

fn is_webrtc(v: &serde_json::Value, subtype: &str) -> bool {
    v.get("type").and_then(|t| t.as_str()) == Some("webrtc")
        && v.get("subtype").and_then(|t| t.as_str()) == Some(subtype)
}

#[test]
fn group_mesh_reconciliation_adds_and_removes_members() {
    let (server, http_port) = TestServer::start();
    let (engine, _sink, _peers) = start_engine(http_port, &server, "alice");

    engine.do_group("g".to_string());
    let group_req = server
        .recv_matching(Duration::from_secs(2), |v| is_webrtc(v, "webrtc_group"))
        .expect("expected outbound webrtc_group");
    assert_eq!(group_req["group"], "g");
    let id = group_req["id"].as_u64().unwrap();

    // Reply establishes the channel and the Group Coordinator, and
    // delivers an initial membership as extra channel data.
    server.send(serde_json::json!({
        "id": 100,
        "reply_to": id,
        "type": "webrtc",
        "subtype": "webrtc_group",
        "channel": "chan-g",
        "hash": "grouphash",
        "v": REQUIRED_VERSION,
        "data": {"group": {"group": "g", "members": ["alice", "bob", "carol"], "reset": false}},
    }));

    let bob_answer = server
        .recv_matching(Duration::from_secs(2), |v| {
            is_webrtc(v, "webrtc_call") && v["target"] == "bob"
        })
        .expect("expected doAnswer for bob");
    assert_eq!(bob_answer["data"]["accept"], true);
    let carol_answer = server
        .recv_matching(Duration::from_secs(2), |v| {
            is_webrtc(v, "webrtc_call") && v["target"] == "carol"
        })
        .expect("expected doAnswer for carol");
    assert_eq!(carol_answer["data"]["accept"], true);

    // Membership changes: carol drops out, dave joins.
    server.send(serde_json::json!({
        "id": 101,
        "type": "webrtc",
        "subtype": "webrtc_channel",
        "channel": "chan-g",
        "v": REQUIRED_VERSION,
        "data": {"group": {"group": "g", "members": ["alice", "bob", "dave"], "reset": false}},
    }));

    let dave_answer = server
        .recv_matching(Duration::from_secs(2), |v| {
            is_webrtc(v, "webrtc_call") && v["target"] == "dave"
        })
        .expect("expected doAnswer for dave");
    assert_eq!(dave_answer["data"]["accept"], true);
    assert_eq!(dave_answer["data"]["state"], "g");

    // Carol's removal is a LOCAL hangup (empty reason): no hangup envelope
    // is ever sent to the server for her, or for anyone else.
    assert!(server.none_matching(Duration::from_millis(200), |v| is_webrtc(v, "webrtc_hangup")));
}

#[test]
fn rejoin_after_reconnect_triggers_refresh_group() {
    let (server, http_port) = TestServer::start();
    let (engine, _sink, _peers) = start_engine(http_port, &server, "alice");

    engine.do_group("g".to_string());
    let group_req = server
        .recv_matching(Duration::from_secs(2), |v| is_webrtc(v, "webrtc_group"))
        .expect("expected outbound webrtc_group");
    let first_id = group_req["id"].as_u64().unwrap();

    server.send(serde_json::json!({
        "id": 100,
        "reply_to": first_id,
        "type": "webrtc",
        "subtype": "webrtc_group",
        "channel": "chan-g",
        "hash": "grouphash",
        "v": REQUIRED_VERSION,
        "data": {"group": {"group": "g", "members": ["alice", "bob"], "reset": false}},
    }));
    server
        .recv_matching(Duration::from_secs(2), |v| {
            is_webrtc(v, "webrtc_call") && v["target"] == "bob"
        })
        .expect("expected doAnswer for bob");

    // Alice reappearing in her own group's membership (as happens on a
    // fresh `hello` after a reconnect) re-issues `webrtc_group`.
    server.send(serde_json::json!({
        "id": 2,
        "type": "hello",
        "self": {"id": "alice", "name": "alice"},
    }));

    let second_req = server
        .recv_matching(Duration::from_secs(2), |v| {
            is_webrtc(v, "webrtc_group") && v["id"].as_u64() != Some(first_id)
        })
        .expect("expected refreshGroup to re-issue webrtc_group");
    assert_eq!(second_req["group"], "g");
}
