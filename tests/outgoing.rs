//
// Copyright 2024 kwm-signaling Contributors
// SPDX-License-Identifier: AGPL-3.0-only
//

mod common;

use std::thread;
use std::time::Duration;

use kwm_signaling::core::call_engine::compute_initiator;
use kwm_signaling::core::envelope::REQUIRED_VERSION;
use kwm_signaling::{Event, Peer};

use common::{start_engine, TestServer};

fn is_webrtc(v: &serde_json::Value, subtype: &str) -> bool {
    v.get("type").and_then(|t| t.as_str()) == Some("webrtc")
        && v.get("subtype").and_then(|t| t.as_str()) == Some(subtype)
}

#[test]
fn places_outgoing_call_and_creates_peer_on_accept() {
    let (server, http_port) = TestServer::start();
    let (engine, sink, peers) = start_engine(http_port, &server, "alice");

    engine.do_call("bob".to_string());

    let call_env = server
        .recv_matching(Duration::from_secs(2), |v| is_webrtc(v, "webrtc_call"))
        .expect("expected outbound webrtc_call");
    assert_eq!(call_env["target"], "bob");
    assert_eq!(call_env["initiator"], true);
    let id = call_env["id"].as_u64().unwrap();
    let state_nonce = call_env["state"].as_str().unwrap().to_string();

    server.send(serde_json::json!({
        "id": 100,
        "reply_to": id,
        "type": "webrtc",
        "subtype": "webrtc_call",
        "source": "bob",
        "channel": "chan-1",
        "hash": "serverhash",
        "v": REQUIRED_VERSION,
        "data": {"accept": true, "state": state_nonce},
    }));

    assert!(sink.wait_for(
        Duration::from_secs(2),
        |e| matches!(e, Event::OutgoingCall { peer } if peer == "bob")
    ));

    thread::sleep(Duration::from_millis(50));
    let created = peers.created.lock().unwrap();
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].initiator(), compute_initiator("alice", "bob"));
}

#[test]
fn outgoing_call_rejected_aborts_without_creating_peer() {
    let (server, http_port) = TestServer::start();
    let (engine, sink, peers) = start_engine(http_port, &server, "alice");

    engine.do_call("bob".to_string());
    let call_env = server
        .recv_matching(Duration::from_secs(2), |v| is_webrtc(v, "webrtc_call"))
        .expect("expected outbound webrtc_call");
    let id = call_env["id"].as_u64().unwrap();
    let state_nonce = call_env["state"].as_str().unwrap().to_string();

    server.send(serde_json::json!({
        "id": 101,
        "reply_to": id,
        "type": "webrtc",
        "subtype": "webrtc_call",
        "source": "bob",
        "hash": "serverhash",
        "v": REQUIRED_VERSION,
        "data": {"accept": false, "reason": "declined", "state": state_nonce},
    }));

    assert!(sink.wait_for(
        Duration::from_secs(2),
        |e| matches!(e, Event::AbortCall { peer, reason } if peer == "bob" && reason == "declined")
    ));
    thread::sleep(Duration::from_millis(50));
    assert!(peers.created.lock().unwrap().is_empty());
}

#[test]
fn stale_reply_with_mismatched_nonce_is_dropped() {
    let (server, http_port) = TestServer::start();
    let (engine, sink, peers) = start_engine(http_port, &server, "alice");

    engine.do_call("bob".to_string());
    let call_env = server
        .recv_matching(Duration::from_secs(2), |v| is_webrtc(v, "webrtc_call"))
        .expect("expected outbound webrtc_call");
    let id = call_env["id"].as_u64().unwrap();

    // A reply carrying a state nonce that doesn't match our request's is
    // a replay of some earlier exchange and must be silently dropped.
    server.send(serde_json::json!({
        "id": 102,
        "reply_to": id,
        "type": "webrtc",
        "subtype": "webrtc_call",
        "source": "bob",
        "hash": "serverhash",
        "v": REQUIRED_VERSION,
        "data": {"accept": true, "state": "not-the-real-nonce"},
    }));

    thread::sleep(Duration::from_millis(200));
    assert!(peers.created.lock().unwrap().is_empty());
    assert!(sink
        .events()
        .iter()
        .all(|e| !matches!(e, Event::OutgoingCall { .. })));
}
