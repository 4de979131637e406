//
// Copyright 2024 kwm-signaling Contributors
// SPDX-License-Identifier: AGPL-3.0-only
//

mod common;

use std::thread;
use std::time::Duration;

use kwm_signaling::core::envelope::REQUIRED_VERSION;
use kwm_signaling::Event;

use common::{start_engine, TestServer};

fn is_webrtc(v: &serde_json::Value, subtype: &str) -> bool {
    v.get("type").and_then(|t| t.as_str()) == Some("webrtc")
        && v.get("subtype").and_then(|t| t.as_str()) == Some(subtype)
}

#[test]
fn incoming_call_fires_event_and_answer_accepts() {
    let (server, http_port) = TestServer::start();
    let (engine, sink, peers) = start_engine(http_port, &server, "alice");

    server.send(serde_json::json!({
        "id": 10,
        "type": "webrtc",
        "subtype": "webrtc_call",
        "source": "carol",
        "target": "alice",
        "initiator": true,
        "channel": "chan-9",
        "transaction": "txn-1",
        "state": "carol-nonce",
        "hash": "carol-hash",
        "v": REQUIRED_VERSION,
    }));

    assert!(sink.wait_for(
        Duration::from_secs(2),
        |e| matches!(e, Event::IncomingCall { peer } if peer == "carol")
    ));

    engine.do_answer("carol".to_string());

    let answer_env = server
        .recv_matching(Duration::from_secs(2), |v| is_webrtc(v, "webrtc_call"))
        .expect("expected outbound accept");
    assert_eq!(answer_env["target"], "carol");
    assert_eq!(answer_env["transaction"], "txn-1");
    assert_eq!(answer_env["data"]["accept"], true);
    assert_eq!(answer_env["data"]["state"], "carol-nonce");

    thread::sleep(Duration::from_millis(50));
    assert!(peers.created.lock().unwrap().is_empty(), "do_answer doesn't itself create a pc");
}

#[test]
fn second_incoming_call_while_busy_is_rejected() {
    let (server, http_port) = TestServer::start();
    let (_engine, sink, _peers) = start_engine(http_port, &server, "alice");

    server.send(serde_json::json!({
        "id": 10,
        "type": "webrtc",
        "subtype": "webrtc_call",
        "source": "carol",
        "target": "alice",
        "initiator": true,
        "channel": "chan-9",
        "v": REQUIRED_VERSION,
    }));
    assert!(sink.wait_for(
        Duration::from_secs(2),
        |e| matches!(e, Event::IncomingCall { peer } if peer == "carol")
    ));

    // A second caller arrives while we already have a channel: must be
    // rejected with reject_busy rather than silently accepted.
    server.send(serde_json::json!({
        "id": 11,
        "type": "webrtc",
        "subtype": "webrtc_call",
        "source": "dave",
        "target": "alice",
        "initiator": true,
        "v": REQUIRED_VERSION,
    }));

    let busy_env = server
        .recv_matching(Duration::from_secs(2), |v| is_webrtc(v, "webrtc_call"))
        .expect("expected busy-reject reply");
    assert_eq!(busy_env["target"], "dave");
    assert_eq!(busy_env["data"]["accept"], false);
    assert_eq!(busy_env["data"]["reason"], "reject_busy");
}

#[test]
fn hangup_from_peer_clears_local_state() {
    let (server, http_port) = TestServer::start();
    let (engine, sink, peers) = start_engine(http_port, &server, "alice");

    server.send(serde_json::json!({
        "id": 10,
        "type": "webrtc",
        "subtype": "webrtc_call",
        "source": "carol",
        "target": "alice",
        "initiator": true,
        "channel": "chan-9",
        "state": "carol-nonce",
        "v": REQUIRED_VERSION,
    }));
    assert!(sink.wait_for(
        Duration::from_secs(2),
        |e| matches!(e, Event::IncomingCall { peer } if peer == "carol")
    ));
    engine.do_answer("carol".to_string());
    server
        .recv_matching(Duration::from_secs(2), |v| is_webrtc(v, "webrtc_call"))
        .expect("expected outbound accept");

    server.send(serde_json::json!({
        "id": 12,
        "type": "webrtc",
        "subtype": "webrtc_hangup",
        "source": "carol",
        "channel": "chan-9",
        "state": "carol-nonce",
        "v": REQUIRED_VERSION,
        "data": {"reason": "normal"},
    }));

    assert!(sink.wait_for(
        Duration::from_secs(2),
        |e| matches!(e, Event::Hangup { peer, .. } if peer == "carol")
    ));

    // A second call from carol should now be treated as fresh, not busy.
    server.send(serde_json::json!({
        "id": 13,
        "type": "webrtc",
        "subtype": "webrtc_call",
        "source": "carol",
        "target": "alice",
        "initiator": true,
        "channel": "chan-10",
        "v": REQUIRED_VERSION,
    }));
    assert!(sink.wait_for(Duration::from_secs(2), |e| matches!(
        e,
        Event::IncomingCall { peer } if peer == "carol"
    )));
    let _ = peers;
}
