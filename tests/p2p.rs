//
// Copyright 2024 kwm-signaling Contributors
// SPDX-License-Identifier: AGPL-3.0-only
//

mod common;

use std::thread;
use std::time::{Duration, Instant};

use kwm_signaling::core::envelope::REQUIRED_VERSION;
use kwm_signaling::webrtc::peer::Peer;
use kwm_signaling::{Event, StreamKind};

use common::{start_engine, TestServer};

fn is_webrtc(v: &serde_json::Value, subtype: &str) -> bool {
    v.get("type").and_then(|t| t.as_str()) == Some("webrtc")
        && v.get("subtype").and_then(|t| t.as_str()) == Some(subtype)
}

/// Polls `f` until it returns `Some`, or panics after `timeout`.
fn wait_for<T>(timeout: Duration, mut f: impl FnMut() -> Option<T>) -> T {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(v) = f() {
            return v;
        }
        assert!(Instant::now() < deadline, "condition never became true");
        thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn p2p_handshake_then_emits_announce_streams_for_local_stream() {
    let (server, http_port) = TestServer::start();
    let (engine, sink, peers) = start_engine(http_port, &server, "alice");

    engine.do_call("bob".to_string());
    let call_env = server
        .recv_matching(Duration::from_secs(2), |v| is_webrtc(v, "webrtc_call"))
        .expect("expected outbound webrtc_call");
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

    let pc = wait_for(Duration::from_secs(2), || peers.last());

    // The parent Peer connecting fires the P2P Controller's handshake.
    pc.emit_connect();
    let handshake = wait_for(Duration::from_secs(2), || {
        pc.sent.lock().unwrap().first().cloned()
    });
    let handshake: serde_json::Value = serde_json::from_str(&handshake).unwrap();
    assert_eq!(handshake["type"], "p2p");
    assert_eq!(handshake["subtype"], "handshake");
    let their_ts = handshake["ts"].as_i64().unwrap();

    // Remote replies, completing the handshake.
    pc.emit_data(
        serde_json::json!({
            "type": "p2p",
            "subtype": "handshake_reply",
            "ts": their_ts,
            "v": REQUIRED_VERSION,
        })
        .to_string()
        .into_bytes(),
    );

    // A local stream emitted after the handshake is ready is announced
    // immediately over the data channel.
    engine.emit_local_stream("s1".to_string(), StreamKind::Screenshare, None);

    let announce = wait_for(Duration::from_secs(2), || {
        pc.sent
            .lock()
            .unwrap()
            .iter()
            .find_map(|s| {
                let v: serde_json::Value = serde_json::from_str(s).ok()?;
                (v["type"] == "p2p" && v["subtype"] == "announce_streams").then_some(v)
            })
    });
    let streams = announce["streams"].as_array().unwrap();
    assert_eq!(streams.len(), 1);
    assert_eq!(streams[0]["id"], "s1");
    assert_eq!(streams[0]["kind"], "screenshare");
    assert!(!streams[0]["token"].as_str().unwrap().is_empty());
}

#[test]
fn remote_announce_streams_creates_sub_connection_and_bootstraps_it() {
    let (server, http_port) = TestServer::start();
    let (engine, sink, peers) = start_engine(http_port, &server, "alice");

    // alice < bob, so computeInitiator("alice", "bob") == false: alice is
    // not the initiator of the parent connection or of the P2P record.
    engine.do_call("bob".to_string());
    let call_env = server
        .recv_matching(Duration::from_secs(2), |v| is_webrtc(v, "webrtc_call"))
        .expect("expected outbound webrtc_call");
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

    let pc = wait_for(Duration::from_secs(2), || peers.last());
    pc.emit_connect();
    let handshake = wait_for(Duration::from_secs(2), || {
        pc.sent.lock().unwrap().first().cloned()
    });
    let handshake: serde_json::Value = serde_json::from_str(&handshake).unwrap();
    let their_ts = handshake["ts"].as_i64().unwrap();
    pc.emit_data(
        serde_json::json!({
            "type": "p2p",
            "subtype": "handshake_reply",
            "ts": their_ts,
            "v": REQUIRED_VERSION,
        })
        .to_string()
        .into_bytes(),
    );

    pc.emit_data(
        serde_json::json!({
            "type": "p2p",
            "subtype": "announce_streams",
            "streams": [{"id": "remote-s1", "kind": "screenshare", "token": "tok-1", "v": 1}],
        })
        .to_string()
        .into_bytes(),
    );

    // Being the non-initiator, alice bootstraps the nested sub-negotiation
    // with a {renegotiate:true, noop:true} webrtc signal routed by token.
    let bootstrap = wait_for(Duration::from_secs(2), || {
        pc.sent.lock().unwrap().iter().find_map(|s| {
            let v: serde_json::Value = serde_json::from_str(s).ok()?;
            (v["type"] == "webrtc" && v["source"] == "tok-1").then_some(v)
        })
    });
    assert_eq!(bootstrap["data"]["renegotiate"], true);
    assert_eq!(bootstrap["data"]["noop"], true);

    // A dedicated sub-Peer was created for the stream (in addition to the
    // parent call's own Peer).
    let created = wait_for(Duration::from_secs(2), || {
        let c = peers.created.lock().unwrap();
        (c.len() >= 2).then(|| c.len())
    });
    assert_eq!(created, 2);

    // Routing a real signal (not just the noop bootstrap) by the stream's
    // token must reach the sub-Peer itself, not just be logged.
    let sub_pc = peers.last().expect("sub-connection pc");
    assert_ne!(sub_pc.local_id(), pc.local_id());
    pc.emit_data(
        serde_json::json!({
            "type": "webrtc",
            "source": "tok-1",
            "v": REQUIRED_VERSION,
            "pcid": "remote-sub-pc",
            "data": {"sdp": "v=0 remote-offer"},
        })
        .to_string()
        .into_bytes(),
    );
    let routed = wait_for(Duration::from_secs(2), || {
        sub_pc.signals_in.lock().unwrap().last().cloned()
    });
    assert_eq!(routed["sdp"], "v=0 remote-offer");
}

#[test]
fn local_announce_creates_a_sub_connection_for_the_announcing_side() {
    let (server, http_port) = TestServer::start();
    let (engine, sink, peers) = start_engine(http_port, &server, "alice");

    engine.do_call("bob".to_string());
    let call_env = server
        .recv_matching(Duration::from_secs(2), |v| is_webrtc(v, "webrtc_call"))
        .expect("expected outbound webrtc_call");
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

    let pc = wait_for(Duration::from_secs(2), || peers.last());
    pc.emit_connect();
    wait_for(Duration::from_secs(2), || pc.sent.lock().unwrap().first().cloned());

    // Announcing a local stream before the handshake even completes still
    // creates the announcing side's own sub-connection immediately.
    engine.emit_local_stream("s1".to_string(), StreamKind::Screenshare, None);

    let created = wait_for(Duration::from_secs(2), || {
        let c = peers.created.lock().unwrap();
        (c.len() >= 2).then(|| c.len())
    });
    assert_eq!(created, 2, "the announcing side should also get a sub-Peer");
}
