//
// Copyright 2024 kwm-signaling Contributors
// SPDX-License-Identifier: AGPL-3.0-only
//

//! Test harness: a scripted HTTP+WebSocket server standing in for the
//! signaling backend, so integration tests drive a real `Engine` over its
//! real `Transport` instead of calling internal functions directly.
//!
//! Shared across several `tests/*.rs` binaries; not every helper is used by
//! every one of them.
#![allow(dead_code)]

use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use kwm_signaling::webrtc::sim::SimPeerProvider;
use kwm_signaling::{ChannelConfig, Config, Engine, Event, EventSink};

/// Replies to exactly one `connect` HTTP POST with a fixed `url` pointing
/// at the WebSocket server, then closes.
fn serve_bootstrap(listener: TcpListener, ws_url: String) {
    thread::spawn(move || {
        let Ok((mut stream, _)) = listener.accept() else { return };
        let mut buf = [0u8; 4096];
        let _ = stream.read(&mut buf);
        let body = format!("{{\"ok\":true,\"url\":\"{ws_url}\"}}");
        let response = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            body.len(),
            body
        );
        let _ = stream.write_all(response.as_bytes());
    });
}

/// Accepts one WebSocket connection and pumps scripted frames in both
/// directions until the channel closes.
fn serve_ws(listener: TcpListener, out_rx: Receiver<serde_json::Value>, in_tx: Sender<serde_json::Value>) {
    thread::spawn(move || {
        let Ok((stream, _)) = listener.accept() else { return };
        let _ = stream.set_read_timeout(Some(Duration::from_secs(5)));
        let Ok(mut ws) = tungstenite::accept(stream) else { return };
        let _ = ws.get_mut().set_read_timeout(Some(Duration::from_millis(20)));
        loop {
            if let Ok(v) = out_rx.try_recv() {
                let text = serde_json::to_string(&v).unwrap();
                if ws.send(tungstenite::Message::Text(text)).is_err() {
                    break;
                }
            }
            match ws.read() {
                Ok(tungstenite::Message::Text(t)) => {
                    if let Ok(v) = serde_json::from_str(&t) {
                        let _ = in_tx.send(v);
                    }
                }
                Ok(tungstenite::Message::Close(_)) => break,
                Ok(_) => {}
                Err(tungstenite::Error::Io(e)) if e.kind() == std::io::ErrorKind::WouldBlock => {}
                Err(_) => break,
            }
        }
    });
}

pub struct TestServer {
    in_rx: Receiver<serde_json::Value>,
    out_tx: Sender<serde_json::Value>,
}

impl TestServer {
    /// Starts the fake backend, returning the harness plus the HTTP port an
    /// `Engine` should use as its connect endpoint.
    pub fn start() -> (Self, u16) {
        let ws_listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let ws_port = ws_listener.local_addr().unwrap().port();
        let (in_tx, in_rx) = channel();
        let (out_tx, out_rx) = channel();
        serve_ws(ws_listener, out_rx, in_tx);

        let http_listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let http_port = http_listener.local_addr().unwrap().port();
        serve_bootstrap(http_listener, format!("ws://127.0.0.1:{ws_port}"));

        (Self { in_rx, out_tx }, http_port)
    }

    pub fn send(&self, v: serde_json::Value) {
        self.out_tx.send(v).unwrap();
    }

    /// Waits up to `timeout` for an inbound frame matching `pred`, draining
    /// (and discarding) anything that doesn't match along the way.
    pub fn recv_matching(
        &self,
        timeout: Duration,
        pred: impl Fn(&serde_json::Value) -> bool,
    ) -> Option<serde_json::Value> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return None;
            }
            match self.in_rx.recv_timeout(remaining) {
                Ok(v) if pred(&v) => return Some(v),
                Ok(_) => continue,
                Err(_) => return None,
            }
        }
    }

    /// True if no frame matching `pred` shows up within `timeout`.
    pub fn none_matching(&self, timeout: Duration, pred: impl Fn(&serde_json::Value) -> bool) -> bool {
        self.recv_matching(timeout, pred).is_none()
    }
}

#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<Event>>,
}

impl EventSink for RecordingSink {
    fn on_event(&self, event: Event) -> bool {
        self.events.lock().unwrap().push(event);
        true
    }
}

impl RecordingSink {
    pub fn wait_for(&self, timeout: Duration, pred: impl Fn(&Event) -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if self.events.lock().unwrap().iter().any(&pred) {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(Duration::from_millis(5));
        }
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }
}

/// Starts an `Engine` against `server`, connects it, and exchanges `hello`
/// so the engine learns `user`.
pub fn start_engine(
    http_port: u16,
    server: &TestServer,
    user: &str,
) -> (Engine, Arc<RecordingSink>, Arc<SimPeerProvider>) {
    let sink = Arc::new(RecordingSink::default());
    let peers = SimPeerProvider::new();
    let engine = Engine::new(
        format!("http://127.0.0.1:{http_port}"),
        None,
        Config::default(),
        ChannelConfig::default(),
        sink.clone(),
        peers.clone(),
    );
    engine.connect("device-1".to_string(), "device".to_string());
    assert!(
        sink.wait_for(Duration::from_secs(2), |e| matches!(
            e,
            Event::StateChanged { connected: true, .. }
        )),
        "engine never reached Connected"
    );
    server.send(serde_json::json!({"id": 1, "type": "hello", "self": {"id": user, "name": user}}));
    thread::sleep(Duration::from_millis(50));
    (engine, sink, peers)
}
