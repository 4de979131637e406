//
// Copyright 2024 kwm-signaling Contributors
// SPDX-License-Identifier: AGPL-3.0-only
//

//! Transport Client: a reconnecting WebSocket carrying request/reply JSON
//! envelopes, with heartbeat and TURN refresh.
//!
//! Grounded on `lite::http`'s `Client`/`Request`/`Response` abstraction and
//! `core::sfu_client`'s pattern of a synchronous HTTP call producing a
//! typed response. The socket itself runs on a dedicated reader thread
//! (`tungstenite`, the sync sibling of `ureq`+`rustls` ringrtc already
//! depends on) that forwards every frame back onto the engine's single
//! `Actor` thread, keeping the "one logical thread mutates state"
//! guarantee intact while keeping I/O off that thread.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use rand::Rng;
use tungstenite::{stream::MaybeTlsStream, Message as WsMessage, WebSocket};

use crate::core::actor::Actor;
use crate::core::envelope::{Envelope, EnvelopeId, Payload};
use crate::core::event::{Event, TransportState as PublicTransportState, TurnChanged};
use crate::error::{Error, Result};

/// TURN server configuration returned by the connect/turn endpoints.
#[derive(Clone, Debug, serde::Deserialize)]
pub struct TurnConfig {
    pub username: String,
    pub password: String,
    pub ttl: u64,
    pub uris: Vec<String>,
}

#[derive(Clone, Debug, serde::Deserialize)]
struct ConnectResponse {
    ok: bool,
    url: Option<String>,
    turn: Option<TurnConfig>,
    error: Option<ConnectErrorBody>,
}

#[derive(Clone, Debug, serde::Deserialize)]
struct ConnectErrorBody {
    code: String,
    #[allow(dead_code)]
    msg: String,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TransportState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
    Closing,
}

impl From<TransportState> for PublicTransportState {
    fn from(s: TransportState) -> Self {
        match s {
            TransportState::Disconnected => PublicTransportState::Disconnected,
            TransportState::Connecting => PublicTransportState::Connecting,
            TransportState::Connected => PublicTransportState::Connected,
            TransportState::Reconnecting => PublicTransportState::Reconnecting,
            TransportState::Closing => PublicTransportState::Closing,
        }
    }
}

/// Invoked with engine state plus either the matched reply or a timeout.
pub type ReplyHandler<S> = Box<dyn FnOnce(&mut S, Result<Envelope>) + Send>;

struct PendingReply<S> {
    handler: ReplyHandler<S>,
    generation: u64,
}

/// One round-trip latency sample; up to 10 are averaged.
const MAX_LATENCY_SAMPLES: usize = 10;

pub struct Transport<S> {
    pub state: TransportState,
    pub auth_identifier: String,
    pub auth_mode: String,
    connect_endpoint: String,
    turn_endpoint: Option<String>,
    authorization_type: Option<String>,
    authorization_value: Option<String>,
    /// Separate token carried in the bootstrap form's `auth` field,
    /// independent of the `Authorization` header pair above.
    authorization_auth: Option<String>,
    api_version: &'static str,

    reconnect_enabled: bool,
    reconnect_base_ms: f64,
    reconnect_factor: f64,
    reconnect_max_ms: f64,
    reconnect_spreader_ms: f64,
    reconnect_attempts: u32,
    /// Set to true after a `goodbye`: suppresses the instant "fast
    /// reconnect" path by seeding the attempt counter.
    suppress_fast_reconnect: bool,

    heartbeat_interval: Duration,
    connect_timeout: Duration,

    next_envelope_id: EnvelopeId,
    pending_replies: HashMap<EnvelopeId, PendingReply<S>>,
    /// Bumped on every (re)connect; timers capture the generation they were
    /// armed in and check it's still current before acting.
    generation: u64,

    latency_samples_ms: Vec<u64>,
    last_pong_at: Option<Instant>,

    writer: Option<Arc<Mutex<WebSocket<MaybeTlsStream<std::net::TcpStream>>>>>,

    pub turn_config: Option<TurnConfig>,
}

/// What the rest of the engine needs to drive in response to transport
/// events. Kept as a trait so `transport.rs` doesn't depend on
/// `session.rs`/`call_engine.rs` directly, the same way `ringrtc` keeps
/// `Connection` free of a direct `CallManager` dependency, routing back
/// through `Platform` callbacks instead.
pub trait TransportDelegate: Send {
    fn on_envelope(&mut self, actor: &Actor<Self>, env: Envelope)
    where
        Self: Sized;
    fn on_event(&mut self, event: Event) -> bool;
    fn peer_provider_set_ice_servers(&mut self, servers: Vec<crate::webrtc::peer::IceServer>);
}

/// Lets a timer callback that only has `&mut S` obtain a handle to post
/// further work, by having the engine state hold a handle to its own actor
/// (set up in `Actor::new`'s `gen_state` callback, which is handed exactly
/// such a handle before `State` exists).
pub trait HasActor<S> {
    fn actor_handle(&self) -> Actor<S>;
}

impl<S> Transport<S> {
    pub fn new(connect_endpoint: String, turn_endpoint: Option<String>, cfg: &crate::core::config::Config) -> Self {
        Self {
            state: TransportState::Disconnected,
            auth_identifier: String::new(),
            auth_mode: String::new(),
            connect_endpoint,
            turn_endpoint,
            authorization_type: cfg.authorization_type.clone(),
            authorization_value: cfg.authorization_value.clone(),
            authorization_auth: cfg.authorization_auth.clone(),
            api_version: cfg.api_version.as_str(),
            reconnect_enabled: cfg.reconnect_enabled,
            reconnect_base_ms: cfg.reconnect_interval_ms as f64,
            reconnect_factor: cfg.reconnect_factor,
            reconnect_max_ms: cfg.max_reconnect_interval_ms as f64,
            reconnect_spreader_ms: cfg.reconnect_spreader_ms as f64,
            reconnect_attempts: 0,
            suppress_fast_reconnect: false,
            heartbeat_interval: Duration::from_millis(cfg.heartbeat_interval_ms),
            connect_timeout: Duration::from_millis(cfg.connect_timeout_ms),
            next_envelope_id: 1,
            pending_replies: HashMap::new(),
            generation: 0,
            latency_samples_ms: Vec::new(),
            last_pong_at: None,
            writer: None,
            turn_config: None,
        }
    }

    pub fn average_latency_ms(&self) -> Option<f64> {
        if self.latency_samples_ms.is_empty() {
            return None;
        }
        Some(self.latency_samples_ms.iter().sum::<u64>() as f64 / self.latency_samples_ms.len() as f64)
    }

    fn next_id(&mut self) -> EnvelopeId {
        let id = self.next_envelope_id;
        self.next_envelope_id += 1;
        id
    }

    fn backoff_delay(&self) -> Duration {
        let exp = self.reconnect_base_ms * self.reconnect_factor.powi(self.reconnect_attempts as i32);
        let base = exp.min(self.reconnect_max_ms).max(0.0);
        let spread = if self.reconnect_spreader_ms > 0.0 {
            rand::thread_rng().gen_range(0.0..self.reconnect_spreader_ms)
        } else {
            0.0
        };
        Duration::from_millis((base + spread).round() as u64)
    }

    fn write_frame(&self, json: &str) -> Result<()> {
        let writer = self.writer.as_ref().ok_or(Error::NoConnection)?;
        let mut ws = writer.lock().unwrap();
        ws.send(WsMessage::Text(json.to_string()))
            .map_err(|e| Error::WebSocketError(e.to_string()))
    }
}

/// The bootstrap request's authorization material: the `Authorization`
/// header pair, and a separate `auth` form token some deployments require
/// alongside it.
struct BootstrapAuth<'a> {
    auth_type: Option<&'a str>,
    auth_value: Option<&'a str>,
    auth_auth: Option<&'a str>,
}

/// Bootstraps a WebSocket URL and TURN config from the configured connect
/// endpoint. Synchronous: called from the reader-thread spawn path, never
/// on the engine's actor thread.
fn bootstrap(
    endpoint: &str,
    auth_mode: &str,
    identifier: &str,
    auth: BootstrapAuth,
    api_version: &str,
    timeout: Duration,
) -> Result<ConnectResponse> {
    let mut request = ureq::post(endpoint).timeout(timeout);
    if let (Some(t), Some(v)) = (auth.auth_type, auth.auth_value) {
        request = request.set("Authorization", &format!("{t} {v}"));
    }
    let mut form: Vec<(&str, &str)> = vec![(auth_mode, identifier), ("api_version", api_version)];
    if let Some(v) = auth.auth_auth {
        form.push(("auth", v));
    }
    match request.send_form(&form) {
        Ok(resp) => {
            let body: ConnectResponse = resp
                .into_json()
                .map_err(|e| Error::RequestFailed(e.to_string()))?;
            Ok(body)
        }
        Err(ureq::Error::Status(code, _)) => Err(Error::HttpError(code)),
        Err(ureq::Error::Transport(t)) if is_timeout(&t) => Err(Error::ConnectTimeout),
        Err(e) => Err(Error::RequestFailed(e.to_string())),
    }
}

/// True if a ureq transport error was caused by the request's deadline
/// elapsing rather than some other I/O failure (DNS, refused connection).
fn is_timeout(t: &ureq::Transport) -> bool {
    use std::error::Error as _;
    t.kind() == ureq::ErrorKind::Io
        && t.source()
            .and_then(|s| s.downcast_ref::<std::io::Error>())
            .map(|io_e| matches!(io_e.kind(), std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock))
            .unwrap_or(false)
}

/// Drives connect/reconnect/heartbeat/reply-correlation for an engine
/// whose state embeds a `Transport` plus a `TransportDelegate`. Generic
/// over the engine's top-level state type so `session.rs`/`call_engine.rs`
/// never need to know about sockets.
pub fn connect<S>(
    actor: &Actor<S>,
    auth_identifier: String,
    auth_mode: String,
) where
    S: AsMut<Transport<S>> + AsRef<Transport<S>> + TransportDelegate + HasActor<S> + 'static,
{
    let actor2 = actor.clone();
    actor.send(move |state: &mut S| {
        let t = state.as_mut();
        t.auth_identifier = auth_identifier.clone();
        t.auth_mode = auth_mode.clone();
        t.generation += 1;
        let generation = t.generation;
        t.state = TransportState::Connecting;
        let endpoint = t.connect_endpoint.clone();
        let mode = auth_mode.clone();
        let ident = auth_identifier.clone();
        let auth_type = t.authorization_type.clone();
        let auth_value = t.authorization_value.clone();
        let auth_auth = t.authorization_auth.clone();
        let api_version = t.api_version;
        let timeout = t.connect_timeout;
        state.on_event(Event::StateChanged {
            connected: false,
            state: TransportState::Connecting.into(),
        });

        let inner_actor = actor2.clone();
        thread::spawn(move || {
            let connect_result = bootstrap(
                &endpoint,
                &mode,
                &ident,
                BootstrapAuth {
                    auth_type: auth_type.as_deref(),
                    auth_value: auth_value.as_deref(),
                    auth_auth: auth_auth.as_deref(),
                },
                api_version,
                timeout,
            );
            let actor_for_reply = inner_actor.clone();
            inner_actor.send(move |state: &mut S| {
                handle_bootstrap_result(state, &actor_for_reply, generation, connect_result);
            });
        });
    });
}

fn handle_bootstrap_result<S>(
    state: &mut S,
    actor: &Actor<S>,
    generation: u64,
    result: Result<ConnectResponse>,
) where
    S: AsMut<Transport<S>> + AsRef<Transport<S>> + TransportDelegate + HasActor<S> + 'static,
{
    if state.as_ref().generation != generation {
        return; // superseded by a newer connect/reconnect attempt
    }
    match result {
        Ok(ConnectResponse { ok: true, url: Some(url), turn, .. }) => {
            if let Some(turn) = turn.clone() {
                state.as_mut().turn_config = Some(turn.clone());
                schedule_turn_refresh(actor, generation, turn.ttl);
            }
            open_socket(state, actor, generation, url);
        }
        Ok(ConnectResponse { error: Some(err), .. }) if is_permanent(&err.code) => {
            state.as_mut().reconnect_enabled = false;
            state.on_event(Event::Error {
                code: err.code,
                msg: err.msg,
            });
        }
        Ok(ConnectResponse { error: Some(err), .. }) => {
            state.on_event(Event::Error {
                code: err.code.clone(),
                msg: err.msg,
            });
            schedule_reconnect(state, actor, generation);
        }
        Ok(_) => {
            state.on_event(Event::Error {
                code: "request_failed".into(),
                msg: "malformed connect response".into(),
            });
            schedule_reconnect(state, actor, generation);
        }
        Err(e) => {
            state.on_event(Event::from(e));
            schedule_reconnect(state, actor, generation);
        }
    }
}

fn is_permanent(code: &str) -> bool {
    matches!(code, "http_error_401" | "http_error_403" | "http_error_404")
}

fn open_socket<S>(_state: &mut S, actor: &Actor<S>, generation: u64, url: String)
where
    S: AsMut<Transport<S>> + AsRef<Transport<S>> + TransportDelegate + HasActor<S> + 'static,
{
    let inner_actor = actor.clone();
    thread::spawn(move || {
        let connected = tungstenite::connect(&url);
        match connected {
            Ok((socket, _response)) => {
                let writer = Arc::new(Mutex::new(socket));
                let reader = writer.clone();
                let actor_for_heartbeat = inner_actor.clone();
                inner_actor.send(move |state: &mut S| {
                    if state.as_ref().generation != generation {
                        return;
                    }
                    state.as_mut().writer = Some(writer);
                    state.as_mut().state = TransportState::Connected;
                    state.as_mut().reconnect_attempts = 0;
                    state.as_mut().last_pong_at = Some(Instant::now());
                    state.on_event(Event::StateChanged {
                        connected: true,
                        state: TransportState::Connected.into(),
                    });
                    arm_heartbeat(state, &actor_for_heartbeat, generation);
                });
                {
                    let mut ws = reader.lock().unwrap();
                    set_socket_read_timeout(&mut ws, Some(Duration::from_millis(50)));
                }
                read_loop(reader, inner_actor, generation);
            }
            Err(e) => {
                let actor_for_retry = inner_actor.clone();
                inner_actor.send(move |state: &mut S| {
                    if state.as_ref().generation != generation {
                        return;
                    }
                    state.on_event(Event::Error {
                        code: "websocket_error".into(),
                        msg: e.to_string(),
                    });
                    schedule_reconnect(state, &actor_for_retry, generation);
                });
            }
        }
    });
}

/// Sets the underlying TCP read timeout so the reader thread periodically
/// releases the socket mutex instead of blocking on it indefinitely, which
/// would starve `write_frame` whenever no frame is currently inbound.
fn set_socket_read_timeout(
    ws: &mut WebSocket<MaybeTlsStream<std::net::TcpStream>>,
    dur: Option<Duration>,
) {
    if let MaybeTlsStream::Plain(tcp) = ws.get_mut() {
        let _ = tcp.set_read_timeout(dur);
    }
}

fn read_loop<S>(
    socket: Arc<Mutex<WebSocket<MaybeTlsStream<std::net::TcpStream>>>>,
    actor: Actor<S>,
    generation: u64,
) where
    S: AsMut<Transport<S>> + AsRef<Transport<S>> + TransportDelegate + HasActor<S> + 'static,
{
    loop {
        let msg = {
            let mut ws = socket.lock().unwrap();
            ws.read()
        };
        match msg {
            Ok(WsMessage::Text(text)) => {
                let actor2 = actor.clone();
                actor.send(move |state: &mut S| {
                    if state.as_ref().generation != generation {
                        return;
                    }
                    on_text_frame(state, &actor2, text);
                });
            }
            Ok(WsMessage::Close(_)) | Err(tungstenite::Error::ConnectionClosed) => {
                let actor2 = actor.clone();
                actor.send(move |state: &mut S| {
                    // A clean close (as opposed to an I/O error or heartbeat
                    // timeout) means the socket itself reported the loss, not
                    // a failure we already detected: fast reconnect applies.
                    on_socket_closed(state, &actor2, generation, true);
                });
                break;
            }
            Ok(_) => {}
            Err(tungstenite::Error::Io(e)) if e.kind() == std::io::ErrorKind::WouldBlock => {}
            Err(e) => {
                let actor2 = actor.clone();
                let msg = e.to_string();
                actor.send(move |state: &mut S| {
                    state.on_event(Event::Error {
                        code: "websocket_error".into(),
                        msg,
                    });
                    on_socket_closed(state, &actor2, generation, false);
                });
                break;
            }
        }
    }
}

fn on_socket_closed<S>(state: &mut S, actor: &Actor<S>, generation: u64, fast: bool)
where
    S: AsMut<Transport<S>> + AsRef<Transport<S>> + TransportDelegate + HasActor<S> + 'static,
{
    if state.as_ref().generation != generation {
        return;
    }
    state.as_mut().writer = None;
    let was_connected = state.as_ref().state == TransportState::Connected;
    state.as_mut().state = TransportState::Disconnected;
    state.on_event(Event::StateChanged {
        connected: false,
        state: TransportState::Disconnected.into(),
    });

    let t = state.as_mut();
    if fast && was_connected && !t.suppress_fast_reconnect {
        // Fast reconnect: the socket closed without us having already
        // changed state for another reason (an explicit close/goodbye would
        // have set `suppress_fast_reconnect`). Skip backoff entirely.
        t.reconnect_attempts = 0;
        if t.reconnect_enabled {
            t.state = TransportState::Reconnecting;
            let auth_identifier = t.auth_identifier.clone();
            let auth_mode = t.auth_mode.clone();
            let actor2 = actor.clone();
            connect(&actor2, auth_identifier, auth_mode);
            return;
        }
    }
    schedule_reconnect(state, actor, generation);
}

fn schedule_reconnect<S>(state: &mut S, actor: &Actor<S>, generation: u64)
where
    S: AsMut<Transport<S>> + AsRef<Transport<S>> + TransportDelegate + HasActor<S> + 'static,
{
    let t = state.as_mut();
    if !t.reconnect_enabled {
        return;
    }
    t.state = TransportState::Reconnecting;
    let delay = if t.suppress_fast_reconnect {
        t.suppress_fast_reconnect = false;
        t.reconnect_attempts = t.reconnect_attempts.max(1);
        t.backoff_delay()
    } else {
        t.backoff_delay()
    };
    t.reconnect_attempts += 1;
    let auth_identifier = t.auth_identifier.clone();
    let auth_mode = t.auth_mode.clone();
    let actor2 = actor.clone();
    actor.send_delayed(delay, move |state: &mut S| {
        if state.as_ref().generation != generation {
            return;
        }
        connect(&actor2, auth_identifier, auth_mode);
    });
}

fn on_text_frame<S>(state: &mut S, actor: &Actor<S>, text: String)
where
    S: AsMut<Transport<S>> + AsRef<Transport<S>> + TransportDelegate + HasActor<S> + 'static,
{
    let mut env: Envelope = match serde_json::from_str(&text) {
        Ok(e) => e,
        Err(e) => {
            state.on_event(Event::Error {
                code: "protocol_error".into(),
                msg: e.to_string(),
            });
            return;
        }
    };

    // `pong` synthesises reply_to := id because the server echoes only id.
    if let Payload::Pong { ts, auth } = &env.payload {
        env.reply_to = Some(env.id);
        handle_pong(state, *ts, auth.clone());
    }

    if let Some(reply_to) = env.reply_to {
        if let Some(pending) = state.as_mut().pending_replies.remove(&reply_to) {
            (pending.handler)(state, Ok(env));
            return;
        }
    }

    state.on_envelope(actor, env);
}

fn handle_pong<S>(state: &mut S, _ts: i64, auth: Option<String>)
where
    S: AsMut<Transport<S>> + AsRef<Transport<S>>,
{
    let t = state.as_mut();
    if let Some(sent_at) = t.last_pong_at.take() {
        let rtt_ms = sent_at.elapsed().as_millis() as u64;
        t.latency_samples_ms.push(rtt_ms);
        if t.latency_samples_ms.len() > MAX_LATENCY_SAMPLES {
            t.latency_samples_ms.remove(0);
        }
    }
    t.last_pong_at = Some(Instant::now());
    if let Some(auth) = auth {
        t.authorization_value = Some(auth);
    }
}

fn arm_heartbeat<S>(state: &mut S, actor: &Actor<S>, generation: u64)
where
    S: AsMut<Transport<S>> + AsRef<Transport<S>> + TransportDelegate + HasActor<S> + 'static,
{
    let t = state.as_mut();
    let interval = t.heartbeat_interval;
    let timeout = Duration::from_millis((interval.as_millis() as f64 * 0.9) as u64);
    let ping_sent_at = Instant::now();

    let id = t.next_id();
    let ping = Envelope {
        id,
        reply_to: None,
        payload: Payload::Ping {
            ts: chrono_ms(),
            auth: t.authorization_value.clone(),
        },
    };
    if let Ok(json) = serde_json::to_string(&ping) {
        let _ = t.write_frame(&json);
    }

    let actor2 = actor.clone();
    actor.send_delayed(timeout, move |state: &mut S| {
        if state.as_ref().generation != generation {
            return;
        }
        let t = state.as_mut();
        let timed_out = t
            .last_pong_at
            .map(|last| last < ping_sent_at)
            .unwrap_or(true);
        if timed_out {
            on_socket_closed(state, &actor2, generation, false);
        } else {
            arm_heartbeat(state, &actor2, generation);
        }
    });
}

fn schedule_turn_refresh<S>(actor: &Actor<S>, generation: u64, ttl_secs: u64)
where
    S: AsMut<Transport<S>> + AsRef<Transport<S>> + TransportDelegate + HasActor<S> + 'static,
{
    let delay = Duration::from_millis(((ttl_secs as f64) * 0.9 * 1000.0) as u64);
    let actor2 = actor.clone();
    actor.send_delayed(delay, move |state: &mut S| {
        refresh_turn(state, &actor2, generation);
    });
}

fn refresh_turn<S>(state: &mut S, actor: &Actor<S>, generation: u64)
where
    S: AsMut<Transport<S>> + AsRef<Transport<S>> + TransportDelegate + HasActor<S> + 'static,
{
    if state.as_ref().generation != generation {
        return;
    }
    let t = state.as_ref();
    let Some(endpoint) = t.turn_endpoint.clone() else {
        return;
    };
    let mode = t.auth_mode.clone();
    let ident = t.auth_identifier.clone();
    let auth_type = t.authorization_type.clone();
    let auth_value = t.authorization_value.clone();
    let auth_auth = t.authorization_auth.clone();
    let api_version = t.api_version;
    let timeout = t.connect_timeout;
    let actor2 = actor.clone();
    thread::spawn(move || {
        let result = bootstrap(
            &endpoint,
            &mode,
            &ident,
            BootstrapAuth {
                auth_type: auth_type.as_deref(),
                auth_value: auth_value.as_deref(),
                auth_auth: auth_auth.as_deref(),
            },
            api_version,
            timeout,
        );
        let actor_for_reply = actor2.clone();
        actor2.send(move |state: &mut S| {
            if state.as_ref().generation != generation {
                return;
            }
            match result {
                Ok(ConnectResponse { turn: Some(turn), .. }) => {
                    let accepted = state.on_event(Event::TurnChanged(TurnChanged {
                        uris: turn.uris.clone(),
                    }));
                    if accepted {
                        state.as_mut().turn_config = Some(turn.clone());
                        state.peer_provider_set_ice_servers(
                            turn.uris
                                .iter()
                                .map(|u| crate::webrtc::peer::IceServer {
                                    urls: vec![u.clone()],
                                    username: Some(turn.username.clone()),
                                    credential: Some(turn.password.clone()),
                                })
                                .collect(),
                        );
                    }
                    schedule_turn_refresh(&actor_for_reply, generation, turn.ttl);
                }
                _ => {
                    actor_for_reply.send_delayed(Duration::from_secs(5), move |state: &mut S| {
                        let actor_for_retry = state.actor_handle();
                        refresh_turn(state, &actor_for_retry, generation);
                    });
                }
            }
        });
    });
}

fn chrono_ms() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

/// Sends an envelope. `timeout` of zero is fire-and-forget; a positive
/// timeout registers a reply handler keyed by the assigned id.
pub fn send<S>(
    state: &mut S,
    actor: &Actor<S>,
    mut build: impl FnMut(EnvelopeId) -> Payload,
    timeout: Option<Duration>,
    on_reply: Option<ReplyHandler<S>>,
) -> Result<EnvelopeId>
where
    S: AsMut<Transport<S>> + AsRef<Transport<S>> + TransportDelegate + HasActor<S> + 'static,
{
    let t = state.as_mut();
    let id = t.next_id();
    let payload = build(id);
    let env = Envelope {
        id,
        reply_to: None,
        payload,
    };
    let json = serde_json::to_string(&env).map_err(|_| Error::NoConnection)?;
    t.write_frame(&json)?;

    if let (Some(timeout), Some(on_reply)) = (timeout, on_reply) {
        let generation = t.generation;
        t.pending_replies.insert(
            id,
            PendingReply {
                handler: on_reply,
                generation,
            },
        );
        actor.send_delayed(timeout, move |state: &mut S| {
            let current_generation = state.as_ref().generation;
            if let Some(pending) = state.as_mut().pending_replies.remove(&id) {
                if pending.generation == current_generation {
                    (pending.handler)(state, Err(Error::Timeout));
                }
            }
        });
    }
    Ok(id)
}

pub fn close<S>(state: &mut S)
where
    S: AsMut<Transport<S>>,
{
    let t = state.as_mut();
    t.reconnect_enabled = false;
    t.generation += 1;
    if let Some(writer) = t.writer.take() {
        let _ = writer.lock().unwrap().close(None);
    }
    t.state = TransportState::Closing;
}

/// Called by the Session Controller on a `goodbye` envelope.
pub fn on_goodbye<S>(state: &mut S)
where
    S: AsMut<Transport<S>>,
{
    let t = state.as_mut();
    t.suppress_fast_reconnect = true;
    if let Some(writer) = t.writer.take() {
        let _ = writer.lock().unwrap().close(None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_and_caps() {
        let cfg = crate::core::config::Config {
            reconnect_interval_ms: 100,
            reconnect_factor: 2.0,
            max_reconnect_interval_ms: 1000,
            reconnect_spreader_ms: 0.0_f64 as u64,
            ..Default::default()
        };
        let mut t: Transport<()> = Transport::new("http://x".into(), None, &cfg);
        t.reconnect_attempts = 0;
        let d0 = t.backoff_delay();
        t.reconnect_attempts = 3;
        let d3 = t.backoff_delay();
        t.reconnect_attempts = 100;
        let d_cap = t.backoff_delay();
        assert!(d0.as_millis() <= d3.as_millis());
        assert!(d_cap.as_millis() as f64 <= 1000.0);
    }
}
