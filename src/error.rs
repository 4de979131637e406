//
// Copyright 2024 kwm-signaling Contributors
// SPDX-License-Identifier: AGPL-3.0-only
//

//! Common error codes.

use thiserror::Error;

/// Platform independent error conditions.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("request to {0} failed")]
    RequestFailed(String),
    #[error("http error {0}")]
    HttpError(u16),
    #[error("connect timed out")]
    ConnectTimeout,
    #[error("no connection")]
    NoConnection,
    #[error("reply timed out")]
    Timeout,
    #[error("websocket error: {0}")]
    WebSocketError(String),
    #[error("connection is destroyed")]
    ConnectionIsDestroyed,
    #[error("server error {code}: {msg}")]
    ServerError { code: String, msg: String },

    #[error("already have a channel")]
    AlreadyHaveChannel,
    #[error("no channel")]
    NoChannel,
    #[error("peer already exists")]
    PeerAlreadyExists,
    #[error("unknown peer")]
    UnknownPeer,
    #[error("wrong stream")]
    WrongStream,
    #[error("mesh without self")]
    MeshWithoutSelf,
}

/// Common `Result` type for the engine.
pub type Result<T> = std::result::Result<T, Error>;
