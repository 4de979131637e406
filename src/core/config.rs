//
// Copyright 2024 kwm-signaling Contributors
// SPDX-License-Identifier: AGPL-3.0-only
//

//! Engine configuration.

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum ApiVersion {
    V1,
    V2,
}

impl ApiVersion {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApiVersion::V1 => "v1",
            ApiVersion::V2 => "v2",
        }
    }
}

/// Transport-level configuration, exactly the keys the server recognises.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    pub api_version: ApiVersion,
    pub connect_timeout_ms: u64,
    pub heartbeat_interval_ms: u64,
    pub max_reconnect_interval_ms: u64,
    pub reconnect_enabled: bool,
    pub reconnect_factor: f64,
    pub reconnect_interval_ms: u64,
    pub reconnect_spreader_ms: u64,
    pub authorization_type: Option<String>,
    pub authorization_value: Option<String>,
    pub authorization_auth: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_version: ApiVersion::V2,
            connect_timeout_ms: 5_000,
            heartbeat_interval_ms: 30_000,
            max_reconnect_interval_ms: 30_000,
            reconnect_enabled: true,
            reconnect_factor: 1.5,
            reconnect_interval_ms: 1_000,
            reconnect_spreader_ms: 1_000,
            authorization_type: None,
            authorization_value: None,
            authorization_auth: None,
        }
    }
}

/// WebRTC-side options.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ChannelConfig {
    pub channel_config: Option<serde_json::Value>,
    pub channel_name: Option<String>,
    pub offer_constraints: Option<serde_json::Value>,
    pub answer_constraints: Option<serde_json::Value>,
    pub local_sdp_transform: bool,
    pub remote_sdp_transform: bool,
}
