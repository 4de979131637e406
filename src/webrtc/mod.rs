//
// Copyright 2024 kwm-signaling Contributors
// SPDX-License-Identifier: AGPL-3.0-only
//

//! The media engine boundary: a fixed "Peer" capability set the engine
//! drives, with no opinion on how offers/answers/ICE/tracks are actually
//! produced. Real applications supply their own `PeerProvider`; `sim` is
//! an in-memory fake used by tests.

pub mod peer;
pub mod sim;
