// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod credential;
pub mod engine;
pub mod guard;
pub mod realtime;
pub mod session;
pub mod signing;
pub mod upstream;

pub use credential::CredentialStore;
pub use engine::{SessionEngine, SessionRegistry};
pub use realtime::{ChannelManager, RealtimeEvent, WsTransport};
pub use session::SessionResolver;
pub use signing::resolve_signature_status;
pub use upstream::UpstreamClient;
