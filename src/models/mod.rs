// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod session;
pub mod signing;

pub use session::{Page, Session, SessionStatus};
pub use signing::{Responsable, ResponsablesPayload, SignatureEntry};
