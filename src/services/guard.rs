// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Route/action guard: pure entitlement predicates.
//!
//! Access is evaluated against the resolved session snapshot. While the
//! session is still loading the answer is `Pending` (callers render and
//! redirect nothing); once resolution settles the answer is a
//! deterministic allow/deny. Authorization never fails open: absent
//! credentials and resolution errors both deny.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::models::SessionStatus;
use crate::services::session::SessionSnapshot;

/// What a request needs in order to pass.
#[derive(Debug, Clone)]
pub enum AccessRequirement {
    /// A granted page whose path covers the requested route.
    PagePath(String),
    /// Membership in one specific role.
    Role(String),
    /// Membership in any of the listed roles.
    AnyRole(Vec<String>),
}

/// Outcome of a pure evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny,
    Pending,
}

/// What a resolved session with an empty page list may access.
#[derive(Debug, Clone)]
pub enum EmptyPagesPolicy {
    /// No pages means no routes.
    DenyAll,
    /// A page-less session is confined to this route prefix.
    Fallback(String),
}

/// Evaluate a requirement against the current session snapshot.
pub fn evaluate(
    snapshot: &SessionSnapshot,
    requirement: &AccessRequirement,
    empty_pages: &EmptyPagesPolicy,
) -> Decision {
    match snapshot.status {
        SessionStatus::Loading => return Decision::Pending,
        SessionStatus::Idle | SessionStatus::Error => return Decision::Deny,
        SessionStatus::Resolved => {}
    }

    let Some(session) = snapshot.session.as_ref() else {
        // Resolved without a session should not happen; fail closed.
        return Decision::Deny;
    };

    let allowed = match requirement {
        AccessRequirement::PagePath(requested) => {
            if session.pages.is_empty() {
                match empty_pages {
                    EmptyPagesPolicy::DenyAll => false,
                    EmptyPagesPolicy::Fallback(fallback) => path_grants(fallback, requested),
                }
            } else {
                session
                    .pages
                    .iter()
                    .any(|page| path_grants(&page.path, requested))
            }
        }
        AccessRequirement::Role(role) => session.roles.iter().any(|r| r == role),
        AccessRequirement::AnyRole(roles) => roles
            .iter()
            .any(|wanted| session.roles.iter().any(|r| r == wanted)),
    };

    if allowed {
        Decision::Allow
    } else {
        Decision::Deny
    }
}

/// True if a granted page path covers the requested route.
///
/// The match is boundary-aware: `/docs` covers `/docs` and `/docs/123`,
/// but never `/documents`. A bare `/` covers everything.
pub fn path_grants(page_path: &str, requested: &str) -> bool {
    let page = page_path.trim_end_matches('/');
    if page.is_empty() {
        return true;
    }
    match requested.strip_prefix(page) {
        Some("") => true,
        Some(rest) => rest.starts_with('/'),
        None => false,
    }
}

/// Per-session-instance guard with a one-shot redirect on deny.
///
/// The first denied evaluation redirects to the forbidden destination;
/// repeated denials for the same session instance answer plain
/// `Forbidden` so re-evaluation can never loop through navigation.
pub struct RouteGuard {
    forbidden_destination: String,
    redirected: AtomicBool,
}

/// What the caller should do with a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardOutcome {
    Allow,
    Pending,
    Redirect(String),
    Forbidden,
}

impl RouteGuard {
    pub fn new(forbidden_destination: impl Into<String>) -> Self {
        Self {
            forbidden_destination: forbidden_destination.into(),
            redirected: AtomicBool::new(false),
        }
    }

    pub fn decide(
        &self,
        snapshot: &SessionSnapshot,
        requirement: &AccessRequirement,
        empty_pages: &EmptyPagesPolicy,
    ) -> GuardOutcome {
        match evaluate(snapshot, requirement, empty_pages) {
            Decision::Allow => GuardOutcome::Allow,
            Decision::Pending => GuardOutcome::Pending,
            Decision::Deny => {
                if self.redirected.swap(true, Ordering::SeqCst) {
                    GuardOutcome::Forbidden
                } else {
                    GuardOutcome::Redirect(self.forbidden_destination.clone())
                }
            }
        }
    }
}
