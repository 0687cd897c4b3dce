// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Route/action guard decision tests.

use portafirmas_gateway::models::SessionStatus;
use portafirmas_gateway::services::guard::{
    evaluate, AccessRequirement, Decision, EmptyPagesPolicy, GuardOutcome, RouteGuard,
};
use portafirmas_gateway::services::session::SessionSnapshot;

mod common;
use common::test_session;

fn resolved(user_id: i64, pages: &[&str]) -> SessionSnapshot {
    SessionSnapshot {
        status: SessionStatus::Resolved,
        session: Some(test_session(user_id, pages)),
        error: None,
    }
}

fn with_status(status: SessionStatus) -> SessionSnapshot {
    SessionSnapshot {
        status,
        session: None,
        error: None,
    }
}

#[test]
fn test_page_path_allows_nested_routes_only_on_boundaries() {
    let snapshot = resolved(5, &["/docs"]);
    let policy = EmptyPagesPolicy::DenyAll;

    let allow = AccessRequirement::PagePath("/docs/123/detail".to_string());
    assert_eq!(evaluate(&snapshot, &allow, &policy), Decision::Allow);

    let exact = AccessRequirement::PagePath("/docs".to_string());
    assert_eq!(evaluate(&snapshot, &exact, &policy), Decision::Allow);

    // A mere string prefix without a path boundary never grants.
    let deny = AccessRequirement::PagePath("/documents".to_string());
    assert_eq!(evaluate(&snapshot, &deny, &policy), Decision::Deny);
}

#[test]
fn test_role_requirements() {
    let snapshot = resolved(5, &["/docs"]); // fixture carries role REVISA
    let policy = EmptyPagesPolicy::DenyAll;

    assert_eq!(
        evaluate(
            &snapshot,
            &AccessRequirement::Role("REVISA".to_string()),
            &policy
        ),
        Decision::Allow
    );
    assert_eq!(
        evaluate(
            &snapshot,
            &AccessRequirement::Role("APRUEBA".to_string()),
            &policy
        ),
        Decision::Deny
    );
    assert_eq!(
        evaluate(
            &snapshot,
            &AccessRequirement::AnyRole(vec!["APRUEBA".to_string(), "REVISA".to_string()]),
            &policy
        ),
        Decision::Allow
    );
    assert_eq!(
        evaluate(
            &snapshot,
            &AccessRequirement::AnyRole(vec!["ELABORA".to_string()]),
            &policy
        ),
        Decision::Deny
    );
}

#[test]
fn test_loading_is_pending_and_settled_states_are_deterministic() {
    let requirement = AccessRequirement::PagePath("/docs".to_string());
    let policy = EmptyPagesPolicy::DenyAll;

    // While loading, the decision is pending even if a prior session
    // value is still cached.
    let mut loading = resolved(5, &["/docs"]);
    loading.status = SessionStatus::Loading;
    assert_eq!(evaluate(&loading, &requirement, &policy), Decision::Pending);

    assert_eq!(
        evaluate(&resolved(5, &["/docs"]), &requirement, &policy),
        Decision::Allow
    );
    assert_eq!(
        evaluate(&with_status(SessionStatus::Idle), &requirement, &policy),
        Decision::Deny
    );
    assert_eq!(
        evaluate(&with_status(SessionStatus::Error), &requirement, &policy),
        Decision::Deny
    );
}

#[test]
fn test_empty_pages_policy() {
    let snapshot = resolved(5, &[]);
    let requirement = AccessRequirement::PagePath("/inicio/panel".to_string());

    assert_eq!(
        evaluate(&snapshot, &requirement, &EmptyPagesPolicy::DenyAll),
        Decision::Deny
    );
    assert_eq!(
        evaluate(
            &snapshot,
            &requirement,
            &EmptyPagesPolicy::Fallback("/inicio".to_string())
        ),
        Decision::Allow
    );
    assert_eq!(
        evaluate(
            &snapshot,
            &AccessRequirement::PagePath("/documentos".to_string()),
            &EmptyPagesPolicy::Fallback("/inicio".to_string())
        ),
        Decision::Deny
    );
}

#[test]
fn test_route_guard_redirects_exactly_once() {
    let guard = RouteGuard::new("/forbidden");
    let snapshot = resolved(5, &["/docs"]);
    let denied = AccessRequirement::PagePath("/admin".to_string());
    let policy = EmptyPagesPolicy::DenyAll;

    assert_eq!(
        guard.decide(&snapshot, &denied, &policy),
        GuardOutcome::Redirect("/forbidden".to_string())
    );
    // Re-evaluating the same deny never navigates again.
    assert_eq!(
        guard.decide(&snapshot, &denied, &policy),
        GuardOutcome::Forbidden
    );
    assert_eq!(
        guard.decide(&snapshot, &denied, &policy),
        GuardOutcome::Forbidden
    );

    // Allowed requests are unaffected by the spent redirect.
    let allowed = AccessRequirement::PagePath("/docs".to_string());
    assert_eq!(
        guard.decide(&snapshot, &allowed, &policy),
        GuardOutcome::Allow
    );
}

#[test]
fn test_pending_outcome_passes_through_guard() {
    let guard = RouteGuard::new("/forbidden");
    let mut loading = resolved(5, &["/docs"]);
    loading.status = SessionStatus::Loading;

    let requirement = AccessRequirement::PagePath("/docs".to_string());
    let outcome = guard.decide(&loading, &requirement, &EmptyPagesPolicy::DenyAll);
    assert_eq!(outcome, GuardOutcome::Pending);
}
