use crate::{
    StateSnapshot,
    command_router::{CommandBinding, CommandInvocation, CommandKind, CommandRouter, CommandSource},
};

fn snapshot() -> StateSnapshot {
    StateSnapshot {
        recording: false,
        transcribing: false,
        preview_active: false,
        shutdown_requested: false,
        shutting_down: false,
    }
}

fn listen_invocation() -> CommandInvocation {
    CommandInvocation::new(CommandKind::Listen, CommandSource::Remote)
}

fn guard_pass(_state: &StateSnapshot) -> bool {
    true
}

fn guard_fail(_state: &StateSnapshot) -> bool {
    false
}

/// WHAT: Higher priority bindings are tried before lower ones
/// WHY: Priority decides which handler sees a command first
#[test]
fn given_mixed_priorities_when_dispatching_then_highest_tried_first() {
    // Given: Two matching bindings with priorities 1 and 5
    let mut router = CommandRouter::new();
    router.register(
        CommandBinding::new("low", CommandKind::Listen, guard_pass, "low").with_priority(1),
    );
    router.register(
        CommandBinding::new("high", CommandKind::Listen, guard_pass, "high").with_priority(5),
    );

    // When: Dispatching with handlers that always decline
    let mut tried = Vec::new();
    let handled = router.dispatch(&listen_invocation(), &snapshot(), |action, _, _| {
        tried.push(*action);
        false
    });

    // Then: Priority 5 was tried first and nothing handled the command
    assert_eq!(tried, vec!["high", "low"]);
    assert!(!handled);
}

/// WHAT: Equal priorities break ties by registration order
/// WHY: Dispatch order must be deterministic across runs
#[test]
fn given_equal_priorities_when_dispatching_then_registration_order_wins() {
    // Given: Two matching bindings, both priority 2, registered in order
    let mut router = CommandRouter::new();
    router.register(
        CommandBinding::new("first", CommandKind::Listen, guard_pass, "first").with_priority(2),
    );
    router.register(
        CommandBinding::new("second", CommandKind::Listen, guard_pass, "second").with_priority(2),
    );

    // When: Dispatching with handlers that always decline
    let mut tried = Vec::new();
    router.dispatch(&listen_invocation(), &snapshot(), |action, _, _| {
        tried.push(*action);
        false
    });

    // Then: The earlier registration is tried first
    assert_eq!(tried, vec!["first", "second"]);
}

/// WHAT: Dispatch stops at the first handler returning true
/// WHY: A lower-priority handler must never run once a higher one succeeds
#[test]
fn given_succeeding_handler_when_dispatching_then_lower_never_invoked() {
    // Given: A succeeding high-priority binding above a lower one
    let mut router = CommandRouter::new();
    router.register(
        CommandBinding::new("wins", CommandKind::Listen, guard_pass, "wins").with_priority(5),
    );
    router.register(
        CommandBinding::new("never", CommandKind::Listen, guard_pass, "never").with_priority(1),
    );

    // When: Dispatching with the first handler succeeding
    let mut tried = Vec::new();
    let handled = router.dispatch(&listen_invocation(), &snapshot(), |action, _, _| {
        tried.push(*action);
        true
    });

    // Then: Only the winning binding ran
    assert!(handled);
    assert_eq!(tried, vec!["wins"]);
}

/// WHAT: Bindings with failing guards are never candidates
/// WHY: Guards gate handlers on the state snapshot
#[test]
fn given_failing_guard_when_dispatching_then_binding_skipped() {
    // Given: A guarded-out binding above an eligible one
    let mut router = CommandRouter::new();
    router.register(
        CommandBinding::new("blocked", CommandKind::Listen, guard_fail, "blocked")
            .with_priority(10),
    );
    router.register(CommandBinding::new(
        "eligible",
        CommandKind::Listen,
        guard_pass,
        "eligible",
    ));

    // When: Dispatching
    let mut tried = Vec::new();
    router.dispatch(&listen_invocation(), &snapshot(), |action, _, _| {
        tried.push(*action);
        true
    });

    // Then: Only the eligible binding ran
    assert_eq!(tried, vec!["eligible"]);
}

/// WHAT: Disabled bindings never match
/// WHY: Disabling must win over kind, guard, and priority
#[test]
fn given_disabled_binding_when_dispatching_then_not_invoked() {
    // Given: A disabled binding that would otherwise win
    let mut router = CommandRouter::new();
    let mut disabled =
        CommandBinding::new("disabled", CommandKind::Listen, guard_pass, "disabled")
            .with_priority(10);
    disabled.enabled = false;
    router.register(disabled);
    router.register(CommandBinding::new(
        "enabled",
        CommandKind::Listen,
        guard_pass,
        "enabled",
    ));

    // When: Dispatching
    let mut tried = Vec::new();
    router.dispatch(&listen_invocation(), &snapshot(), |action, _, _| {
        tried.push(*action);
        true
    });

    // Then: The disabled binding never ran
    assert_eq!(tried, vec!["enabled"]);
}

/// WHAT: Bindings of other kinds are never candidates
/// WHY: A submit handler must not see listen commands
#[test]
fn given_other_kind_binding_when_dispatching_then_unhandled() {
    // Given: Only a submit binding registered
    let mut router = CommandRouter::new();
    router.register(CommandBinding::new(
        "submit-only",
        CommandKind::Submit,
        guard_pass,
        "submit-only",
    ));

    // When: Dispatching a listen invocation
    let handled = router.dispatch(&listen_invocation(), &snapshot(), |_, _, _| true);

    // Then: Nothing handled it
    assert!(!handled);
}
