//! Guard-gated command dispatch.
//!
//! Bindings are registered once at startup and evaluated against a state
//! snapshot: candidates matching the invocation kind whose guard passes are
//! tried in descending priority, then registration order, until one handler
//! reports success. The router itself never mutates session state; all side
//! effects live with the caller executing the selected actions.

use crate::{StateSnapshot, VoiceCommand};

use tracing::debug;

/// The kind of command an invocation carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    /// Toggle or trigger a dictation cycle.
    Listen,
    /// Submit behavior (press Enter, or cancel an active recording).
    Submit,
    /// Request graceful shutdown.
    Close,
    /// A recognized voice command from a transcribed utterance.
    Voice(VoiceCommand),
}

/// Where an invocation came from, for logging and diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandSource {
    /// The local global hotkey.
    Hotkey,
    /// A signal raised by another process.
    Remote,
    /// The listen-after-startup request of this process's own launch.
    Startup,
    /// A phrase recognized in a transcribed utterance.
    Voice,
}

/// One trigger fed into the router. Stateless value, created per trigger.
#[derive(Debug, Clone, Copy)]
pub struct CommandInvocation {
    /// What is being asked for.
    pub kind: CommandKind,
    /// Where the trigger came from.
    pub source: CommandSource,
    /// Skip prefix handling in downstream text processing.
    pub ignore_prefix: bool,
}

impl CommandInvocation {
    /// Invocation with the default prefix handling.
    pub fn new(kind: CommandKind, source: CommandSource) -> Self {
        Self {
            kind,
            source,
            ignore_prefix: false,
        }
    }
}

/// A registered, guarded, prioritized handler for one command kind.
#[derive(Debug)]
pub struct CommandBinding<A> {
    /// Identifier for logs. Duplicates are the caller's concern.
    pub id: &'static str,
    /// Command kind this binding answers.
    pub kind: CommandKind,
    /// Predicate over the dispatch-time state snapshot.
    pub guard: fn(&StateSnapshot) -> bool,
    /// Action descriptor executed by the session controller.
    pub action: A,
    /// Higher priority bindings are tried first.
    pub priority: i32,
    /// Disabled bindings never match.
    pub enabled: bool,
    registration_order: u64,
}

impl<A> CommandBinding<A> {
    /// Create an enabled binding with default priority.
    pub fn new(id: &'static str, kind: CommandKind, guard: fn(&StateSnapshot) -> bool, action: A) -> Self {
        Self {
            id,
            kind,
            guard,
            action,
            priority: 0,
            enabled: true,
            registration_order: 0,
        }
    }

    /// Set the binding priority.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

/// Ordered table of command bindings.
pub struct CommandRouter<A> {
    bindings: Vec<CommandBinding<A>>,
    next_order: u64,
}

impl<A> CommandRouter<A> {
    /// Empty router.
    pub fn new() -> Self {
        Self {
            bindings: Vec::new(),
            next_order: 0,
        }
    }

    /// Append a binding, assigning its registration order.
    pub fn register(&mut self, mut binding: CommandBinding<A>) {
        binding.registration_order = self.next_order;
        self.next_order += 1;
        self.bindings.push(binding);
    }

    /// Bindings matching `invocation` under `state`, in dispatch order:
    /// descending priority, then ascending registration order.
    fn candidates(
        &self,
        invocation: &CommandInvocation,
        state: &StateSnapshot,
    ) -> Vec<&CommandBinding<A>> {
        let mut matching: Vec<&CommandBinding<A>> = self
            .bindings
            .iter()
            .filter(|b| b.enabled && b.kind == invocation.kind && (b.guard)(state))
            .collect();

        matching.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then(a.registration_order.cmp(&b.registration_order))
        });

        matching
    }

    /// Run `execute` over the candidates until one reports success.
    ///
    /// Returns whether any handler handled the invocation.
    pub fn dispatch<F>(
        &self,
        invocation: &CommandInvocation,
        state: &StateSnapshot,
        mut execute: F,
    ) -> bool
    where
        F: FnMut(&A, &CommandInvocation, &StateSnapshot) -> bool,
    {
        for binding in self.candidates(invocation, state) {
            if execute(&binding.action, invocation, state) {
                debug!(binding = binding.id, "Command handled");
                return true;
            }
        }

        false
    }
}

impl<A> Default for CommandRouter<A> {
    fn default() -> Self {
        Self::new()
    }
}
