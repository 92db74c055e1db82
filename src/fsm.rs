//! Generic table-driven finite state machine.
//!
//! A [`TransitionTable`] maps `(state, input)` pairs to a next state and an
//! optional guard. Tables are built once through [`TransitionTableBuilder`],
//! which rejects duplicate entries up front; pairs never declared are a
//! lookup fault at [`StateMachine::transition`] time, not a no-op.
//!
//! Guards receive a mutable context `C` and run before the state commits.
//! A guard returning `false` vetoes the move without raising an error.
//!
//! ```
//! use tickwire::fsm::{StateMachine, TransitionTable};
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
//! enum Door { Open, Closed }
//! #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
//! enum Push { Shut, Pull }
//!
//! let table = TransitionTable::builder()
//!     .on(Door::Open, Push::Shut, Door::Closed)
//!     .guarded(Door::Closed, Push::Pull, Door::Open, |unlocked: &mut bool| *unlocked)
//!     .build()
//!     .unwrap();
//! let mut door = StateMachine::new(Door::Open, table).unwrap();
//! let mut unlocked = false;
//!
//! door.transition(Push::Shut, &mut unlocked).unwrap();
//! door.transition(Push::Pull, &mut unlocked).unwrap();
//! assert_eq!(door.state(), Door::Closed);
//! assert!(door.transition(Push::Shut, &mut unlocked).is_err());
//! ```

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;

use tracing::debug;

use crate::error::FsmError;

/// Side-effecting check run during a transition.
pub type Guard<C> = Box<dyn Fn(&mut C) -> bool>;

/// Target of one table entry.
pub struct Transition<S, C> {
    next: S,
    guard: Option<Guard<C>>,
}

impl<S: Copy, C> Transition<S, C> {
    pub fn next(&self) -> S {
        self.next
    }

    pub fn is_guarded(&self) -> bool {
        self.guard.is_some()
    }
}

impl<S: Debug, C> Debug for Transition<S, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transition")
            .field("next", &self.next)
            .field("guarded", &self.guard.is_some())
            .finish()
    }
}

/// Validated `(state, input) -> transition` mapping.
pub struct TransitionTable<S, I, C> {
    entries: HashMap<(S, I), Transition<S, C>>,
}

impl<S, I, C> TransitionTable<S, I, C>
where
    S: Copy + Eq + Hash + Debug,
    I: Copy + Eq + Hash + Debug,
{
    /// Start declaring a table.
    pub fn builder() -> TransitionTableBuilder<S, I, C> {
        TransitionTableBuilder {
            entries: Vec::new(),
        }
    }

    /// Entry for `(state, input)`, if declared.
    pub fn get(&self, state: S, input: I) -> Option<&Transition<S, C>> {
        self.entries.get(&(state, input))
    }

    pub fn contains(&self, state: S, input: I) -> bool {
        self.entries.contains_key(&(state, input))
    }

    /// Returns `true` if any entry leaves `state`.
    pub fn has_outgoing(&self, state: S) -> bool {
        self.entries.keys().any(|(from, _)| *from == state)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<S: Debug, I: Debug, C> Debug for TransitionTable<S, I, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map().entries(self.entries.iter()).finish()
    }
}

/// Collects table entries; [`build`](Self::build) validates them.
pub struct TransitionTableBuilder<S, I, C> {
    entries: Vec<((S, I), Transition<S, C>)>,
}

impl<S, I, C> TransitionTableBuilder<S, I, C>
where
    S: Copy + Eq + Hash + Debug,
    I: Copy + Eq + Hash + Debug,
{
    /// Declare an unconditional transition.
    #[must_use]
    pub fn on(mut self, from: S, input: I, next: S) -> Self {
        self.entries
            .push(((from, input), Transition { next, guard: None }));
        self
    }

    /// Declare a transition that commits only if `guard` returns `true`.
    #[must_use]
    pub fn guarded(
        mut self,
        from: S,
        input: I,
        next: S,
        guard: impl Fn(&mut C) -> bool + 'static,
    ) -> Self {
        self.entries.push((
            (from, input),
            Transition {
                next,
                guard: Some(Box::new(guard)),
            },
        ));
        self
    }

    /// Validate and freeze the table.
    ///
    /// # Errors
    ///
    /// Returns [`FsmError::DuplicateTransition`] if a pair was declared twice.
    pub fn build(self) -> Result<TransitionTable<S, I, C>, FsmError> {
        let mut entries = HashMap::with_capacity(self.entries.len());
        for ((from, input), transition) in self.entries {
            if entries.contains_key(&(from, input)) {
                return Err(FsmError::DuplicateTransition {
                    state: format!("{from:?}"),
                    input: format!("{input:?}"),
                });
            }
            entries.insert((from, input), transition);
        }
        Ok(TransitionTable { entries })
    }
}

/// State machine over a fixed [`TransitionTable`].
pub struct StateMachine<S, I, C> {
    state: S,
    table: TransitionTable<S, I, C>,
}

impl<S, I, C> StateMachine<S, I, C>
where
    S: Copy + Eq + Hash + Debug,
    I: Copy + Eq + Hash + Debug,
{
    /// Create a machine starting in `initial`.
    ///
    /// # Errors
    ///
    /// Returns [`FsmError::DeadInitialState`] if no entry leaves `initial`.
    pub fn new(initial: S, table: TransitionTable<S, I, C>) -> Result<Self, FsmError> {
        if !table.has_outgoing(initial) {
            return Err(FsmError::DeadInitialState(format!("{initial:?}")));
        }
        Ok(Self {
            state: initial,
            table,
        })
    }

    pub fn state(&self) -> S {
        self.state
    }

    pub fn table(&self) -> &TransitionTable<S, I, C> {
        &self.table
    }

    /// Feed `input` to the machine, running the entry's guard against `ctx`.
    ///
    /// Returns the state after the call: the declared next state, or the
    /// unchanged current state if the guard vetoed.
    ///
    /// # Errors
    ///
    /// Returns [`FsmError::UndefinedTransition`] if `(state, input)` is not
    /// declared; the state is left unchanged.
    pub fn transition(&mut self, input: I, ctx: &mut C) -> Result<S, FsmError> {
        let Some(entry) = self.table.get(self.state, input) else {
            return Err(FsmError::UndefinedTransition {
                state: format!("{:?}", self.state),
                input: format!("{input:?}"),
            });
        };

        let allowed = entry.guard.as_ref().map_or(true, |guard| guard(ctx));
        if allowed {
            debug!("fsm: {:?} --{:?}--> {:?}", self.state, input, entry.next);
            self.state = entry.next;
        } else {
            debug!("fsm: {:?} --{:?}--> vetoed", self.state, input);
        }
        Ok(self.state)
    }
}

impl<S: Debug, I: Debug, C> Debug for StateMachine<S, I, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateMachine")
            .field("state", &self.state)
            .field("table", &self.table)
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum Light {
        Red,
        Green,
        Yellow,
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum Signal {
        Go,
        Slow,
        Halt,
    }

    const STATES: [Light; 3] = [Light::Red, Light::Green, Light::Yellow];
    const INPUTS: [Signal; 3] = [Signal::Go, Signal::Slow, Signal::Halt];

    /// Guard context: the verdict to return and how often guards ran.
    #[derive(Default)]
    struct Ctx {
        allow: bool,
        calls: usize,
    }

    fn check(ctx: &mut Ctx) -> bool {
        ctx.calls += 1;
        ctx.allow
    }

    fn table() -> TransitionTable<Light, Signal, Ctx> {
        TransitionTable::builder()
            .guarded(Light::Red, Signal::Go, Light::Green, check)
            .on(Light::Green, Signal::Slow, Light::Yellow)
            .on(Light::Yellow, Signal::Halt, Light::Red)
            .guarded(Light::Yellow, Signal::Go, Light::Green, check)
            .build()
            .unwrap()
    }

    fn machine_at(state: Light) -> StateMachine<Light, Signal, Ctx> {
        let mut machine = StateMachine::new(Light::Red, table()).unwrap();
        machine.state = state;
        machine
    }

    #[test]
    fn declared_pairs_follow_the_table() {
        let reference = table();
        for state in STATES {
            for input in INPUTS {
                let Some(entry) = reference.get(state, input) else {
                    continue;
                };

                for allow in [true, false] {
                    let mut machine = machine_at(state);
                    let mut ctx = Ctx { allow, calls: 0 };
                    let result = machine.transition(input, &mut ctx).unwrap();

                    let expected = if entry.is_guarded() && !allow {
                        state
                    } else {
                        entry.next()
                    };
                    assert_eq!(result, expected, "{state:?} + {input:?}, allow={allow}");
                    assert_eq!(machine.state(), expected);
                    assert_eq!(ctx.calls, usize::from(entry.is_guarded()));
                }
            }
        }
    }

    #[test]
    fn undeclared_pairs_fail_and_keep_state() {
        let reference = table();
        for state in STATES {
            for input in INPUTS {
                if reference.contains(state, input) {
                    continue;
                }
                let mut machine = machine_at(state);
                let mut ctx = Ctx::default();
                let err = machine.transition(input, &mut ctx).unwrap_err();
                assert!(matches!(err, FsmError::UndefinedTransition { .. }));
                assert_eq!(machine.state(), state);
                assert_eq!(ctx.calls, 0);
            }
        }
    }

    #[test]
    fn guard_side_effects_happen_before_commit() {
        let table = TransitionTable::builder()
            .guarded(Light::Red, Signal::Go, Light::Green, |log: &mut Vec<String>| {
                log.push("guard".to_string());
                true
            })
            .build()
            .unwrap();
        let mut machine = StateMachine::new(Light::Red, table).unwrap();
        let mut log = Vec::new();
        assert_eq!(machine.transition(Signal::Go, &mut log).unwrap(), Light::Green);
        assert_eq!(log, ["guard"]);
    }

    #[test]
    fn duplicate_entries_are_rejected() {
        let result = TransitionTable::<Light, Signal, Ctx>::builder()
            .on(Light::Red, Signal::Go, Light::Green)
            .on(Light::Red, Signal::Go, Light::Yellow)
            .build();
        assert_eq!(
            result.unwrap_err(),
            FsmError::DuplicateTransition {
                state: "Red".into(),
                input: "Go".into(),
            }
        );
    }

    #[test]
    fn initial_state_needs_an_exit() {
        let table = TransitionTable::<Light, Signal, Ctx>::builder()
            .on(Light::Green, Signal::Slow, Light::Yellow)
            .build()
            .unwrap();
        assert!(matches!(
            StateMachine::new(Light::Red, table),
            Err(FsmError::DeadInitialState(_))
        ));
    }
}
