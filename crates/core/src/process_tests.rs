// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[parameterized(
    created_stop = { ProcessState::Created, Signal::Stop, Some(ProcessState::Stopped) },
    running_stop = { ProcessState::Running, Signal::Stop, Some(ProcessState::Stopped) },
    sleeping_stop = { ProcessState::Sleeping, Signal::Stop, Some(ProcessState::Stopped) },
    stopped_stop = { ProcessState::Stopped, Signal::Stop, None },
    zombie_stop = { ProcessState::Zombie, Signal::Stop, None },
    created_cont = { ProcessState::Created, Signal::Cont, None },
    running_cont = { ProcessState::Running, Signal::Cont, Some(ProcessState::Running) },
    sleeping_cont = { ProcessState::Sleeping, Signal::Cont, Some(ProcessState::Running) },
    stopped_cont = { ProcessState::Stopped, Signal::Cont, Some(ProcessState::Running) },
    created_term = { ProcessState::Created, Signal::Term, Some(ProcessState::Zombie) },
    running_term = { ProcessState::Running, Signal::Term, Some(ProcessState::Zombie) },
    sleeping_term = { ProcessState::Sleeping, Signal::Term, Some(ProcessState::Zombie) },
    stopped_term = { ProcessState::Stopped, Signal::Term, Some(ProcessState::Zombie) },
    zombie_term = { ProcessState::Zombie, Signal::Term, None },
    zombie_kill = { ProcessState::Zombie, Signal::Kill, Some(ProcessState::Zombie) },
    running_kill = { ProcessState::Running, Signal::Kill, Some(ProcessState::Zombie) },
    running_int = { ProcessState::Running, Signal::Int, Some(ProcessState::Zombie) },
    stopped_int = { ProcessState::Stopped, Signal::Int, None },
    dead_kill = { ProcessState::Dead, Signal::Kill, None },
    dead_term = { ProcessState::Dead, Signal::Term, None },
)]
fn signal_table(state: ProcessState, signal: Signal, expected: Option<ProcessState>) {
    assert_eq!(transition(state, signal), expected);
}

#[parameterized(
    paused_cont = { Signal::Cont, Some(ProcessState::Running) },
    paused_term = { Signal::Term, Some(ProcessState::Zombie) },
    paused_kill = { Signal::Kill, Some(ProcessState::Zombie) },
    paused_stop = { Signal::Stop, None },
    paused_int = { Signal::Int, None },
)]
fn paused_follows_stopped_row(signal: Signal, expected: Option<ProcessState>) {
    assert_eq!(transition(ProcessState::Paused, signal), expected);
}

#[test]
fn dead_accepts_no_signal() {
    for signal in [Signal::Stop, Signal::Cont, Signal::Term, Signal::Kill, Signal::Int] {
        assert_eq!(transition(ProcessState::Dead, signal), None);
    }
}

#[test]
fn terminal_states() {
    assert!(ProcessState::Zombie.is_terminal());
    assert!(ProcessState::Dead.is_terminal());
    assert!(!ProcessState::Running.is_terminal());
    assert!(!ProcessState::Stopped.is_terminal());
}

#[test]
fn state_serializes_lowercase() {
    assert_eq!(serde_json::to_string(&ProcessState::Zombie).unwrap(), "\"zombie\"");
    assert_eq!(serde_json::to_string(&AgentPhase::Thinking).unwrap(), "\"thinking\"");
}

#[test]
fn signal_display_and_wire_name_agree() {
    assert_eq!(Signal::Term.to_string(), "SIGTERM");
    assert_eq!(Signal::Kill.to_string(), "SIGKILL");
    assert_eq!(serde_json::to_string(&Signal::Term).unwrap(), "\"SIGTERM\"");
    let parsed: Signal = serde_json::from_str("\"SIGINT\"").unwrap();
    assert_eq!(parsed, Signal::Int);
}

#[test]
fn spawn_config_builder_defaults() {
    let config = SpawnConfig::builder().goal("write a poem").build();
    assert_eq!(config.goal, "write a poem");
    assert_eq!(config.owner, "tester");
    assert!(config.uid.is_none());
    assert!(config.tools.is_empty());
}

mod properties {
    use super::*;
    use proptest::prelude::*;

    fn arb_state() -> impl Strategy<Value = ProcessState> {
        prop_oneof![
            Just(ProcessState::Created),
            Just(ProcessState::Running),
            Just(ProcessState::Sleeping),
            Just(ProcessState::Stopped),
            Just(ProcessState::Paused),
            Just(ProcessState::Zombie),
            Just(ProcessState::Dead),
        ]
    }

    fn arb_signal() -> impl Strategy<Value = Signal> {
        prop_oneof![
            Just(Signal::Stop),
            Just(Signal::Cont),
            Just(Signal::Term),
            Just(Signal::Kill),
            Just(Signal::Int),
        ]
    }

    proptest! {
        /// No signal sequence ever reaches `dead`: reap is the only way out
        /// of zombie, and signals never resurrect a zombie.
        #[test]
        fn signals_never_reach_dead(start in arb_state(), signals in prop::collection::vec(arb_signal(), 0..32)) {
            prop_assume!(start != ProcessState::Dead);
            let mut state = start;
            for signal in signals {
                if let Some(next) = transition(state, signal) {
                    state = next;
                }
                prop_assert_ne!(state, ProcessState::Dead);
                // Once zombie, only zombie (Kill is a self-loop).
                if state == ProcessState::Zombie {
                    for follow in [Signal::Stop, Signal::Cont, Signal::Term, Signal::Int] {
                        prop_assert_eq!(transition(state, follow), None);
                    }
                }
            }
        }
    }
}
