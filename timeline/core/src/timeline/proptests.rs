//! Property-based tests for the turn reducer
//!
//! These tests drive the reducer with arbitrary event sequences and check
//! the timeline invariants after every step.

use std::collections::HashMap;

use proptest::prelude::*;

use super::fixtures::{
    execution, final_answer, input_requested, request, summary, task_completed, upstream_error,
};
use super::*;
use crate::classifier::ClassifiedEvent;

// ============================================================================
// Arbitrary Generators
// ============================================================================

#[derive(Clone, Debug)]
enum Op {
    Event(ClassifiedEvent),
    Abandon,
}

fn arb_participant() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("AgentA".to_string()),
        Just("AgentB".to_string()),
        Just("ManagerAssistant".to_string()),
    ]
}

fn arb_capability() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("lookup".to_string()),
        Just("predict".to_string()),
        Just("tool".to_string()),
    ]
}

/// Answer text, blank about a third of the time
fn arb_answer() -> impl Strategy<Value = String> {
    prop_oneof![
        2 => "[a-zA-Z][a-zA-Z .]{0,30}",
        1 => "[ \t\n]{0,4}",
    ]
}

fn arb_event() -> impl Strategy<Value = ClassifiedEvent> {
    prop_oneof![
        3 => (arb_participant(), arb_capability()).prop_map(|(p, c)| request(&p, &c)),
        3 => (arb_participant(), arb_capability()).prop_map(|(p, c)| execution(&p, &c)),
        1 => (arb_participant(), arb_answer()).prop_map(|(p, t)| summary(&p, &t)),
        2 => (arb_participant(), arb_answer()).prop_map(|(p, t)| final_answer(&p, &t)),
        1 => Just(input_requested("user_proxy")),
        1 => Just(task_completed()),
        1 => Just(upstream_error("boom")),
    ]
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        12 => arb_event().prop_map(Op::Event),
        1 => Just(Op::Abandon),
    ]
}

fn run(reducer: &mut TurnReducer, op: Op) {
    match op {
        Op::Event(event) => {
            reducer.apply(event);
        }
        Op::Abandon => {
            reducer.abandon_active("connection lost");
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    // At most one turn is active at any point
    #[test]
    fn prop_single_active_turn(ops in proptest::collection::vec(arb_op(), 0..40)) {
        let mut reducer = TurnReducer::new();
        for op in ops {
            run(&mut reducer, op);
            let active = reducer.store().iter().filter(|t| t.is_active()).count();
            prop_assert!(active <= 1, "{} active turns", active);
        }
    }

    // Steps only grow by appending, and never change once the turn ends
    #[test]
    fn prop_steps_are_append_only(ops in proptest::collection::vec(arb_op(), 0..40)) {
        let mut reducer = TurnReducer::new();
        let mut seen: HashMap<TurnId, (Vec<Step>, bool)> = HashMap::new();

        for op in ops {
            run(&mut reducer, op);
            for turn in reducer.store() {
                if let Some((before, was_active)) = seen.get(turn.id()) {
                    prop_assert!(turn.steps().starts_with(before));
                    if !was_active {
                        prop_assert_eq!(turn.steps(), before.as_slice());
                    }
                }
            }
            seen = reducer
                .store()
                .iter()
                .map(|t| (t.id().clone(), (t.steps().to_vec(), t.is_active())))
                .collect();
        }
    }

    // The root participant of a turn never changes
    #[test]
    fn prop_root_is_stable(ops in proptest::collection::vec(arb_op(), 0..40)) {
        let mut reducer = TurnReducer::new();
        let mut roots: HashMap<TurnId, String> = HashMap::new();

        for op in ops {
            run(&mut reducer, op);
            for turn in reducer.store() {
                let root = roots
                    .entry(turn.id().clone())
                    .or_insert_with(|| turn.initiating_participant().to_string());
                prop_assert_eq!(turn.initiating_participant(), root.as_str());
            }
        }
    }

    // A blank final answer leaves every turn untouched
    #[test]
    fn prop_blank_final_answer_is_inert(
        ops in proptest::collection::vec(arb_op(), 0..30),
        participant in arb_participant(),
        blank in "[ \t\n]{0,4}",
    ) {
        let mut reducer = TurnReducer::new();
        for op in ops {
            run(&mut reducer, op);
        }

        let before = reducer.store().clone();
        let window_before = reducer.override_window_open();
        reducer.apply(final_answer(&participant, &blank));
        prop_assert_eq!(reducer.store(), &before);
        prop_assert_eq!(reducer.override_window_open(), window_before);
    }

    // A final answer right after a summary replaces it in the same turn
    #[test]
    fn prop_summary_override(
        prefix in proptest::collection::vec(arb_op(), 0..20),
        participant in arb_participant(),
        first in "[a-zA-Z][a-zA-Z ]{0,20}",
        second in "[a-zA-Z][a-zA-Z ]{0,20}",
    ) {
        let mut reducer = TurnReducer::new();
        for op in prefix {
            run(&mut reducer, op);
        }
        // Exchange boundary: the previous run ends, the user asks again
        reducer.apply(task_completed());
        reducer.note_user_request();
        prop_assert!(!reducer.override_window_open());

        let turns_before = reducer.store().len();
        let finished_before: Vec<(usize, String)> = reducer
            .store()
            .iter()
            .enumerate()
            .filter(|(_, t)| !t.is_active())
            .map(|(i, t)| (i, t.final_text().to_string()))
            .collect();
        // A turn still active from the prefix absorbs the new steps
        let carried_steps = reducer.store().active().map(|t| t.steps().len());

        reducer.apply(request(&participant, "lookup"));
        reducer.apply(execution(&participant, "lookup"));
        reducer.apply(summary(&participant, &first));
        reducer.apply(final_answer(&participant, &second));

        let last = reducer.store().last().unwrap();
        prop_assert_eq!(last.final_text(), second.as_str());
        prop_assert_eq!(last.steps().len(), carried_steps.unwrap_or(0) + 2);
        prop_assert_eq!(
            reducer.store().len(),
            turns_before + usize::from(carried_steps.is_none())
        );
        // Answers from earlier exchanges are untouched
        for (i, text) in finished_before {
            prop_assert_eq!(reducer.store().nth(i).unwrap().final_text(), text.as_str());
        }
    }

    // An answer is only ever set on a finished turn
    #[test]
    fn prop_final_text_implies_finished(ops in proptest::collection::vec(arb_op(), 0..40)) {
        let mut reducer = TurnReducer::new();
        for op in ops {
            run(&mut reducer, op);
            for turn in reducer.store() {
                if !turn.final_text().is_empty() {
                    prop_assert!(!turn.is_active());
                    prop_assert_eq!(turn.current_step_text(), None);
                }
            }
        }
    }
}
