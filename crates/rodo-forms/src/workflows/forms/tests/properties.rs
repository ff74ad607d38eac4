use super::common::*;

use proptest::prelude::*;

use crate::workflows::forms::domain::AnswerValue;
use crate::workflows::forms::wizard::{StateError, WizardStateMachine};

#[derive(Debug, Clone)]
enum Action {
    Next,
    Back,
    Jump(usize),
    Set(&'static str, AnswerValue),
}

fn answer_strategy() -> impl Strategy<Value = (&'static str, AnswerValue)> {
    prop_oneof![
        prop_oneof![Just(AnswerValue::text("Lost laptop")), Just(AnswerValue::Empty)]
            .prop_map(|value| ("title", value)),
        prop_oneof![
            Just(AnswerValue::bool(true)),
            Just(AnswerValue::bool(false)),
            Just(AnswerValue::Empty)
        ]
        .prop_map(|value| ("breach_occurred", value)),
        prop_oneof![Just(AnswerValue::text("Addresses")), Just(AnswerValue::Empty)]
            .prop_map(|value| ("affected_data", value)),
        prop_oneof![Just(AnswerValue::text("2024-04-02")), Just(AnswerValue::text("soon"))]
            .prop_map(|value| ("notified_on", value)),
        any::<bool>().prop_map(|flag| ("confirmed", AnswerValue::bool(flag))),
    ]
}

fn action_strategy() -> impl Strategy<Value = Action> {
    prop_oneof![
        3 => Just(Action::Next),
        1 => Just(Action::Back),
        1 => (0usize..5).prop_map(Action::Jump),
        4 => answer_strategy().prop_map(|(field, value)| Action::Set(field, value)),
    ]
}

fn assert_position(wizard: &WizardStateMachine) -> Result<(), TestCaseError> {
    let active = wizard.active_steps();
    prop_assert!(active.contains(&wizard.current_step_index()));
    prop_assert!(wizard.active_step_index() < active.len());
    prop_assert_eq!(active[wizard.active_step_index()], wizard.current_step_index());
    Ok(())
}

proptest! {
    /// The current step is always one of the active steps, whatever the renderer sends.
    #[test]
    fn current_step_stays_active(actions in prop::collection::vec(action_strategy(), 1..40)) {
        let mut wizard = wizard();
        for action in actions {
            match action {
                Action::Next => { let _ = wizard.next(); }
                Action::Back => { let _ = wizard.back(); }
                Action::Jump(step) => { let _ = wizard.jump_to(step); }
                Action::Set(field, value) => {
                    prop_assert!(wizard.set_answer(field, value).is_ok());
                }
            }
            assert_position(&wizard)?;
        }
    }

    /// Forward jumps only land on steps validated earlier in the session.
    #[test]
    fn forward_jumps_reach_only_validated_steps(
        actions in prop::collection::vec(action_strategy(), 1..40),
    ) {
        let mut wizard = wizard();
        for action in actions {
            let before = wizard.current_step_index();
            match action {
                Action::Jump(step) => {
                    let was_validated = wizard.is_validated(step);
                    match wizard.jump_to(step) {
                        Ok(()) if step > before => prop_assert!(was_validated),
                        Ok(()) => prop_assert_eq!(wizard.current_step_index(), step),
                        Err(_) => prop_assert_eq!(wizard.current_step_index(), before),
                    }
                }
                Action::Next => {
                    if let Err(StateError::StepInvalid { count }) = wizard.next() {
                        prop_assert!(count > 0);
                        prop_assert_eq!(wizard.current_step_index(), before);
                    }
                }
                Action::Back => { let _ = wizard.back(); }
                Action::Set(field, value) => { let _ = wizard.set_answer(field, value); }
            }
        }
    }
}
