//! Event builders shared by the reducer tests

use chrono::Utc;

use crate::classifier::ClassifiedEvent;
use crate::wire::EventKind;

fn event(kind: EventKind, participant: &str) -> ClassifiedEvent {
    ClassifiedEvent {
        kind,
        participant: participant.to_string(),
        capability: None,
        step_text: String::new(),
        final_text: None,
        detail: None,
        is_final: matches!(
            kind,
            EventKind::Summary | EventKind::FinalAnswer | EventKind::InputRequested
        ),
        occurred_at: Utc::now(),
        correlation: None,
    }
}

pub(crate) fn request(participant: &str, capability: &str) -> ClassifiedEvent {
    ClassifiedEvent {
        capability: Some(capability.to_string()),
        step_text: format!("{capability} is starting"),
        ..event(EventKind::Request, participant)
    }
}

pub(crate) fn execution(participant: &str, capability: &str) -> ClassifiedEvent {
    ClassifiedEvent {
        capability: Some(capability.to_string()),
        step_text: format!("{capability} has run"),
        ..event(EventKind::Execution, participant)
    }
}

pub(crate) fn summary(participant: &str, text: &str) -> ClassifiedEvent {
    ClassifiedEvent {
        final_text: Some(text.to_string()),
        ..event(EventKind::Summary, participant)
    }
}

pub(crate) fn final_answer(participant: &str, text: &str) -> ClassifiedEvent {
    ClassifiedEvent {
        final_text: Some(text.to_string()),
        ..event(EventKind::FinalAnswer, participant)
    }
}

pub(crate) fn input_requested(participant: &str) -> ClassifiedEvent {
    event(EventKind::InputRequested, participant)
}

pub(crate) fn task_completed() -> ClassifiedEvent {
    event(EventKind::TaskCompleted, "system")
}

pub(crate) fn upstream_error(message: &str) -> ClassifiedEvent {
    ClassifiedEvent {
        detail: Some(message.to_string()),
        ..event(EventKind::UpstreamError, "system")
    }
}
