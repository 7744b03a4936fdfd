//! Event Classifier
//!
//! Turns one decoded [`InboundFrame`] into a [`ClassifiedEvent`]: the kind
//! from the closed [`EventKind`] set, plus canonical display text and an
//! optional detail blob.
//!
//! | kind             | step text                    | detail               |
//! |------------------|------------------------------|----------------------|
//! | `Request`        | `<capability> is starting`   | call arguments       |
//! | `Execution`      | `<capability> has run`       | execution result     |
//! | `Summary`        | none, text becomes the answer | none                 |
//! | `FinalAnswer`    | none, text becomes the answer | none                 |
//! | `InputRequested` | none                         | none                 |
//! | `TaskCompleted`  | none                         | none                 |
//! | `UpstreamError`  | none                         | error message        |
//!
//! A frame whose content no strategy can normalize is a
//! [`ClassifyError::Malformed`]. Callers log and drop it; the stream keeps
//! flowing.

pub mod normalize;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::wire::{EventKind, InboundFrame, WireError};

pub use normalize::{Extract, Extracted, PayloadShape, CAPABILITY_PLACEHOLDER};

/// Why a frame could not be classified
#[derive(Debug, Error)]
pub enum ClassifyError {
    /// The frame text itself could not be decoded
    #[error("Malformed frame: {0}")]
    Wire(#[from] WireError),

    /// The frame decoded but its content matches no normalization rule
    #[error("Malformed {kind:?} event from '{participant}': {reason}")]
    Malformed {
        /// Kind the frame was tagged with
        kind: EventKind,
        /// Participant that sent it
        participant: String,
        /// What was wrong
        reason: String,
    },
}

/// One event, normalized for the turn reducer
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ClassifiedEvent {
    /// Kind from the closed set
    pub kind: EventKind,
    /// Participant that emitted the event
    pub participant: String,
    /// Capability named by a request or execution
    pub capability: Option<String>,
    /// Progress description; empty for kinds that produce no step
    pub step_text: String,
    /// Answer text carried by `Summary` and `FinalAnswer`
    pub final_text: Option<String>,
    /// Arguments or result, rendered for display
    pub detail: Option<String>,
    /// Whether this event (provisionally, for `Summary`) ends the turn
    pub is_final: bool,
    /// When the producer emitted it (receive time if it did not say)
    pub occurred_at: DateTime<Utc>,
    /// Upstream correlation id
    pub correlation: Option<String>,
}

impl ClassifiedEvent {
    fn bare(kind: EventKind, frame: &InboundFrame) -> Self {
        Self {
            kind,
            participant: frame.source.clone(),
            capability: None,
            step_text: String::new(),
            final_text: None,
            detail: None,
            is_final: matches!(
                kind,
                EventKind::Summary | EventKind::FinalAnswer | EventKind::InputRequested
            ),
            occurred_at: frame.occurred_at().unwrap_or_else(Utc::now),
            correlation: frame.request_id.clone(),
        }
    }
}

/// Decode and classify one text frame
///
/// Returns `Ok(None)` for frames outside the closed kind set (unknown or
/// missing `type`, or the user's own message echoed back).
///
/// # Errors
///
/// Returns [`ClassifyError`] when the frame is not a JSON object or its
/// content cannot be normalized.
pub fn classify_text(text: &str) -> Result<Option<ClassifiedEvent>, ClassifyError> {
    let frame = InboundFrame::decode(text)?;
    classify(&frame)
}

/// Classify one decoded frame
///
/// # Errors
///
/// Returns [`ClassifyError::Malformed`] when a content-bearing kind arrives
/// with content no strategy can normalize.
pub fn classify(frame: &InboundFrame) -> Result<Option<ClassifiedEvent>, ClassifyError> {
    let Some(kind) = frame.kind() else {
        tracing::trace!(tag = ?frame.tag, source = %frame.source, "Ignoring unmapped frame");
        return Ok(None);
    };

    let mut event = ClassifiedEvent::bare(kind, frame);
    if kind == EventKind::UpstreamError {
        event.detail = PayloadShape::of(&frame.content)
            .and_then(|shape| shape.extract(Extract::Text).body)
            .filter(|message| !message.trim().is_empty());
        return Ok(Some(event));
    }
    if !kind.carries_content() {
        return Ok(Some(event));
    }

    let shape = PayloadShape::of(&frame.content).ok_or_else(|| ClassifyError::Malformed {
        kind,
        participant: frame.source.clone(),
        reason: "content is missing or null".to_string(),
    })?;

    match kind {
        EventKind::Request => {
            let extracted = shape.extract(Extract::Arguments);
            let capability = capability_or_placeholder(extracted.capability);
            event.step_text = format!("{capability} is starting");
            event.capability = Some(capability);
            event.detail = extracted.body;
        }
        EventKind::Execution => {
            let extracted = shape.extract(Extract::Result);
            let capability = capability_or_placeholder(extracted.capability);
            event.step_text = if extracted.failed {
                format!("{capability} has run (failed)")
            } else {
                format!("{capability} has run")
            };
            event.capability = Some(capability);
            event.detail = extracted.body;
        }
        EventKind::Summary | EventKind::FinalAnswer => {
            // Blank text survives as "" so the reducer can apply its drop rule
            event.final_text = Some(shape.extract(Extract::Text).body.unwrap_or_default());
        }
        EventKind::InputRequested | EventKind::TaskCompleted | EventKind::UpstreamError => {}
    }

    Ok(Some(event))
}

fn capability_or_placeholder(name: Option<String>) -> String {
    name.unwrap_or_else(|| CAPABILITY_PLACEHOLDER.to_string())
}
