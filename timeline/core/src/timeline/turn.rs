//! Turn and Step Types
//!
//! A [`Turn`] is one assistant exchange as the user sees it: a live list of
//! progress [`Step`]s that collapses behind its final answer once the
//! exchange ends. Fields are private; only the reducer mutates turns, which
//! keeps the append-only and set-once rules in one place.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque turn identifier, stable for the turn's lifetime
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TurnId(pub String);

impl TurnId {
    /// Create a turn ID from a string
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a new unique turn ID
    #[must_use]
    pub fn generate() -> Self {
        Self(format!("turn_{}", Uuid::new_v4().simple()))
    }

    /// Get the string value
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TurnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One normalized unit of progress. Immutable once appended.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Step {
    /// Human-readable description, e.g. `lookup is starting`
    pub text: String,
    /// Arguments or result, rendered for display
    pub detail: Option<String>,
    /// Participant that produced this step
    pub participant: String,
    /// When the producer emitted the underlying event
    pub occurred_at: DateTime<Utc>,
}

/// Where a turn is in its lifecycle
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum TurnStatus {
    /// Still accumulating steps
    Active,
    /// Finalized by a summary or final answer
    Answered,
    /// Finalized because the upstream process is waiting on the user
    AwaitingInput,
    /// Force-finalized after the connection was lost for good or the upstream run failed
    Abandoned {
        /// Marker shown in place of an answer
        reason: String,
    },
}

/// One assistant exchange
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Turn {
    id: TurnId,
    initiating_participant: String,
    status: TurnStatus,
    current_step_text: Option<String>,
    steps: Vec<Step>,
    final_text: String,
    created_at: DateTime<Utc>,
}

impl Turn {
    /// Open a new active turn
    pub(crate) fn open(participant: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id: TurnId::generate(),
            initiating_participant: participant.into(),
            status: TurnStatus::Active,
            current_step_text: None,
            steps: Vec::new(),
            final_text: String::new(),
            created_at,
        }
    }

    /// A turn that is born finalized, holding only an answer
    pub(crate) fn answered(
        participant: impl Into<String>,
        final_text: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        let mut turn = Self::open(participant, created_at);
        turn.status = TurnStatus::Answered;
        turn.final_text = final_text.into();
        turn
    }

    /// Turn identifier
    #[must_use]
    pub fn id(&self) -> &TurnId {
        &self.id
    }

    /// The participant whose event opened this turn
    #[must_use]
    pub fn initiating_participant(&self) -> &str {
        &self.initiating_participant
    }

    /// Lifecycle status
    #[must_use]
    pub fn status(&self) -> &TurnStatus {
        &self.status
    }

    /// True while the turn is still accumulating steps
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == TurnStatus::Active
    }

    /// Most recent in-progress description; `None` once finalized
    #[must_use]
    pub fn current_step_text(&self) -> Option<&str> {
        self.current_step_text.as_deref()
    }

    /// Every step, in arrival order
    #[must_use]
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Terminal answer; empty until finalized with one
    #[must_use]
    pub fn final_text(&self) -> &str {
        &self.final_text
    }

    /// When the first event of this turn was emitted
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Append a step. Returns `false` (and changes nothing) once finalized.
    pub(crate) fn push_step(&mut self, step: Step) -> bool {
        if !self.is_active() {
            return false;
        }
        self.current_step_text = Some(step.text.clone());
        self.steps.push(step);
        true
    }

    pub(crate) fn finalize(&mut self, final_text: impl Into<String>) {
        self.status = TurnStatus::Answered;
        self.final_text = final_text.into();
        self.current_step_text = None;
    }

    /// Replace the answer of an already-answered turn
    pub(crate) fn replace_final_text(&mut self, final_text: impl Into<String>) {
        debug_assert_eq!(self.status, TurnStatus::Answered);
        self.final_text = final_text.into();
    }

    pub(crate) fn await_input(&mut self) {
        self.status = TurnStatus::AwaitingInput;
        self.current_step_text = None;
    }

    pub(crate) fn abandon(&mut self, reason: impl Into<String>) {
        self.status = TurnStatus::Abandoned {
            reason: reason.into(),
        };
        self.current_step_text = None;
    }
}
