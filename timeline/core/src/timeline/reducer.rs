//! Turn Reducer
//!
//! Folds classified events, strictly in arrival order, into the
//! [`TurnStore`]. The reducer owns the only "current turn" cursor; nothing
//! else writes turns.
//!
//! # Cursor
//!
//! ```text
//!   Idle ──request──▶ Active ──summary──▶ Provisional
//!                     │  ▲                  │
//!                     └──┘ request,         │ finalAnswer, inputRequested,
//!                          execution        │ taskCompleted, a user request
//!                                           │ or a request opening a new turn
//!   Active ──finalAnswer / inputRequested / error / abandon──▶ Idle
//! ```
//!
//! `Provisional` is the override window: the turn is already finalized by a
//! summary, but a following non-blank final answer replaces its text instead
//! of opening a second turn. The window never outlives its exchange: the end
//! of the run or the next user request closes it.

use serde::Serialize;

use super::store::TurnStore;
use super::turn::{Step, Turn, TurnId};
use crate::classifier::ClassifiedEvent;
use crate::wire::EventKind;

/// Marker recorded on a turn cut short by an upstream `error` frame
pub const UPSTREAM_ERROR: &str = "upstream error";

/// Which turn, if any, incoming events attach to
#[derive(Clone, Debug, Default, PartialEq, Eq)]
enum Cursor {
    #[default]
    Idle,
    Active(TurnId),
    Provisional(TurnId),
}

/// An incremental change to the timeline, for surfaces to render
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum TurnChange {
    /// A new turn was created
    Started {
        /// New turn
        turn_id: TurnId,
        /// Root participant
        participant: String,
    },
    /// A step was appended to the active turn
    StepAppended {
        /// Turn the step belongs to
        turn_id: TurnId,
        /// Position of the step within the turn
        index: usize,
        /// The step itself
        step: Step,
    },
    /// A turn received its answer
    Finalized {
        /// Finalized turn
        turn_id: TurnId,
        /// The answer
        final_text: String,
        /// True when a later final answer may still replace the text
        provisional: bool,
    },
    /// A provisional answer was replaced
    Overridden {
        /// Affected turn
        turn_id: TurnId,
        /// Replacement answer
        final_text: String,
    },
    /// A turn ended because the upstream is waiting on the user
    AwaitingInput {
        /// Finalized turn
        turn_id: TurnId,
    },
    /// A turn was force-finalized by the caller
    Abandoned {
        /// Finalized turn
        turn_id: TurnId,
        /// Marker text
        reason: String,
    },
    /// The "assistant is still producing" flag flipped
    ProducingChanged(bool),
}

/// The turn state machine
#[derive(Debug, Default)]
pub struct TurnReducer {
    store: TurnStore,
    cursor: Cursor,
    root_participant: Option<String>,
    producing: bool,
}

impl TurnReducer {
    /// Create a reducer over an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Read-only view of every turn
    #[must_use]
    pub fn store(&self) -> &TurnStore {
        &self.store
    }

    /// The turn incoming events currently attach to (active, or inside the
    /// override window)
    #[must_use]
    pub fn current_turn(&self) -> Option<&Turn> {
        match &self.cursor {
            Cursor::Idle => None,
            Cursor::Active(id) | Cursor::Provisional(id) => self.store.get(id),
        }
    }

    /// Participant that opened the tracked turn
    #[must_use]
    pub fn root_participant(&self) -> Option<&str> {
        self.root_participant.as_deref()
    }

    /// Whether the assistant is still producing output
    #[must_use]
    pub fn is_producing(&self) -> bool {
        self.producing
    }

    /// Whether a summary's answer can still be replaced
    #[must_use]
    pub fn override_window_open(&self) -> bool {
        matches!(self.cursor, Cursor::Provisional(_))
    }

    /// Apply one event. Returns what changed, in order.
    pub fn apply(&mut self, event: ClassifiedEvent) -> Vec<TurnChange> {
        let mut changes = Vec::new();
        match event.kind {
            EventKind::Request => {
                self.mark_producing(&mut changes);
                self.on_request(event, &mut changes);
            }
            EventKind::Execution => {
                self.mark_producing(&mut changes);
                self.on_execution(event, &mut changes);
            }
            EventKind::Summary => {
                self.mark_producing(&mut changes);
                self.on_summary(event, &mut changes);
            }
            EventKind::FinalAnswer => {
                self.mark_producing(&mut changes);
                self.on_final_answer(event, &mut changes);
            }
            EventKind::InputRequested => {
                self.on_input_requested(&mut changes);
                self.clear_producing(&mut changes);
            }
            EventKind::TaskCompleted => {
                self.close_override_window("run completed");
                self.clear_producing(&mut changes);
            }
            EventKind::UpstreamError => {
                tracing::warn!(
                    error = event.detail.as_deref().unwrap_or_default(),
                    "Upstream run failed"
                );
                changes = self.abandon_active(UPSTREAM_ERROR);
            }
        }
        changes
    }

    /// Record that the user just submitted a request
    ///
    /// Starts a new exchange: a summary from the previous one can no longer
    /// be replaced.
    pub fn note_user_request(&mut self) -> Option<TurnChange> {
        self.close_override_window("user request");
        let mut changes = Vec::new();
        self.mark_producing(&mut changes);
        changes.pop()
    }

    /// Force-finalize the active turn with a marker instead of an answer
    ///
    /// Used when the connection is lost for good mid-turn. A turn already
    /// inside the override window has its answer and is left alone.
    pub fn abandon_active(&mut self, reason: &str) -> Vec<TurnChange> {
        let mut changes = Vec::new();
        match std::mem::take(&mut self.cursor) {
            Cursor::Active(id) => {
                if let Some(turn) = self.store.get_mut(&id) {
                    turn.abandon(reason);
                    tracing::warn!(turn_id = %id, reason, "Turn abandoned");
                    changes.push(TurnChange::Abandoned {
                        turn_id: id,
                        reason: reason.to_string(),
                    });
                }
            }
            Cursor::Provisional(_) | Cursor::Idle => {}
        }
        self.root_participant = None;
        self.clear_producing(&mut changes);
        changes
    }

    fn on_request(&mut self, event: ClassifiedEvent, changes: &mut Vec<TurnChange>) {
        let existing = match &self.cursor {
            Cursor::Active(id) => Some(id.clone()),
            Cursor::Provisional(previous) => {
                tracing::debug!(turn_id = %previous, "Override window closed by new request");
                None
            }
            Cursor::Idle => None,
        };

        let id = match existing {
            Some(id) => id,
            None => {
                let turn = self
                    .store
                    .insert(Turn::open(&event.participant, event.occurred_at));
                let id = turn.id().clone();
                tracing::debug!(turn_id = %id, participant = %event.participant, "Turn started");

                self.cursor = Cursor::Active(id.clone());
                self.root_participant = Some(event.participant.clone());
                changes.push(TurnChange::Started {
                    turn_id: id.clone(),
                    participant: event.participant.clone(),
                });
                id
            }
        };
        self.append_step(id, event, changes);
    }

    fn on_execution(&mut self, event: ClassifiedEvent, changes: &mut Vec<TurnChange>) {
        match &self.cursor {
            Cursor::Active(id) => {
                let id = id.clone();
                self.append_step(id, event, changes);
            }
            Cursor::Idle | Cursor::Provisional(_) => {
                tracing::debug!(
                    participant = %event.participant,
                    step = %event.step_text,
                    "Dropping execution with no active turn"
                );
            }
        }
    }

    fn on_summary(&mut self, event: ClassifiedEvent, changes: &mut Vec<TurnChange>) {
        let Some(text) = answer_text(&event) else {
            tracing::debug!(participant = %event.participant, "Dropping blank summary");
            return;
        };

        match self.cursor.clone() {
            Cursor::Active(id) => {
                if let Some(turn) = self.store.get_mut(&id) {
                    turn.finalize(&text);
                }
                tracing::debug!(turn_id = %id, "Turn provisionally finalized by summary");
                self.cursor = Cursor::Provisional(id.clone());
                changes.push(TurnChange::Finalized {
                    turn_id: id,
                    final_text: text,
                    provisional: true,
                });
            }
            Cursor::Provisional(id) => {
                if let Some(turn) = self.store.get_mut(&id) {
                    turn.replace_final_text(&text);
                }
                changes.push(TurnChange::Overridden {
                    turn_id: id,
                    final_text: text,
                });
            }
            Cursor::Idle => {
                let id = self.insert_answered(&event, &text, changes);
                self.cursor = Cursor::Provisional(id.clone());
                changes.push(TurnChange::Finalized {
                    turn_id: id,
                    final_text: text,
                    provisional: true,
                });
            }
        }
    }

    fn on_final_answer(&mut self, event: ClassifiedEvent, changes: &mut Vec<TurnChange>) {
        let Some(text) = answer_text(&event) else {
            tracing::debug!(participant = %event.participant, "Dropping blank final answer");
            return;
        };

        match std::mem::take(&mut self.cursor) {
            Cursor::Provisional(id) => {
                if let Some(turn) = self.store.get_mut(&id) {
                    turn.replace_final_text(&text);
                }
                tracing::debug!(turn_id = %id, "Provisional answer overridden");
                changes.push(TurnChange::Overridden {
                    turn_id: id,
                    final_text: text,
                });
            }
            Cursor::Active(id) => {
                if let Some(turn) = self.store.get_mut(&id) {
                    turn.finalize(&text);
                }
                tracing::debug!(turn_id = %id, "Turn finalized");
                changes.push(TurnChange::Finalized {
                    turn_id: id,
                    final_text: text,
                    provisional: false,
                });
            }
            Cursor::Idle => {
                let id = self.insert_answered(&event, &text, changes);
                changes.push(TurnChange::Finalized {
                    turn_id: id,
                    final_text: text,
                    provisional: false,
                });
            }
        }
        self.root_participant = None;
    }

    fn on_input_requested(&mut self, changes: &mut Vec<TurnChange>) {
        match std::mem::take(&mut self.cursor) {
            Cursor::Active(id) => {
                if let Some(turn) = self.store.get_mut(&id) {
                    turn.await_input();
                }
                tracing::debug!(turn_id = %id, "Turn awaiting user input");
                changes.push(TurnChange::AwaitingInput { turn_id: id });
            }
            Cursor::Provisional(id) => {
                tracing::debug!(turn_id = %id, "Override window closed by input request");
            }
            Cursor::Idle => {}
        }
        self.root_participant = None;
    }

    /// End the exchange a provisional answer belongs to
    fn close_override_window(&mut self, cause: &str) {
        if let Cursor::Provisional(id) = &self.cursor {
            tracing::debug!(turn_id = %id, cause, "Override window closed");
            self.cursor = Cursor::Idle;
            self.root_participant = None;
        }
    }

    fn append_step(&mut self, id: TurnId, event: ClassifiedEvent, changes: &mut Vec<TurnChange>) {
        let Some(turn) = self.store.get_mut(&id) else {
            return;
        };
        let step = Step {
            text: event.step_text,
            detail: event.detail,
            participant: event.participant,
            occurred_at: event.occurred_at,
        };
        if turn.push_step(step.clone()) {
            changes.push(TurnChange::StepAppended {
                turn_id: id,
                index: turn.steps().len() - 1,
                step,
            });
        }
    }

    fn insert_answered(
        &mut self,
        event: &ClassifiedEvent,
        text: &str,
        changes: &mut Vec<TurnChange>,
    ) -> TurnId {
        let turn = self
            .store
            .insert(Turn::answered(&event.participant, text, event.occurred_at));
        let id = turn.id().clone();
        tracing::debug!(turn_id = %id, participant = %event.participant, "Answer with no turn, created finalized turn");
        self.root_participant = Some(event.participant.clone());
        changes.push(TurnChange::Started {
            turn_id: id.clone(),
            participant: event.participant.clone(),
        });
        id
    }

    fn mark_producing(&mut self, changes: &mut Vec<TurnChange>) {
        if !self.producing {
            self.producing = true;
            changes.push(TurnChange::ProducingChanged(true));
        }
    }

    fn clear_producing(&mut self, changes: &mut Vec<TurnChange>) {
        if self.producing {
            self.producing = false;
            changes.push(TurnChange::ProducingChanged(false));
        }
    }
}

/// Non-blank answer text carried by a summary or final answer
fn answer_text(event: &ClassifiedEvent) -> Option<String> {
    event
        .final_text
        .as_deref()
        .filter(|text| !text.trim().is_empty())
        .map(str::to_string)
}
