//! Timeline Rendering
//!
//! Turns session updates into plain terminal text. The CLI is a thin client:
//! everything it prints is derived from a [`TurnChange`], a
//! [`ConnectionStatus`] or a [`TurnStore`] snapshot.
//!
//! While a turn is active each step prints as its own line. When the turn
//! finalizes it collapses to a single `▸ thought for N steps (/expand K)`
//! line followed by the wrapped answer.

use textwrap::{Options, WrapAlgorithm};
use timeline_core::{ConnectionStatus, Turn, TurnChange, TurnStatus, TurnStore};

/// Narrowest wrap width accepted
pub const MIN_WIDTH: usize = 20;

const ANSWER_INDENT: &str = "  ";
const DETAIL_INDENT: &str = "       ";

/// Renders session output at a fixed width
#[derive(Clone, Debug)]
pub struct Display {
    width: usize,
}

impl Display {
    /// Create a renderer wrapping answers at `width` columns
    pub fn new(width: usize) -> Self {
        Self {
            width: width.max(MIN_WIDTH),
        }
    }

    /// Text for one timeline change, if it has any visible effect
    ///
    /// `store` must be a snapshot taken after the change was applied.
    pub fn turn_change(&self, change: &TurnChange, store: &TurnStore) -> Option<String> {
        match change {
            TurnChange::Started {
                turn_id,
                participant,
            } => {
                // A turn born with its answer never had a thinking phase
                let turn = store.get(turn_id)?;
                let born_answered = turn.steps().is_empty() && !turn.is_active();
                (!born_answered).then(|| format!("● {participant} is thinking"))
            }
            TurnChange::StepAppended { step, .. } => Some(format!("  · {}", step.text)),
            TurnChange::Finalized {
                turn_id,
                final_text,
                ..
            } => {
                let position = store.position(turn_id)?;
                let turn = store.nth(position)?;
                Some(self.answered(turn, position + 1, final_text))
            }
            TurnChange::Overridden { final_text, .. } => {
                Some(format!("▸ revised answer\n{}", self.wrap(final_text)))
            }
            TurnChange::AwaitingInput { turn_id } => {
                let position = store.position(turn_id)?;
                let turn = store.nth(position)?;
                Some(self.ended(turn, position + 1, "waiting for your input"))
            }
            TurnChange::Abandoned { turn_id, reason } => {
                let position = store.position(turn_id)?;
                let turn = store.nth(position)?;
                Some(self.ended(turn, position + 1, &format!("✗ {reason}")))
            }
            TurnChange::ProducingChanged(_) => None,
        }
    }

    /// Status line for a connection change
    pub fn connection(&self, status: &ConnectionStatus) -> String {
        match status {
            ConnectionStatus::Connected => "● connected".to_string(),
            ConnectionStatus::Reconnecting { attempt, delay } => format!(
                "… connection lost, retry {attempt} in {} ms",
                delay.as_millis()
            ),
            ConnectionStatus::Disconnected { intentional: true } => "○ disconnected".to_string(),
            ConnectionStatus::Disconnected { intentional: false } => {
                "○ connection dropped".to_string()
            }
            ConnectionStatus::Failed => {
                "✗ could not reconnect, type /reconnect to try again".to_string()
            }
        }
    }

    /// A failure the user should see
    pub fn failure(&self, message: &str) -> String {
        format!("✗ {message}")
    }

    /// Every step of turn `number` (1-based), or of the latest turn
    ///
    /// # Errors
    ///
    /// Returns a printable message when there is no such turn.
    pub fn expand(&self, store: &TurnStore, number: Option<usize>) -> Result<String, String> {
        let number = match number {
            Some(n) => n,
            None if store.is_empty() => return Err("no turns yet".to_string()),
            None => store.len(),
        };
        let turn = number
            .checked_sub(1)
            .and_then(|i| store.nth(i))
            .ok_or_else(|| format!("no turn {number} (there are {})", store.len()))?;

        let mut lines = vec![format!(
            "turn {number} · {} · {}",
            turn.initiating_participant(),
            status_label(turn.status())
        )];
        for (i, step) in turn.steps().iter().enumerate() {
            lines.push(format!("  {}. {}", i + 1, step.text));
            if let Some(detail) = &step.detail {
                lines.extend(detail.lines().map(|l| format!("{DETAIL_INDENT}{l}")));
            }
        }
        if !turn.final_text().is_empty() {
            lines.push("answer:".to_string());
            lines.push(self.wrap(turn.final_text()));
        }
        Ok(lines.join("\n"))
    }

    /// One line per turn
    pub fn turn_list(&self, store: &TurnStore) -> String {
        if store.is_empty() {
            return "no turns yet".to_string();
        }
        store
            .iter()
            .enumerate()
            .map(|(i, turn)| {
                format!(
                    "  {}. {} · {} · {}",
                    i + 1,
                    turn.initiating_participant(),
                    step_count(turn.steps().len()),
                    status_label(turn.status())
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn answered(&self, turn: &Turn, number: usize, final_text: &str) -> String {
        let answer = self.wrap(final_text);
        match collapsed(turn, number) {
            Some(header) => format!("{header}\n{answer}"),
            None => answer,
        }
    }

    fn ended(&self, turn: &Turn, number: usize, note: &str) -> String {
        let note = format!("{ANSWER_INDENT}{note}");
        match collapsed(turn, number) {
            Some(header) => format!("{header}\n{note}"),
            None => note,
        }
    }

    fn wrap(&self, text: &str) -> String {
        let options = Options::new(self.width)
            .initial_indent(ANSWER_INDENT)
            .subsequent_indent(ANSWER_INDENT)
            .wrap_algorithm(WrapAlgorithm::FirstFit);
        textwrap::fill(text.trim(), options)
    }
}

/// Collapsed header for a finished turn; `None` when it had no steps
fn collapsed(turn: &Turn, number: usize) -> Option<String> {
    let steps = turn.steps().len();
    (steps > 0).then(|| format!("▸ thought for {} (/expand {number})", step_count(steps)))
}

fn step_count(n: usize) -> String {
    if n == 1 {
        "1 step".to_string()
    } else {
        format!("{n} steps")
    }
}

fn status_label(status: &TurnStatus) -> &str {
    match status {
        TurnStatus::Active => "thinking",
        TurnStatus::Answered => "answered",
        TurnStatus::AwaitingInput => "awaiting input",
        TurnStatus::Abandoned { reason } => reason,
    }
}
