//! Turn Store
//!
//! Ordered turns for one conversation. Read-only to everyone except the
//! [`TurnReducer`](super::TurnReducer).

use std::collections::HashMap;

use serde::Serialize;

use super::turn::{Turn, TurnId};

/// Ordered collection of turns, indexed by id
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct TurnStore {
    turns: Vec<Turn>,
    #[serde(skip)]
    index: HashMap<TurnId, usize>,
}

impl TurnStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of turns
    #[must_use]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Whether the store holds no turns
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Look a turn up by id
    #[must_use]
    pub fn get(&self, id: &TurnId) -> Option<&Turn> {
        self.index.get(id).map(|&pos| &self.turns[pos])
    }

    /// Turn at a position (0 = oldest)
    #[must_use]
    pub fn nth(&self, position: usize) -> Option<&Turn> {
        self.turns.get(position)
    }

    /// Position of a turn in creation order
    #[must_use]
    pub fn position(&self, id: &TurnId) -> Option<usize> {
        self.index.get(id).copied()
    }

    /// Most recently created turn
    #[must_use]
    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    /// The turn still accumulating steps, if any
    #[must_use]
    pub fn active(&self) -> Option<&Turn> {
        self.turns.iter().rev().find(|t| t.is_active())
    }

    /// Iterate in creation order
    pub fn iter(&self) -> std::slice::Iter<'_, Turn> {
        self.turns.iter()
    }

    pub(crate) fn insert(&mut self, turn: Turn) -> &mut Turn {
        let pos = self.turns.len();
        self.index.insert(turn.id().clone(), pos);
        self.turns.push(turn);
        &mut self.turns[pos]
    }

    pub(crate) fn get_mut(&mut self, id: &TurnId) -> Option<&mut Turn> {
        let pos = *self.index.get(id)?;
        self.turns.get_mut(pos)
    }
}

impl<'a> IntoIterator for &'a TurnStore {
    type Item = &'a Turn;
    type IntoIter = std::slice::Iter<'a, Turn>;

    fn into_iter(self) -> Self::IntoIter {
        self.turns.iter()
    }
}
