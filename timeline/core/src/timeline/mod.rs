//! Timeline
//!
//! The conversation as a sequence of [`Turn`]s, built by the
//! [`TurnReducer`] from classified events.

mod reducer;
mod store;
mod turn;

#[cfg(test)]
pub(crate) mod fixtures;
#[cfg(test)]
mod proptests;

pub use reducer::{TurnChange, TurnReducer, UPSTREAM_ERROR};
pub use store::TurnStore;
pub use turn::{Step, Turn, TurnId, TurnStatus};
