//! Actor cells: one supervised task binding an actor to its mailbox.

pub mod lifecycle;
pub mod runner;

pub use lifecycle::CellState;
pub(crate) use runner::{spawn_cell, CellHandle};
