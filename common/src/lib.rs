//! A knowledge-based minesweeper agent.
//!
//! The agent never sees the mines. It is told, for every cell it reveals, how
//! many neighbours are mines, turns that into a [`Constraint`] and infers
//! whatever follows. Moves are picked from cells it has proven safe, falling
//! back to a random guess when logic runs out.

pub mod agent;
pub mod audit;
pub mod board;
pub mod constraint;
pub mod error;
pub mod facts;
pub mod game;

pub use agent::{Agent, InferenceReport, Move};
pub use audit::{Audit, Cardinality, DeducedState};
pub use board::{Environment, Minesweeper};
pub use constraint::Constraint;
pub use error::{Error, Result};
pub use facts::FactStore;
pub use game::{Game, GameState, Turn};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Represents a cell on the board by row and column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Point {
    pub row: usize,
    pub col: usize,
}

impl Point {
    /// Every cell of a `height` x `width` grid, row by row.
    pub fn grid(height: usize, width: usize) -> impl Iterator<Item = Point> {
        (0..height).flat_map(move |row| (0..width).map(move |col| Point { row, col }))
    }

    /// The up to eight in-bounds cells around this one.
    pub fn neighbors(self, height: usize, width: usize) -> impl Iterator<Item = Point> {
        (-1..=1).flat_map(move |dr| {
            (-1..=1).filter_map(move |dc| {
                if dr == 0 && dc == 0 {
                    return None;
                }

                let row = self.row as isize + dr;
                let col = self.col as isize + dc;

                if row >= 0 && row < height as isize && col >= 0 && col < width as isize {
                    Some(Point {
                        row: row as usize,
                        col: col as usize,
                    })
                } else {
                    None
                }
            })
        })
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}
