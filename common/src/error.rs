//! Error types for the inference engine and the game session around it.

use crate::Point;
use thiserror::Error;

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// A coordinate outside the grid was handed to the engine.
    #[error("{point} is outside the {height}x{width} grid")]
    OutOfBounds {
        point: Point,
        height: usize,
        width: usize,
    },

    /// A constraint claims more mines than it has cells.
    #[error("constraint over {cells} cells cannot hold {count} mines")]
    InvalidConstraint { cells: usize, count: usize },

    /// The reported count is smaller than the mines already known around the cell.
    #[error("{point} reports {reported} neighbouring mines but {known_mines} are already known")]
    InconsistentObservation {
        point: Point,
        reported: usize,
        known_mines: usize,
    },

    /// A cell would be recorded as both a mine and safe.
    #[error("{point} cannot be both a mine and safe")]
    Contradiction { point: Point },

    #[error("a {height}x{width} board cannot hold {mines} mines")]
    InvalidBoard {
        height: usize,
        width: usize,
        mines: usize,
    },

    #[error("game_ended")]
    GameOver,

    #[error("codec error: {0}")]
    Codec(#[from] bcs::Error),
}
