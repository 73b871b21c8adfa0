use crate::{Error, Point, Result};
use itertools::Itertools;
use rand::Rng;
use rand::seq::IteratorRandom;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// What the agent may ask of the world it plays in.
pub trait Environment {
    fn height(&self) -> usize;
    fn width(&self) -> usize;

    fn in_bounds(&self, point: Point) -> bool {
        point.row < self.height() && point.col < self.width()
    }

    /// The number of mines around `point`, not counting `point` itself.
    fn neighbor_mine_count(&self, point: Point) -> usize;
}

/// A board with hidden mines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawBoard")]
pub struct Minesweeper {
    pub height: usize,
    pub width: usize,
    mines: HashSet<Point>,
}

/// Wire form of [`Minesweeper`], validated like [`Minesweeper::with_mines`].
#[derive(Deserialize)]
struct RawBoard {
    height: usize,
    width: usize,
    mines: HashSet<Point>,
}

impl TryFrom<RawBoard> for Minesweeper {
    type Error = Error;

    fn try_from(raw: RawBoard) -> Result<Self> {
        Minesweeper::with_mines(raw.height, raw.width, raw.mines)
    }
}

impl Minesweeper {
    /// Places `mines` mines uniformly at random.
    pub fn new<R: Rng + ?Sized>(
        height: usize,
        width: usize,
        mines: usize,
        rng: &mut R,
    ) -> Result<Self> {
        if height == 0 || width == 0 || mines >= height * width {
            return Err(Error::InvalidBoard { height, width, mines });
        }

        let mines = Point::grid(height, width).choose_multiple(rng, mines);
        Ok(Minesweeper {
            height,
            width,
            mines: mines.into_iter().collect(),
        })
    }

    /// Builds a board with a fixed layout.
    pub fn with_mines(
        height: usize,
        width: usize,
        mines: impl IntoIterator<Item = Point>,
    ) -> Result<Self> {
        let mines: HashSet<Point> = mines.into_iter().collect();
        let board = Minesweeper { height, width, mines };
        if height == 0 || width == 0 || board.mines.len() >= height * width {
            return Err(Error::InvalidBoard {
                height,
                width,
                mines: board.mines.len(),
            });
        }
        if let Some(&point) = board.mines.iter().find(|&&p| !board.in_bounds(p)) {
            return Err(Error::OutOfBounds { point, height, width });
        }
        Ok(board)
    }

    pub fn mines(&self) -> &HashSet<Point> {
        &self.mines
    }

    pub fn is_mine(&self, point: Point) -> bool {
        self.mines.contains(&point)
    }

    pub fn nearby_mines(&self, point: Point) -> usize {
        point
            .neighbors(self.height, self.width)
            .filter(|n| self.mines.contains(n))
            .count()
    }

    /// The board is won once exactly the mines have been flagged.
    pub fn won(&self, flags: &HashSet<Point>) -> bool {
        *flags == self.mines
    }

    /// Row-major dump of the layout, `X` for a mine.
    pub fn layout(&self) -> String {
        (0..self.height)
            .map(|row| {
                (0..self.width)
                    .map(|col| if self.is_mine(Point { row, col }) { 'X' } else { '.' })
                    .collect::<String>()
            })
            .join("\n")
    }
}

impl Environment for Minesweeper {
    fn height(&self) -> usize {
        self.height
    }

    fn width(&self) -> usize {
        self.width
    }

    fn neighbor_mine_count(&self, point: Point) -> usize {
        self.nearby_mines(point)
    }
}
