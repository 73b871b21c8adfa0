use crate::{Error, Point, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Everything the agent knows for certain. All three sets only ever grow,
/// and no cell is ever both a known mine and known safe.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactStore {
    known_mines: HashSet<Point>,
    known_safes: HashSet<Point>,
    acted_on: HashSet<Point>,
}

impl FactStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn known_mines(&self) -> &HashSet<Point> {
        &self.known_mines
    }

    pub fn known_safes(&self) -> &HashSet<Point> {
        &self.known_safes
    }

    pub fn acted_on(&self) -> &HashSet<Point> {
        &self.acted_on
    }

    pub fn is_mine(&self, cell: Point) -> bool {
        self.known_mines.contains(&cell)
    }

    pub fn is_safe(&self, cell: Point) -> bool {
        self.known_safes.contains(&cell)
    }

    pub fn is_acted_on(&self, cell: Point) -> bool {
        self.acted_on.contains(&cell)
    }

    /// Records a mine. Returns whether the fact is new.
    pub fn record_mine(&mut self, cell: Point) -> Result<bool> {
        if self.known_safes.contains(&cell) {
            return Err(Error::Contradiction { point: cell });
        }
        Ok(self.known_mines.insert(cell))
    }

    /// Records a safe cell. Returns whether the fact is new.
    pub fn record_safe(&mut self, cell: Point) -> Result<bool> {
        if self.known_mines.contains(&cell) {
            return Err(Error::Contradiction { point: cell });
        }
        Ok(self.known_safes.insert(cell))
    }

    pub fn record_move(&mut self, cell: Point) -> bool {
        self.acted_on.insert(cell)
    }

    /// Known safe cells that have not been played yet.
    pub fn unplayed_safes(&self) -> impl Iterator<Item = Point> + '_ {
        self.known_safes.difference(&self.acted_on).copied()
    }
}
