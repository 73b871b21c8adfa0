use crate::{Error, Point, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};

/// A logical statement about the board: exactly `count` of `cells` are mines.
///
/// A constraint shrinks as facts are fed into it. Once every cell has been
/// accounted for, the cells it could prove end up in `resolved_mines` or
/// `resolved_safes` and the constraint is resolved for good.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "RawConstraint")]
pub struct Constraint {
    /// The cells whose state this constraint has not determined yet.
    cells: BTreeSet<Point>,
    /// The number of mines among `cells`.
    count: usize,
    resolved_mines: BTreeSet<Point>,
    resolved_safes: BTreeSet<Point>,
}

/// Wire form of [`Constraint`], checked before it becomes one.
#[derive(Deserialize)]
struct RawConstraint {
    cells: BTreeSet<Point>,
    count: usize,
    resolved_mines: BTreeSet<Point>,
    resolved_safes: BTreeSet<Point>,
}

impl TryFrom<RawConstraint> for Constraint {
    type Error = Error;

    /// Only reduced constraints are accepted: open ones hold
    /// `0 < count < |cells|`, resolved ones a zero count.
    fn try_from(raw: RawConstraint) -> Result<Self> {
        let reduced = if raw.cells.is_empty() {
            raw.count == 0
        } else {
            raw.count > 0 && raw.count < raw.cells.len()
        };
        if !reduced {
            return Err(Error::InvalidConstraint {
                cells: raw.cells.len(),
                count: raw.count,
            });
        }

        Ok(Constraint {
            cells: raw.cells,
            count: raw.count,
            resolved_mines: raw.resolved_mines,
            resolved_safes: raw.resolved_safes,
        })
    }
}

impl Constraint {
    /// Builds a constraint and immediately reduces it.
    ///
    /// Fails if `count` exceeds the number of distinct cells.
    pub fn new(cells: impl IntoIterator<Item = Point>, count: usize) -> Result<Self> {
        let cells: BTreeSet<Point> = cells.into_iter().collect();
        if count > cells.len() {
            return Err(Error::InvalidConstraint {
                cells: cells.len(),
                count,
            });
        }

        let mut constraint = Constraint {
            cells,
            count,
            resolved_mines: BTreeSet::new(),
            resolved_safes: BTreeSet::new(),
        };
        constraint.reduce();
        Ok(constraint)
    }

    pub fn cells(&self) -> &BTreeSet<Point> {
        &self.cells
    }

    pub fn count(&self) -> usize {
        self.count
    }

    /// Mines proven at the moment this constraint resolved.
    pub fn resolved_mines(&self) -> &BTreeSet<Point> {
        &self.resolved_mines
    }

    /// Safe cells proven at the moment this constraint resolved.
    pub fn resolved_safes(&self) -> &BTreeSet<Point> {
        &self.resolved_safes
    }

    pub fn is_resolved(&self) -> bool {
        self.cells.is_empty()
    }

    /// Removes a cell known to be a mine. It was one of the counted mines.
    pub fn mark_mine(&mut self, cell: Point) {
        if self.cells.remove(&cell) {
            // A reduced constraint holding cells always has 0 < count < |cells|.
            self.count -= 1;
            self.reduce();
        }
    }

    /// Removes a cell known to be safe.
    pub fn mark_safe(&mut self, cell: Point) {
        if self.cells.remove(&cell) {
            self.reduce();
        }
    }

    /// True iff `self.cells` is a proper subset of `other.cells`.
    pub fn is_subset_of(&self, other: &Constraint) -> bool {
        self.cells.len() < other.cells.len() && self.cells.is_subset(&other.cells)
    }

    /// Derives `other \ self` holding `other.count - self.count` mines.
    ///
    /// Must only be called when `self.is_subset_of(other)`. Fails when the two
    /// constraints disagree, i.e. the derived count would be negative or larger
    /// than the remaining cells.
    pub fn subtract(&self, other: &Constraint) -> Result<Constraint> {
        debug_assert!(self.is_subset_of(other));

        let cells: BTreeSet<Point> = other.cells.difference(&self.cells).copied().collect();
        let count = other
            .count
            .checked_sub(self.count)
            .ok_or(Error::InvalidConstraint {
                cells: cells.len(),
                count: self.count,
            })?;
        Constraint::new(cells, count)
    }

    fn reduce(&mut self) {
        if self.cells.is_empty() {
            return;
        }

        if self.cells.len() == self.count {
            self.resolved_mines.append(&mut self.cells);
            self.count = 0;
        } else if self.count == 0 {
            self.resolved_safes.append(&mut self.cells);
        }
    }
}

// Equality and hashing only look at the undetermined part.
impl PartialEq for Constraint {
    fn eq(&self, other: &Self) -> bool {
        self.count == other.count && self.cells == other.cells
    }
}

impl Eq for Constraint {}

impl Hash for Constraint {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.cells.hash(state);
        self.count.hash(state);
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{{")?;
        for (i, cell) in self.cells.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", cell)?;
        }
        write!(f, "}} = {}", self.count)
    }
}
