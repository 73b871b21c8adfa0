//! The knowledge-based player.
//!
//! The agent owns two pieces of state: a [`FactStore`] of certainties and a
//! constraint base of statements that are still open. Facts only ever flow
//! from the store into the constraints; constraints never reach back. Every
//! observation runs the inference loop to a fixed point:
//!
//! 1. harvest resolved constraints and propagate their cells as facts,
//! 2. derive `B \ A` for every pair where `A` is a strict subset of `B`,
//! 3. merge and deduplicate,
//! 4. harvest again,
//!
//! and repeats while a pass resolves a constraint or records a new fact.

use crate::audit::{self, Audit, Cardinality, DeducedState};
use crate::board::Environment;
use crate::{Constraint, Error, FactStore, Point, Result};
use itertools::Itertools;
use rand::Rng;
use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use tracing::{debug, instrument, trace};

/// A move proposed by the agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Move {
    /// Provably safe.
    Safe(Point),
    /// Not known to be a mine, but not known to be safe either.
    Guess(Point),
}

impl Move {
    pub fn point(self) -> Point {
        match self {
            Move::Safe(point) | Move::Guess(point) => point,
        }
    }
}

/// What a single observation taught the agent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InferenceReport {
    /// Passes of the fixed-point loop, including the final idle one.
    pub passes: usize,
    pub new_mines: usize,
    pub new_safes: usize,
    /// Constraints produced by subset resolution.
    pub derived: usize,
}

#[derive(Debug, Default)]
struct Harvest {
    resolved: usize,
    new_mines: usize,
    new_safes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    height: usize,
    width: usize,
    facts: FactStore,
    /// The active constraint base.
    knowledge: Vec<Constraint>,
    /// Every accepted observation, as reported.
    observations: Vec<(Point, usize)>,
}

impl Agent {
    pub fn new(height: usize, width: usize) -> Self {
        Agent {
            height,
            width,
            facts: FactStore::new(),
            knowledge: Vec::new(),
            observations: Vec::new(),
        }
    }

    pub fn for_board(env: &impl Environment) -> Self {
        Agent::new(env.height(), env.width())
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn in_bounds(&self, cell: Point) -> bool {
        cell.row < self.height && cell.col < self.width
    }

    pub fn facts(&self) -> &FactStore {
        &self.facts
    }

    pub fn known_mines(&self) -> &HashSet<Point> {
        self.facts.known_mines()
    }

    pub fn known_safes(&self) -> &HashSet<Point> {
        self.facts.known_safes()
    }

    pub fn acted_on(&self) -> &HashSet<Point> {
        self.facts.acted_on()
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.knowledge
    }

    pub fn observations(&self) -> &[(Point, usize)] {
        &self.observations
    }

    /// Feeds the reveal of `cell`, surrounded by `count` mines, into the
    /// knowledge base and infers everything that follows.
    ///
    /// Either the whole update is applied or, on error, nothing is. Observing
    /// a cell that was already acted on is a no-op.
    #[instrument(skip(self))]
    pub fn observe(&mut self, cell: Point, count: usize) -> Result<InferenceReport> {
        if !self.in_bounds(cell) {
            return Err(Error::OutOfBounds {
                point: cell,
                height: self.height,
                width: self.width,
            });
        }
        if self.facts.is_acted_on(cell) {
            debug!("cell already observed");
            return Ok(InferenceReport::default());
        }

        let mut next = self.clone();
        let report = next.apply_observation(cell, count)?;
        *self = next;

        debug!(
            passes = report.passes,
            new_mines = report.new_mines,
            new_safes = report.new_safes,
            derived = report.derived,
            active = self.knowledge.len(),
            "observation applied"
        );
        Ok(report)
    }

    fn apply_observation(&mut self, cell: Point, count: usize) -> Result<InferenceReport> {
        let constraint = self.observation_constraint(cell, count)?;

        self.facts.record_move(cell);
        self.observations.push((cell, count));
        self.mark_safe(cell)?;
        if let Some(constraint) = constraint {
            trace!(%constraint, "new constraint");
            self.knowledge.push(constraint);
        }

        let mut report = InferenceReport::default();
        self.infer(&mut report)?;
        Ok(report)
    }

    /// The constraint stated by `cell`'s count over its undetermined neighbours.
    fn observation_constraint(&self, cell: Point, count: usize) -> Result<Option<Constraint>> {
        let mut cells = Vec::new();
        let mut known_mines = 0;
        for neighbor in cell.neighbors(self.height, self.width) {
            if self.facts.is_safe(neighbor) {
                continue;
            }
            if self.facts.is_mine(neighbor) {
                known_mines += 1;
                continue;
            }
            cells.push(neighbor);
        }

        let count = count
            .checked_sub(known_mines)
            .ok_or(Error::InconsistentObservation {
                point: cell,
                reported: count,
                known_mines,
            })?;

        // Nothing left to say about an empty neighbourhood.
        if cells.is_empty() && count == 0 {
            return Ok(None);
        }
        Constraint::new(cells, count).map(Some)
    }

    /// Records `cell` as a mine and tells every active constraint.
    /// Returns whether the fact is new.
    pub fn mark_mine(&mut self, cell: Point) -> Result<bool> {
        let new = self.facts.record_mine(cell)?;
        for constraint in &mut self.knowledge {
            constraint.mark_mine(cell);
        }
        Ok(new)
    }

    /// Records `cell` as safe and tells every active constraint.
    /// Returns whether the fact is new.
    pub fn mark_safe(&mut self, cell: Point) -> Result<bool> {
        let new = self.facts.record_safe(cell)?;
        for constraint in &mut self.knowledge {
            constraint.mark_safe(cell);
        }
        Ok(new)
    }

    fn infer(&mut self, report: &mut InferenceReport) -> Result<()> {
        let mut progress = true;
        while progress {
            report.passes += 1;

            let first = self.harvest()?;
            let derived = self.resolve_subsets()?;
            let second = self.harvest()?;

            let resolved = first.resolved + second.resolved;
            let new_mines = first.new_mines + second.new_mines;
            let new_safes = first.new_safes + second.new_safes;
            report.new_mines += new_mines;
            report.new_safes += new_safes;
            report.derived += derived;

            debug!(
                pass = report.passes,
                resolved,
                new_mines,
                new_safes,
                derived,
                active = self.knowledge.len(),
                "inference pass"
            );
            progress = resolved > 0 || new_mines + new_safes > 0;
        }
        Ok(())
    }

    /// Drops resolved constraints from the base and records what they proved.
    fn harvest(&mut self) -> Result<Harvest> {
        let (resolved, active): (Vec<Constraint>, Vec<Constraint>) =
            std::mem::take(&mut self.knowledge).into_iter().partition(Constraint::is_resolved);
        self.knowledge = active;

        let mut mines: BTreeSet<Point> = BTreeSet::new();
        let mut safes: BTreeSet<Point> = BTreeSet::new();
        for constraint in &resolved {
            mines.extend(constraint.resolved_mines());
            safes.extend(constraint.resolved_safes());
        }

        let mut harvest = Harvest {
            resolved: resolved.len(),
            ..Harvest::default()
        };
        for cell in mines {
            if !self.facts.is_mine(cell) {
                self.mark_mine(cell)?;
                harvest.new_mines += 1;
            }
        }
        for cell in safes {
            if !self.facts.is_safe(cell) {
                self.mark_safe(cell)?;
                harvest.new_safes += 1;
            }
        }
        Ok(harvest)
    }

    /// Pairwise subset resolution followed by the merge. Returns how many
    /// constraints were derived.
    fn resolve_subsets(&mut self) -> Result<usize> {
        let mut staged = Vec::new();
        let mut duplicates = HashSet::new();

        for (i, j) in (0..self.knowledge.len()).tuple_combinations() {
            let (a, b) = (&self.knowledge[i], &self.knowledge[j]);
            // Cascades from the last harvest may have resolved some; leave
            // those to the next harvest.
            if a.is_resolved() || b.is_resolved() {
                continue;
            }
            if a.is_subset_of(b) {
                staged.push(a.subtract(b)?);
            } else if b.is_subset_of(a) {
                staged.push(b.subtract(a)?);
            } else if a == b {
                duplicates.insert(i);
            }
        }

        let derived = staged.len();
        for constraint in &staged {
            trace!(%constraint, "derived constraint");
        }

        let merged = std::mem::take(&mut self.knowledge)
            .into_iter()
            .enumerate()
            .filter(|(i, _)| !duplicates.contains(i))
            .map(|(_, constraint)| constraint)
            .chain(staged);

        // Resolved constraints all look alike (no cells, zero count) but carry
        // different facts, so only the open ones are deduplicated.
        let (resolved, open): (Vec<Constraint>, Vec<Constraint>) =
            merged.partition(Constraint::is_resolved);
        self.knowledge = open.into_iter().unique().chain(resolved).collect();
        Ok(derived)
    }

    /// A known-safe cell that has not been played yet.
    pub fn safe_move(&self) -> Option<Point> {
        self.facts.unplayed_safes().min()
    }

    /// A uniformly random cell that is neither played nor a known mine.
    pub fn fallback_move<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<Point> {
        let candidates: Vec<Point> = Point::grid(self.height, self.width)
            .filter(|&cell| !self.facts.is_mine(cell) && !self.facts.is_acted_on(cell))
            .collect();
        candidates.choose(rng).copied()
    }

    /// Safe moves first, a guess otherwise.
    pub fn next_move<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<Move> {
        self.safe_move()
            .map(Move::Safe)
            .or_else(|| self.fallback_move(rng).map(Move::Guess))
    }

    /// Cross-checks the agent's facts with a complete SAT search over the
    /// observations it has accepted.
    ///
    /// The search sees each observation as reported, not the reduced
    /// constraint base, so recorded facts are checked rather than assumed.
    /// With `total_mines` it also knows how many mines the board holds.
    /// Fails if the evidence is contradictory.
    pub fn audit(&self, total_mines: Option<usize>) -> anyhow::Result<Audit> {
        let mut counts = Vec::with_capacity(2 * self.observations.len() + 1);
        for &(cell, mines) in &self.observations {
            counts.push(Cardinality {
                cells: vec![cell],
                mines: 0,
            });
            counts.push(Cardinality {
                cells: cell.neighbors(self.height, self.width).collect(),
                mines,
            });
        }
        if let Some(total) = total_mines {
            let cells = Point::grid(self.height, self.width)
                .filter(|&cell| !self.facts.is_acted_on(cell))
                .collect();
            counts.push(Cardinality { cells, mines: total });
        }

        let analysis = audit::analyze(&counts)?;

        let mut report = Audit::default();
        for (cell, state) in analysis {
            let (mine, safe) = (self.facts.is_mine(cell), self.facts.is_safe(cell));
            match state {
                DeducedState::ForcedMine if safe => {
                    report.conflicts.insert(cell);
                }
                DeducedState::ForcedSafe if mine => {
                    report.conflicts.insert(cell);
                }
                DeducedState::ForcedMine if !mine => {
                    report.missed_mines.insert(cell);
                }
                DeducedState::ForcedSafe if !safe => {
                    report.missed_safes.insert(cell);
                }
                DeducedState::Undetermined if !mine && !safe => report.undetermined += 1,
                _ => {}
            }
        }
        Ok(report)
    }
}
