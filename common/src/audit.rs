//! A complete, SAT-backed second opinion on the agent's knowledge.
//!
//! The inference engine only ever reasons about pairs of constraints. This
//! module encodes the raw evidence (every observation, plus optionally the
//! total mine count) as CNF and asks `varisat` which cells are forced either
//! way. It is diagnostic only: it never feeds facts back into the agent.

use crate::Point;
use itertools::Itertools;
use std::collections::{BTreeSet, HashMap};
use varisat::{CnfFormula, ExtendFormula, Lit, Solver, Var};

/// The possible outcomes of the analysis for a single cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeducedState {
    ForcedMine,   // Every model makes this cell a mine.
    ForcedSafe,   // Every model makes this cell safe.
    Undetermined, // Models exist either way.
}

/// The deduced state of every cell mentioned by the analysed counts.
pub type Analysis = HashMap<Point, DeducedState>;

/// "Exactly `mines` of `cells` are mines".
///
/// Unlike a [`Constraint`](crate::Constraint) this is never reduced, so a
/// cell keeps its variable even once its state is obvious.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cardinality {
    pub cells: Vec<Point>,
    pub mines: usize,
}

/// How the agent's knowledge compares with the SAT search.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Audit {
    /// Forced mines the agent has not recorded.
    pub missed_mines: BTreeSet<Point>,
    /// Forced safe cells the agent has not recorded.
    pub missed_safes: BTreeSet<Point>,
    /// Cells the agent recorded one way that the evidence forces the other.
    pub conflicts: BTreeSet<Point>,
    /// Cells the audit could not decide either.
    pub undetermined: usize,
}

impl Audit {
    pub fn is_sound(&self) -> bool {
        self.conflicts.is_empty()
    }

    pub fn is_complete(&self) -> bool {
        self.is_sound() && self.missed_mines.is_empty() && self.missed_safes.is_empty()
    }
}

/// Classifies every cell referenced by `counts`.
///
/// Fails when the counts cannot all hold at once.
pub fn analyze(counts: &[Cardinality]) -> anyhow::Result<Analysis> {
    let mut solver = Solver::new();
    let mut var_map: HashMap<Point, Var> = HashMap::new();

    // 1. One SAT variable per cell.
    for point in counts.iter().flat_map(|c| c.cells.iter().copied()) {
        var_map.entry(point).or_insert_with(|| solver.new_var());
    }

    // 2. Encode every cardinality constraint.
    let mut formula = CnfFormula::new();
    for count in counts {
        let lits = literals(&var_map, &count.cells);
        encode_exactly_k_to_formula(&mut formula, &mut solver, &lits, count.mines);
    }
    solver.add_formula(&formula);

    // 3. The evidence must be satisfiable at all.
    if !solver.solve()? {
        anyhow::bail!("knowledge_inconsistent");
    }

    // 4. Test both polarities of every cell under assumptions.
    let mut deductions = Analysis::new();
    for (&point, &var) in &var_map {
        let lit_mine = Lit::from_var(var, true);

        let mine_possible = {
            solver.assume(&[lit_mine]);
            let result = solver.solve()?;
            solver.assume(&[]);
            result
        };

        let safe_possible = {
            solver.assume(&[!lit_mine]);
            let result = solver.solve()?;
            solver.assume(&[]);
            result
        };

        let state = match (mine_possible, safe_possible) {
            (true, true) => DeducedState::Undetermined,
            (true, false) => DeducedState::ForcedMine,
            (false, true) => DeducedState::ForcedSafe,
            (false, false) => anyhow::bail!("state_collision"),
        };
        deductions.insert(point, state);
    }

    Ok(deductions)
}

fn literals(var_map: &HashMap<Point, Var>, points: &[Point]) -> Vec<Lit> {
    points
        .iter()
        .filter_map(|p| var_map.get(p).map(|&v| Lit::from_var(v, true)))
        .collect()
}

/// Encodes an "exactly k" constraint into the CNF formula.
fn encode_exactly_k_to_formula(
    formula: &mut CnfFormula,
    solver: &mut Solver,
    vars: &[Lit],
    k: usize,
) {
    encode_at_most_k_to_formula(formula, solver, vars, k);
    encode_at_least_k_to_formula(formula, solver, vars, k);
}

/// Encodes an "at most k" constraint into the CNF formula.
fn encode_at_most_k_to_formula(
    formula: &mut CnfFormula,
    solver: &mut Solver,
    vars: &[Lit],
    k: usize,
) {
    if k >= vars.len() {
        return; // Always satisfiable.
    }
    if k == 0 {
        for &lit in vars {
            formula.add_clause(&[!lit]);
        }
        return;
    }

    if vars.len() <= 10 {
        // Every (k + 1)-subset holds at least one safe cell.
        for combo in vars.iter().copied().combinations(k + 1) {
            let clause: Vec<Lit> = combo.iter().map(|&lit| !lit).collect();
            formula.add_clause(&clause);
        }
    } else {
        encode_sequential_counter_at_most_k_to_formula(formula, solver, vars, k);
    }
}

/// Encodes an "at least k" constraint into the CNF formula.
fn encode_at_least_k_to_formula(
    formula: &mut CnfFormula,
    solver: &mut Solver,
    vars: &[Lit],
    k: usize,
) {
    if k == 0 {
        return; // Always satisfied.
    }
    if k > vars.len() {
        formula.add_clause(&[]);
        return;
    }

    if vars.len() <= 10 {
        // Every (n - k + 1)-subset holds at least one mine.
        for combo in vars.iter().copied().combinations(vars.len() - k + 1) {
            formula.add_clause(&combo);
        }
    } else {
        // At least k true is at most n - k false.
        let negated: Vec<Lit> = vars.iter().map(|&lit| !lit).collect();
        encode_at_most_k_to_formula(formula, solver, &negated, vars.len() - k);
    }
}

/// Sequential counter encoding of "at most k", for 1 <= k < vars.len().
fn encode_sequential_counter_at_most_k_to_formula(
    formula: &mut CnfFormula,
    solver: &mut Solver,
    vars: &[Lit],
    k: usize,
) {
    let n = vars.len();

    // s[i][j] holds when at least j + 1 of vars[..=i] are true.
    let s: Vec<Vec<Lit>> = (0..n - 1)
        .map(|_| (0..k).map(|_| Lit::from_var(solver.new_var(), true)).collect())
        .collect();

    formula.add_clause(&[!vars[0], s[0][0]]);
    for j in 1..k {
        formula.add_clause(&[!s[0][j]]);
    }

    for i in 1..n - 1 {
        formula.add_clause(&[!vars[i], s[i][0]]);
        formula.add_clause(&[!s[i - 1][0], s[i][0]]);
        for j in 1..k {
            formula.add_clause(&[!vars[i], !s[i - 1][j - 1], s[i][j]]);
            formula.add_clause(&[!s[i - 1][j], s[i][j]]);
        }
        // A (k + 1)-th mine is not allowed.
        formula.add_clause(&[!vars[i], !s[i - 1][k - 1]]);
    }

    formula.add_clause(&[!vars[n - 1], !s[n - 2][k - 1]]);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(row: usize, col: usize) -> Point {
        Point { row, col }
    }

    fn exactly(cells: impl IntoIterator<Item = Point>, mines: usize) -> Cardinality {
        Cardinality {
            cells: cells.into_iter().collect(),
            mines,
        }
    }

    #[test]
    fn test_symmetric_pair_is_undetermined() {
        let analysis = analyze(&[exactly([p(0, 0), p(0, 1)], 1)]).unwrap();
        assert_eq!(analysis.len(), 2);
        assert_eq!(analysis[&p(0, 0)], DeducedState::Undetermined);
        assert_eq!(analysis[&p(0, 1)], DeducedState::Undetermined);
    }

    #[test]
    fn test_zero_count_forces_safes() {
        let analysis = analyze(&[exactly([p(0, 0), p(0, 1), p(1, 1)], 0)]).unwrap();
        assert_eq!(analysis.len(), 3);
        assert!(analysis.values().all(|&s| s == DeducedState::ForcedSafe));
    }

    #[test]
    fn test_subset_pair_forces_difference() {
        let counts = [
            exactly([p(1, 1), p(1, 2)], 1),
            exactly([p(1, 1), p(1, 2), p(1, 3)], 1),
        ];
        let analysis = analyze(&counts).unwrap();
        assert_eq!(analysis[&p(1, 3)], DeducedState::ForcedSafe);
        assert_eq!(analysis[&p(1, 1)], DeducedState::Undetermined);
    }

    #[test]
    fn test_overlap_beyond_subsets() {
        // The 1-2-1 pattern: no count is a subset of another.
        let counts = [
            exactly([p(0, 0), p(0, 1), p(0, 2)], 1),
            exactly([p(0, 1), p(0, 2), p(0, 3)], 2),
            exactly([p(0, 2), p(0, 3), p(0, 4)], 1),
        ];
        let analysis = analyze(&counts).unwrap();
        assert_eq!(analysis[&p(0, 0)], DeducedState::ForcedSafe);
        assert_eq!(analysis[&p(0, 1)], DeducedState::ForcedMine);
        assert_eq!(analysis[&p(0, 2)], DeducedState::ForcedSafe);
        assert_eq!(analysis[&p(0, 3)], DeducedState::ForcedMine);
        assert_eq!(analysis[&p(0, 4)], DeducedState::ForcedSafe);
    }

    #[test]
    fn test_inconsistent_knowledge_is_an_error() {
        let counts = [
            exactly([p(0, 0), p(0, 1), p(0, 2)], 1),
            exactly([p(0, 0), p(0, 1), p(0, 2)], 2),
        ];
        assert!(analyze(&counts).is_err());
    }

    #[test]
    fn test_global_count_uses_sequential_counter() {
        // One mine in the row, one among the first eleven cells and (1, 0).
        let row: Vec<Point> = (0..12).map(|col| p(0, col)).collect();
        let local = exactly(row[..11].iter().copied().chain([p(1, 0)]), 1);
        let analysis = analyze(&[local, exactly(row.clone(), 1)]).unwrap();
        assert_eq!(analysis[&p(1, 0)], DeducedState::Undetermined);

        let analysis = analyze(&[exactly(row, 0)]).unwrap();
        assert!(analysis.values().all(|&s| s == DeducedState::ForcedSafe));
    }

    #[test]
    fn test_global_count_forces_all_mines() {
        let row: Vec<Point> = (0..12).map(|col| p(2, col)).collect();
        let analysis = analyze(&[exactly(row, 12)]).unwrap();
        assert_eq!(analysis.len(), 12);
        assert!(analysis.values().all(|&s| s == DeducedState::ForcedMine));
    }

    #[test]
    fn test_global_count_in_large_set() {
        // 11 cells of which exactly 3 are mines, two of them pinned by a local
        // count: the remaining nine share a single mine.
        let row: Vec<Point> = (0..11).map(|col| p(3, col)).collect();
        let local = exactly([p(3, 0), p(3, 1), p(3, 2)], 2);
        let analysis = analyze(&[local.clone(), exactly(row.clone(), 3)]).unwrap();
        assert!(analysis.values().all(|&s| s == DeducedState::Undetermined));

        assert!(analyze(&[local, exactly(row, 1)]).is_err());
    }

    #[test]
    fn test_audit_verdicts() {
        let mut audit = Audit::default();
        assert!(audit.is_complete());

        audit.missed_safes.insert(p(0, 0));
        assert!(audit.is_sound());
        assert!(!audit.is_complete());

        audit.missed_safes.clear();
        audit.conflicts.insert(p(0, 1));
        assert!(!audit.is_sound());
        assert!(!audit.is_complete());
    }
}
