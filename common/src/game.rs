use crate::agent::{Agent, InferenceReport, Move};
use crate::board::{Environment, Minesweeper};
use crate::{Error, Point, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};

/// Represents the current state of the game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameState {
    Playing,
    Won,
    Lost,
}

/// One move of the agent and what came of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Turn {
    pub chosen: Move,
    /// `None` when the move hit a mine.
    pub report: Option<InferenceReport>,
}

/// A board together with the agent playing it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Game {
    pub board: Minesweeper,
    pub agent: Agent,
    /// Revealed cells and their neighbour counts.
    pub revealed: HashMap<Point, usize>,
    pub game_state: GameState,
}

impl Game {
    pub fn new<R: Rng + ?Sized>(
        height: usize,
        width: usize,
        mines: usize,
        rng: &mut R,
    ) -> Result<Self> {
        Ok(Game::from_board(Minesweeper::new(height, width, mines, rng)?))
    }

    pub fn from_board(board: Minesweeper) -> Self {
        Game {
            agent: Agent::for_board(&board),
            board,
            revealed: HashMap::new(),
            game_state: GameState::Playing,
        }
    }

    /// Deserializes a game state from bytes.
    pub fn deserialize(bts: &[u8]) -> Result<Self> {
        Ok(bcs::from_bytes(bts)?)
    }

    /// Serializes the game state to bytes.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        Ok(bcs::to_bytes(self)?)
    }

    /// Reveals `at`, feeding the result to the agent.
    ///
    /// Returns `false` if `at` was a mine. Revealing an already revealed
    /// cell changes nothing.
    pub fn reveal_cell(&mut self, at: Point) -> Result<bool> {
        self.reveal(at).map(|report| report.is_some())
    }

    fn reveal(&mut self, at: Point) -> Result<Option<InferenceReport>> {
        if !self.board.in_bounds(at) {
            return Err(Error::OutOfBounds {
                point: at,
                height: self.board.height,
                width: self.board.width,
            });
        }
        if self.revealed.contains_key(&at) {
            return Ok(Some(InferenceReport::default()));
        }
        if self.game_state != GameState::Playing {
            return Err(Error::GameOver);
        }

        if self.board.is_mine(at) {
            info!(%at, "hit a mine");
            self.game_state = GameState::Lost;
            return Ok(None);
        }

        let count = self.board.neighbor_mine_count(at);
        let report = self.agent.observe(at, count)?;
        self.revealed.insert(at, count);

        if self.check_win_condition() {
            info!(moves = self.revealed.len(), "board cleared");
            self.game_state = GameState::Won;
        }
        Ok(Some(report))
    }

    /// The agent's choice for the next reveal.
    pub fn next_move<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<Move> {
        self.agent.next_move(rng)
    }

    /// Lets the agent pick a cell and reveals it. `None` when the agent has
    /// nothing left to play.
    pub fn step<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<Option<Turn>> {
        if self.game_state != GameState::Playing {
            return Err(Error::GameOver);
        }

        let Some(chosen) = self.next_move(rng) else {
            debug!("no move left");
            return Ok(None);
        };
        debug!(?chosen, "agent move");

        let report = self.reveal(chosen.point())?;
        Ok(Some(Turn { chosen, report }))
    }

    /// The game is won once every safe cell is revealed, or once the agent
    /// has located exactly the mines.
    pub fn check_win_condition(&self) -> bool {
        let safe_cells = self.board.height * self.board.width - self.board.mines().len();
        self.revealed.len() == safe_cells || self.board.won(self.agent.known_mines())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::collections::HashSet;

    fn p(row: usize, col: usize) -> Point {
        Point { row, col }
    }

    #[test]
    fn test_game_initialization() {
        let mut rng = StdRng::seed_from_u64(11);
        let game = Game::new(5, 5, 3, &mut rng).unwrap();
        assert_eq!(game.board.height, 5);
        assert_eq!(game.board.width, 5);
        assert_eq!(game.board.mines().len(), 3);
        assert_eq!(game.game_state, GameState::Playing);
        assert!(game.revealed.is_empty());
        assert_eq!(game.agent.height(), 5);
    }

    #[test]
    fn test_game_initialization_too_many_mines() {
        let mut rng = StdRng::seed_from_u64(11);
        assert!(matches!(
            Game::new(3, 3, 9, &mut rng),
            Err(Error::InvalidBoard { .. })
        ));
    }

    #[test]
    fn test_reveal_feeds_agent() {
        let board = Minesweeper::with_mines(3, 3, [p(2, 2)]).unwrap();
        let mut game = Game::from_board(board);

        assert!(game.reveal_cell(p(0, 0)).unwrap());
        assert_eq!(game.revealed[&p(0, 0)], 0);
        assert!(game.agent.acted_on().contains(&p(0, 0)));
        assert!(game.agent.known_safes().contains(&p(1, 1)));

        // Revealing twice is harmless.
        assert!(game.reveal_cell(p(0, 0)).unwrap());
        assert_eq!(game.revealed.len(), 1);
    }

    #[test]
    fn test_hitting_mine() {
        let board = Minesweeper::with_mines(3, 3, [p(1, 1)]).unwrap();
        let mut game = Game::from_board(board);

        assert!(!game.reveal_cell(p(1, 1)).unwrap());
        assert_eq!(game.game_state, GameState::Lost);
        assert!(matches!(game.reveal_cell(p(0, 0)), Err(Error::GameOver)));
        let mut rng = StdRng::seed_from_u64(0);
        assert!(matches!(game.step(&mut rng), Err(Error::GameOver)));
    }

    #[test]
    fn test_out_of_bounds_reveal() {
        let board = Minesweeper::with_mines(3, 3, [p(1, 1)]).unwrap();
        let mut game = Game::from_board(board);
        assert!(matches!(
            game.reveal_cell(p(0, 3)),
            Err(Error::OutOfBounds { .. })
        ));
        assert_eq!(game.game_state, GameState::Playing);
    }

    #[test]
    fn test_agent_clears_board_after_safe_opening() {
        // A single mine in the corner: once (0, 0) is open the rest is logic.
        let board = Minesweeper::with_mines(4, 4, [p(3, 3)]).unwrap();
        let mut game = Game::from_board(board);
        let mut rng = StdRng::seed_from_u64(5);

        assert!(game.reveal_cell(p(0, 0)).unwrap());
        while game.game_state == GameState::Playing {
            let turn = game.step(&mut rng).unwrap().expect("a move is available");
            assert!(matches!(turn.chosen, Move::Safe(_)));
            assert!(turn.report.is_some());
        }

        assert_eq!(game.game_state, GameState::Won);
        assert!(game.check_win_condition());
        assert!(!game.agent.known_safes().contains(&p(3, 3)));
    }

    #[test]
    fn test_win_by_locating_mines() {
        let board = Minesweeper::with_mines(1, 2, [p(0, 1)]).unwrap();
        let mut game = Game::from_board(board);
        assert!(game.reveal_cell(p(0, 0)).unwrap());
        assert_eq!(game.game_state, GameState::Won);
        assert!(game.agent.known_mines().contains(&p(0, 1)));
    }

    #[test]
    fn test_serialization_round_trip() {
        let mut rng = StdRng::seed_from_u64(21);
        let mut game = Game::new(6, 6, 5, &mut rng).unwrap();
        let _ = game.step(&mut rng).unwrap();

        let bts = game.serialize().unwrap();
        let restored = Game::deserialize(&bts).unwrap();
        assert_eq!(restored.board, game.board);
        assert_eq!(restored.revealed, game.revealed);
        assert_eq!(restored.game_state, game.game_state);
        assert_eq!(restored.agent.facts(), game.agent.facts());
        assert_eq!(restored.agent.constraints(), game.agent.constraints());

        assert!(Game::deserialize(&bts[..bts.len() / 2]).is_err());
    }

    #[test]
    fn test_deserialize_rejects_crafted_board() {
        let game = Game::from_board(Minesweeper::with_mines(2, 2, [p(0, 0)]).unwrap());
        let every_cell = HashSet::from([p(0, 0), p(0, 1), p(1, 0), p(1, 1)]);
        let bts = bcs::to_bytes(&(
            (2usize, 2usize, every_cell),
            &game.agent,
            &game.revealed,
            game.game_state,
        ))
        .unwrap();

        assert!(matches!(Game::deserialize(&bts), Err(Error::Codec(_))));
        assert!(Game::deserialize(&game.serialize().unwrap()).is_ok());
    }
}
