use minesweeper_ai as ms;
use wasm_bindgen::prelude::*;

#[wasm_bindgen]
pub fn create_game(height: u8, width: u8, mines: u8) -> Result<Vec<u8>, String> {
    console_error_panic_hook::set_once();

    let mut rng = rand::rng();
    let game = ms::Game::new(height as usize, width as usize, mines as usize, &mut rng)
        .map_err(|e| e.to_string())?;
    game.serialize().map_err(|e| e.to_string())
}

#[wasm_bindgen]
pub fn validate(bts: Vec<u8>) -> bool {
    console_error_panic_hook::set_once();

    ms::Game::deserialize(&bts)
        .map(|game| game.game_state == ms::GameState::Won)
        .unwrap_or(false)
}

/// Reveals a cell picked by the player. The last byte is 0 if it was safe, 1
/// if it was a mine.
#[wasm_bindgen]
pub fn choose_cell(bts: Vec<u8>, row: usize, col: usize) -> Result<Vec<u8>, String> {
    console_error_panic_hook::set_once();

    let mut game = ms::Game::deserialize(&bts).map_err(|e| e.to_string())?;
    let res = game
        .reveal_cell(ms::Point { row, col })
        .map_err(|e| e.to_string())?;
    let mut xs = game.serialize().map_err(|e| e.to_string())?;
    xs.push(if res { 0 } else { 1 });
    Ok(xs)
}

/// Lets the agent play one move. The last byte is 0 if it was safe, 1 if it
/// was a mine and 2 if the agent had nothing to play.
#[wasm_bindgen]
pub fn agent_step(bts: Vec<u8>) -> Result<Vec<u8>, String> {
    console_error_panic_hook::set_once();

    let mut game = ms::Game::deserialize(&bts).map_err(|e| e.to_string())?;
    let mut rng = rand::rng();
    let outcome = match game.step(&mut rng).map_err(|e| e.to_string())? {
        Some(turn) if turn.report.is_some() => 0,
        Some(_) => 1,
        None => 2,
    };
    let mut xs = game.serialize().map_err(|e| e.to_string())?;
    xs.push(outcome);
    Ok(xs)
}

/// Row-major cells: -1 hidden, -2 a mine the agent has located, otherwise
/// the neighbour count.
#[wasm_bindgen]
pub fn get_cells(bts: Vec<u8>) -> Result<Vec<i8>, String> {
    console_error_panic_hook::set_once();

    let game = ms::Game::deserialize(&bts).map_err(|e| e.to_string())?;
    Ok(ms::Point::grid(game.board.height, game.board.width)
        .map(|point| match game.revealed.get(&point) {
            Some(&n) => n as i8,
            None if game.agent.known_mines().contains(&point) => -2,
            None => -1,
        })
        .collect())
}
