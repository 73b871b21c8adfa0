use clap::Parser;
use minesweeper_ai::*;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::thread;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Autonomous minesweeper bot: plays provably safe cells, guesses otherwise.
#[derive(Parser, Debug)]
#[command(name = "minesweeper_ai")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Board height
    #[arg(long, default_value = "8")]
    height: usize,

    /// Board width
    #[arg(long, default_value = "8")]
    width: usize,

    /// Number of mines
    #[arg(short, long, default_value = "8")]
    mines: usize,

    /// Seed for mine placement and guesses
    #[arg(long)]
    seed: Option<u64>,

    /// Pause between moves, in milliseconds
    #[arg(long, default_value = "0")]
    delay_ms: u64,

    /// Cross-check the agent's knowledge with a SAT search after every move
    #[arg(long)]
    audit: bool,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let mut rng = match cli.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };

    // --- 1. Initialization ---
    let mut game = Game::new(cli.height, cli.width, cli.mines, &mut rng)?;

    println!("--- Autonomous Minesweeper Bot ---");
    println!("Strategy: Prioritize logically safe moves, guess randomly otherwise.");
    print_board(&game);

    // --- 2. Game Loop ---
    let mut move_count = 0;
    while game.game_state == GameState::Playing {
        move_count += 1;
        println!("\n--- Move #{} ---", move_count);

        let Some(turn) = game.step(&mut rng)? else {
            println!("No valid moves left for the bot to make.");
            break;
        };

        match turn.chosen {
            Move::Safe(point) => println!("Logic found a guaranteed safe cell: {}", point),
            Move::Guess(point) => println!("No logically safe move found. Guessing {}...", point),
        }
        if let Some(report) = turn.report {
            info!(
                passes = report.passes,
                new_mines = report.new_mines,
                new_safes = report.new_safes,
                "inference finished"
            );
        }

        if cli.audit && game.game_state == GameState::Playing {
            match game.agent.audit(Some(cli.mines)) {
                Ok(audit) if !audit.is_sound() => warn!(
                    conflicts = ?audit.conflicts,
                    "audit contradicts facts the agent recorded"
                ),
                Ok(audit) if !audit.is_complete() => info!(
                    missed_mines = ?audit.missed_mines,
                    missed_safes = ?audit.missed_safes,
                    "audit found deductions the agent has not made"
                ),
                Ok(_) => {}
                Err(e) => warn!(error = %e, "audit failed"),
            }
        }

        print_board(&game);

        if cli.delay_ms > 0 {
            thread::sleep(Duration::from_millis(cli.delay_ms));
        }
    }

    // --- 3. Final Result ---
    println!("\n--- Game Over ---");
    match game.game_state {
        GameState::Won => println!("Result: The bot won!"),
        GameState::Lost => {
            println!("Result: The bot hit a mine and lost.");
            println!("{}", game.board.layout());
        }
        GameState::Playing => println!("Result: The game ended unexpectedly."),
    }
    println!(
        "Known mines: {}, known safe cells: {}, moves: {}",
        game.agent.known_mines().len(),
        game.agent.known_safes().len(),
        game.agent.acted_on().len()
    );

    Ok(())
}

fn print_board(game: &Game) {
    let width = game.board.width;

    // Print header
    print!("   ");
    for col in 0..width {
        print!("{:^3}", col);
    }
    println!("\n  +{}", "---".repeat(width));

    // Print rows
    for row in 0..game.board.height {
        print!("{:^2}|", row);
        for col in 0..width {
            let point = Point { row, col };
            let display = match game.revealed.get(&point) {
                Some(0) => " . ".to_string(),
                Some(n) => format!(" {} ", n),
                None if game.agent.known_mines().contains(&point) => " F ".to_string(),
                None => " ■ ".to_string(),
            };
            print!("{}", display);
        }
        println!();
    }
    println!();
}
