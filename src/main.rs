use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use arbor_core::Board;
use arbor_engine::{Engine, EngineEvent, Hce, SearchConfig, SearchEngine, SearchLimits};

/// Search one position and print the UCI-style progress and best move.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Position to search; the starting position when omitted.
    #[arg(short, long)]
    fen: Option<String>,

    /// Moves to play from the position first, in UCI notation.
    #[arg(short, long, num_args = 1..)]
    moves: Vec<String>,

    /// Fixed search depth.
    #[arg(short, long)]
    depth: Option<i32>,

    /// Time for the move in milliseconds.
    #[arg(long)]
    movetime: Option<u64>,

    #[arg(short, long, default_value_t = 1)]
    threads: usize,

    /// Transposition table size in megabytes.
    #[arg(long, default_value_t = 16)]
    hash: usize,

    #[arg(long, default_value_t = 1)]
    multi_pv: usize,

    /// Playing strength from 0 to 20; 20 is full strength.
    #[arg(long, default_value_t = 20)]
    skill_level: u8,

    /// Centipawns to give up rather than accept a draw.
    #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
    contempt: i32,
}

impl Args {
    fn limits(&self) -> Result<SearchLimits> {
        let limits = match (self.depth, self.movetime) {
            (Some(depth), None) => SearchLimits::depth(depth),
            (None, Some(ms)) => SearchLimits::movetime(Duration::from_millis(ms)),
            (Some(depth), Some(ms)) => {
                SearchLimits::movetime(Duration::from_millis(ms)).with_depth_cap(depth)
            }
            (None, None) => bail!("give --depth, --movetime or both"),
        };
        Ok(limits)
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let limits = args.limits()?;

    let start = match &args.fen {
        Some(fen) => Board::from_fen(fen).with_context(|| format!("bad --fen {fen:?}"))?,
        None => Board::starting_position(),
    };
    let mut history = Vec::with_capacity(args.moves.len());
    let mut board = start;
    for uci in &args.moves {
        let mv = board
            .find_move(uci)
            .with_context(|| format!("move {uci} in {board}"))?;
        history.push(board.hash());
        board = board.make_move(mv);
    }

    let config = SearchConfig {
        hash_mb: args.hash,
        threads: args.threads,
        multi_pv: args.multi_pv,
        skill_level: args.skill_level,
        contempt: args.contempt,
        ..SearchConfig::default()
    };
    let mut engine = Engine::new(config, Arc::new(Hce)).context("engine configuration")?;
    info!(fen = %board.to_fen(), "arbor searching");

    engine.start_search(board, history, limits)?;
    loop {
        match engine.poll_output() {
            Some(EngineEvent::Info(info)) => println!("{info}"),
            Some(EngineEvent::BestMove(result)) => {
                match result.ponder_move {
                    Some(ponder) => println!("bestmove {} ponder {}", result.best_move, ponder),
                    None => println!("bestmove {}", result.best_move),
                }
                info!(
                    nodes = result.nodes,
                    depth = result.depth,
                    tt_hits = result.stats.tt_hits,
                    "search finished"
                );
                return Ok(());
            }
            None => std::thread::sleep(Duration::from_millis(1)),
        }
    }
}
