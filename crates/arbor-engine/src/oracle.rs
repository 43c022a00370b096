//! Book and tablebase boundary.
//!
//! No file formats live here: an [`Oracle`] is whatever the caller plugs in
//! (an opening book, an endgame tablebase, a test double). The search asks
//! it once at the root and, for small enough positions, inside the tree.

use arbor_core::{Board, Move};

use crate::search::TB_WIN;

/// A root answer from the oracle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OracleHit {
    /// Score from the side to move's point of view.
    pub score: i32,
    /// Candidate moves, best first. Illegal entries are skipped.
    pub moves: Vec<Move>,
}

/// Win/draw/loss verdict for the side to move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wdl {
    Loss,
    Draw,
    Win,
}

impl Wdl {
    /// Search score for this verdict found `ply` plies from the root.
    ///
    /// Wins and losses sit just below the mate range so that a real mate
    /// is always preferred.
    pub fn score(self, ply: usize) -> i32 {
        match self {
            Wdl::Loss => -TB_WIN + ply as i32,
            Wdl::Draw => 0,
            Wdl::Win => TB_WIN - ply as i32,
        }
    }
}

/// External knowledge consulted by the search.
pub trait Oracle: Send + Sync {
    /// Root probe: a score and the moves to play, or `None` for no data.
    fn probe_root(&self, board: &Board) -> Option<OracleHit>;

    /// In-tree probe.
    fn probe_wdl(&self, _board: &Board) -> Option<Wdl> {
        None
    }

    /// Largest piece count (kings included) `probe_wdl` can answer.
    fn max_pieces(&self) -> u32 {
        0
    }
}
