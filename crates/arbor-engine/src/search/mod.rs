//! Search algorithms, move ordering and the shared transposition table.

pub mod control;
pub mod heuristics;
pub mod negamax;
pub mod ordering;
pub mod params;
pub mod pool;
pub mod qsearch;
pub mod skill;
pub mod stack;
pub mod tt;
pub mod worker;

use std::fmt;
use std::time::Duration;

use arbor_core::Move;

/// Score representing an unreachable upper/lower bound.
pub const INF: i32 = 30_000;

/// Base score for checkmate (adjusted by ply for mate distance).
pub const MATE_SCORE: i32 = 29_000;

/// Scores above this threshold indicate a forced mate.
pub const MATE_THRESHOLD: i32 = 28_000;

/// Maximum search depth (in plies) for array sizing and recursion limits.
pub const MAX_PLY: usize = 128;

/// Tablebase win score, below every mate score.
pub const TB_WIN: i32 = MATE_THRESHOLD - 1 - MAX_PLY as i32;

/// Score of delivering mate `ply` plies from the root.
#[inline]
pub const fn mate_in(ply: usize) -> i32 {
    MATE_SCORE - ply as i32
}

/// Score of being mated `ply` plies from the root.
#[inline]
pub const fn mated_in(ply: usize) -> i32 {
    -MATE_SCORE + ply as i32
}

#[inline]
pub const fn is_mate_score(score: i32) -> bool {
    score.abs() > MATE_THRESHOLD
}

/// Full moves to mate: positive when the side to move mates, negative when
/// it is mated, `None` for ordinary scores.
pub fn mate_distance(score: i32) -> Option<i32> {
    if score > MATE_THRESHOLD {
        Some((MATE_SCORE - score + 1) / 2)
    } else if score < -MATE_THRESHOLD {
        Some(-(MATE_SCORE + score) / 2)
    } else {
        None
    }
}

/// One principal variation of a multi-PV search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PvLine {
    pub score: i32,
    pub depth: i32,
    pub pv: Vec<Move>,
}

impl PvLine {
    pub fn best_move(&self) -> Move {
        self.pv.first().copied().unwrap_or(Move::NULL)
    }
}

/// Counters summed over every worker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchStats {
    /// Nodes visited, as counted by each worker.
    pub nodes: u64,
    pub tt_probes: u64,
    pub tt_hits: u64,
    /// Aspiration re-searches across all iterations.
    pub aspiration_researches: u32,
    /// Tablebase hits inside the tree.
    pub tb_hits: u64,
    /// Null-move searches tried.
    pub null_moves: u64,
    /// Moves extended for being singular.
    pub singular_extensions: u64,
}

/// Result of a completed search.
#[derive(Debug, Clone)]
pub struct SearchResult {
    /// Best move found at the highest completed depth. Null only when the
    /// root has no legal moves.
    pub best_move: Move,
    /// Second move in the PV, the expected reply (for pondering).
    pub ponder_move: Option<Move>,
    /// Full principal variation line.
    pub pv: Vec<Move>,
    /// Score in centipawns from the side to move's point of view.
    pub score: i32,
    /// Depth of the last completed iteration; 0 for terminal or oracle answers.
    pub depth: i32,
    pub seldepth: usize,
    /// Total nodes visited by all workers.
    pub nodes: u64,
    /// Every PV line of the last completed iteration, best first.
    pub lines: Vec<PvLine>,
    pub stats: SearchStats,
}

impl SearchResult {
    /// A result with no search behind it: a terminal position or an oracle move.
    pub(crate) fn immediate(best_move: Move, score: i32) -> Self {
        let pv = if best_move.is_null() {
            Vec::new()
        } else {
            vec![best_move]
        };
        Self {
            best_move,
            ponder_move: None,
            lines: vec![PvLine {
                score,
                depth: 0,
                pv: pv.clone(),
            }],
            pv,
            score,
            depth: 0,
            seldepth: 0,
            nodes: 0,
            stats: SearchStats::default(),
        }
    }
}

/// Progress report for one completed PV line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchInfo {
    pub depth: i32,
    pub seldepth: usize,
    /// 1-based index of the line.
    pub multipv: usize,
    pub score: i32,
    pub nodes: u64,
    pub nps: u64,
    pub elapsed: Duration,
    /// Permille of the transposition table in use.
    pub hashfull: u32,
    pub pv: Vec<Move>,
}

/// A search score rendered the UCI way (`cp 23` or `mate -3`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UciScore(pub i32);

impl fmt::Display for UciScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match mate_distance(self.0) {
            Some(moves) => write!(f, "mate {moves}"),
            None => write!(f, "cp {}", self.0),
        }
    }
}

impl fmt::Display for SearchInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "info depth {} seldepth {} multipv {} score {} nodes {} nps {} hashfull {} time {} pv",
            self.depth,
            self.seldepth,
            self.multipv,
            UciScore(self.score),
            self.nodes,
            self.nps,
            self.hashfull,
            self.elapsed.as_millis(),
        )?;
        for mv in &self.pv {
            write!(f, " {mv}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mate_distance_in_moves() {
        assert_eq!(mate_distance(mate_in(1)), Some(1));
        assert_eq!(mate_distance(mate_in(3)), Some(2));
        assert_eq!(mate_distance(mate_in(5)), Some(3));
        assert_eq!(mate_distance(mated_in(2)), Some(-1));
        assert_eq!(mate_distance(mated_in(4)), Some(-2));
        assert_eq!(mate_distance(150), None);
        assert_eq!(mate_distance(TB_WIN), None);
    }

    #[test]
    fn uci_score_rendering() {
        assert_eq!(UciScore(23).to_string(), "cp 23");
        assert_eq!(UciScore(mate_in(3)).to_string(), "mate 2");
        assert_eq!(UciScore(mated_in(2)).to_string(), "mate -1");
    }

    #[test]
    fn info_line_lists_the_pv() {
        use arbor_core::Square;

        let info = SearchInfo {
            depth: 3,
            seldepth: 5,
            multipv: 1,
            score: 17,
            nodes: 1234,
            nps: 5000,
            elapsed: Duration::from_millis(246),
            hashfull: 2,
            pv: vec![Move::new(Square::E2, Square::E4), Move::new(Square::E7, Square::E5)],
        };
        assert_eq!(
            info.to_string(),
            "info depth 3 seldepth 5 multipv 1 score cp 17 nodes 1234 nps 5000 hashfull 2 time 246 pv e2e4 e7e5"
        );
    }
}
