//! Root search, aspiration windows and the iterative-deepening loop run by
//! every worker.

use std::time::Duration;

use arbor_core::{Board, Move};
use tracing::{debug, trace};

use crate::search::heuristics::Continuation;
use crate::search::negamax::{SearchContext, negamax};
use crate::search::ordering::MovePicker;
use crate::search::params::{
    ASPIRATION_BASE, ASPIRATION_DIVISOR, ASPIRATION_MAX_DELTA, ASPIRATION_MIN_DEPTH, LMR_MIN_DEPTH,
    helper_skips, reduction,
};
use crate::search::tt::Bound;
use crate::search::{INF, PvLine, SearchInfo, is_mate_score, mated_in};

/// Result of one root search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootOutcome {
    pub score: i32,
    pub best_move: Move,
    pub pv: Vec<Move>,
}

/// Search every root move not in `excluded` to `depth` within
/// `(alpha, beta)`.
///
/// With `allow_shortcut`, an exact root entry of at least `depth` whose
/// score falls inside the window is returned without searching, its PV
/// rebuilt from the table.
pub fn root_search(
    ctx: &mut SearchContext<'_>,
    root: &Board,
    depth: i32,
    mut alpha: i32,
    beta: i32,
    excluded: &[Move],
    allow_shortcut: bool,
) -> RootOutcome {
    ctx.pv.clear_ply(0);
    ctx.count_node();

    let tt_entry = ctx.probe_tt(root, 0);
    if allow_shortcut
        && excluded.is_empty()
        && ctx.pruning.tt_cutoffs
        && let Some(entry) = tt_entry
        && entry.bound == Bound::Exact
        && entry.depth >= depth
        && entry.score > alpha
        && entry.score < beta
        && root.is_legal(entry.best_move)
    {
        return RootOutcome {
            score: entry.score,
            best_move: entry.best_move,
            pv: pv_from_table(ctx, root, entry.best_move, depth),
        };
    }

    let in_check = root.in_check();
    let tt_move = tt_entry.map_or(Move::NULL, |e| e.best_move);
    let cx = Continuation::root(root.side_to_move());
    let mut picker = if in_check {
        MovePicker::evasions(root, tt_move, cx)
    } else {
        MovePicker::new(root, tt_move, ctx.stack[0].killers, cx, ctx.heuristics)
    };
    ctx.stack[0].static_eval = if in_check {
        None
    } else {
        Some(ctx.evaluate(root))
    };
    ctx.stack[2].killers = [Move::NULL; 2];

    let original_alpha = alpha;
    let mut best_score = -INF;
    let mut best_move = Move::NULL;
    let mut moves_searched = 0usize;

    while let Some(mv) = picker.next(root, ctx.heuristics) {
        if excluded.contains(&mv) {
            continue;
        }
        let child = root.make_move(mv);
        let gives_check = child.in_check();
        let tactical = root.is_tactical(mv);
        ctx.stack[0].moved = root.moved_piece(mv).map(|role| (role, mv.dest()));

        let new_depth = depth - 1;
        ctx.path.push(root.hash());
        let score = if moves_searched == 0 {
            -negamax(&child, new_depth, 1, -beta, -alpha, ctx)
        } else {
            let mut r = 0;
            if ctx.pruning.lmr && depth >= LMR_MIN_DEPTH && !tactical && !in_check && !gives_check {
                r = (reduction(depth, moves_searched + 1) - 1).clamp(0, (new_depth - 1).max(0));
            }
            let mut score = -negamax(&child, new_depth - r, 1, -alpha - 1, -alpha, ctx);
            if score > alpha && r > 0 {
                score = -negamax(&child, new_depth, 1, -alpha - 1, -alpha, ctx);
            }
            if score > alpha && score < beta {
                score = -negamax(&child, new_depth, 1, -beta, -alpha, ctx);
            }
            score
        };
        ctx.path.pop();
        moves_searched += 1;

        if ctx.stopped() {
            break;
        }

        if score > best_score {
            best_score = score;
            best_move = mv;
            if score > alpha {
                alpha = score;
                ctx.pv.update(0, mv);
                if alpha >= beta {
                    break;
                }
            }
        }
    }

    if moves_searched == 0 && !ctx.stopped() {
        let score = if in_check { mated_in(0) } else { 0 };
        return RootOutcome {
            score,
            best_move: Move::NULL,
            pv: Vec::new(),
        };
    }

    if !ctx.stopped() && excluded.is_empty() {
        let bound = if best_score >= beta {
            Bound::Lower
        } else if alpha > original_alpha {
            Bound::Exact
        } else {
            Bound::Upper
        };
        ctx.tt.store(
            root.hash(),
            depth,
            best_score,
            ctx.stack[0].static_eval,
            best_move,
            bound,
            0,
        );
    }

    let pv = match ctx.pv.root_pv() {
        [] => vec![best_move],
        line => line.to_vec(),
    };
    RootOutcome {
        score: best_score,
        best_move: pv[0],
        pv,
    }
}

/// Follow table moves from `first` for at most `depth` plies.
fn pv_from_table(ctx: &SearchContext<'_>, root: &Board, first: Move, depth: i32) -> Vec<Move> {
    let mut pv = vec![first];
    let mut seen = vec![root.hash()];
    let mut board = root.make_move(first);
    while pv.len() < depth.max(1) as usize {
        if seen.contains(&board.hash()) {
            break;
        }
        seen.push(board.hash());
        let Some(entry) = ctx.tt.probe(board.hash(), pv.len()) else {
            break;
        };
        if entry.best_move.is_null() || !board.is_legal(entry.best_move) {
            break;
        }
        pv.push(entry.best_move);
        board = board.make_move(entry.best_move);
    }
    pv
}

/// Root search wrapped in an aspiration window around `prev`.
///
/// The window starts at `±(14 + |prev| / 25)`. On a fail the failing side
/// moves out by the current delta, the delta doubles, and once it passes
/// 1000 that side opens fully.
pub fn aspiration(
    ctx: &mut SearchContext<'_>,
    root: &Board,
    depth: i32,
    prev: Option<i32>,
    excluded: &[Move],
    main: bool,
) -> RootOutcome {
    let prev = match prev {
        Some(score)
            if ctx.pruning.aspiration
                && depth >= ASPIRATION_MIN_DEPTH
                && !is_mate_score(score) =>
        {
            score
        }
        _ => return root_search(ctx, root, depth, -INF, INF, excluded, true),
    };

    let mut delta = ASPIRATION_BASE + prev.abs() / ASPIRATION_DIVISOR;
    let mut alpha = (prev - delta).max(-INF);
    let mut beta = (prev + delta).min(INF);

    loop {
        let outcome = root_search(ctx, root, depth, alpha, beta, excluded, true);
        if ctx.stopped() {
            return outcome;
        }

        if outcome.score <= alpha {
            trace!(depth, alpha, beta, score = outcome.score, "aspiration fail low");
            if main {
                ctx.control.time().report_fail_low();
            }
            alpha = (outcome.score - delta).max(-INF);
            delta *= 2;
            if delta > ASPIRATION_MAX_DELTA {
                alpha = -INF;
            }
        } else if outcome.score >= beta {
            trace!(depth, alpha, beta, score = outcome.score, "aspiration fail high");
            beta = (outcome.score + delta).min(INF);
            delta *= 2;
            if delta > ASPIRATION_MAX_DELTA {
                beta = INF;
            }
        } else {
            return outcome;
        }
        ctx.stats.aspiration_researches += 1;
    }
}

/// Lines of the deepest iteration a worker completed.
#[derive(Debug, Clone)]
pub struct Completed {
    pub depth: i32,
    pub seldepth: usize,
    /// Best first.
    pub lines: Vec<PvLine>,
}

/// Iterative deepening for one worker.
///
/// Worker 0 is the main worker: it searches every depth, reports each line
/// through `on_info` and asks the time manager whether to go on. Helpers
/// sit out some depths and run a single PV. Only iterations that finished
/// before the stop flag was raised are returned.
pub fn iterative_deepening(
    ctx: &mut SearchContext<'_>,
    root: &Board,
    thread_id: usize,
    multi_pv: usize,
    on_info: &mut dyn FnMut(&SearchInfo),
) -> Option<Completed> {
    let main = thread_id == 0;
    let root_moves = root.legal_moves().len();
    let lines_wanted = if main { multi_pv.clamp(1, root_moves.max(1)) } else { 1 };
    let max_depth = ctx.control.time().depth_limit();

    let mut completed: Option<Completed> = None;
    let mut prev_scores: Vec<Option<i32>> = vec![None; lines_wanted];

    for depth in 1..=max_depth {
        if !main && helper_skips(thread_id, depth) {
            continue;
        }

        let mut lines: Vec<PvLine> = Vec::with_capacity(lines_wanted);
        let mut excluded: Vec<Move> = Vec::with_capacity(lines_wanted);
        for prev in prev_scores.iter().take(lines_wanted) {
            let outcome = aspiration(ctx, root, depth, *prev, &excluded, main);
            if ctx.stopped() || outcome.best_move.is_null() {
                break;
            }
            excluded.push(outcome.best_move);
            lines.push(PvLine {
                score: outcome.score,
                depth,
                pv: outcome.pv,
            });
        }
        if ctx.stopped() || lines.is_empty() {
            break;
        }

        lines.sort_by(|a, b| b.score.cmp(&a.score));
        for (prev, line) in prev_scores.iter_mut().zip(&lines) {
            *prev = Some(line.score);
        }

        let best = lines[0].clone();
        if main {
            let nodes = ctx.total_nodes();
            let elapsed = ctx.control.time().elapsed();
            let hashfull = ctx.tt.hashfull();
            for (index, line) in lines.iter().enumerate() {
                on_info(&SearchInfo {
                    depth,
                    seldepth: ctx.seldepth,
                    multipv: index + 1,
                    score: line.score,
                    nodes,
                    nps: nps(nodes, elapsed),
                    elapsed,
                    hashfull,
                    pv: line.pv.clone(),
                });
            }
            debug!(
                depth,
                score = best.score,
                best_move = %best.best_move(),
                nodes,
                "iteration complete"
            );
        }

        completed = Some(Completed {
            depth,
            seldepth: ctx.seldepth,
            lines,
        });

        if main
            && !ctx
                .control
                .time()
                .continue_search(depth, best.best_move(), best.score, ctx.total_nodes())
        {
            break;
        }
    }

    ctx.flush_nodes();
    completed
}

fn nps(nodes: u64, elapsed: Duration) -> u64 {
    let ms = elapsed.as_millis().max(1) as u64;
    nodes.saturating_mul(1000) / ms
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::AtomicBool;

    use super::*;
    use crate::config::PruningConfig;
    use crate::eval::Hce;
    use crate::search::control::SearchControl;
    use crate::search::heuristics::Heuristics;
    use crate::search::tt::TranspositionTable;

    #[test]
    fn root_search_finds_back_rank_mate() {
        let board: Board = "6k1/5ppp/8/8/8/8/8/R5K1 w - - 0 1".parse().unwrap();
        let tt = TranspositionTable::new(1);
        let mut heuristics = Heuristics::new();
        let control = SearchControl::infinite(Arc::new(AtomicBool::new(false)));
        let mut ctx =
            SearchContext::new(&tt, &mut heuristics, &Hce, &control, PruningConfig::all(), &[]);

        let outcome = root_search(&mut ctx, &board, 2, -INF, INF, &[], false);
        assert_eq!(outcome.best_move.to_uci(), "a1a8");
        assert_eq!(outcome.score, crate::search::mate_in(1));
        assert_eq!(outcome.pv[0], outcome.best_move);
    }

    #[test]
    fn exclusion_skips_the_best_move() {
        let board: Board = "6k1/5ppp/8/8/8/8/8/R5K1 w - - 0 1".parse().unwrap();
        let tt = TranspositionTable::new(1);
        let mut heuristics = Heuristics::new();
        let control = SearchControl::infinite(Arc::new(AtomicBool::new(false)));
        let mut ctx =
            SearchContext::new(&tt, &mut heuristics, &Hce, &control, PruningConfig::all(), &[]);

        let mate = board.find_move("a1a8").unwrap();
        let outcome = root_search(&mut ctx, &board, 2, -INF, INF, &[mate], false);
        assert_ne!(outcome.best_move, mate);
        assert!(!is_mate_score(outcome.score));
    }

    #[test]
    fn exact_root_entry_shortcuts() {
        let board = Board::starting_position();
        let tt = TranspositionTable::new(1);
        let mut heuristics = Heuristics::new();
        let control = SearchControl::infinite(Arc::new(AtomicBool::new(false)));
        let mut ctx =
            SearchContext::new(&tt, &mut heuristics, &Hce, &control, PruningConfig::all(), &[]);

        let first = root_search(&mut ctx, &board, 4, -INF, INF, &[], true);
        let nodes = ctx.nodes;
        let again = root_search(&mut ctx, &board, 3, -INF, INF, &[], true);
        assert_eq!(ctx.nodes, nodes + 1);
        assert_eq!(again.best_move, first.best_move);
        assert_eq!(again.score, first.score);
    }

    #[test]
    fn nps_guards_zero_elapsed() {
        assert_eq!(nps(5000, Duration::ZERO), 5_000_000);
        assert_eq!(nps(5000, Duration::from_secs(1)), 5000);
    }
}
