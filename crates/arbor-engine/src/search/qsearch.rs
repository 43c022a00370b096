//! Quiescence search: resolve captures before trusting the static eval.

use arbor_core::{Board, Move, piece_value};

use crate::search::heuristics::Continuation;
use crate::search::negamax::SearchContext;
use crate::search::ordering::MovePicker;
use crate::search::params::DELTA_MARGIN;
use crate::search::tt::Bound;
use crate::search::{INF, MAX_PLY, mated_in};

/// Tactical-only search at the horizon.
///
/// Stand-pat on the static eval unless in check; in check every evasion is
/// searched and having none is mate. Captures that lose material are never
/// tried, and captures that cannot lift the score to `alpha` even with
/// [`DELTA_MARGIN`] to spare are skipped.
pub fn qsearch(
    board: &Board,
    ply: usize,
    mut alpha: i32,
    beta: i32,
    ctx: &mut SearchContext<'_>,
) -> i32 {
    ctx.pv.clear_ply(ply);
    if ctx.poll() {
        return 0;
    }
    ctx.seldepth = ctx.seldepth.max(ply);

    let pruning = ctx.pruning;
    if !pruning.quiescence {
        return ctx.evaluate(board);
    }

    if ctx.is_draw(board) {
        return ctx.draw_score(board);
    }

    let in_check = board.in_check();
    if ply >= MAX_PLY - 1 {
        return if in_check { 0 } else { ctx.evaluate(board) };
    }

    let pv_node = beta - alpha > 1;
    let tt_entry = ctx.probe_tt(board, ply);
    if let Some(entry) = tt_entry
        && !pv_node
        && pruning.tt_cutoffs
        && entry.bound.cuts(entry.score, alpha, beta)
    {
        return entry.score;
    }
    let tt_move = tt_entry.map_or(Move::NULL, |e| e.best_move);

    let original_alpha = alpha;
    let static_eval;
    let mut best_score;
    let mut picker;
    if in_check {
        static_eval = None;
        best_score = -INF;
        picker = MovePicker::evasions(board, tt_move, Continuation::root(board.side_to_move()));
    } else {
        let eval = tt_entry
            .and_then(|e| e.eval)
            .unwrap_or_else(|| ctx.evaluate(board));
        if eval >= beta {
            return eval;
        }
        static_eval = Some(eval);
        best_score = eval;
        alpha = alpha.max(eval);
        picker = MovePicker::qsearch(board, tt_move);
    }

    let mut best_move = Move::NULL;
    let mut searched = 0usize;

    while let Some(mv) = picker.next(board, ctx.heuristics) {
        if let Some(eval) = static_eval
            && pruning.delta
            && !mv.is_promotion()
        {
            let gain = board.captured_piece(mv).map_or(0, piece_value);
            if eval + gain + DELTA_MARGIN <= alpha {
                continue;
            }
        }

        let child = board.make_move(mv);
        ctx.path.push(board.hash());
        let score = -qsearch(&child, ply + 1, -beta, -alpha, ctx);
        ctx.path.pop();
        searched += 1;

        if ctx.stopped() {
            return 0;
        }

        if score > best_score {
            best_score = score;
            if score > alpha {
                best_move = mv;
                alpha = score;
                ctx.pv.update(ply, mv);
                if alpha >= beta {
                    break;
                }
            }
        }
    }

    if in_check && searched == 0 {
        return mated_in(ply);
    }

    let bound = if best_score >= beta {
        Bound::Lower
    } else if alpha > original_alpha {
        Bound::Exact
    } else {
        Bound::Upper
    };
    ctx.tt
        .store(board.hash(), 0, best_score, static_eval, best_move, bound, ply);

    best_score
}
