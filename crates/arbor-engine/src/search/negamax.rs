//! Principal variation search with pruning, extensions and reductions.

use arbor_core::{Board, Color, Move, Role, see_ge};

use crate::config::PruningConfig;
use crate::eval::Evaluator;
use crate::oracle::{Oracle, Wdl};
use crate::search::control::SearchControl;
use crate::search::heuristics::{Continuation, Heuristics};
use crate::search::ordering::MovePicker;
use crate::search::params::*;
use crate::search::qsearch::qsearch;
use crate::search::stack::SearchStack;
use crate::search::tt::{Bound, TranspositionTable, TtEntry};
use crate::search::{INF, MATE_THRESHOLD, MAX_PLY, SearchStats, is_mate_score, mate_in, mated_in};

/// Quiet moves remembered per node for history maluses.
const MAX_QUIETS: usize = 64;

/// Triangular PV table for collecting principal variation lines.
///
/// Each row `ply` contains the PV continuation from that ply onward.
pub struct PvTable {
    moves: [[Move; MAX_PLY]; MAX_PLY],
    len: [usize; MAX_PLY],
}

impl PvTable {
    pub fn new() -> Self {
        Self {
            moves: [[Move::NULL; MAX_PLY]; MAX_PLY],
            len: [0; MAX_PLY],
        }
    }

    /// Clear the PV line at `ply` (called at the top of each node).
    pub fn clear_ply(&mut self, ply: usize) {
        if ply < MAX_PLY {
            self.len[ply] = 0;
        }
    }

    /// Set `mv` as the best move at `ply`, followed by the line of `ply + 1`.
    pub fn update(&mut self, ply: usize, mv: Move) {
        if ply >= MAX_PLY {
            return;
        }
        self.moves[ply][0] = mv;

        let child_ply = ply + 1;
        if child_ply < MAX_PLY {
            let copy_len = self.len[child_ply].min(MAX_PLY - 1);
            let (top, bottom) = self.moves.split_at_mut(child_ply);
            top[ply][1..1 + copy_len].copy_from_slice(&bottom[0][..copy_len]);
            self.len[ply] = 1 + copy_len;
        } else {
            self.len[ply] = 1;
        }
    }

    /// The principal variation from the root.
    pub fn root_pv(&self) -> &[Move] {
        &self.moves[0][..self.len[0]]
    }
}

impl Default for PvTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Everything one worker threads through its recursive search.
pub struct SearchContext<'a> {
    pub tt: &'a TranspositionTable,
    pub heuristics: &'a mut Heuristics,
    pub evaluator: &'a dyn Evaluator,
    pub oracle: Option<&'a dyn Oracle>,
    pub control: &'a SearchControl,
    pub pruning: PruningConfig,
    pub stack: Box<SearchStack>,
    pub pv: Box<PvTable>,
    /// Hashes of the game history followed by the current search path.
    pub path: Vec<u64>,
    /// Nodes visited by this worker.
    pub nodes: u64,
    unflushed: u64,
    pub seldepth: usize,
    /// Null-move pruning is disabled below this ply during verification.
    nmp_min_ply: usize,
    /// Centipawns the side to move at the root gives up to avoid a draw.
    contempt: i32,
    root_side: Color,
    pub stats: SearchStats,
}

impl<'a> SearchContext<'a> {
    pub fn new(
        tt: &'a TranspositionTable,
        heuristics: &'a mut Heuristics,
        evaluator: &'a dyn Evaluator,
        control: &'a SearchControl,
        pruning: PruningConfig,
        history: &[u64],
    ) -> Self {
        Self {
            tt,
            heuristics,
            evaluator,
            oracle: None,
            control,
            pruning,
            stack: Box::default(),
            pv: Box::default(),
            path: history.to_vec(),
            nodes: 0,
            unflushed: 0,
            seldepth: 0,
            nmp_min_ply: 0,
            contempt: 0,
            root_side: Color::White,
            stats: SearchStats::default(),
        }
    }

    pub fn with_oracle(mut self, oracle: Option<&'a dyn Oracle>) -> Self {
        self.oracle = oracle;
        self
    }

    /// Score draws as `-contempt` for `root_side` and `+contempt` for its
    /// opponent.
    pub fn with_contempt(mut self, contempt: i32, root_side: Color) -> Self {
        self.contempt = contempt;
        self.root_side = root_side;
        self
    }

    /// Count a node. Returns `true` when the search must unwind.
    #[inline]
    pub(crate) fn poll(&mut self) -> bool {
        self.nodes += 1;
        self.unflushed += 1;
        if self.unflushed >= NODE_POLL_INTERVAL {
            let n = std::mem::take(&mut self.unflushed);
            return self.control.poll(n);
        }
        self.control.is_stopped()
    }

    /// Count a node without polling.
    #[inline]
    pub(crate) fn count_node(&mut self) {
        self.nodes += 1;
        self.unflushed += 1;
    }

    /// Push any nodes not yet counted globally.
    pub(crate) fn flush_nodes(&mut self) {
        let n = std::mem::take(&mut self.unflushed);
        if n > 0 {
            self.control.add_nodes(n);
        }
    }

    /// Global node count including this worker's unflushed nodes.
    pub(crate) fn total_nodes(&self) -> u64 {
        self.control.total_nodes() + self.unflushed
    }

    #[inline]
    pub(crate) fn stopped(&self) -> bool {
        self.control.is_stopped()
    }

    pub(crate) fn evaluate(&self, board: &Board) -> i32 {
        self.evaluator.evaluate(board)
    }

    pub(crate) fn probe_tt(&mut self, board: &Board, ply: usize) -> Option<TtEntry> {
        self.stats.tt_probes += 1;
        let entry = self.tt.probe(board.hash(), ply);
        if entry.is_some() {
            self.stats.tt_hits += 1;
        }
        entry
    }

    /// The position repeats one earlier in the game or on the current path.
    pub(crate) fn is_repetition(&self, board: &Board) -> bool {
        let hash = board.hash();
        self.path
            .iter()
            .rev()
            .take(board.halfmove_clock() as usize)
            .skip(1)
            .step_by(2)
            .any(|&h| h == hash)
    }

    /// Draw by the fifty-move rule, insufficient material or repetition.
    /// Mate on the move that reaches the fifty-move limit is still mate.
    pub(crate) fn is_draw(&self, board: &Board) -> bool {
        if board.is_insufficient_material() || self.is_repetition(board) {
            return true;
        }
        board.halfmove_clock() >= 100 && !(board.in_check() && board.legal_moves().is_empty())
    }

    /// Score of a drawn node for the side to move there.
    #[inline]
    pub(crate) fn draw_score(&self, board: &Board) -> i32 {
        if board.side_to_move() == self.root_side {
            -self.contempt
        } else {
            self.contempt
        }
    }

    /// Continuation-history keys for a node at `ply`.
    pub(crate) fn continuation(&self, us: Color, ply: usize) -> Continuation {
        Continuation {
            us,
            counter: self.stack.moved_before(ply, 1),
            followup: self.stack.moved_before(ply, 2),
        }
    }
}

/// Search `board` to `depth` with window `(alpha, beta)`.
///
/// Returns the score for the side to move. The principal variation is
/// collected into `ctx.pv`. Returns 0 once the search has been stopped; such
/// results must be discarded by the caller.
pub fn negamax(
    board: &Board,
    depth: i32,
    ply: usize,
    mut alpha: i32,
    mut beta: i32,
    ctx: &mut SearchContext<'_>,
) -> i32 {
    if depth <= 0 {
        return qsearch(board, ply, alpha, beta, ctx);
    }

    ctx.pv.clear_ply(ply);
    if ctx.poll() {
        return 0;
    }
    ctx.seldepth = ctx.seldepth.max(ply);

    if ctx.is_draw(board) {
        return ctx.draw_score(board);
    }

    let in_check = board.in_check();
    if ply >= MAX_PLY - 1 {
        return if in_check { 0 } else { ctx.evaluate(board) };
    }

    let pruning = ctx.pruning;
    if pruning.mate_distance {
        alpha = alpha.max(mated_in(ply));
        beta = beta.min(mate_in(ply + 1));
        if alpha >= beta {
            return alpha;
        }
    }

    let pv_node = beta - alpha > 1;
    let excluded = ctx.stack[ply].excluded;
    let us = board.side_to_move();

    // Transposition table
    let tt_entry = if excluded.is_null() {
        ctx.probe_tt(board, ply)
    } else {
        None
    };
    let mut tt_move = tt_entry.map_or(Move::NULL, |e| e.best_move);
    if let Some(entry) = tt_entry
        && !pv_node
        && pruning.tt_cutoffs
        && entry.depth >= depth
        && entry.bound.cuts(entry.score, alpha, beta)
    {
        return entry.score;
    }

    // Tablebase
    if let Some(oracle) = ctx.oracle
        && excluded.is_null()
        && board.halfmove_clock() == 0
        && board.piece_count() <= oracle.max_pieces()
        && let Some(wdl) = oracle.probe_wdl(board)
    {
        ctx.stats.tb_hits += 1;
        let score = wdl.score(ply);
        let bound = match wdl {
            Wdl::Win => Bound::Lower,
            Wdl::Loss => Bound::Upper,
            Wdl::Draw => Bound::Exact,
        };
        if bound.cuts(score, alpha, beta) {
            ctx.tt
                .store(board.hash(), depth, score, None, Move::NULL, bound, ply);
            return score;
        }
    }

    // Static evaluation
    let static_eval = if in_check {
        None
    } else {
        Some(
            tt_entry
                .and_then(|e| e.eval)
                .unwrap_or_else(|| ctx.evaluate(board)),
        )
    };
    ctx.stack[ply].static_eval = static_eval;
    ctx.stack[ply + 2].killers = [Move::NULL; 2];
    let improving = ctx.stack.improving(ply);

    // Pre-move pruning
    if let Some(eval) = static_eval
        && !pv_node
        && excluded.is_null()
    {
        if pruning.reverse_futility
            && depth <= RFP_MAX_DEPTH
            && !is_mate_score(beta)
            && eval - RFP_MARGIN * depth >= beta
        {
            return eval;
        }

        if pruning.razoring && depth <= RAZOR_MAX_DEPTH && eval + RAZOR_MARGIN <= alpha {
            let razor_alpha = alpha - RAZOR_MARGIN;
            let score = qsearch(board, ply, razor_alpha, razor_alpha + 1, ctx);
            if ctx.stopped() {
                return 0;
            }
            if score <= razor_alpha {
                return score;
            }
        }

        if pruning.null_move
            && depth >= NMP_MIN_DEPTH
            && eval >= beta
            && ply >= ctx.nmp_min_ply
            && !is_mate_score(beta)
            && board.has_non_pawn_material(us)
            && !ctx.stack.ancestor(ply, 1).is_some_and(|e| e.null_move)
            && let Some(child) = board.make_null_move()
        {
            let r = 2 + (32 * depth + (eval - beta).min(384)) / 128;

            ctx.stats.null_moves += 1;
            ctx.stack[ply].null_move = true;
            ctx.stack[ply].moved = None;
            ctx.path.push(board.hash());
            let mut score = -negamax(&child, depth - 1 - r, ply + 1, -beta, -beta + 1, ctx);
            ctx.path.pop();
            ctx.stack[ply].null_move = false;

            if ctx.stopped() {
                return 0;
            }
            if score >= beta {
                if is_mate_score(score) {
                    score = beta;
                }
                if depth < NMP_VERIFY_DEPTH || ctx.nmp_min_ply != 0 {
                    return score;
                }
                // Verify with null moves disabled for the first part of the subtree.
                ctx.nmp_min_ply = ply + (3 * (depth - r) / 4) as usize;
                let verified = negamax(board, depth - r, ply, beta - 1, beta, ctx);
                ctx.nmp_min_ply = 0;
                ctx.stack[ply].static_eval = static_eval;
                if ctx.stopped() {
                    return 0;
                }
                if verified >= beta {
                    return score;
                }
            }
        }

        if pruning.probcut && depth >= PROBCUT_MIN_DEPTH && !is_mate_score(beta) {
            let pc_beta = beta + PROBCUT_MARGIN;
            let pc_depth = depth - depth / 4 - 4;
            let mut picker = MovePicker::probcut(board, tt_move, pc_beta - eval);
            while let Some(mv) = picker.next(board, ctx.heuristics) {
                let child = board.make_move(mv);
                ctx.stack[ply].moved = board.moved_piece(mv).map(|role| (role, mv.dest()));
                ctx.path.push(board.hash());
                let mut score = -qsearch(&child, ply + 1, -pc_beta, -pc_beta + 1, ctx);
                if score >= pc_beta && pc_depth > 0 {
                    score = -negamax(&child, pc_depth, ply + 1, -pc_beta, -pc_beta + 1, ctx);
                }
                ctx.path.pop();
                if ctx.stopped() {
                    return 0;
                }
                if score >= pc_beta {
                    ctx.tt.store(
                        board.hash(),
                        pc_depth + 1,
                        score,
                        static_eval,
                        mv,
                        Bound::Lower,
                        ply,
                    );
                    return score;
                }
            }
        }
    }

    // Internal iterative deepening
    if pruning.iid && tt_move.is_null() && excluded.is_null() {
        let iid_depth = if pv_node && depth >= IID_PV_DEPTH {
            Some(depth - depth / 4 - 1)
        } else if !pv_node && depth >= IID_NON_PV_DEPTH {
            Some(depth / 2)
        } else {
            None
        };
        if let Some(iid_depth) = iid_depth {
            negamax(board, iid_depth, ply, alpha, beta, ctx);
            if ctx.stopped() {
                return 0;
            }
            ctx.stack[ply].static_eval = static_eval;
            ctx.pv.clear_ply(ply);
            tt_move = ctx
                .tt
                .probe(board.hash(), ply)
                .map_or(Move::NULL, |e| e.best_move);
        }
    }

    // Move loop
    let cx = ctx.continuation(us, ply);
    let mut picker = if in_check {
        MovePicker::evasions(board, tt_move, cx)
    } else {
        MovePicker::new(board, tt_move, ctx.stack[ply].killers, cx, ctx.heuristics)
    };
    let tt_move = picker.tt_move();

    let original_alpha = alpha;
    let mut best_score = -INF;
    let mut best_move = Move::NULL;
    let mut moves_searched = 0usize;
    let mut quiets = [(Move::NULL, Role::Pawn); MAX_QUIETS];
    let mut quiet_count = 0usize;

    while let Some(mv) = picker.next(board, ctx.heuristics) {
        if mv == excluded {
            continue;
        }
        let Some(role) = board.moved_piece(mv) else {
            continue;
        };
        let tactical = board.is_tactical(mv);
        let is_killer = ctx.stack[ply].is_killer(mv);
        let child = board.make_move(mv);
        let gives_check = child.in_check();

        // Move-loop pruning
        if moves_searched > 0
            && !in_check
            && !gives_check
            && best_score > -MATE_THRESHOLD
            && let Some(eval) = static_eval
        {
            if !tactical {
                if pruning.late_move
                    && !pv_node
                    && depth <= LMP_MAX_DEPTH
                    && quiet_count >= lmp_count(depth, improving)
                {
                    picker.skip_quiets();
                    continue;
                }
                if pruning.futility
                    && depth <= FUTILITY_MAX_DEPTH
                    && eval + FUTILITY_BASE + FUTILITY_PER_DEPTH * depth <= alpha
                {
                    continue;
                }
                if pruning.see_pruning
                    && depth <= SEE_QUIET_MAX_DEPTH
                    && !see_ge(board, mv, -SEE_QUIET_MARGIN * depth * depth)
                {
                    continue;
                }
            } else if pruning.see_pruning
                && depth <= SEE_CAPTURE_MAX_DEPTH
                && !see_ge(board, mv, -SEE_CAPTURE_MARGIN * depth)
            {
                continue;
            }
        }

        // Extensions
        let mut extension = 0;
        if pruning.singular_extension
            && mv == tt_move
            && excluded.is_null()
            && depth >= SINGULAR_MIN_DEPTH
            && let Some(entry) = tt_entry
            && entry.best_move == mv
            && entry.depth >= depth - SINGULAR_TT_DEPTH_SLACK
            && matches!(entry.bound, Bound::Lower | Bound::Exact)
            && !is_mate_score(entry.score)
        {
            let se_beta = entry.score - depth;
            ctx.stack[ply].excluded = mv;
            let score = negamax(board, depth / 2 - 1, ply, se_beta - 1, se_beta, ctx);
            ctx.stack[ply].excluded = Move::NULL;
            ctx.stack[ply].static_eval = static_eval;
            if ctx.stopped() {
                return 0;
            }
            if score < se_beta {
                ctx.stats.singular_extensions += 1;
                extension = 1;
            } else if se_beta >= beta {
                // Multi-cut: more than one move beats beta.
                return se_beta;
            }
        } else if pruning.check_extension && gives_check && see_ge(board, mv, 0) {
            extension = 1;
        }

        ctx.stack[ply].moved = Some((role, mv.dest()));
        if !tactical && quiet_count < MAX_QUIETS {
            quiets[quiet_count] = (mv, role);
            quiet_count += 1;
        }

        let new_depth = depth - 1 + extension;
        ctx.path.push(board.hash());
        let score = if moves_searched == 0 {
            -negamax(&child, new_depth, ply + 1, -beta, -alpha, ctx)
        } else {
            let mut r = 0;
            if pruning.lmr && depth >= LMR_MIN_DEPTH && !tactical && !in_check && !gives_check {
                r = reduction(depth, moves_searched + 1);
                if pv_node {
                    r -= 1;
                }
                if !improving {
                    r += 1;
                }
                if is_killer {
                    r -= 1;
                }
                r = r.clamp(0, (new_depth - 1).max(0));
            }

            let mut score = -negamax(&child, new_depth - r, ply + 1, -alpha - 1, -alpha, ctx);
            if score > alpha && r > 0 {
                score = -negamax(&child, new_depth, ply + 1, -alpha - 1, -alpha, ctx);
            }
            if score > alpha && score < beta {
                score = -negamax(&child, new_depth, ply + 1, -beta, -alpha, ctx);
            }
            score
        };
        ctx.path.pop();
        moves_searched += 1;

        if ctx.stopped() {
            return 0;
        }

        if score > best_score {
            best_score = score;
            best_move = mv;
            if score > alpha {
                alpha = score;
                ctx.pv.update(ply, mv);
                if alpha >= beta {
                    break;
                }
            }
        }
    }

    if moves_searched == 0 {
        return if !excluded.is_null() {
            alpha
        } else if in_check {
            mated_in(ply)
        } else {
            ctx.draw_score(board)
        };
    }

    if alpha > original_alpha
        && !best_move.is_null()
        && !board.is_tactical(best_move)
        && let Some(role) = board.moved_piece(best_move)
    {
        ctx.heuristics
            .update_quiet_stats(&cx, best_move, role, depth, &quiets[..quiet_count]);
        if best_score >= beta {
            ctx.stack[ply].store_killer(best_move);
        }
    }

    if excluded.is_null() {
        let bound = if best_score >= beta {
            Bound::Lower
        } else if alpha > original_alpha {
            Bound::Exact
        } else {
            Bound::Upper
        };
        let store_move = if bound == Bound::Upper { tt_move } else { best_move };
        ctx.tt.store(
            board.hash(),
            depth,
            best_score,
            static_eval,
            store_move,
            bound,
            ply,
        );
    }

    best_score
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::AtomicBool;

    use super::*;
    use crate::eval::Hce;

    fn search(board: &Board, depth: i32, history: &[u64]) -> i32 {
        let tt = TranspositionTable::new(1);
        let mut heuristics = Heuristics::new();
        let control = SearchControl::infinite(Arc::new(AtomicBool::new(false)));
        let mut ctx = SearchContext::new(
            &tt,
            &mut heuristics,
            &Hce,
            &control,
            PruningConfig::all(),
            history,
        );
        negamax(board, depth, 1, -INF, INF, &mut ctx)
    }

    #[test]
    fn pv_table_collects_lines() {
        use arbor_core::Square;

        let mut pv = PvTable::new();
        let a = Move::new(Square::E2, Square::E4);
        let b = Move::new(Square::E7, Square::E5);
        pv.clear_ply(1);
        pv.update(1, b);
        pv.update(0, a);
        assert_eq!(pv.root_pv(), &[a, b]);
        pv.clear_ply(0);
        assert!(pv.root_pv().is_empty());
    }

    #[test]
    fn mated_node_scores_mate() {
        // Fool's mate: white is checkmated.
        let board: Board = "rnb1kbnr/pppp1ppp/8/4p3/6Pq/5P2/PPPPP2P/RNBQKBNR w KQkq - 1 3"
            .parse()
            .unwrap();
        assert_eq!(search(&board, 3, &[]), mated_in(1));
    }

    #[test]
    fn stalemate_scores_zero() {
        let board: Board = "k7/2Q5/1K6/8/8/8/8/8 b - - 0 1".parse().unwrap();
        assert_eq!(search(&board, 3, &[]), 0);
    }

    #[test]
    fn insufficient_material_is_a_draw() {
        let board: Board = "8/8/4k3/8/8/3NK3/8/8 w - - 0 1".parse().unwrap();
        assert_eq!(search(&board, 4, &[]), 0);
    }

    #[test]
    fn repetition_on_the_path_is_a_draw() {
        // Knights out and back: the node repeats the position two plies up.
        let start = Board::starting_position();
        let b1 = start.make_move(Move::new(arbor_core::Square::G1, arbor_core::Square::F3));
        let b2 = b1.make_move(Move::new(arbor_core::Square::G8, arbor_core::Square::F6));
        let b3 = b2.make_move(Move::new(arbor_core::Square::F3, arbor_core::Square::G1));
        let b4 = b3.make_move(Move::new(arbor_core::Square::F6, arbor_core::Square::G8));
        assert_eq!(b4.hash(), start.hash());

        let history = [start.hash(), b1.hash(), b2.hash(), b3.hash()];
        assert_eq!(search(&b4, 5, &history), 0);
    }

    #[test]
    fn mate_on_the_fiftieth_move_is_still_mate() {
        let mated: Board = "R5k1/5ppp/8/8/8/8/8/6K1 b - - 100 90".parse().unwrap();
        assert_eq!(search(&mated, 3, &[]), mated_in(1));

        // In check with an escape: the clock has run out, it is a draw.
        let escapes: Board = "R5k1/6pp/8/8/8/8/8/6K1 b - - 100 90".parse().unwrap();
        assert_eq!(search(&escapes, 3, &[]), 0);
    }

    #[test]
    fn contempt_shifts_draw_scores_by_side() {
        let board: Board = "8/8/4k3/8/8/3NK3/8/8 w - - 0 1".parse().unwrap();
        let tt = TranspositionTable::new(1);
        let mut heuristics = Heuristics::new();
        let control = SearchControl::infinite(Arc::new(AtomicBool::new(false)));

        for (root_side, expected) in [(Color::White, -25), (Color::Black, 25)] {
            let mut ctx =
                SearchContext::new(&tt, &mut heuristics, &Hce, &control, PruningConfig::all(), &[])
                    .with_contempt(25, root_side);
            assert_eq!(negamax(&board, 3, 1, -INF, INF, &mut ctx), expected);
        }
    }

    #[test]
    fn mate_distance_pruning_collapses_the_window() {
        let board = Board::starting_position();
        let tt = TranspositionTable::new(1);
        let mut heuristics = Heuristics::new();
        let control = SearchControl::infinite(Arc::new(AtomicBool::new(false)));

        // Nothing found at ply 3 can beat a mate already in hand at ply 4.
        let mut ctx =
            SearchContext::new(&tt, &mut heuristics, &Hce, &control, PruningConfig::all(), &[]);
        let score = negamax(&board, 6, 3, mate_in(4), mate_in(2), &mut ctx);
        assert_eq!(score, mate_in(4));
        assert_eq!(ctx.nodes, 1);

        let pruning = PruningConfig {
            mate_distance: false,
            ..PruningConfig::all()
        };
        let mut ctx = SearchContext::new(&tt, &mut heuristics, &Hce, &control, pruning, &[]);
        negamax(&board, 6, 3, mate_in(4), mate_in(2), &mut ctx);
        assert!(ctx.nodes > 1);
    }

    #[test]
    fn null_move_is_not_tried_in_pawn_endings() {
        let tt = TranspositionTable::new(4);
        let mut heuristics = Heuristics::new();
        let control = SearchControl::infinite(Arc::new(AtomicBool::new(false)));

        let pawns_only: Board = "8/8/8/3k4/8/3K4/4P3/8 w - - 0 1".parse().unwrap();
        let mut ctx =
            SearchContext::new(&tt, &mut heuristics, &Hce, &control, PruningConfig::all(), &[]);
        for depth in 1..=8 {
            negamax(&pawns_only, depth, 0, -INF, INF, &mut ctx);
        }
        assert_eq!(ctx.stats.null_moves, 0);

        tt.clear();
        let with_rook: Board = "8/8/8/3k4/8/3K4/4P3/7R w - - 0 1".parse().unwrap();
        let mut ctx =
            SearchContext::new(&tt, &mut heuristics, &Hce, &control, PruningConfig::all(), &[]);
        for depth in 1..=8 {
            negamax(&with_rook, depth, 0, -INF, INF, &mut ctx);
        }
        assert!(ctx.stats.null_moves > 0);
    }

    #[test]
    fn only_move_gets_a_singular_extension() {
        use arbor_core::Square;

        // The king must take the queen; running away loses it all.
        let board: Board = "4k3/8/8/8/8/8/3q4/4K3 w - - 0 1".parse().unwrap();
        let recapture = Move::new(Square::E1, Square::D2);
        assert!(board.is_legal(recapture));

        let run = |pruning: PruningConfig| {
            let tt = TranspositionTable::new(1);
            tt.store(board.hash(), 8, 0, None, recapture, Bound::Lower, 1);
            let mut heuristics = Heuristics::new();
            let control = SearchControl::infinite(Arc::new(AtomicBool::new(false)));
            let mut ctx = SearchContext::new(&tt, &mut heuristics, &Hce, &control, pruning, &[]);
            let score = negamax(&board, 8, 1, -INF, INF, &mut ctx);
            (score, ctx.stats.singular_extensions)
        };

        let (score, extended) = run(PruningConfig::all());
        assert_eq!(score, 0);
        assert!(extended >= 1);

        let (_, extended) = run(PruningConfig {
            singular_extension: false,
            ..PruningConfig::all()
        });
        assert_eq!(extended, 0);
    }

    #[test]
    fn stopped_search_returns_zero() {
        let tt = TranspositionTable::new(1);
        let mut heuristics = Heuristics::new();
        let control = SearchControl::infinite(Arc::new(AtomicBool::new(true)));
        let board = Board::starting_position();
        let mut ctx = SearchContext::new(
            &tt,
            &mut heuristics,
            &Hce,
            &control,
            PruningConfig::all(),
            &[],
        );
        assert_eq!(negamax(&board, 6, 1, -INF, INF, &mut ctx), 0);
        assert_eq!(tt.probe(board.hash(), 1), None);
    }
}
