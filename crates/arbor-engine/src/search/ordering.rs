//! Staged move ordering.
//!
//! A [`MovePicker`] hands out the moves of one node in stages, generating and
//! scoring each stage only when the previous ones are exhausted: the TT move
//! and killers are often enough for a cutoff, in which case no quiet move is
//! ever generated.

use arbor_core::{Board, Move, MoveFilter, PromotionPiece, Role, piece_value, role_index, see, see_ge};

use crate::search::heuristics::{Continuation, Heuristics};

/// MVV-LVA weights: Pawn=1, Knight=3, Bishop=3, Rook=5, Queen=9, King=0.
const MVV_LVA_WEIGHT: [i32; 6] = [1, 3, 3, 5, 9, 0];

/// `victim_weight * 16 - attacker_weight`.
pub fn mvv_lva(victim: Role, attacker: Role) -> i32 {
    MVV_LVA_WEIGHT[role_index(victim)] * 16 - MVV_LVA_WEIGHT[role_index(attacker)]
}

/// Score bands.
const GOOD_TACTICAL: i32 = 10_000;
const QUEEN_PROMOTION: i32 = 20_000;
const UNDER_PROMOTION: i32 = -100_000;
const BAD_CAPTURE: i32 = -50_000;

/// Fixed-capacity move buffer consumed by selection sort.
struct ScoredMoves {
    moves: [Move; 256],
    scores: [i32; 256],
    len: usize,
    cursor: usize,
}

impl ScoredMoves {
    fn new() -> Self {
        Self {
            moves: [Move::NULL; 256],
            scores: [0; 256],
            len: 0,
            cursor: 0,
        }
    }

    fn push(&mut self, mv: Move, score: i32) {
        debug_assert!(self.len < 256, "ScoredMoves overflow");
        self.moves[self.len] = mv;
        self.scores[self.len] = score;
        self.len += 1;
    }

    fn reset(&mut self) {
        self.len = 0;
        self.cursor = 0;
    }

    /// Yield the highest-scored remaining move.
    fn pick_best(&mut self) -> Option<Move> {
        if self.cursor >= self.len {
            return None;
        }
        let mut best_idx = self.cursor;
        for i in (self.cursor + 1)..self.len {
            if self.scores[i] > self.scores[best_idx] {
                best_idx = i;
            }
        }
        self.moves.swap(self.cursor, best_idx);
        self.scores.swap(self.cursor, best_idx);
        let mv = self.moves[self.cursor];
        self.cursor += 1;
        Some(mv)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    TtMove,
    Killer1,
    Killer2,
    Counter,
    GenTactical,
    GoodTactical,
    GenQuiet,
    Quiet,
    Deferred,
    GenEvasions,
    Evasions,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Main,
    Quiescence,
    Evasions,
    ProbCut { threshold: i32 },
}

/// Lazily generating, staged move iterator for one node.
pub struct MovePicker {
    kind: Kind,
    stage: Stage,
    tt_move: Move,
    killers: [Move; 2],
    counter: Move,
    cx: Continuation,
    skip_quiets: bool,
    /// Good tacticals, then quiets.
    current: ScoredMoves,
    /// Bad captures and under-promotions, tried last.
    deferred: ScoredMoves,
}

impl MovePicker {
    fn with_kind(kind: Kind, stage: Stage, tt_move: Move, cx: Continuation) -> Self {
        Self {
            kind,
            stage,
            tt_move,
            killers: [Move::NULL; 2],
            counter: Move::NULL,
            cx,
            skip_quiets: false,
            current: ScoredMoves::new(),
            deferred: ScoredMoves::new(),
        }
    }

    /// Picker for a full-width node that is not in check.
    ///
    /// Recalled moves (TT, killers, counter) are checked for legality; stale
    /// ones are dropped.
    pub fn new(
        board: &Board,
        tt_move: Move,
        killers: [Move; 2],
        cx: Continuation,
        heuristics: &Heuristics,
    ) -> Self {
        let tt_move = if !tt_move.is_null() && board.is_legal(tt_move) {
            tt_move
        } else {
            Move::NULL
        };
        let mut picker = Self::with_kind(Kind::Main, Stage::TtMove, tt_move, cx);

        let usable = |mv: Move, taken: &[Move]| {
            !mv.is_null()
                && !taken.contains(&mv)
                && !board.is_tactical(mv)
                && board.is_legal(mv)
        };
        if usable(killers[0], &[tt_move]) {
            picker.killers[0] = killers[0];
        }
        if usable(killers[1], &[tt_move, picker.killers[0]]) {
            picker.killers[1] = killers[1];
        }
        let counter = heuristics.counter_move(&cx);
        if usable(counter, &[tt_move, picker.killers[0], picker.killers[1]]) {
            picker.counter = counter;
        }
        picker
    }

    /// Picker for a node in check: every evasion, tacticals first.
    pub fn evasions(board: &Board, tt_move: Move, cx: Continuation) -> Self {
        let tt_move = if !tt_move.is_null() && board.is_legal(tt_move) {
            tt_move
        } else {
            Move::NULL
        };
        Self::with_kind(Kind::Evasions, Stage::TtMove, tt_move, cx)
    }

    /// Quiescence picker: captures that do not lose material and queen
    /// promotions.
    pub fn qsearch(board: &Board, tt_move: Move) -> Self {
        let cx = Continuation::root(board.side_to_move());
        let tt_move = if !tt_move.is_null()
            && board.is_legal(tt_move)
            && winning_tactical(board, tt_move, 0)
        {
            tt_move
        } else {
            Move::NULL
        };
        Self::with_kind(Kind::Quiescence, Stage::TtMove, tt_move, cx)
    }

    /// ProbCut picker: captures whose SEE reaches `threshold`.
    pub fn probcut(board: &Board, tt_move: Move, threshold: i32) -> Self {
        let cx = Continuation::root(board.side_to_move());
        let tt_move = if !tt_move.is_null()
            && board.is_legal(tt_move)
            && board.is_capture(tt_move)
            && see_ge(board, tt_move, threshold)
        {
            tt_move
        } else {
            Move::NULL
        };
        Self::with_kind(Kind::ProbCut { threshold }, Stage::TtMove, tt_move, cx)
    }

    /// Drop the remaining quiet stages (late-move pruning).
    pub fn skip_quiets(&mut self) {
        self.skip_quiets = true;
    }

    pub fn tt_move(&self) -> Move {
        self.tt_move
    }

    /// Next move to search, or `None` when the node is exhausted.
    pub fn next(&mut self, board: &Board, heuristics: &Heuristics) -> Option<Move> {
        loop {
            match self.stage {
                Stage::TtMove => {
                    self.stage = match self.kind {
                        Kind::Main => Stage::Killer1,
                        Kind::Evasions => Stage::GenEvasions,
                        Kind::Quiescence | Kind::ProbCut { .. } => Stage::GenTactical,
                    };
                    if !self.tt_move.is_null() {
                        return Some(self.tt_move);
                    }
                }
                Stage::Killer1 => {
                    self.stage = Stage::Killer2;
                    if !self.skip_quiets && !self.killers[0].is_null() {
                        return Some(self.killers[0]);
                    }
                }
                Stage::Killer2 => {
                    self.stage = Stage::Counter;
                    if !self.skip_quiets && !self.killers[1].is_null() {
                        return Some(self.killers[1]);
                    }
                }
                Stage::Counter => {
                    self.stage = Stage::GenTactical;
                    if !self.skip_quiets && !self.counter.is_null() {
                        return Some(self.counter);
                    }
                }
                Stage::GenTactical => {
                    self.generate_tactical(board);
                    self.stage = Stage::GoodTactical;
                }
                Stage::GoodTactical => {
                    if let Some(mv) = self.current.pick_best() {
                        return Some(mv);
                    }
                    self.stage = match self.kind {
                        Kind::Main => Stage::GenQuiet,
                        _ => Stage::Done,
                    };
                }
                Stage::GenQuiet => {
                    self.stage = Stage::Deferred;
                    if !self.skip_quiets {
                        self.generate_quiet(board, heuristics);
                        self.stage = Stage::Quiet;
                    }
                }
                Stage::Quiet => {
                    if !self.skip_quiets
                        && let Some(mv) = self.current.pick_best()
                    {
                        return Some(mv);
                    }
                    self.stage = Stage::Deferred;
                }
                Stage::Deferred => {
                    if let Some(mv) = self.deferred.pick_best() {
                        return Some(mv);
                    }
                    self.stage = Stage::Done;
                }
                Stage::GenEvasions => {
                    self.generate_evasions(board, heuristics);
                    self.stage = Stage::Evasions;
                }
                Stage::Evasions => {
                    if let Some(mv) = self.current.pick_best() {
                        return Some(mv);
                    }
                    self.stage = Stage::Done;
                }
                Stage::Done => return None,
            }
        }
    }

    fn generate_tactical(&mut self, board: &Board) {
        self.current.reset();
        for &mv in board.generate(MoveFilter::Tactical).iter() {
            if mv == self.tt_move {
                continue;
            }
            match self.kind {
                Kind::ProbCut { threshold } => {
                    if board.is_capture(mv) && see_ge(board, mv, threshold) {
                        self.current.push(mv, tactical_score(board, mv));
                    }
                }
                Kind::Quiescence => {
                    if winning_tactical(board, mv, 0) {
                        self.current.push(mv, tactical_score(board, mv));
                    }
                }
                Kind::Main | Kind::Evasions => {
                    if let Some(promo) = mv.promotion()
                        && promo != PromotionPiece::Queen
                    {
                        self.deferred
                            .push(mv, UNDER_PROMOTION + piece_value(promo.role()));
                    } else if winning_tactical(board, mv, 0) {
                        self.current.push(mv, tactical_score(board, mv));
                    } else {
                        self.deferred.push(mv, BAD_CAPTURE + see(board, mv));
                    }
                }
            }
        }
    }

    fn generate_quiet(&mut self, board: &Board, heuristics: &Heuristics) {
        self.current.reset();
        for &mv in board.generate(MoveFilter::Quiet).iter() {
            if mv == self.tt_move || self.killers.contains(&mv) || mv == self.counter {
                continue;
            }
            let Some(role) = board.moved_piece(mv) else {
                continue;
            };
            self.current
                .push(mv, heuristics.quiet_score(&self.cx, role, mv.dest()));
        }
    }

    fn generate_evasions(&mut self, board: &Board, heuristics: &Heuristics) {
        self.current.reset();
        for &mv in board.legal_moves().iter() {
            if mv == self.tt_move {
                continue;
            }
            let score = if board.is_tactical(mv) {
                if winning_tactical(board, mv, 0) {
                    tactical_score(board, mv)
                } else {
                    BAD_CAPTURE + see(board, mv)
                }
            } else {
                match board.moved_piece(mv) {
                    Some(role) => heuristics.quiet_score(&self.cx, role, mv.dest()),
                    None => 0,
                }
            };
            self.current.push(mv, score);
        }
    }
}

/// Queen promotions, and captures with SEE at least `threshold`.
fn winning_tactical(board: &Board, mv: Move, threshold: i32) -> bool {
    match mv.promotion() {
        Some(PromotionPiece::Queen) => true,
        Some(_) => false,
        None => board.is_capture(mv) && see_ge(board, mv, threshold),
    }
}

fn tactical_score(board: &Board, mv: Move) -> i32 {
    let capture = match (board.captured_piece(mv), board.moved_piece(mv)) {
        (Some(victim), Some(attacker)) => mvv_lva(victim, attacker),
        _ => 0,
    };
    if mv.is_promotion() {
        QUEEN_PROMOTION + capture
    } else {
        GOOD_TACTICAL + capture
    }
}
