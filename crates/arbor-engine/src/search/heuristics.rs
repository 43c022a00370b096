//! Quiet move ordering statistics: butterfly history, counter moves and the
//! two continuation histories.
//!
//! One [`Heuristics`] belongs to each worker. Values are aged (halved) at the
//! start of every search and only zeroed on a new game.

use arbor_core::{Color, Move, Role, Square, role_index};

/// Maximum absolute value for any history score.
pub const HISTORY_MAX: i32 = 16_384;

/// Upper bound on a single bonus or malus.
const MAX_BONUS: i32 = 400;

const ROLE_SQUARES: usize = 6 * 64;

#[inline]
fn color_index(color: Color) -> usize {
    match color {
        Color::White => 0,
        Color::Black => 1,
    }
}

#[inline]
fn piece_square(role: Role, sq: Square) -> usize {
    role_index(role) * 64 + sq as usize
}

#[inline]
fn add_clamped(entry: &mut i32, delta: i32) {
    *entry = (*entry + delta).clamp(-HISTORY_MAX, HISTORY_MAX);
}

/// Bonus (and malus) for a cutoff found at `depth`.
pub fn history_bonus(depth: i32) -> i32 {
    (depth * depth).min(MAX_BONUS)
}

/// Two-ply history indexed by `[previous piece/square][piece/square]`.
pub struct ContinuationHistory {
    table: Box<[i32]>,
}

impl ContinuationHistory {
    fn new() -> Self {
        Self {
            table: vec![0; ROLE_SQUARES * ROLE_SQUARES].into_boxed_slice(),
        }
    }

    #[inline]
    fn index(prev: (Role, Square), role: Role, dest: Square) -> usize {
        piece_square(prev.0, prev.1) * ROLE_SQUARES + piece_square(role, dest)
    }

    pub fn score(&self, prev: Option<(Role, Square)>, role: Role, dest: Square) -> i32 {
        prev.map_or(0, |p| self.table[Self::index(p, role, dest)])
    }

    fn update(&mut self, prev: Option<(Role, Square)>, role: Role, dest: Square, delta: i32) {
        if let Some(p) = prev {
            add_clamped(&mut self.table[Self::index(p, role, dest)], delta);
        }
    }

    fn scale(&mut self, f: impl Fn(i32) -> i32) {
        self.table.iter_mut().for_each(|v| *v = f(*v));
    }
}

/// The moves leading to a node that the continuation tables key on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Continuation {
    /// Side to move at the node.
    pub us: Color,
    /// Opponent's last move (one ply back).
    pub counter: Option<(Role, Square)>,
    /// Our own previous move (two plies back).
    pub followup: Option<(Role, Square)>,
}

impl Continuation {
    /// A node with no move history, such as the root.
    pub const fn root(us: Color) -> Self {
        Self {
            us,
            counter: None,
            followup: None,
        }
    }
}

/// Per-worker quiet move statistics.
pub struct Heuristics {
    /// Butterfly history: `[color][piece][dest]`.
    history: Box<[i32]>,
    /// Refutation of the opponent's last move: `[color][prev piece][prev dest]`.
    counter_moves: Box<[Move]>,
    counter_history: ContinuationHistory,
    followup_history: ContinuationHistory,
}

impl Heuristics {
    pub fn new() -> Self {
        Self {
            history: vec![0; 2 * ROLE_SQUARES].into_boxed_slice(),
            counter_moves: vec![Move::NULL; 2 * ROLE_SQUARES].into_boxed_slice(),
            counter_history: ContinuationHistory::new(),
            followup_history: ContinuationHistory::new(),
        }
    }

    /// Zero every table (new game).
    pub fn clear(&mut self) {
        self.history.fill(0);
        self.counter_moves.fill(Move::NULL);
        self.counter_history.scale(|_| 0);
        self.followup_history.scale(|_| 0);
    }

    /// Halve every score. Counter moves are kept.
    pub fn age(&mut self) {
        self.history.iter_mut().for_each(|v| *v /= 2);
        self.counter_history.scale(|v| v / 2);
        self.followup_history.scale(|v| v / 2);
    }

    #[inline]
    fn history_index(us: Color, role: Role, dest: Square) -> usize {
        color_index(us) * ROLE_SQUARES + piece_square(role, dest)
    }

    pub fn history(&self, us: Color, role: Role, dest: Square) -> i32 {
        self.history[Self::history_index(us, role, dest)]
    }

    /// Ordering score of a quiet move: history plus both continuations.
    pub fn quiet_score(&self, cx: &Continuation, role: Role, dest: Square) -> i32 {
        self.history(cx.us, role, dest)
            + self.counter_history.score(cx.counter, role, dest)
            + self.followup_history.score(cx.followup, role, dest)
    }

    /// Stored reply to the opponent's last move, or `Move::NULL`.
    pub fn counter_move(&self, cx: &Continuation) -> Move {
        match cx.counter {
            Some((role, sq)) => self.counter_moves[Self::history_index(cx.us, role, sq)],
            None => Move::NULL,
        }
    }

    fn update_one(&mut self, cx: &Continuation, role: Role, dest: Square, delta: i32) {
        add_clamped(
            &mut self.history[Self::history_index(cx.us, role, dest)],
            delta,
        );
        self.counter_history.update(cx.counter, role, dest, delta);
        self.followup_history.update(cx.followup, role, dest, delta);
    }

    /// Reward the quiet move `best` that produced a cutoff or raised alpha,
    /// punish the quiet moves tried before it, and remember `best` as the
    /// counter to the opponent's last move.
    ///
    /// `tried` lists `(move, moving piece)` for quiets searched at this node;
    /// `best` itself may appear in it and is skipped.
    pub fn update_quiet_stats(
        &mut self,
        cx: &Continuation,
        best: Move,
        role: Role,
        depth: i32,
        tried: &[(Move, Role)],
    ) {
        let bonus = history_bonus(depth);
        self.update_one(cx, role, best.dest(), bonus);
        for &(mv, r) in tried {
            if mv != best {
                self.update_one(cx, r, mv.dest(), -bonus);
            }
        }
        if let Some((prev_role, prev_sq)) = cx.counter {
            self.counter_moves[Self::history_index(cx.us, prev_role, prev_sq)] = best;
        }
    }
}

impl Default for Heuristics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cx() -> Continuation {
        Continuation {
            us: Color::White,
            counter: Some((Role::Pawn, Square::E5)),
            followup: Some((Role::Knight, Square::F3)),
        }
    }

    #[test]
    fn bonus_and_malus() {
        let mut h = Heuristics::new();
        let best = Move::new(Square::G1, Square::F3);
        let tried = Move::new(Square::B1, Square::C3);

        h.update_quiet_stats(
            &cx(),
            best,
            Role::Knight,
            4,
            &[(tried, Role::Knight), (best, Role::Knight)],
        );

        assert_eq!(h.history(Color::White, Role::Knight, Square::F3), 16);
        assert_eq!(h.history(Color::White, Role::Knight, Square::C3), -16);
        // history + counter + followup
        assert_eq!(h.quiet_score(&cx(), Role::Knight, Square::F3), 48);
        assert_eq!(h.quiet_score(&cx(), Role::Knight, Square::C3), -48);
        // the other side's table is untouched
        assert_eq!(h.history(Color::Black, Role::Knight, Square::F3), 0);
    }

    #[test]
    fn counter_move_is_remembered() {
        let mut h = Heuristics::new();
        let best = Move::new(Square::G1, Square::F3);
        assert_eq!(h.counter_move(&cx()), Move::NULL);

        h.update_quiet_stats(&cx(), best, Role::Knight, 3, &[]);
        assert_eq!(h.counter_move(&cx()), best);
        assert_eq!(h.counter_move(&Continuation::root(Color::White)), Move::NULL);
    }

    #[test]
    fn history_clamped() {
        let mut h = Heuristics::new();
        let mv = Move::new(Square::A2, Square::A3);
        for _ in 0..200 {
            h.update_quiet_stats(&cx(), mv, Role::Pawn, 20, &[]);
        }
        assert_eq!(h.history(Color::White, Role::Pawn, Square::A3), HISTORY_MAX);
        assert_eq!(history_bonus(20), MAX_BONUS);
    }

    #[test]
    fn age_halves_and_clear_zeroes() {
        let mut h = Heuristics::new();
        let mv = Move::new(Square::G1, Square::F3);
        h.update_quiet_stats(&cx(), mv, Role::Knight, 4, &[]);

        h.age();
        assert_eq!(h.history(Color::White, Role::Knight, Square::F3), 8);
        assert_eq!(h.counter_move(&cx()), mv);

        h.clear();
        assert_eq!(h.quiet_score(&cx(), Role::Knight, Square::F3), 0);
        assert_eq!(h.counter_move(&cx()), Move::NULL);
    }
}
