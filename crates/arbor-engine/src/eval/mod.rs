//! Static evaluation.
//!
//! The search only sees the [`Evaluator`] trait. [`Hce`] is the bundled
//! hand-crafted implementation: material, tapered piece-square tables and a
//! bishop-pair bonus, enough to give the search something to chew on.

pub mod pst;
pub mod score;

use arbor_core::{Board, Color, Role};

use crate::eval::score::{S, Score};

/// Phase of a full starting complement of non-pawn material.
///
/// Weights: Knight=1, Bishop=1, Rook=2, Queen=4.
pub const MAX_PHASE: i32 = 24;

const PHASE_WEIGHT: [(Role, i32); 4] = [
    (Role::Knight, 1),
    (Role::Bishop, 1),
    (Role::Rook, 2),
    (Role::Queen, 4),
];

const BISHOP_PAIR: Score = S(30, 50);

/// Game phase in `0..=MAX_PHASE`; `MAX_PHASE` is a full middlegame.
///
/// Promoted pieces cannot push the result above the maximum.
pub fn game_phase(board: &Board) -> i32 {
    PHASE_WEIGHT
        .iter()
        .map(|&(role, weight)| board.pieces(role).count() as i32 * weight)
        .sum::<i32>()
        .min(MAX_PHASE)
}

/// Static evaluation of a position.
///
/// Implementations must be colour-symmetric: mirroring the board and
/// swapping colours leaves the side-to-move score unchanged.
pub trait Evaluator: Send + Sync {
    /// Centipawn score from the side to move's point of view.
    fn evaluate(&self, board: &Board) -> i32;
}

/// Hand-crafted evaluation: material + PST + bishop pair.
#[derive(Debug, Clone, Copy, Default)]
pub struct Hce;

impl Evaluator for Hce {
    fn evaluate(&self, board: &Board) -> i32 {
        evaluate(board)
    }
}

/// Evaluate `board` with [`Hce`], side-to-move relative.
pub fn evaluate(board: &Board) -> i32 {
    let mut score = Score::ZERO;
    for (sq, piece) in board.pieces_iter() {
        let value = pst::piece_square(piece.color, piece.role, sq);
        match piece.color {
            Color::White => score += value,
            Color::Black => score -= value,
        }
    }

    let bishops = board.pieces(Role::Bishop);
    if (bishops & board.side(Color::White)).count() >= 2 {
        score += BISHOP_PAIR;
    }
    if (bishops & board.side(Color::Black)).count() >= 2 {
        score -= BISHOP_PAIR;
    }

    let white = score.taper(game_phase(board));
    match board.side_to_move() {
        Color::White => white,
        Color::Black => -white,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starting_position_is_balanced() {
        let board = Board::starting_position();
        assert_eq!(game_phase(&board), MAX_PHASE);
        assert_eq!(evaluate(&board), 0);
    }

    #[test]
    fn bare_kings_are_phase_zero() {
        let board: Board = "8/8/4k3/8/8/4K3/8/8 w - - 0 1".parse().unwrap();
        assert_eq!(game_phase(&board), 0);
    }

    #[test]
    fn missing_queen_drops_phase_by_four() {
        let board: Board = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNB1KBNR w KQkq - 0 1"
            .parse()
            .unwrap();
        assert_eq!(game_phase(&board), 20);
        assert!(evaluate(&board) < -500);
    }

    #[test]
    fn score_flips_with_side_to_move() {
        let white: Board = "4k3/8/8/8/8/8/8/3QK3 w - - 0 1".parse().unwrap();
        let black: Board = "4k3/8/8/8/8/8/8/3QK3 b - - 0 1".parse().unwrap();
        assert!(evaluate(&white) > 0);
        assert_eq!(evaluate(&white), -evaluate(&black));
    }

    #[test]
    fn mirrored_position_scores_the_same() {
        let board: Board = "r1bqkbnr/pppp1ppp/2n5/4p3/4P3/5N2/PPPP1PPP/RNBQKB1R w KQkq - 2 3"
            .parse()
            .unwrap();
        let mirror: Board = "rnbqkb1r/pppp1ppp/5n2/4p3/4P3/2N5/PPPP1PPP/R1BQKBNR b KQkq - 2 3"
            .parse()
            .unwrap();
        assert_eq!(evaluate(&board), evaluate(&mirror));
    }

    #[test]
    fn trait_object_matches_free_function() {
        let board: Board = "4k3/8/8/8/8/8/8/3QK3 w - - 0 1".parse().unwrap();
        let eval: &dyn Evaluator = &Hce;
        assert_eq!(eval.evaluate(&board), evaluate(&board));
    }
}
