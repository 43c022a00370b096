//! Static Exchange Evaluation (SEE).
//!
//! Plays out the capture sequence on a single square, each side always
//! recapturing with its least valuable attacker, and reports the material
//! balance for the side making the first move. X-ray attackers behind a
//! moved slider are picked up as the occupancy shrinks.

use shakmaty::attacks::{bishop_attacks, rook_attacks};
use shakmaty::{Bitboard, Color, Position, Role, Square};

use crate::board::Board;
use crate::chess_move::Move;

/// Exchange values, indexed by [`role_index`].
pub const SEE_VALUE: [i32; 6] = [100, 320, 330, 500, 900, 20_000];

/// Zero-based index of a role (`Pawn` = 0 … `King` = 5).
#[inline]
pub const fn role_index(role: Role) -> usize {
    role as usize - 1
}

/// Exchange value of a role.
#[inline]
pub const fn piece_value(role: Role) -> i32 {
    SEE_VALUE[role_index(role)]
}

fn least_valuable_attacker(attackers: Bitboard, board: &Board) -> Option<(Square, Role)> {
    Role::ALL.into_iter().find_map(|role| {
        (attackers & board.pieces(role))
            .first()
            .map(|sq| (sq, role))
    })
}

/// Full Static Exchange Evaluation of `mv` from the mover's point of view.
///
/// Castling always scores 0.
pub fn see(board: &Board, mv: Move) -> i32 {
    if mv.is_castle() || mv.is_null() {
        return 0;
    }
    let src = mv.source();
    let dst = mv.dest();
    let Some(mover) = board.moved_piece(mv) else {
        return 0;
    };
    let us = board.side_to_move();

    let mut occ = board.occupied().without(src);
    if mv.is_en_passant() {
        let captured_sq = Square::from_coords(dst.file(), src.rank());
        occ = occ.without(captured_sq);
    }

    let mut gain = [0i32; 32];
    gain[0] = board.captured_piece(mv).map_or(0, piece_value);
    let mut on_square = match mv.promotion() {
        Some(promo) => {
            gain[0] += piece_value(promo.role()) - piece_value(Role::Pawn);
            piece_value(promo.role())
        }
        None => piece_value(mover),
    };

    let diagonal = board.pieces(Role::Bishop) | board.pieces(Role::Queen);
    let orthogonal = board.pieces(Role::Rook) | board.pieces(Role::Queen);
    let position = board.position().board();
    let mut attackers = (position.attacks_to(dst, Color::White, occ)
        | position.attacks_to(dst, Color::Black, occ))
        & occ;

    let mut side = !us;
    let mut depth = 0usize;
    while let Some((sq, role)) = least_valuable_attacker(attackers & board.side(side), board) {
        depth += 1;
        if depth >= gain.len() {
            break;
        }
        gain[depth] = on_square - gain[depth - 1];
        on_square = piece_value(role);

        occ = occ.without(sq);
        if matches!(role, Role::Pawn | Role::Bishop | Role::Queen) {
            attackers |= bishop_attacks(dst, occ) & diagonal;
        }
        if matches!(role, Role::Rook | Role::Queen) {
            attackers |= rook_attacks(dst, occ) & orthogonal;
        }
        attackers &= occ;
        side = !side;
    }

    while depth > 0 {
        depth -= 1;
        gain[depth] = -((-gain[depth]).max(gain[depth + 1]));
    }
    gain[0]
}

/// `true` if the exchange started by `mv` nets at least `threshold`.
pub fn see_ge(board: &Board, mv: Move, threshold: i32) -> bool {
    see(board, mv) >= threshold
}

#[cfg(test)]
mod tests {
    use super::*;

    fn board(fen: &str) -> Board {
        fen.parse().unwrap()
    }

    #[test]
    fn pawn_takes_undefended_knight() {
        let b = board("4k3/8/8/3n4/4P3/8/8/4K3 w - - 0 1");
        let mv = b.find_move("e4d5").unwrap();
        assert_eq!(see(&b, mv), 320);
    }

    #[test]
    fn pawn_takes_defended_knight() {
        let b = board("4k3/8/4p3/3n4/4P3/8/8/4K3 w - - 0 1");
        let mv = b.find_move("e4d5").unwrap();
        assert_eq!(see(&b, mv), 220);
    }

    #[test]
    fn queen_takes_defended_pawn_loses() {
        let b = board("4k3/8/3p4/2p5/8/4Q3/8/4K3 w - - 0 1");
        let mv = b.find_move("e3c5").unwrap();
        assert_eq!(see(&b, mv), 100 - 900);
    }

    #[test]
    fn xray_rook_behind_rook_counts() {
        // Rxd5 Rxd5 Rxd5: white ends a rook up on the exchange of a pawn.
        let b = board("3rk3/8/8/3p4/8/8/3R4/3RK3 w - - 0 1");
        let mv = b.find_move("d2d5").unwrap();
        assert_eq!(see(&b, mv), 100);
    }

    #[test]
    fn quiet_move_into_pawn_attack_is_negative() {
        let b = board("4k3/8/4p3/8/3N4/8/8/4K3 w - - 0 1");
        let hang = b.find_move("d4f5").unwrap();
        assert_eq!(see(&b, hang), -320);
        let safe = b.find_move("d4b5").unwrap();
        assert_eq!(see(&b, safe), 0);
    }

    #[test]
    fn see_ge_threshold() {
        let b = board("4k3/8/8/3n4/4P3/8/8/4K3 w - - 0 1");
        let mv = b.find_move("e4d5").unwrap();
        assert!(see_ge(&b, mv, 0));
        assert!(see_ge(&b, mv, 300));
        assert!(!see_ge(&b, mv, 400));
    }

    #[test]
    fn castling_is_neutral() {
        let b = board("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1");
        let mv = b.find_move("e1g1").unwrap();
        assert_eq!(see(&b, mv), 0);
    }
}
