//! Material and piece-square tables.
//!
//! Tables are laid out from White's side, index 0 = a1 … 63 = h8. Black
//! looks up the vertically mirrored square, which keeps the evaluation
//! colour-symmetric.

use arbor_core::{Color, Role, Square, role_index};

use crate::eval::score::{S, Score};

/// Piece values, indexed by [`role_index`]. The king carries no material.
pub const MATERIAL: [Score; 6] = [
    S(90, 120),
    S(330, 300),
    S(345, 320),
    S(480, 540),
    S(1000, 980),
    S(0, 0),
];

#[rustfmt::skip]
const PAWN: [Score; 64] = [
    S(0,0),   S(0,0),   S(0,0),   S(0,0),   S(0,0),   S(0,0),   S(0,0),   S(0,0),
    S(-4,6),  S(2,4),   S(0,4),   S(-12,2), S(-12,2), S(0,4),   S(2,4),   S(-4,6),
    S(-6,2),  S(-2,2),  S(4,0),   S(6,0),   S(6,0),   S(4,0),   S(-2,2),  S(-6,2),
    S(-4,10), S(0,8),   S(8,4),   S(22,2),  S(22,2),  S(8,4),   S(0,8),   S(-4,10),
    S(2,24),  S(6,20),  S(12,14), S(26,10), S(26,10), S(12,14), S(6,20),  S(2,24),
    S(12,56), S(18,50), S(26,40), S(34,34), S(34,34), S(26,40), S(18,50), S(12,56),
    S(60,120),S(64,116),S(70,108),S(74,100),S(74,100),S(70,108),S(64,116),S(60,120),
    S(0,0),   S(0,0),   S(0,0),   S(0,0),   S(0,0),   S(0,0),   S(0,0),   S(0,0),
];

#[rustfmt::skip]
const KNIGHT: [Score; 64] = [
    S(-60,-44),S(-24,-30),S(-20,-18),S(-16,-12),S(-16,-12),S(-20,-18),S(-24,-30),S(-60,-44),
    S(-28,-28),S(-14,-14),S(-2,-6),  S(2,0),    S(2,0),    S(-2,-6),  S(-14,-14),S(-28,-28),
    S(-18,-16),S(2,-4),   S(10,4),   S(14,10),  S(14,10),  S(10,4),   S(2,-4),   S(-18,-16),
    S(-12,-10),S(6,2),    S(16,12),  S(22,18),  S(22,18),  S(16,12),  S(6,2),    S(-12,-10),
    S(-10,-10),S(8,2),    S(20,12),  S(26,18),  S(26,18),  S(20,12),  S(8,2),    S(-10,-10),
    S(-14,-16),S(6,-4),   S(18,4),   S(22,10),  S(22,10),  S(18,4),   S(6,-4),   S(-14,-16),
    S(-26,-28),S(-12,-14),S(0,-6),   S(6,0),    S(6,0),    S(0,-6),   S(-12,-14),S(-26,-28),
    S(-70,-44),S(-30,-30),S(-22,-18),S(-18,-12),S(-18,-12),S(-22,-18),S(-30,-30),S(-70,-44),
];

#[rustfmt::skip]
const BISHOP: [Score; 64] = [
    S(-18,-16),S(-6,-10), S(-10,-10),S(-12,-6), S(-12,-6), S(-10,-10),S(-6,-10), S(-18,-16),
    S(-4,-8),  S(10,-4),  S(4,-2),   S(2,0),    S(2,0),    S(4,-2),   S(10,-4),  S(-4,-8),
    S(-6,-6),  S(6,-2),   S(8,2),    S(8,4),    S(8,4),    S(8,2),    S(6,-2),   S(-6,-6),
    S(-4,-4),  S(4,0),    S(10,4),   S(14,8),   S(14,8),   S(10,4),   S(4,0),    S(-4,-4),
    S(-4,-4),  S(6,0),    S(10,4),   S(14,8),   S(14,8),   S(10,4),   S(6,0),    S(-4,-4),
    S(-6,-6),  S(4,-2),   S(6,2),    S(8,4),    S(8,4),    S(6,2),    S(4,-2),   S(-6,-6),
    S(-10,-8), S(-2,-4),  S(0,-2),   S(0,0),    S(0,0),    S(0,-2),   S(-2,-4),  S(-10,-8),
    S(-20,-16),S(-10,-10),S(-12,-10),S(-14,-6), S(-14,-6), S(-12,-10),S(-10,-10),S(-20,-16),
];

#[rustfmt::skip]
const ROOK: [Score; 64] = [
    S(-6,-2), S(-4,-2), S(0,-2),  S(6,-4),  S(6,-4),  S(0,-2),  S(-4,-2), S(-6,-2),
    S(-14,-4),S(-8,-4), S(-4,-4), S(-2,-4), S(-2,-4), S(-4,-4), S(-8,-4), S(-14,-4),
    S(-12,-2),S(-6,-2), S(-2,-2), S(0,-2),  S(0,-2),  S(-2,-2), S(-6,-2), S(-12,-2),
    S(-10,0), S(-4,0),  S(-2,0),  S(0,0),   S(0,0),   S(-2,0),  S(-4,0),  S(-10,0),
    S(-8,2),  S(-2,2),  S(0,2),   S(2,2),   S(2,2),   S(0,2),   S(-2,2),  S(-8,2),
    S(-4,4),  S(2,4),   S(4,4),   S(6,4),   S(6,4),   S(4,4),   S(2,4),   S(-4,4),
    S(10,8),  S(16,8),  S(18,8),  S(20,8),  S(20,8),  S(18,8),  S(16,8),  S(10,8),
    S(4,6),   S(6,6),   S(8,6),   S(10,6),  S(10,6),  S(8,6),   S(6,6),   S(4,6),
];

#[rustfmt::skip]
const QUEEN: [Score; 64] = [
    S(-14,-24),S(-10,-16),S(-6,-12),S(-2,-8), S(-2,-8), S(-6,-12),S(-10,-16),S(-14,-24),
    S(-10,-16),S(-2,-8),  S(2,-4),  S(2,-2),  S(2,-2),  S(2,-4),  S(-2,-8),  S(-10,-16),
    S(-6,-12), S(2,-4),   S(4,2),   S(4,6),   S(4,6),   S(4,2),   S(2,-4),   S(-6,-12),
    S(-4,-8),  S(2,-2),   S(4,6),   S(6,12),  S(6,12),  S(4,6),   S(2,-2),   S(-4,-8),
    S(-4,-8),  S(2,-2),   S(4,6),   S(6,12),  S(6,12),  S(4,6),   S(2,-2),   S(-4,-8),
    S(-6,-12), S(0,-4),   S(4,2),   S(4,6),   S(4,6),   S(4,2),   S(0,-4),   S(-6,-12),
    S(-10,-16),S(-4,-8),  S(0,-4),  S(0,-2),  S(0,-2),  S(0,-4),  S(-4,-8),  S(-10,-16),
    S(-16,-24),S(-12,-16),S(-8,-12),S(-4,-8), S(-4,-8), S(-8,-12),S(-12,-16),S(-16,-24),
];

#[rustfmt::skip]
const KING: [Score; 64] = [
    S(24,-60), S(36,-36), S(10,-24), S(-14,-20),S(-14,-20),S(10,-24), S(36,-36), S(24,-60),
    S(18,-30), S(14,-12), S(-6,-4),  S(-24,0),  S(-24,0),  S(-6,-4),  S(14,-12), S(18,-30),
    S(-14,-22),S(-22,0),  S(-34,10), S(-44,16), S(-44,16), S(-34,10), S(-22,0),  S(-14,-22),
    S(-30,-18),S(-40,6),  S(-52,18), S(-64,26), S(-64,26), S(-52,18), S(-40,6),  S(-30,-18),
    S(-40,-16),S(-50,8),  S(-62,20), S(-72,28), S(-72,28), S(-62,20), S(-50,8),  S(-40,-16),
    S(-48,-18),S(-58,6),  S(-68,16), S(-78,22), S(-78,22), S(-68,16), S(-58,6),  S(-48,-18),
    S(-56,-26),S(-64,-4), S(-74,6),  S(-84,10), S(-84,10), S(-74,6),  S(-64,-4), S(-56,-26),
    S(-64,-50),S(-70,-30),S(-80,-20),S(-90,-14),S(-90,-14),S(-80,-20),S(-70,-30),S(-64,-50),
];

const TABLES: [&[Score; 64]; 6] = [&PAWN, &KNIGHT, &BISHOP, &ROOK, &QUEEN, &KING];

/// Material plus placement bonus for a `color` `role` on `sq`.
#[inline]
pub fn piece_square(color: Color, role: Role, sq: Square) -> Score {
    let relative = match color {
        Color::White => sq,
        Color::Black => sq.flip_vertical(),
    };
    let idx = role_index(role);
    MATERIAL[idx] + TABLES[idx][relative as usize]
}
