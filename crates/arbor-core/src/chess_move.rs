//! Chess move representation, bit-packed into a u16.
//!
//! The packed form is what the transposition table, killer slots and
//! counter-move tables store. Conversion to and from `shakmaty::Move`
//! happens in [`Board`](crate::Board), which has the position context
//! (moving role, captured role) the packed form leaves out.

use std::fmt;

use shakmaty::{Role, Square};

const SRC_MASK: u16 = 0x003F;
const DST_MASK: u16 = 0x0FC0;
const PROMO_MASK: u16 = 0x3000;
const KIND_MASK: u16 = 0xC000;
const DST_SHIFT: u32 = 6;
const PROMO_SHIFT: u32 = 12;
const KIND_SHIFT: u32 = 14;

/// The category of a chess move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MoveKind {
    Normal = 0,
    Promotion = 1,
    EnPassant = 2,
    Castling = 3,
}

impl MoveKind {
    const fn bits(self) -> u16 {
        (self as u16) << KIND_SHIFT
    }
}

/// The piece a pawn promotes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PromotionPiece {
    Knight = 0,
    Bishop = 1,
    Rook = 2,
    Queen = 3,
}

impl PromotionPiece {
    /// All promotion pieces in index order.
    pub const ALL: [PromotionPiece; 4] = [
        PromotionPiece::Knight,
        PromotionPiece::Bishop,
        PromotionPiece::Rook,
        PromotionPiece::Queen,
    ];

    /// Convert to the corresponding [`Role`].
    pub const fn role(self) -> Role {
        match self {
            PromotionPiece::Knight => Role::Knight,
            PromotionPiece::Bishop => Role::Bishop,
            PromotionPiece::Rook => Role::Rook,
            PromotionPiece::Queen => Role::Queen,
        }
    }

    /// Inverse of [`role`](Self::role); `None` for pawns and kings.
    pub const fn from_role(role: Role) -> Option<PromotionPiece> {
        match role {
            Role::Knight => Some(PromotionPiece::Knight),
            Role::Bishop => Some(PromotionPiece::Bishop),
            Role::Rook => Some(PromotionPiece::Rook),
            Role::Queen => Some(PromotionPiece::Queen),
            Role::Pawn | Role::King => None,
        }
    }

    /// UCI suffix character.
    pub const fn uci_char(self) -> char {
        match self {
            PromotionPiece::Knight => 'n',
            PromotionPiece::Bishop => 'b',
            PromotionPiece::Rook => 'r',
            PromotionPiece::Queen => 'q',
        }
    }

    const fn bits(self) -> u16 {
        (self as u16) << PROMO_SHIFT
    }
}

/// A chess move encoded in 16 bits.
///
/// ```text
/// bits  0-5:  source square      (0-63)
/// bits  6-11: destination square (0-63)
/// bits 12-13: promotion piece    (Knight=0, Bishop=1, Rook=2, Queen=3)
/// bits 14-15: move kind          (Normal=0, Promotion=1, EnPassant=2, Castling=3)
/// ```
///
/// Castling is encoded as the king's own source and destination (`e1g1`).
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Move(u16);

impl Move {
    /// Null move sentinel (A1→A1, Normal). Never a legal move.
    pub const NULL: Move = Move(0);

    /// Create a normal (quiet or capture) move.
    pub const fn new(source: Square, dest: Square) -> Move {
        Move((source as u16) | ((dest as u16) << DST_SHIFT))
    }

    /// Create a promotion move.
    pub const fn new_promotion(source: Square, dest: Square, promo: PromotionPiece) -> Move {
        Move(
            (source as u16)
                | ((dest as u16) << DST_SHIFT)
                | promo.bits()
                | MoveKind::Promotion.bits(),
        )
    }

    /// Create an en passant capture.
    pub const fn new_en_passant(source: Square, dest: Square) -> Move {
        Move((source as u16) | ((dest as u16) << DST_SHIFT) | MoveKind::EnPassant.bits())
    }

    /// Create a castling move from the king's source and destination squares.
    pub const fn new_castle(king_src: Square, king_dst: Square) -> Move {
        Move((king_src as u16) | ((king_dst as u16) << DST_SHIFT) | MoveKind::Castling.bits())
    }

    /// Rebuild a move from its packed form (as stored in the hash table).
    pub const fn from_raw(raw: u16) -> Move {
        Move(raw)
    }

    /// The packed 16-bit form.
    pub const fn raw(self) -> u16 {
        self.0
    }

    pub const fn source(self) -> Square {
        Square::new((self.0 & SRC_MASK) as u32)
    }

    pub const fn dest(self) -> Square {
        Square::new(((self.0 & DST_MASK) >> DST_SHIFT) as u32)
    }

    pub const fn kind(self) -> MoveKind {
        match (self.0 & KIND_MASK) >> KIND_SHIFT {
            0 => MoveKind::Normal,
            1 => MoveKind::Promotion,
            2 => MoveKind::EnPassant,
            _ => MoveKind::Castling,
        }
    }

    /// Extract the promotion piece.
    ///
    /// Only meaningful when `kind() == MoveKind::Promotion`.
    pub const fn promotion_piece(self) -> PromotionPiece {
        match (self.0 & PROMO_MASK) >> PROMO_SHIFT {
            0 => PromotionPiece::Knight,
            1 => PromotionPiece::Bishop,
            2 => PromotionPiece::Rook,
            _ => PromotionPiece::Queen,
        }
    }

    /// The promotion piece, or `None` for non-promotions.
    pub const fn promotion(self) -> Option<PromotionPiece> {
        if self.is_promotion() {
            Some(self.promotion_piece())
        } else {
            None
        }
    }

    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    pub const fn is_promotion(self) -> bool {
        (self.0 & KIND_MASK) >> KIND_SHIFT == MoveKind::Promotion as u16
    }

    /// Promotion to anything but a queen.
    pub const fn is_under_promotion(self) -> bool {
        self.is_promotion() && !matches!(self.promotion_piece(), PromotionPiece::Queen)
    }

    pub const fn is_en_passant(self) -> bool {
        (self.0 & KIND_MASK) >> KIND_SHIFT == MoveKind::EnPassant as u16
    }

    pub const fn is_castle(self) -> bool {
        (self.0 & KIND_MASK) >> KIND_SHIFT == MoveKind::Castling as u16
    }

    /// Long algebraic (UCI) notation.
    pub fn to_uci(self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            write!(f, "0000")
        } else if self.is_promotion() {
            write!(f, "{}{}{}", self.source(), self.dest(), self.promotion_piece().uci_char())
        } else {
            write!(f, "{}{}", self.source(), self.dest())
        }
    }
}

impl fmt::Debug for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Move({} kind={:?})", self, self.kind())
    }
}

impl Default for Move {
    fn default() -> Self {
        Move::NULL
    }
}

/// Stack-allocated buffer for generated moves. Capacity 256 covers the theoretical max of 218.
#[derive(Clone)]
pub struct MoveList {
    moves: [Move; 256],
    len: u16,
}

impl MoveList {
    pub fn new() -> MoveList {
        MoveList {
            moves: [Move::NULL; 256],
            len: 0,
        }
    }

    #[inline]
    pub fn push(&mut self, mv: Move) {
        debug_assert!((self.len as usize) < 256);
        self.moves[self.len as usize] = mv;
        self.len += 1;
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn as_slice(&self) -> &[Move] {
        &self.moves[..self.len as usize]
    }

    pub fn contains(&self, mv: Move) -> bool {
        self.as_slice().contains(&mv)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Move> {
        self.as_slice().iter()
    }
}

impl Default for MoveList {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MoveList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.as_slice()).finish()
    }
}

impl std::ops::Index<usize> for MoveList {
    type Output = Move;
    #[inline]
    fn index(&self, index: usize) -> &Move {
        &self.as_slice()[index]
    }
}

impl<'a> IntoIterator for &'a MoveList {
    type Item = &'a Move;
    type IntoIter = std::slice::Iter<'a, Move>;
    fn into_iter(self) -> Self::IntoIter {
        self.as_slice().iter()
    }
}
