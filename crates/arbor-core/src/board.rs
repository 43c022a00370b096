//! Position wrapper around `shakmaty::Chess`.
//!
//! `Board` is an immutable copy-make snapshot: [`Board::make_move`] returns a
//! new board and leaves `self` untouched, so every search frame owns the
//! position it is working on. The Zobrist key is cached alongside the
//! position and updated incrementally where shakmaty supports it.

use std::fmt;
use std::str::FromStr;

use shakmaty::fen::Fen;
use shakmaty::zobrist::Zobrist64;
use shakmaty::{
    Bitboard, CastlingMode, Chess, Color, EnPassantMode, File, Piece, Position, Role, Square,
};
use tracing::debug;

use crate::chess_move::{Move, MoveList, PromotionPiece};
use crate::error::BoardError;

/// Which subset of legal moves to generate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveFilter {
    /// Every legal move.
    All,
    /// Captures (including en passant) and promotions.
    Tactical,
    /// Everything [`MoveFilter::Tactical`] leaves out.
    Quiet,
}

/// A chess position plus its cached 64-bit Zobrist key.
#[derive(Clone)]
pub struct Board {
    pos: Chess,
    hash: u64,
}

impl Board {
    /// The standard starting position.
    pub fn starting_position() -> Board {
        Board::from_position(Chess::default())
    }

    /// Parse a FEN string (standard chess, no Chess960 castling).
    pub fn from_fen(fen: &str) -> Result<Board, BoardError> {
        let reject = |reason: String| {
            debug!(fen, %reason, "rejected FEN");
            BoardError::InvalidFen {
                fen: fen.to_string(),
                reason,
            }
        };
        let parsed: Fen = fen
            .trim()
            .parse()
            .map_err(|e: shakmaty::fen::ParseFenError| reject(e.to_string()))?;
        let pos: Chess = parsed
            .into_position(CastlingMode::Standard)
            .map_err(|e| reject(e.to_string()))?;
        Ok(Board::from_position(pos))
    }

    /// Wrap an existing shakmaty position.
    pub fn from_position(pos: Chess) -> Board {
        let hash = pos.zobrist_hash::<Zobrist64>(EnPassantMode::Legal).0;
        Board { pos, hash }
    }

    /// The underlying shakmaty position.
    pub fn position(&self) -> &Chess {
        &self.pos
    }

    /// FEN of the current position.
    pub fn to_fen(&self) -> String {
        Fen::from_position(&self.pos, EnPassantMode::Legal).to_string()
    }

    /// Zobrist key. Excludes the move counters, includes legal en passant.
    #[inline]
    pub fn hash(&self) -> u64 {
        self.hash
    }

    #[inline]
    pub fn side_to_move(&self) -> Color {
        self.pos.turn()
    }

    #[inline]
    pub fn halfmove_clock(&self) -> u32 {
        self.pos.halfmoves()
    }

    #[inline]
    pub fn in_check(&self) -> bool {
        self.pos.is_check()
    }

    /// Neither side can possibly deliver mate.
    pub fn is_insufficient_material(&self) -> bool {
        self.pos.is_insufficient_material()
    }

    /// `true` if `color` owns anything besides king and pawns.
    ///
    /// Null-move pruning is unsound in pawn endings (zugzwang), so the
    /// search asks this before trying it.
    pub fn has_non_pawn_material(&self, color: Color) -> bool {
        let board = self.pos.board();
        (board.by_color(color) & !(board.pawns() | board.kings())).any()
    }

    /// Number of pieces (both colors, kings included).
    pub fn piece_count(&self) -> u32 {
        self.pos.board().occupied().count() as u32
    }

    pub fn occupied(&self) -> Bitboard {
        self.pos.board().occupied()
    }

    /// All pieces of `role`, both colors.
    pub fn pieces(&self, role: Role) -> Bitboard {
        self.pos.board().by_role(role)
    }

    /// All pieces of `color`.
    pub fn side(&self, color: Color) -> Bitboard {
        self.pos.board().by_color(color)
    }

    pub fn piece_on(&self, sq: Square) -> Option<Piece> {
        self.pos.board().piece_at(sq)
    }

    pub fn role_on(&self, sq: Square) -> Option<Role> {
        self.pos.board().role_at(sq)
    }

    /// Iterate over occupied squares and their pieces.
    pub fn pieces_iter(&self) -> impl Iterator<Item = (Square, Piece)> + '_ {
        self.pos.board().iter()
    }

    /// The role of the piece making `mv`.
    pub fn moved_piece(&self, mv: Move) -> Option<Role> {
        self.role_on(mv.source())
    }

    /// The role captured by `mv`, if any.
    pub fn captured_piece(&self, mv: Move) -> Option<Role> {
        if mv.is_en_passant() {
            Some(Role::Pawn)
        } else if mv.is_castle() {
            None
        } else {
            self.role_on(mv.dest())
        }
    }

    pub fn is_capture(&self, mv: Move) -> bool {
        self.captured_piece(mv).is_some()
    }

    /// Captures and promotions.
    pub fn is_tactical(&self, mv: Move) -> bool {
        mv.is_promotion() || self.is_capture(mv)
    }

    /// All legal moves.
    pub fn legal_moves(&self) -> MoveList {
        self.generate(MoveFilter::All)
    }

    /// Legal moves restricted by `filter`.
    pub fn generate(&self, filter: MoveFilter) -> MoveList {
        let mut list = MoveList::new();
        for m in &self.pos.legal_moves() {
            let tactical = m.is_capture() || m.is_promotion();
            let keep = match filter {
                MoveFilter::All => true,
                MoveFilter::Tactical => tactical,
                MoveFilter::Quiet => !tactical,
            };
            if keep && let Some(mv) = from_shakmaty(m) {
                list.push(mv);
            }
        }
        list
    }

    /// Full legality check for a move recalled from a table.
    pub fn is_legal(&self, mv: Move) -> bool {
        self.to_shakmaty(mv).is_some_and(|m| self.pos.is_legal(m))
    }

    /// Return the position after `mv`.
    ///
    /// `mv` must be legal (taken from [`legal_moves`](Self::legal_moves) or
    /// checked with [`is_legal`](Self::is_legal)).
    pub fn make_move(&self, mv: Move) -> Board {
        match self.to_shakmaty(mv) {
            Some(m) => self.play(m),
            None => {
                debug_assert!(false, "make_move with unconvertible move {mv}");
                self.clone()
            }
        }
    }

    /// Return the position with the side to move passed over.
    ///
    /// `None` when in check.
    pub fn make_null_move(&self) -> Option<Board> {
        if self.in_check() {
            return None;
        }
        self.pos.clone().swap_turn().ok().map(Board::from_position)
    }

    /// Resolve a UCI string (`e2e4`, `e7e8q`, `e1g1`) against the legal moves.
    pub fn find_move(&self, uci: &str) -> Result<Move, BoardError> {
        let text = uci.trim();
        if !(4..=5).contains(&text.len()) || !text.is_ascii() {
            return Err(BoardError::MalformedMove {
                uci_move: text.to_string(),
            });
        }
        self.legal_moves()
            .iter()
            .copied()
            .find(|mv| mv.to_uci() == text)
            .ok_or_else(|| BoardError::IllegalMove {
                uci_move: text.to_string(),
            })
    }

    /// Play a sequence of UCI moves from this position.
    pub fn play_uci_line(&self, moves: &[&str]) -> Result<Board, BoardError> {
        moves.iter().try_fold(self.clone(), |board, text| {
            let mv = board.find_move(text)?;
            Ok(board.make_move(mv))
        })
    }

    fn play(&self, m: shakmaty::Move) -> Board {
        let incremental =
            self.pos
                .update_zobrist_hash(Zobrist64(self.hash), m, EnPassantMode::Legal);
        let mut pos = self.pos.clone();
        pos.play_unchecked(m);
        let hash = match incremental {
            Some(z) => z.0,
            None => pos.zobrist_hash::<Zobrist64>(EnPassantMode::Legal).0,
        };
        Board { pos, hash }
    }

    fn to_shakmaty(&self, mv: Move) -> Option<shakmaty::Move> {
        if mv.is_null() {
            return None;
        }
        let from = mv.source();
        let to = mv.dest();
        if mv.is_castle() {
            let rook_file = if to > from { File::H } else { File::A };
            return Some(shakmaty::Move::Castle {
                king: from,
                rook: Square::from_coords(rook_file, from.rank()),
            });
        }
        if mv.is_en_passant() {
            return Some(shakmaty::Move::EnPassant { from, to });
        }
        let role = self.role_on(from)?;
        Some(shakmaty::Move::Normal {
            role,
            from,
            capture: self.role_on(to),
            to,
            promotion: mv.promotion().map(PromotionPiece::role),
        })
    }
}

fn from_shakmaty(m: &shakmaty::Move) -> Option<Move> {
    match *m {
        shakmaty::Move::Normal {
            from, to, promotion, ..
        } => Some(match promotion.and_then(PromotionPiece::from_role) {
            Some(promo) => Move::new_promotion(from, to, promo),
            None => Move::new(from, to),
        }),
        shakmaty::Move::EnPassant { from, to } => Some(Move::new_en_passant(from, to)),
        shakmaty::Move::Castle { king, rook } => {
            let file = if rook > king { File::G } else { File::C };
            Some(Move::new_castle(king, Square::from_coords(file, king.rank())))
        }
        shakmaty::Move::Put { .. } => None,
    }
}

impl FromStr for Board {
    type Err = BoardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Board::from_fen(s)
    }
}

impl Default for Board {
    fn default() -> Self {
        Board::starting_position()
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_fen())
    }
}

impl fmt::Debug for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Board")
            .field("fen", &self.to_fen())
            .field("hash", &format_args!("{:#018x}", self.hash))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starting_position_has_twenty_moves() {
        let board = Board::starting_position();
        assert_eq!(board.legal_moves().len(), 20);
        assert_eq!(board.generate(MoveFilter::Tactical).len(), 0);
        assert_eq!(board.generate(MoveFilter::Quiet).len(), 20);
    }

    #[test]
    fn fen_roundtrip() {
        let fen = "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1";
        let board: Board = fen.parse().unwrap();
        assert_eq!(board.to_fen(), fen);
    }

    #[test]
    fn fen_keeps_only_a_capturable_en_passant_square() {
        let capturable = "rnbqkbnr/ppp1pppp/8/3pP3/8/8/PPPP1PPP/RNBQKBNR w KQkq d6 0 3";
        assert_eq!(Board::from_fen(capturable).unwrap().to_fen(), capturable);

        let idle = Board::from_fen("rnbqkbnr/ppp1pppp/8/3p4/4P3/8/PPPP1PPP/RNBQKBNR w KQkq d6 0 2")
            .unwrap();
        assert_eq!(
            idle.to_fen(),
            "rnbqkbnr/ppp1pppp/8/3p4/4P3/8/PPPP1PPP/RNBQKBNR w KQkq - 0 2"
        );
    }

    #[test]
    fn invalid_fen_is_rejected() {
        let err = Board::from_fen("not a fen").unwrap_err();
        assert!(matches!(err, BoardError::InvalidFen { .. }));
    }

    #[test]
    fn incremental_hash_matches_full_recompute() {
        let board = Board::starting_position()
            .play_uci_line(&["e2e4", "c7c5", "g1f3", "d7d6", "f1b5", "c8d7", "e1g1"])
            .unwrap();
        let fresh = Board::from_position(board.position().clone());
        assert_eq!(board.hash(), fresh.hash());
    }

    #[test]
    fn transposed_move_orders_share_a_hash() {
        let start = Board::starting_position();
        let a = start.play_uci_line(&["g1f3", "g8f6", "b1c3"]).unwrap();
        let b = start.play_uci_line(&["b1c3", "g8f6", "g1f3"]).unwrap();
        assert_eq!(a.hash(), b.hash());
        assert_ne!(a.hash(), start.hash());
    }

    #[test]
    fn castling_encodes_king_destination() {
        let board: Board = "r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1".parse().unwrap();
        let short = board.find_move("e1g1").unwrap();
        let long = board.find_move("e1c1").unwrap();
        assert!(short.is_castle());
        assert!(long.is_castle());
        let after = board.make_move(short);
        assert_eq!(after.role_on(Square::G1), Some(Role::King));
        assert_eq!(after.role_on(Square::F1), Some(Role::Rook));
    }

    #[test]
    fn en_passant_is_tactical() {
        let board: Board = "rnbqkbnr/ppp1pppp/8/3pP3/8/8/PPPP1PPP/RNBQKBNR w KQkq d6 0 3"
            .parse()
            .unwrap();
        let ep = board.find_move("e5d6").unwrap();
        assert!(ep.is_en_passant());
        assert!(board.is_tactical(ep));
        assert_eq!(board.captured_piece(ep), Some(Role::Pawn));
        assert!(board.generate(MoveFilter::Tactical).contains(ep));
    }

    #[test]
    fn recalled_moves_are_validated() {
        let board = Board::starting_position();
        assert!(board.is_legal(Move::new(Square::E2, Square::E4)));
        assert!(!board.is_legal(Move::new(Square::E2, Square::E5)));
        assert!(!board.is_legal(Move::new(Square::E7, Square::E5)));
        assert!(!board.is_legal(Move::NULL));
    }

    #[test]
    fn null_move_flips_side_and_refuses_in_check() {
        let board = Board::starting_position();
        let passed = board.make_null_move().unwrap();
        assert_eq!(passed.side_to_move(), Color::Black);
        assert_ne!(passed.hash(), board.hash());

        let checked: Board = "4k3/8/8/8/8/8/4r3/4K3 w - - 0 1".parse().unwrap();
        assert!(checked.in_check());
        assert!(checked.make_null_move().is_none());
    }

    #[test]
    fn malformed_and_illegal_moves() {
        let board = Board::starting_position();
        assert!(matches!(
            board.find_move("e2"),
            Err(BoardError::MalformedMove { .. })
        ));
        assert!(matches!(
            board.find_move("e2e5"),
            Err(BoardError::IllegalMove { .. })
        ));
    }

    #[test]
    fn non_pawn_material() {
        let board: Board = "4k3/pppp4/8/8/8/8/4P3/4K2N w - - 0 1".parse().unwrap();
        assert!(board.has_non_pawn_material(Color::White));
        assert!(!board.has_non_pawn_material(Color::Black));
        assert_eq!(board.piece_count(), 8);
    }
}
