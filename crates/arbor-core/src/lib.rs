//! Board-side collaborators for the arbor search engine.
//!
//! Move generation and rules come from `shakmaty`; this crate adds the
//! compact move encoding, a hashed copy-make [`Board`], and static exchange
//! evaluation on top of it.

pub mod board;
pub mod chess_move;
pub mod error;
pub mod see;

pub use board::{Board, MoveFilter};
pub use chess_move::{Move, MoveKind, MoveList, PromotionPiece};
pub use error::BoardError;
pub use see::{SEE_VALUE, piece_value, role_index, see, see_ge};
pub use shakmaty::{Color, Piece, Role, Square};
