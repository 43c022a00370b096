//! Errors raised when building positions or parsing moves.

/// Errors from constructing a [`Board`](crate::Board) or resolving a move on it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BoardError {
    /// The FEN string could not be parsed.
    #[error("invalid FEN \"{fen}\": {reason}")]
    InvalidFen {
        /// The FEN string that failed to parse.
        fen: String,
        /// Parser or validation message.
        reason: String,
    },

    /// The text is not a well-formed UCI move.
    #[error("malformed move: {uci_move}")]
    MalformedMove {
        /// The offending text.
        uci_move: String,
    },

    /// The move is well-formed but not legal in the position.
    #[error("illegal move: {uci_move}")]
    IllegalMove {
        /// The offending move in UCI notation.
        uci_move: String,
    },
}

#[cfg(test)]
mod tests {
    use super::BoardError;

    #[test]
    fn board_error_display() {
        let err = BoardError::IllegalMove {
            uci_move: "e2e5".to_string(),
        };
        assert_eq!(format!("{err}"), "illegal move: e2e5");
    }
}
