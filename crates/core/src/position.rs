//! Validated board positions

use shakmaty::{fen::Fen, CastlingMode, Chess, Color, Position as _};

use crate::error::{Error, Result};

/// A FEN that has been checked to describe a legal standard-chess position.
///
/// The original text is kept verbatim (minus surrounding whitespace) because
/// the evaluation cache is keyed on it.
#[derive(Debug, Clone)]
pub struct Position {
    fen: String,
    board: Chess,
}

impl Position {
    /// Parses and validates a FEN string
    pub fn parse(text: &str) -> Result<Self> {
        let fen = text.trim();
        if fen.is_empty() {
            return Err(Error::InvalidPosition("empty FEN".into()));
        }

        let parsed: Fen = fen
            .parse()
            .map_err(|e| Error::InvalidPosition(format!("{}: {}", fen, e)))?;
        let board: Chess = parsed
            .into_position(CastlingMode::Standard)
            .map_err(|e| Error::InvalidPosition(format!("{}: {}", fen, e)))?;

        Ok(Self {
            fen: fen.to_string(),
            board,
        })
    }

    /// The starting position
    pub fn starting() -> Self {
        Self {
            fen: "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1".to_string(),
            board: Chess::default(),
        }
    }

    pub fn fen(&self) -> &str {
        &self.fen
    }

    pub fn board(&self) -> &Chess {
        &self.board
    }

    pub fn side_to_move(&self) -> Color {
        self.board.turn()
    }

    pub fn fullmove_number(&self) -> u32 {
        self.board.fullmoves().get()
    }
}
