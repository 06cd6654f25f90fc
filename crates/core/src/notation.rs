//! Rendering engine lines in standard algebraic notation

use shakmaty::{san::SanPlus, uci::UciMove, Color};

use crate::error::{Error, Result};
use crate::position::Position;

/// A principal variation rendered for display
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedLine {
    /// Each move in SAN, in order
    pub moves: Vec<String>,
    /// Moves with move-number prefixes, e.g. `1. e4 e5 2. Nf3`
    pub transcript: String,
}

/// Converts a UCI line to SAN, playing each move on a working copy of the
/// board so every move is rendered against the position it is played from.
///
/// At most `max_moves` moves are rendered. An illegal or unparseable move
/// means the engine output is unusable.
pub fn render_line(start: &Position, uci_moves: &[String], max_moves: usize) -> Result<RenderedLine> {
    let mut board = start.board().clone();
    let mut moves = Vec::with_capacity(uci_moves.len().min(max_moves));

    for uci_str in uci_moves.iter().take(max_moves) {
        let uci: UciMove = uci_str
            .parse()
            .map_err(|e| Error::AnalysisFailure(format!("bad move {:?} in line: {}", uci_str, e)))?;
        let mv = uci
            .to_move(&board)
            .map_err(|e| Error::AnalysisFailure(format!("illegal move {:?} in line: {}", uci_str, e)))?;

        // Advance the working board past this move
        let san = SanPlus::from_move_and_play_unchecked(&mut board, mv);
        moves.push(san.to_string());
    }

    let transcript = number_moves(&moves, start.side_to_move(), start.fullmove_number());
    Ok(RenderedLine { moves, transcript })
}

/// Adds move numbers: `N.` before White's moves, `N. ...` when Black moves first
fn number_moves(moves: &[String], first_to_move: Color, first_number: u32) -> String {
    let mut parts = Vec::with_capacity(moves.len() * 3 / 2 + 1);
    let mut number = first_number;
    let mut turn = first_to_move;

    for (i, san) in moves.iter().enumerate() {
        match turn {
            Color::White => parts.push(format!("{}.", number)),
            Color::Black if i == 0 => parts.push(format!("{}. ...", number)),
            Color::Black => {}
        }
        parts.push(san.clone());

        if turn == Color::Black {
            number += 1;
        }
        turn = !turn;
    }

    parts.join(" ")
}
