//! Types for representing engine analysis results

use std::fmt;

use shakmaty::Color;

/// Sentinel magnitude used for forced mates in pawn units
pub const MATE_SCORE: f64 = 9999.0;

/// Slope of the win-percentage curve used by Lichess
const WIN_CURVE_SLOPE: f64 = -0.00368208;
/// Centipawn clamp applied before the win-percentage curve
const WIN_CURVE_CLAMP: i32 = 1000;

/// Represents a position evaluation as reported by a UCI engine,
/// relative to the side to move
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Evaluation {
    /// Centipawn score (positive = side to move is better)
    Centipawns(i32),
    /// Forced mate in N moves (positive = side to move mates, 0 = side to move is mated)
    Mate(i32),
}

impl Evaluation {
    /// Converts the engine's side-to-move score to White's point of view
    pub fn for_white(self, turn: Color) -> Score {
        match self {
            Evaluation::Centipawns(cp) => Score::Centipawns(match turn {
                Color::White => cp,
                Color::Black => -cp,
            }),
            Evaluation::Mate(moves) => {
                let mover_wins = moves > 0;
                let winner = if mover_wins { turn } else { !turn };
                Score::Mate {
                    winner,
                    moves: moves.unsigned_abs(),
                }
            }
        }
    }
}

impl fmt::Display for Evaluation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Evaluation::Centipawns(cp) => {
                let score = *cp as f32 / 100.0;
                if score >= 0.0 {
                    write!(f, "+{:.2}", score)
                } else {
                    write!(f, "{:.2}", score)
                }
            }
            Evaluation::Mate(moves) => write!(f, "M{}", moves),
        }
    }
}

/// Engine score normalized to White's perspective
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Score {
    /// Positive = White is better
    Centipawns(i32),
    /// Forced mate for `winner`
    Mate { winner: Color, moves: u32 },
}

impl Score {
    /// White's expected game result in [0, 1] (win = 1, draw = 0.5, loss = 0)
    pub fn win_expectation(&self) -> f64 {
        match self {
            Score::Centipawns(cp) => {
                let cp = (*cp).clamp(-WIN_CURVE_CLAMP, WIN_CURVE_CLAMP) as f64;
                1.0 / (1.0 + (WIN_CURVE_SLOPE * cp).exp())
            }
            Score::Mate { winner: Color::White, .. } => 1.0,
            Score::Mate { winner: Color::Black, .. } => 0.0,
        }
    }

    /// Score in pawns rounded to one decimal; mates saturate at ±9999.0
    pub fn pawns(&self) -> f64 {
        match self {
            Score::Centipawns(cp) => (*cp as f64 / 10.0).round() / 10.0,
            Score::Mate { winner: Color::White, .. } => MATE_SCORE,
            Score::Mate { winner: Color::Black, .. } => -MATE_SCORE,
        }
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Score::Centipawns(cp) => write!(f, "{:+.2}", *cp as f64 / 100.0),
            Score::Mate { winner: Color::White, moves } => write!(f, "#{}", moves),
            Score::Mate { winner: Color::Black, moves } => write!(f, "#-{}", moves),
        }
    }
}

/// Raw output of one engine search
#[derive(Debug, Clone)]
pub struct RawAnalysis {
    /// Best move in UCI notation, `None` when the engine reports `(none)`
    pub best_move: Option<String>,
    /// Evaluation of the position, relative to the side to move
    pub evaluation: Evaluation,
    /// Analysis depth reached
    pub depth: u8,
    /// Principal variation in UCI notation
    pub pv: Vec<String>,
    /// Time spent analyzing (milliseconds)
    pub time_ms: u64,
    /// Nodes searched
    pub nodes: u64,
}

impl RawAnalysis {
    /// Returns a brief summary of the analysis
    pub fn summary(&self) -> String {
        format!(
            "Eval: {} | Best: {} | Depth: {} | PV: {}",
            self.evaluation,
            self.best_move.as_deref().unwrap_or("(none)"),
            self.depth,
            self.pv.iter().take(5).cloned().collect::<Vec<_>>().join(" ")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_black_to_move_flips_centipawns() {
        assert_eq!(
            Evaluation::Centipawns(35).for_white(Color::Black),
            Score::Centipawns(-35)
        );
        assert_eq!(
            Evaluation::Centipawns(35).for_white(Color::White),
            Score::Centipawns(35)
        );
    }

    #[test]
    fn test_mate_winner() {
        assert_eq!(
            Evaluation::Mate(3).for_white(Color::Black),
            Score::Mate { winner: Color::Black, moves: 3 }
        );
        assert_eq!(
            Evaluation::Mate(-2).for_white(Color::Black),
            Score::Mate { winner: Color::White, moves: 2 }
        );
        // Side to move is already mated
        assert_eq!(
            Evaluation::Mate(0).for_white(Color::White),
            Score::Mate { winner: Color::Black, moves: 0 }
        );
    }

    #[test]
    fn test_win_expectation() {
        assert!((Score::Centipawns(0).win_expectation() - 0.5).abs() < 1e-9);
        assert!(Score::Centipawns(200).win_expectation() > 0.6);
        assert!(Score::Centipawns(-200).win_expectation() < 0.4);
        // Clamped beyond ±1000
        assert_eq!(
            Score::Centipawns(5000).win_expectation(),
            Score::Centipawns(1000).win_expectation()
        );
        assert_eq!(Score::Mate { winner: Color::White, moves: 4 }.win_expectation(), 1.0);
        assert_eq!(Score::Mate { winner: Color::Black, moves: 4 }.win_expectation(), 0.0);
    }

    #[test]
    fn test_pawns_rounding_and_mate_sentinel() {
        assert_eq!(Score::Centipawns(34).pawns(), 0.3);
        assert_eq!(Score::Centipawns(-156).pawns(), -1.6);
        assert_eq!(Score::Mate { winner: Color::White, moves: 7 }.pawns(), 9999.0);
        assert_eq!(Score::Mate { winner: Color::Black, moves: 1 }.pawns(), -9999.0);
    }

    #[test]
    fn test_display() {
        assert_eq!(Evaluation::Centipawns(35).to_string(), "+0.35");
        assert_eq!(Evaluation::Mate(-3).to_string(), "M-3");
        assert_eq!(Score::Mate { winner: Color::Black, moves: 2 }.to_string(), "#-2");
    }

    #[test]
    fn test_summary() {
        let analysis = RawAnalysis {
            best_move: None,
            evaluation: Evaluation::Mate(0),
            depth: 0,
            pv: Vec::new(),
            time_ms: 0,
            nodes: 0,
        };
        assert_eq!(analysis.summary(), "Eval: M0 | Best: (none) | Depth: 0 | PV: ");
    }
}
