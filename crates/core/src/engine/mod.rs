//! Chess engine integration
//!
//! Provides the handle abstraction the pool manages and a UCI-backed
//! implementation that drives engines like Stockfish.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

pub mod analysis;
pub mod stockfish;

// Re-export main types for convenience
pub use analysis::{Evaluation, RawAnalysis, Score};
pub use stockfish::{StockfishEngine, StockfishSpawner};

/// Error type for engine operations
#[derive(Error, Debug)]
pub enum EngineError {
    /// Failed to start the engine process
    #[error("Failed to start engine: {0}")]
    Spawn(String),
    /// Failed to communicate with engine
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Engine returned unexpected response
    #[error("Protocol error: {0}")]
    Protocol(String),
    /// Engine did not answer in time
    #[error("Engine did not respond within {0:?}")]
    Timeout(Duration),
    /// Process has exited or was terminated
    #[error("Engine process terminated")]
    Terminated,
}

/// Budget for one analysis call. Exactly one bound is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceLimit {
    Time(Duration),
    Depth(u8),
}

impl ResourceLimit {
    /// The UCI `go` command for this limit
    pub fn go_command(&self) -> String {
        match self {
            ResourceLimit::Time(t) => format!("go movetime {}", t.as_millis().max(1)),
            ResourceLimit::Depth(d) => format!("go depth {}", d),
        }
    }

    /// Expected wall-clock budget, if the limit is time based
    pub fn time_budget(&self) -> Option<Duration> {
        match self {
            ResourceLimit::Time(t) => Some(*t),
            ResourceLimit::Depth(_) => None,
        }
    }
}

impl fmt::Display for ResourceLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceLimit::Time(t) => write!(f, "{}ms", t.as_millis()),
            ResourceLimit::Depth(d) => write!(f, "depth {}", d),
        }
    }
}

/// One external analysis process.
///
/// Implementations are driven by a single caller at a time; the pool
/// guarantees exclusivity, so methods take `&mut self`.
pub trait EngineHandle: Send {
    /// Identity used in logs
    fn id(&self) -> usize;

    /// Liveness check. Never fails past this boundary; any problem reads as `false`.
    fn health_check(&mut self) -> bool;

    /// Runs a search on `fen` under `limit` and blocks until the engine reports a best move
    fn analyze(&mut self, fen: &str, limit: ResourceLimit) -> Result<RawAnalysis, EngineError>;

    /// Stops the process. Safe to call more than once.
    fn terminate(&mut self);
}

/// Creates engine handles for the pool, both at startup and for replacements
pub trait EngineSpawner: Send + Sync {
    fn spawn(&self, id: usize) -> Result<Box<dyn EngineHandle>, EngineError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_go_commands() {
        assert_eq!(
            ResourceLimit::Time(Duration::from_millis(1500)).go_command(),
            "go movetime 1500"
        );
        assert_eq!(ResourceLimit::Depth(17).go_command(), "go depth 17");
    }

    #[test]
    fn test_time_budget_only_for_time_limits() {
        assert_eq!(
            ResourceLimit::Time(Duration::from_secs(2)).time_budget(),
            Some(Duration::from_secs(2))
        );
        assert_eq!(ResourceLimit::Depth(18).time_budget(), None);
    }
}
