//! Chess Eval Core Library
//!
//! Position analysis backed by a pool of external UCI engines, with a
//! bounded cache for deep evaluations.

pub mod analysis;
pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod notation;
pub mod pool;
pub mod position;

pub use analysis::{AnalysisSettings, Analyzer, DeepEvaluation, LineEvaluation, QuickEvaluation};
pub use cache::EvaluationCache;
pub use config::Config;
pub use engine::{EngineHandle, EngineSpawner, ResourceLimit, StockfishSpawner};
pub use error::{Error, Result, StatusHint};
pub use pool::{EnginePool, PoolStatus, PooledEngine};
pub use position::Position;

/// Builds an analyzer backed by Stockfish processes as described by `config`
pub fn stockfish_analyzer(config: &Config) -> Result<Analyzer> {
    let spawner = StockfishSpawner::new(config.engine_path.clone(), config.engine_response_timeout);
    Analyzer::from_config(config, Box::new(spawner))
}
