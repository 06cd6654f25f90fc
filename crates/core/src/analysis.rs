//! Analysis orchestration
//!
//! Three evaluation modes share one engine pool:
//!
//! - **quick**: time-bounded search, reported as White's win expectation.
//!   Never cached: two time-bounded runs of the same position can disagree.
//! - **deep**: depth-bounded search, reported in pawns with mates saturated
//!   at ±9999. Memoized by exact FEN text.
//! - **line**: depth-bounded search whose principal variation is rendered in
//!   SAN with move numbers, alongside the win expectation.
//!
//! Every mode validates the FEN before touching the pool, and every engine is
//! returned to the pool on all exit paths through the checkout guard.

use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cache::EvaluationCache;
use crate::config::Config;
use crate::engine::{EngineSpawner, RawAnalysis, ResourceLimit, Score};
use crate::error::{Error, Result};
use crate::notation::render_line;
use crate::pool::{EnginePool, PoolStatus};
use crate::position::Position;

/// Per-mode search budgets
#[derive(Debug, Clone)]
pub struct AnalysisSettings {
    pub quick_time: Duration,
    pub deep_depth: u8,
    pub line_depth: u8,
    pub max_line_moves: usize,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            quick_time: Duration::from_millis(1500),
            deep_depth: 17,
            line_depth: 18,
            max_line_moves: 10,
        }
    }
}

impl From<&Config> for AnalysisSettings {
    fn from(config: &Config) -> Self {
        Self {
            quick_time: config.quick_time,
            deep_depth: config.deep_depth,
            line_depth: config.line_depth,
            max_line_moves: config.max_line_moves,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuickEvaluation {
    /// White's win expectation in [0, 1]
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeepEvaluation {
    /// Pawns from White's perspective, ±9999.0 for forced mates
    pub evaluation: f64,
    #[serde(skip)]
    pub cached: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineEvaluation {
    /// White's win expectation in [0, 1]
    pub score: f64,
    pub moves: Vec<String>,
    pub move_string: String,
}

pub struct Analyzer {
    pool: EnginePool,
    cache: EvaluationCache,
    settings: AnalysisSettings,
}

impl Analyzer {
    pub fn new(pool: EnginePool, cache: EvaluationCache, settings: AnalysisSettings) -> Self {
        Self { pool, cache, settings }
    }

    /// Starts the engine pool and cache described by `config`
    pub fn from_config(config: &Config, spawner: Box<dyn EngineSpawner>) -> Result<Self> {
        config.validate()?;
        let pool = EnginePool::new(spawner, config.pool_size, config.acquire_timeout)?;
        let cache = EvaluationCache::new(config.cache_capacity);
        Ok(Self::new(pool, cache, AnalysisSettings::from(config)))
    }

    pub fn quick_evaluate(&self, fen: &str) -> Result<QuickEvaluation> {
        let position = Position::parse(fen).map_err(log_rejected)?;
        let score = self.search(&position, ResourceLimit::Time(self.settings.quick_time))?.1;
        Ok(QuickEvaluation {
            score: score.win_expectation(),
        })
    }

    pub fn deep_evaluate(&self, fen: &str) -> Result<DeepEvaluation> {
        let position = Position::parse(fen).map_err(log_rejected)?;

        if let Some(evaluation) = self.cache.get(position.fen()) {
            debug!(fen = position.fen(), evaluation, "deep evaluation cache hit");
            return Ok(DeepEvaluation { evaluation, cached: true });
        }

        let score = self.search(&position, ResourceLimit::Depth(self.settings.deep_depth))?.1;
        let evaluation = score.pawns();
        self.cache.put(position.fen(), evaluation);

        Ok(DeepEvaluation { evaluation, cached: false })
    }

    pub fn line_evaluate(&self, fen: &str) -> Result<LineEvaluation> {
        let position = Position::parse(fen).map_err(log_rejected)?;
        let (analysis, score) = self.search(&position, ResourceLimit::Depth(self.settings.line_depth))?;

        let line = render_line(&position, &analysis.pv, self.settings.max_line_moves)
            .inspect_err(|e| warn!(fen = position.fen(), error = %e, "unusable principal variation"))?;

        Ok(LineEvaluation {
            score: score.win_expectation(),
            moves: line.moves,
            move_string: line.transcript,
        })
    }

    /// Runs one search on a pooled engine and normalizes the score to White's view
    fn search(&self, position: &Position, limit: ResourceLimit) -> Result<(RawAnalysis, Score)> {
        let mut engine = self.pool.acquire()?;
        let started = Instant::now();

        let analysis = engine.analyze(position.fen(), limit).map_err(|e| {
            warn!(engine = engine.id(), fen = position.fen(), %limit, error = %e, "analysis failed");
            Error::analysis(e)
        })?;
        let engine_id = engine.id();
        engine.release();

        let score = analysis.evaluation.for_white(position.side_to_move());
        info!(
            engine = engine_id,
            %limit,
            %score,
            summary = %analysis.summary(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "analysis complete"
        );
        Ok((analysis, score))
    }

    pub fn pool(&self) -> &EnginePool {
        &self.pool
    }

    pub fn pool_status(&self) -> PoolStatus {
        self.pool.status()
    }

    pub fn cache(&self) -> &EvaluationCache {
        &self.cache
    }

    pub fn settings(&self) -> &AnalysisSettings {
        &self.settings
    }

    /// Terminates all engines; further evaluations fail with `EngineUnavailable`
    pub fn shutdown(&self) {
        self.pool.shutdown();
    }
}

fn log_rejected(error: Error) -> Error {
    debug!(error = %error, "rejected position");
    error
}
