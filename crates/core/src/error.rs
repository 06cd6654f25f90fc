//! Error types for chess-eval-core

use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::engine::EngineError;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid position: {0}")]
    InvalidPosition(String),

    #[error("All engines busy (waited {waited:?})")]
    PoolExhausted { waited: Duration },

    #[error("Engine unavailable: {0}")]
    EngineUnavailable(String),

    #[error("Analysis failed: {0}")]
    AnalysisFailure(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Tells the transport layer whether the caller should retry
    pub fn status_hint(&self) -> StatusHint {
        match self {
            Error::InvalidPosition(_) => StatusHint::BadRequest,
            Error::PoolExhausted { .. } => StatusHint::Busy,
            Error::EngineUnavailable(_) | Error::AnalysisFailure(_) | Error::Config(_) => {
                StatusHint::ServerError
            }
        }
    }

    pub(crate) fn unavailable(error: EngineError) -> Self {
        Error::EngineUnavailable(error.to_string())
    }

    pub(crate) fn analysis(error: EngineError) -> Self {
        Error::AnalysisFailure(error.to_string())
    }
}

/// Coarse error category exposed to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum StatusHint {
    BadRequest,
    Busy,
    ServerError,
}

pub type Result<T> = std::result::Result<T, Error>;
