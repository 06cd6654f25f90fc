//! Process-wide settings, read from `CHESS_EVAL_*` environment variables

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::cache::DEFAULT_CACHE_CAPACITY;
use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub struct Config {
    /// Engine executable, resolved through PATH when not absolute
    pub engine_path: String,
    pub pool_size: usize,
    /// How long a request waits for a free engine
    pub acquire_timeout: Duration,
    /// How long to wait for any single line from an engine
    pub engine_response_timeout: Duration,
    /// Search time for quick evaluations
    pub quick_time: Duration,
    pub deep_depth: u8,
    pub line_depth: u8,
    pub max_line_moves: usize,
    pub cache_capacity: usize,
    pub bind_addr: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            engine_path: "stockfish".to_string(),
            pool_size: 4,
            acquire_timeout: Duration::from_secs(30),
            engine_response_timeout: Duration::from_secs(10),
            quick_time: Duration::from_millis(1500),
            deep_depth: 17,
            line_depth: 18,
            max_line_moves: 10,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            bind_addr: "127.0.0.1:3000".to_string(),
        }
    }
}

impl Config {
    /// Reads overrides from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a config from an arbitrary key lookup, falling back to defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();

        if let Some(path) = lookup("CHESS_EVAL_ENGINE_PATH") {
            config.engine_path = path;
        }
        if let Some(addr) = lookup("CHESS_EVAL_BIND_ADDR") {
            config.bind_addr = addr;
        }
        set_parsed(&lookup, "CHESS_EVAL_POOL_SIZE", &mut config.pool_size)?;
        set_parsed(&lookup, "CHESS_EVAL_DEEP_DEPTH", &mut config.deep_depth)?;
        set_parsed(&lookup, "CHESS_EVAL_LINE_DEPTH", &mut config.line_depth)?;
        set_parsed(&lookup, "CHESS_EVAL_MAX_LINE_MOVES", &mut config.max_line_moves)?;
        set_parsed(&lookup, "CHESS_EVAL_CACHE_CAPACITY", &mut config.cache_capacity)?;
        set_duration(&lookup, "CHESS_EVAL_ACQUIRE_TIMEOUT", &mut config.acquire_timeout)?;
        set_duration(&lookup, "CHESS_EVAL_ENGINE_TIMEOUT", &mut config.engine_response_timeout)?;
        set_duration(&lookup, "CHESS_EVAL_QUICK_TIME", &mut config.quick_time)?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.engine_path.trim().is_empty() {
            return Err(Error::Config("engine path is empty".into()));
        }
        if self.pool_size == 0 {
            return Err(Error::Config("pool size must be at least 1".into()));
        }
        if self.cache_capacity == 0 {
            return Err(Error::Config("cache capacity must be at least 1".into()));
        }
        if self.deep_depth == 0 || self.line_depth == 0 {
            return Err(Error::Config("search depth must be at least 1".into()));
        }
        if self.max_line_moves == 0 {
            return Err(Error::Config("max line moves must be at least 1".into()));
        }
        if self.quick_time.is_zero() {
            return Err(Error::Config("quick evaluation time must be positive".into()));
        }
        Ok(())
    }
}

fn set_parsed<F, T>(lookup: &F, key: &str, target: &mut T) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    if let Some(raw) = lookup(key) {
        *target = raw
            .trim()
            .parse()
            .map_err(|e| Error::Config(format!("{}={:?}: {}", key, raw, e)))?;
    }
    Ok(())
}

fn set_duration<F>(lookup: &F, key: &str, target: &mut Duration) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(raw) = lookup(key) {
        *target = humantime::parse_duration(raw.trim())
            .map_err(|e| Error::Config(format!("{}={:?}: {}", key, raw, e)))?;
    }
    Ok(())
}
