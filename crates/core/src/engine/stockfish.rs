//! Stockfish chess engine interface
//!
//! Spawns Stockfish as a subprocess and communicates via UCI protocol.
//! Stdout is drained by a reader thread so every read can time out instead
//! of hanging on a wedged process.

use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use super::analysis::{Evaluation, RawAnalysis};
use super::{EngineError, EngineHandle, EngineSpawner, ResourceLimit};

/// Wrapper around Stockfish chess engine
pub struct StockfishEngine {
    id: usize,
    /// The child process, `None` once terminated
    process: Option<Child>,
    /// Stdin for sending commands
    stdin: Option<ChildStdin>,
    /// Lines read from stdout by the reader thread
    lines: Receiver<String>,
    /// Upper bound on waiting for any single line
    response_timeout: Duration,
    /// A search was started and its `bestmove` never arrived; later output
    /// cannot be told apart from the next search's
    desynced: bool,
}

impl StockfishEngine {
    /// Creates a new Stockfish engine instance and completes the UCI handshake
    ///
    /// # Arguments
    /// * `path` - Path to stockfish binary (or "stockfish" if in PATH)
    /// * `id` - Identity used in logs
    /// * `response_timeout` - How long to wait for any single response line
    ///
    /// # Example
    /// ```ignore
    /// let mut engine = StockfishEngine::new("stockfish", 0, Duration::from_secs(10))?;
    /// ```
    pub fn new(path: &str, id: usize, response_timeout: Duration) -> Result<Self, EngineError> {
        let mut process = Command::new(path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| EngineError::Spawn(format!("{}: {}", path, e)))?;

        let stdin = process
            .stdin
            .take()
            .ok_or_else(|| EngineError::Spawn("Failed to open stdin".into()))?;

        let stdout = process
            .stdout
            .take()
            .ok_or_else(|| EngineError::Spawn("Failed to open stdout".into()))?;

        let (tx, rx) = mpsc::channel();
        thread::Builder::new()
            .name(format!("engine-{}-stdout", id))
            .spawn(move || {
                for line in BufReader::new(stdout).lines() {
                    let Ok(line) = line else { break };
                    if tx.send(line).is_err() {
                        break;
                    }
                }
            })
            .map_err(|e| EngineError::Spawn(e.to_string()))?;

        let mut engine = StockfishEngine {
            id,
            process: Some(process),
            stdin: Some(stdin),
            lines: rx,
            response_timeout,
            desynced: false,
        };

        if let Err(e) = engine.init_uci() {
            engine.terminate();
            return Err(e);
        }

        Ok(engine)
    }

    /// Sends a command to the engine
    fn send(&mut self, cmd: &str) -> Result<(), EngineError> {
        let stdin = self.stdin.as_mut().ok_or(EngineError::Terminated)?;
        writeln!(stdin, "{}", cmd)?;
        stdin.flush()?;
        Ok(())
    }

    /// Reads a line from the engine, waiting at most `timeout`
    fn read_line(&mut self, timeout: Duration) -> Result<String, EngineError> {
        match self.lines.recv_timeout(timeout) {
            Ok(line) => Ok(line.trim().to_string()),
            Err(RecvTimeoutError::Timeout) => Err(EngineError::Timeout(timeout)),
            Err(RecvTimeoutError::Disconnected) => Err(EngineError::Terminated),
        }
    }

    /// Reads lines until we get the expected response
    fn read_until(&mut self, expected: &str) -> Result<Vec<String>, EngineError> {
        let deadline = Instant::now() + self.response_timeout;
        let mut lines = Vec::new();
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let line = self.read_line(remaining)?;
            let done = line.starts_with(expected);
            lines.push(line);
            if done {
                break;
            }
        }
        Ok(lines)
    }

    /// Initialize UCI protocol
    fn init_uci(&mut self) -> Result<(), EngineError> {
        self.send("uci")?;
        self.read_until("uciok")?;

        self.send("isready")?;
        self.read_until("readyok")?;

        Ok(())
    }

    fn is_running(&mut self) -> bool {
        match self.process.as_mut() {
            Some(child) => matches!(child.try_wait(), Ok(None)),
            None => false,
        }
    }
}

impl EngineHandle for StockfishEngine {
    fn id(&self) -> usize {
        self.id
    }

    fn health_check(&mut self) -> bool {
        if self.desynced {
            debug!(engine = self.id, "engine abandoned a search");
            return false;
        }
        if !self.is_running() {
            return false;
        }
        // Discard anything left over from an abandoned search
        while self.lines.try_recv().is_ok() {}

        match self.send("isready").and_then(|_| self.read_until("readyok")) {
            Ok(_) => true,
            Err(e) => {
                debug!(engine = self.id, error = %e, "health check failed");
                false
            }
        }
    }

    fn analyze(&mut self, fen: &str, limit: ResourceLimit) -> Result<RawAnalysis, EngineError> {
        if !self.is_running() {
            return Err(EngineError::Terminated);
        }

        self.send(&format!("position fen {}", fen))?;
        // Cleared once this search's bestmove has been consumed
        self.desynced = true;
        self.send(&limit.go_command())?;

        // A time-bounded search may legitimately stay quiet until its budget runs out
        let line_timeout = self.response_timeout + limit.time_budget().unwrap_or_default();

        let mut best_move = None;
        let mut evaluation = None;
        let mut pv = Vec::new();
        let mut final_depth = 0u8;
        let mut time_ms = 0u64;
        let mut nodes = 0u64;

        // Read until we get bestmove
        loop {
            let line = self.read_line(line_timeout)?;

            if line.starts_with("bestmove") {
                // Parse: "bestmove e2e4 ponder e7e5" or "bestmove (none)"
                match line.split_whitespace().nth(1) {
                    Some("(none)") => {}
                    Some(mv) => best_move = Some(mv.to_string()),
                    None => {
                        return Err(EngineError::Protocol(format!("malformed bestmove: {}", line)))
                    }
                }
                self.desynced = false;
                break;
            } else if line.starts_with("info") {
                parse_info_line(&line, &mut evaluation, &mut pv, &mut final_depth, &mut time_ms, &mut nodes);
            }
        }

        let evaluation = evaluation
            .ok_or_else(|| EngineError::Protocol("engine reported no score".into()))?;

        Ok(RawAnalysis {
            best_move,
            evaluation,
            depth: final_depth,
            pv,
            time_ms,
            nodes,
        })
    }

    fn terminate(&mut self) {
        let Some(mut child) = self.process.take() else {
            return;
        };
        if self.send("quit").is_ok() {
            // Give it a moment to exit
            thread::sleep(Duration::from_millis(50));
        }
        self.stdin = None;
        if let Err(e) = child.kill() {
            // Already exited
            debug!(engine = self.id, error = %e, "kill after quit");
        }
        if let Err(e) = child.wait() {
            warn!(engine = self.id, error = %e, "failed to reap engine process");
        }
    }
}

impl Drop for StockfishEngine {
    fn drop(&mut self) {
        self.terminate();
    }
}

/// Parses an info line from Stockfish
fn parse_info_line(
    line: &str,
    evaluation: &mut Option<Evaluation>,
    pv: &mut Vec<String>,
    depth: &mut u8,
    time_ms: &mut u64,
    nodes: &mut u64,
) {
    let parts: Vec<&str> = line.split_whitespace().collect();
    let mut i = 0;

    while i < parts.len() {
        match parts[i] {
            "depth" => {
                if i + 1 < parts.len() {
                    *depth = parts[i + 1].parse().unwrap_or(0);
                }
                i += 2;
            }
            "score" => {
                if i + 2 < parts.len() {
                    match parts[i + 1] {
                        "cp" => {
                            if let Ok(cp) = parts[i + 2].parse::<i32>() {
                                *evaluation = Some(Evaluation::Centipawns(cp));
                            }
                        }
                        "mate" => {
                            if let Ok(m) = parts[i + 2].parse::<i32>() {
                                *evaluation = Some(Evaluation::Mate(m));
                            }
                        }
                        _ => {}
                    }
                }
                i += 3;
            }
            "time" => {
                if i + 1 < parts.len() {
                    *time_ms = parts[i + 1].parse().unwrap_or(0);
                }
                i += 2;
            }
            "nodes" => {
                if i + 1 < parts.len() {
                    *nodes = parts[i + 1].parse().unwrap_or(0);
                }
                i += 2;
            }
            "pv" => {
                // Everything after "pv" is the principal variation
                *pv = parts[i + 1..].iter().map(|s| s.to_string()).collect();
                break;
            }
            // Free text, nothing useful follows
            "string" => break,
            _ => {
                i += 1;
            }
        }
    }
}

/// Spawns Stockfish processes from a configured executable path
#[derive(Debug, Clone)]
pub struct StockfishSpawner {
    path: String,
    response_timeout: Duration,
}

impl StockfishSpawner {
    pub fn new(path: impl Into<String>, response_timeout: Duration) -> Self {
        Self {
            path: path.into(),
            response_timeout,
        }
    }
}

impl EngineSpawner for StockfishSpawner {
    fn spawn(&self, id: usize) -> Result<Box<dyn EngineHandle>, EngineError> {
        let engine = StockfishEngine::new(&self.path, id, self.response_timeout)?;
        debug!(engine = id, path = %self.path, "stockfish ready");
        Ok(Box::new(engine))
    }
}
