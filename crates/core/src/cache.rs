//! Bounded in-memory cache of deep evaluations keyed by FEN text.
//!
//! Keys are the exact position text, not a canonical board, so two spellings
//! of the same position are cached separately. Entries never expire; they
//! only leave under capacity pressure, least recently used first.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use tracing::trace;

pub const DEFAULT_CACHE_CAPACITY: usize = 100_000;

const NIL: usize = usize::MAX;

struct Node {
    key: String,
    score: f64,
    prev: usize,
    next: usize,
}

/// LRU list stored in a slab; `head` is most recent, `tail` least recent
struct Lru {
    index: HashMap<String, usize>,
    nodes: Vec<Node>,
    head: usize,
    tail: usize,
}

impl Lru {
    fn with_capacity(capacity: usize) -> Self {
        // Don't reserve the full default up front
        let reserve = capacity.min(1024);
        Self {
            index: HashMap::with_capacity(reserve),
            nodes: Vec::with_capacity(reserve),
            head: NIL,
            tail: NIL,
        }
    }

    fn unlink(&mut self, i: usize) {
        let (prev, next) = (self.nodes[i].prev, self.nodes[i].next);
        if prev == NIL {
            self.head = next;
        } else {
            self.nodes[prev].next = next;
        }
        if next == NIL {
            self.tail = prev;
        } else {
            self.nodes[next].prev = prev;
        }
    }

    fn push_front(&mut self, i: usize) {
        self.nodes[i].prev = NIL;
        self.nodes[i].next = self.head;
        if self.head != NIL {
            self.nodes[self.head].prev = i;
        }
        self.head = i;
        if self.tail == NIL {
            self.tail = i;
        }
    }

    fn touch(&mut self, i: usize) {
        if self.head != i {
            self.unlink(i);
            self.push_front(i);
        }
    }

    fn get(&mut self, key: &str) -> Option<f64> {
        let i = *self.index.get(key)?;
        self.touch(i);
        Some(self.nodes[i].score)
    }

    /// Inserts or updates; returns the evicted key, if any
    fn put(&mut self, key: &str, score: f64, capacity: usize) -> Option<String> {
        if let Some(&i) = self.index.get(key) {
            self.nodes[i].score = score;
            self.touch(i);
            return None;
        }

        if self.nodes.len() < capacity {
            let i = self.nodes.len();
            self.nodes.push(Node {
                key: key.to_string(),
                score,
                prev: NIL,
                next: NIL,
            });
            self.index.insert(key.to_string(), i);
            self.push_front(i);
            return None;
        }

        // Full: recycle the least recently used node
        let i = self.tail;
        self.unlink(i);
        let evicted = std::mem::replace(&mut self.nodes[i].key, key.to_string());
        self.nodes[i].score = score;
        self.index.remove(&evicted);
        self.index.insert(key.to_string(), i);
        self.push_front(i);
        Some(evicted)
    }
}

/// Thread-safe LRU memo of position text to score
pub struct EvaluationCache {
    capacity: usize,
    inner: Mutex<Lru>,
}

impl EvaluationCache {
    /// Creates a cache holding at most `capacity` entries (at least one)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            inner: Mutex::new(Lru::with_capacity(capacity)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Lru> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Looks up a score, marking the entry as most recently used
    pub fn get(&self, fen: &str) -> Option<f64> {
        self.lock().get(fen)
    }

    /// Stores a score, evicting the least recently used entry when full
    pub fn put(&self, fen: &str, score: f64) {
        let evicted = self.lock().put(fen, score, self.capacity);
        if let Some(evicted) = evicted {
            trace!(fen = %evicted, "evicted cached evaluation");
        }
    }

    pub fn len(&self) -> usize {
        self.lock().index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&self) {
        let mut lru = self.lock();
        *lru = Lru::with_capacity(self.capacity);
    }
}

impl Default for EvaluationCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}
