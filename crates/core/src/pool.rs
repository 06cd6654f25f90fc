//! Bounded pool of engine processes
//!
//! Handles are checked out through [`PooledEngine`], a guard that puts the
//! handle back when dropped, so every exit path of a caller releases it.
//! Health checks run lazily at checkout: an unhealthy handle is terminated
//! and swapped for a freshly spawned one before anyone sees it.

use std::collections::VecDeque;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::engine::{EngineHandle, EngineSpawner};
use crate::error::{Error, Result};

/// One unit of pool capacity
enum Slot {
    Engine(Box<dyn EngineHandle>),
    /// A replacement spawn failed; the next checkout retries it
    Vacant,
}

struct Available {
    slots: VecDeque<Slot>,
    closed: bool,
}

/// Snapshot of pool occupancy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolStatus {
    pub capacity: usize,
    pub available: usize,
    pub checked_out: usize,
    pub closed: bool,
}

pub struct EnginePool {
    spawner: Box<dyn EngineSpawner>,
    capacity: usize,
    acquire_timeout: Duration,
    available: Mutex<Available>,
    returned: Condvar,
    next_id: AtomicUsize,
}

impl EnginePool {
    /// Spawns `capacity` engines up front. They are not checked until first checkout.
    pub fn new(
        spawner: Box<dyn EngineSpawner>,
        capacity: usize,
        acquire_timeout: Duration,
    ) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::Config("pool capacity must be at least 1".into()));
        }

        let mut slots = VecDeque::with_capacity(capacity);
        for id in 0..capacity {
            match spawner.spawn(id) {
                Ok(engine) => slots.push_back(Slot::Engine(engine)),
                Err(e) => {
                    error!(engine = id, error = %e, "failed to start engine");
                    for slot in slots.iter_mut() {
                        if let Slot::Engine(engine) = slot {
                            engine.terminate();
                        }
                    }
                    return Err(Error::unavailable(e));
                }
            }
        }
        info!(capacity, "engine pool ready");

        Ok(Self {
            spawner,
            capacity,
            acquire_timeout,
            available: Mutex::new(Available {
                slots,
                closed: false,
            }),
            returned: Condvar::new(),
            next_id: AtomicUsize::new(capacity),
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Checks out an engine using the configured timeout
    pub fn acquire(&self) -> Result<PooledEngine<'_>> {
        self.acquire_timeout(self.acquire_timeout)
    }

    /// Checks out an engine, waiting at most `timeout` for one to be returned.
    ///
    /// The returned handle has just passed a health check or was just spawned.
    pub fn acquire_timeout(&self, timeout: Duration) -> Result<PooledEngine<'_>> {
        let slot = self.take_slot(timeout)?;

        // Check and replace outside the lock
        match self.ensure_healthy(slot) {
            Ok(engine) => Ok(PooledEngine {
                pool: self,
                engine: Some(engine),
            }),
            Err(e) => {
                self.put_back(Slot::Vacant);
                Err(e)
            }
        }
    }

    /// Returns a handle to the pool. Equivalent to dropping the guard.
    pub fn release(&self, engine: PooledEngine<'_>) {
        drop(engine);
    }

    /// Terminates every idle engine and refuses further checkouts.
    ///
    /// Engines currently checked out are terminated when they come back.
    pub fn shutdown(&self) {
        let drained: Vec<Slot> = {
            let mut available = self.lock();
            if available.closed {
                return;
            }
            available.closed = true;
            available.slots.drain(..).collect()
        };
        self.returned.notify_all();

        let mut terminated = 0;
        for slot in drained {
            if let Slot::Engine(mut engine) = slot {
                engine.terminate();
                terminated += 1;
            }
        }
        info!(terminated, "engine pool shut down");
    }

    pub fn status(&self) -> PoolStatus {
        let available = self.lock();
        let idle = available.slots.len();
        PoolStatus {
            capacity: self.capacity,
            available: idle,
            checked_out: if available.closed { 0 } else { self.capacity - idle },
            closed: available.closed,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Available> {
        // Critical sections only move slots around, so a poisoned lock still holds valid state
        self.available.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn take_slot(&self, timeout: Duration) -> Result<Slot> {
        let started = Instant::now();
        let deadline = started + timeout;
        let mut available = self.lock();

        loop {
            if available.closed {
                return Err(Error::EngineUnavailable("engine pool is shut down".into()));
            }
            if let Some(slot) = available.slots.pop_front() {
                return Ok(slot);
            }

            let now = Instant::now();
            if now >= deadline {
                let waited = now - started;
                warn!(?waited, "no engine available");
                return Err(Error::PoolExhausted { waited });
            }

            available = self
                .returned
                .wait_timeout(available, deadline - now)
                .unwrap_or_else(|e| e.into_inner())
                .0;
        }
    }

    fn ensure_healthy(&self, slot: Slot) -> Result<Box<dyn EngineHandle>> {
        match slot {
            Slot::Engine(mut engine) => {
                if engine.health_check() {
                    return Ok(engine);
                }
                warn!(engine = engine.id(), "engine failed health check, replacing");
                engine.terminate();
                self.spawn_replacement()
            }
            Slot::Vacant => self.spawn_replacement(),
        }
    }

    fn spawn_replacement(&self) -> Result<Box<dyn EngineHandle>> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        match self.spawner.spawn(id) {
            Ok(engine) => {
                info!(engine = id, "spawned replacement engine");
                Ok(engine)
            }
            Err(e) => {
                error!(engine = id, error = %e, "failed to spawn replacement engine");
                Err(Error::unavailable(e))
            }
        }
    }

    fn put_back(&self, slot: Slot) {
        let mut available = self.lock();
        if available.closed {
            drop(available);
            if let Slot::Engine(mut engine) = slot {
                engine.terminate();
            }
            return;
        }
        available.slots.push_back(slot);
        drop(available);
        self.returned.notify_one();
    }
}

impl Drop for EnginePool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl fmt::Debug for EnginePool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnginePool")
            .field("status", &self.status())
            .field("acquire_timeout", &self.acquire_timeout)
            .finish()
    }
}

/// An engine checked out of an [`EnginePool`]; returned to the pool on drop
pub struct PooledEngine<'a> {
    pool: &'a EnginePool,
    engine: Option<Box<dyn EngineHandle>>,
}

impl PooledEngine<'_> {
    /// Returns the engine to the pool
    pub fn release(self) {
        drop(self);
    }
}

impl Deref for PooledEngine<'_> {
    type Target = dyn EngineHandle;

    fn deref(&self) -> &Self::Target {
        // Only taken in drop
        self.engine.as_deref().expect("engine present until drop")
    }
}

impl DerefMut for PooledEngine<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.engine.as_deref_mut().expect("engine present until drop")
    }
}

impl Drop for PooledEngine<'_> {
    fn drop(&mut self) {
        if let Some(engine) = self.engine.take() {
            debug!(engine = engine.id(), "engine released");
            self.pool.put_back(Slot::Engine(engine));
        }
    }
}


#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;
    use std::sync::{mpsc, Arc};
    use std::thread;

    use super::testing::{FakeSpawner, Script};
    use super::*;

    fn pool(script: &Arc<Script>, capacity: usize) -> EnginePool {
        EnginePool::new(
            Box::new(FakeSpawner(Arc::clone(script))),
            capacity,
            Duration::from_millis(200),
        )
        .unwrap()
    }

    #[test]
    fn test_new_spawns_capacity_engines() {
        let script = Script::new();
        let pool = pool(&script, 3);
        assert_eq!(script.spawned.load(Ordering::SeqCst), 3);
        assert_eq!(
            pool.status(),
            PoolStatus { capacity: 3, available: 3, checked_out: 0, closed: false }
        );
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let script = Script::new();
        let result = EnginePool::new(Box::new(FakeSpawner(script)), 0, Duration::from_secs(1));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_startup_spawn_failure_is_unavailable() {
        let script = Script::new();
        script.fail_spawns.store(true, Ordering::SeqCst);
        let result = EnginePool::new(Box::new(FakeSpawner(script)), 2, Duration::from_secs(1));
        assert!(matches!(result, Err(Error::EngineUnavailable(_))));
    }

    #[test]
    fn test_checked_out_handles_are_distinct() {
        let script = Script::new();
        let pool = pool(&script, 2);
        let a = pool.acquire().unwrap();
        let b = pool.acquire().unwrap();
        assert_ne!(a.id(), b.id());
        assert_eq!(pool.status().checked_out, 2);
        assert_eq!(pool.status().available, 0);
    }

    #[test]
    fn test_acquire_times_out_when_exhausted() {
        let script = Script::new();
        let pool = pool(&script, 1);
        let _held = pool.acquire().unwrap();

        let started = Instant::now();
        let result = pool.acquire_timeout(Duration::from_millis(50));
        assert!(matches!(result, Err(Error::PoolExhausted { .. })));
        assert!(started.elapsed() >= Duration::from_millis(50));
        // The failed caller consumed nothing
        assert_eq!(pool.status().checked_out, 1);
    }

    #[test]
    fn test_waiter_wakes_on_release() {
        let script = Script::new();
        let pool = Arc::new(pool(&script, 1));
        let held = pool.acquire().unwrap();
        let held_id = held.id();

        let (tx, rx) = mpsc::channel();
        let waiter = {
            let pool = Arc::clone(&pool);
            thread::spawn(move || {
                let engine = pool.acquire_timeout(Duration::from_secs(5)).unwrap();
                tx.send(engine.id()).unwrap();
            })
        };

        // The waiter must still be blocked
        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
        held.release();
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), held_id);
        waiter.join().unwrap();
        assert_eq!(pool.status().available, 1);
    }

    #[test]
    fn test_never_more_than_capacity_checked_out() {
        let script = Script::new();
        *script.analyze_delay.lock().unwrap() = Duration::from_millis(10);
        let pool = Arc::new(EnginePool::new(
            Box::new(FakeSpawner(Arc::clone(&script))),
            3,
            Duration::from_secs(10),
        ).unwrap());

        let workers: Vec<_> = (0..12)
            .map(|_| {
                let pool = Arc::clone(&pool);
                thread::spawn(move || {
                    for _ in 0..3 {
                        let mut engine = pool.acquire().unwrap();
                        engine.analyze("fen", crate::engine::ResourceLimit::Depth(1)).unwrap();
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        assert!(script.max_checked_out.load(Ordering::SeqCst) <= 3);
        assert_eq!(script.analyze_calls.load(Ordering::SeqCst), 36);
        assert_eq!(pool.status().available, 3);
    }

    #[test]
    fn test_unhealthy_engine_is_replaced() {
        let script = Script::new();
        let pool = pool(&script, 2);
        script.unhealthy.lock().unwrap().insert(0);

        let engine = pool.acquire().unwrap();
        assert_ne!(engine.id(), 0);
        assert_eq!(engine.id(), 2);
        assert_eq!(*script.terminated.lock().unwrap(), vec![0]);
        drop(engine);

        assert_eq!(pool.status().available, 2);
        assert_eq!(pool.status().capacity, 2);
    }

    #[test]
    fn test_replacement_failure_keeps_capacity() {
        let script = Script::new();
        let pool = pool(&script, 1);
        script.unhealthy.lock().unwrap().insert(0);
        script.fail_spawns.store(true, Ordering::SeqCst);

        assert!(matches!(pool.acquire(), Err(Error::EngineUnavailable(_))));
        assert_eq!(pool.status().available, 1);

        // Vacant slot is refilled once spawning works again
        script.fail_spawns.store(false, Ordering::SeqCst);
        let engine = pool.acquire().unwrap();
        assert!(engine.id() >= 1);
    }

    #[test]
    fn test_dead_engine_released_then_replaced_on_next_acquire() {
        let script = Script::new();
        let pool = pool(&script, 1);

        let mut engine = pool.acquire().unwrap();
        engine.terminate();
        assert!(engine.analyze("fen", crate::engine::ResourceLimit::Depth(1)).is_err());
        drop(engine);
        assert_eq!(pool.status().available, 1);

        let engine = pool.acquire().unwrap();
        assert!(engine.id() > 0);
    }

    #[test]
    fn test_shutdown_terminates_and_is_idempotent() {
        let script = Script::new();
        let pool = pool(&script, 2);
        let held = pool.acquire().unwrap();
        let held_id = held.id();

        pool.shutdown();
        pool.shutdown();
        assert_eq!(script.terminated.lock().unwrap().len(), 1);
        assert!(matches!(pool.acquire(), Err(Error::EngineUnavailable(_))));

        // Returned after shutdown: terminated instead of pooled
        drop(held);
        assert!(script.terminated.lock().unwrap().contains(&held_id));
        assert_eq!(pool.status().available, 0);
        assert!(pool.status().closed);
    }

    #[test]
    fn test_shutdown_wakes_waiters() {
        let script = Script::new();
        let pool = Arc::new(pool(&script, 1));
        let _held = pool.acquire().unwrap();

        let waiter = {
            let pool = Arc::clone(&pool);
            thread::spawn(move || pool.acquire_timeout(Duration::from_secs(10)).map(|e| e.id()))
        };
        thread::sleep(Duration::from_millis(30));
        pool.shutdown();

        let result = waiter.join().unwrap();
        assert!(matches!(result, Err(Error::EngineUnavailable(_))));
    }
}
