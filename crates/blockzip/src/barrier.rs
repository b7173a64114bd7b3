//! Generation barrier releasing the producer once every block of a batch has completed.

use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::{Condvar, Mutex};
use tracing::trace;

/// Completion counter plus a wake signal for one generation of blocks.
///
/// Workers call [`BatchBarrier::notify_complete`] once per finished task. The completion that
/// brings the counter to the generation target wakes the producer blocked in
/// [`BatchBarrier::wait`]. The target is only changed by the producer between generations, or
/// before it enqueues the block that could reach the new target.
#[derive(Debug, Default)]
pub struct BatchBarrier {
    /// Completions recorded in the current generation
    completed: AtomicUsize,
    /// Number of completions that releases the producer
    target:    AtomicUsize,
    /// Set by the releasing completion, consumed by `wait`
    released:  Mutex<bool>,
    /// Wakes the producer
    signal:    Condvar,
}

impl BatchBarrier {
    /// Create a barrier with an empty generation.
    pub fn new() -> Self { Self::default() }

    /// Start a new generation expecting `target` completions.
    pub fn reset(&self, target: usize) {
        *self.released.lock() = false;
        self.completed.store(0, Ordering::SeqCst);
        self.target.store(target, Ordering::SeqCst);
        trace!("Barrier reset to target {}", target);
    }

    /// Shrink the target of the current generation (final, partial batch).
    ///
    /// Must be called before the block that completes the new target is enqueued.
    pub fn set_target(&self, target: usize) {
        debug_assert!(
            self.completed.load(Ordering::SeqCst) < target,
            "target must stay ahead of completions"
        );
        self.target.store(target, Ordering::SeqCst);
    }

    /// Record one finished task. Returns the number of completions so far.
    pub fn notify_complete(&self) -> usize {
        let done = self.completed.fetch_add(1, Ordering::SeqCst) + 1;
        if done == self.target.load(Ordering::SeqCst) {
            let mut released = self.released.lock();
            *released = true;
            self.signal.notify_one();
        }
        done
    }

    /// Block until the current generation reaches its target.
    ///
    /// The release is consumed, so each generation is waited on exactly once.
    pub fn wait(&self) {
        let mut released = self.released.lock();
        while !*released {
            self.signal.wait(&mut released);
        }
        *released = false;
    }

    /// Wait for the `enqueued` tasks of a generation that is being abandoned.
    ///
    /// Used when the producer fails halfway through a generation, so no straggling task can
    /// complete into the next one.
    pub fn drain(&self, enqueued: usize) {
        if enqueued == 0 {
            return;
        }
        self.target.store(enqueued, Ordering::SeqCst);
        if self.completed.load(Ordering::SeqCst) >= enqueued {
            return;
        }
        self.wait();
    }

    /// Completions recorded in the current generation.
    pub fn completed(&self) -> usize { self.completed.load(Ordering::SeqCst) }

    /// Target of the current generation.
    pub fn target(&self) -> usize { self.target.load(Ordering::SeqCst) }
}
