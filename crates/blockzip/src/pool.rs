//! Fixed pool of persistent workers running block codec tasks.
//!
//! Workers are started once and live until [`WorkerPool::shutdown`]. Each worker takes a
//! [`Task`] from the shared queue, runs the codec on the task's input, stores the outcome in
//! the block slot of the task's index and reports the completion to the [`BatchBarrier`]. A
//! failing or panicking codec call is contained at the task boundary: the failure is stored
//! in the slot and still counts as a completion, so one bad block never stalls a generation.

use std::{
    collections::VecDeque,
    panic::{self, AssertUnwindSafe},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, error, trace, warn};

use crate::{barrier::BatchBarrier, codec::BlockCodec, BlockzipError, Result};

/// Codec operation requested for one block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Compress raw bytes into one gzip member
    Compress,
    /// Decompress one gzip member into `expected_len` bytes
    Decompress {
        expected_len: usize,
    },
}

/// One unit of work bound to a block index of the current generation.
#[derive(Debug)]
pub struct Task {
    /// Block index within the generation
    pub index:     usize,
    /// Operation to run on the input
    pub operation: Operation,
    /// Input bytes, owned by the task until it completes
    pub input:     Vec<u8>,
}

impl Task {
    /// Create a compress task for block `index`.
    pub fn compress(index: usize, input: Vec<u8>) -> Self {
        Self {
            index,
            operation: Operation::Compress,
            input,
        }
    }

    /// Create a decompress task for block `index`.
    pub fn decompress(index: usize, input: Vec<u8>, expected_len: usize) -> Self {
        Self {
            index,
            operation: Operation::Decompress {
                expected_len,
            },
            input,
        }
    }

    /// Run the codec on this task's input.
    fn execute(&self, codec: &dyn BlockCodec) -> Result<Vec<u8>> {
        match self.operation {
            Operation::Compress => codec.compress(&self.input),
            Operation::Decompress {
                expected_len,
            } => codec.decompress(&self.input, expected_len),
        }
    }
}

/// Result of one block: the output bytes, or the reason the codec failed.
pub type BlockOutcome = std::result::Result<Vec<u8>, String>;

/// Per-index output slots shared between the producer and the workers.
///
/// A slot is written by the single worker running the task of that index and taken by the
/// producer after the generation barrier has released.
#[derive(Debug)]
pub struct BlockSlots {
    slots: Vec<Mutex<Option<BlockOutcome>>>,
}

impl BlockSlots {
    /// Allocate `count` empty slots.
    pub fn new(count: usize) -> Self {
        Self {
            slots: (0 .. count).map(|_| Mutex::new(None)).collect(),
        }
    }

    /// Store the outcome of block `index`.
    pub fn store(&self, index: usize, outcome: BlockOutcome) {
        if let Some(slot) = self.slots.get(index) {
            *slot.lock() = Some(outcome);
        }
    }

    /// Take the outcome of block `index`, leaving the slot empty.
    pub fn take(&self, index: usize) -> Option<BlockOutcome> { self.slots.get(index).and_then(|slot| slot.lock().take()) }

    /// Number of slots.
    pub fn len(&self) -> usize { self.slots.len() }

    /// Whether there are no slots at all.
    pub fn is_empty(&self) -> bool { self.slots.is_empty() }
}

/// Pending tasks and the closed flag, guarded together.
#[derive(Debug, Default)]
struct QueueState {
    tasks:  VecDeque<Task>,
    closed: bool,
}

/// State shared by the pool handle and its workers.
struct Shared {
    queue:     Mutex<QueueState>,
    available: Condvar,
    codec:     Arc<dyn BlockCodec>,
    slots:     Arc<BlockSlots>,
    barrier:   Arc<BatchBarrier>,
    alive:     AtomicUsize,
}

/// Fixed set of worker threads consuming a shared task queue.
pub struct WorkerPool {
    shared:  Arc<Shared>,
    workers: Vec<JoinHandle<()>>,
    size:    usize,
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("size", &self.size)
            .field("alive", &self.alive_workers())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl WorkerPool {
    /// Start `size` persistent workers.
    ///
    /// Workers write their results into `slots` and report completions to `barrier`.
    ///
    /// # Errors
    ///
    /// * `BlockzipError::ConfigError` - If `size` is zero or larger than the slot count
    /// * `BlockzipError::Io` - If the operating system refuses to spawn a thread
    pub fn new(
        size: usize,
        codec: Arc<dyn BlockCodec>,
        slots: Arc<BlockSlots>,
        barrier: Arc<BatchBarrier>,
    ) -> Result<Self> {
        if size == 0 || size > slots.len() {
            return Err(BlockzipError::ConfigError {
                message: format!("worker pool size {} does not match {} block slots", size, slots.len()),
            });
        }

        let shared = Arc::new(Shared {
            queue: Mutex::new(QueueState::default()),
            available: Condvar::new(),
            codec,
            slots,
            barrier,
            alive: AtomicUsize::new(0),
        });

        let mut pool = Self {
            shared,
            workers: Vec::with_capacity(size),
            size,
        };

        for id in 0 .. size {
            let shared = Arc::clone(&pool.shared);
            shared.alive.fetch_add(1, Ordering::AcqRel);
            let spawned = thread::Builder::new()
                .name(format!("blockzip-worker-{}", id))
                .spawn(move || worker_loop(&shared, id));
            match spawned {
                Ok(handle) => pool.workers.push(handle),
                Err(e) => {
                    pool.shared.alive.fetch_sub(1, Ordering::AcqRel);
                    // Dropping the partially built pool joins the workers already started.
                    return Err(e.into());
                }
            }
        }

        debug!("Worker pool started with {} workers", size);
        Ok(pool)
    }

    /// Queue a task for the next idle worker.
    ///
    /// # Errors
    ///
    /// * `BlockzipError::PoolClosed` - If the pool has been shut down
    /// * `BlockzipError::Internal` - If the task index has no block slot
    pub fn enqueue(&self, task: Task) -> Result<()> {
        if task.index >= self.shared.slots.len() {
            return Err(BlockzipError::Internal {
                message: format!("block index {} out of range", task.index),
            });
        }

        let mut queue = self.shared.queue.lock();
        if queue.closed {
            return Err(BlockzipError::PoolClosed);
        }
        trace!("Enqueueing {:?} for block {}", task.operation, task.index);
        queue.tasks.push_back(task);
        drop(queue);
        self.shared.available.notify_one();
        Ok(())
    }

    /// Stop accepting tasks, let pending tasks finish and join every worker.
    ///
    /// Calling it again after a successful shutdown is a no-op.
    ///
    /// # Errors
    ///
    /// * `BlockzipError::Internal` - If a worker thread panicked outside a task
    pub fn shutdown(&mut self) -> Result<()> {
        {
            let mut queue = self.shared.queue.lock();
            if queue.closed && self.workers.is_empty() {
                return Ok(());
            }
            queue.closed = true;
        }
        self.shared.available.notify_all();

        let mut panicked = 0_usize;
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                panicked += 1;
            }
        }

        debug!("Worker pool shut down");
        if panicked > 0 {
            return Err(BlockzipError::Internal {
                message: format!("{} worker thread(s) panicked", panicked),
            });
        }
        Ok(())
    }

    /// Number of workers the pool was started with.
    pub const fn size(&self) -> usize { self.size }

    /// Number of worker threads that have not exited yet.
    pub fn alive_workers(&self) -> usize { self.shared.alive.load(Ordering::Acquire) }

    /// Whether the pool stopped accepting tasks.
    pub fn is_closed(&self) -> bool { self.shared.queue.lock().closed }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            warn!("Worker pool shutdown failed: {}", e);
        }
    }
}

/// Decrements the live worker count when a worker exits, even by unwinding.
struct AliveGuard<'a>(&'a AtomicUsize);

impl Drop for AliveGuard<'_> {
    fn drop(&mut self) { self.0.fetch_sub(1, Ordering::AcqRel); }
}

fn worker_loop(shared: &Shared, id: usize) {
    let _alive = AliveGuard(&shared.alive);
    trace!("Worker {} started", id);

    loop {
        let task = {
            let mut queue = shared.queue.lock();
            loop {
                if let Some(task) = queue.tasks.pop_front() {
                    break Some(task);
                }
                if queue.closed {
                    break None;
                }
                shared.available.wait(&mut queue);
            }
        };

        match task {
            Some(task) => run_task(shared, &task),
            None => break,
        }
    }

    trace!("Worker {} finished", id);
}

fn run_task(shared: &Shared, task: &Task) {
    let codec = shared.codec.as_ref();
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| task.execute(codec))).unwrap_or_else(|payload| {
        let reason = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "codec panicked".to_string());
        Err(BlockzipError::Internal {
            message: format!("codec panicked: {}", reason),
        })
    });

    let outcome = match outcome {
        Ok(output) => {
            trace!("Block {} done: {} -> {} bytes", task.index, task.input.len(), output.len());
            Ok(output)
        }
        Err(e) => {
            error!("Block {} failed: {}", task.index, e);
            Err(e.to_string())
        }
    };

    // The slot must be filled before the completion can release the producer.
    shared.slots.store(task.index, outcome);
    shared.barrier.notify_complete();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::GzipCodec;

    /// Codec failing on odd-sized inputs and panicking on inputs starting with `!`.
    struct FaultyCodec;

    impl BlockCodec for FaultyCodec {
        fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
            if data.first() == Some(&b'!') {
                panic!("boom");
            }
            if data.len() % 2 == 1 {
                return Err(BlockzipError::Internal {
                    message: "odd block".to_string(),
                });
            }
            Ok(data.to_vec())
        }

        fn decompress(&self, member: &[u8], _expected_len: usize) -> Result<Vec<u8>> { Ok(member.to_vec()) }
    }

    fn pool_with(codec: Arc<dyn BlockCodec>, size: usize) -> (WorkerPool, Arc<BlockSlots>, Arc<BatchBarrier>) {
        let slots = Arc::new(BlockSlots::new(size));
        let barrier = Arc::new(BatchBarrier::new());
        let pool = WorkerPool::new(size, codec, Arc::clone(&slots), Arc::clone(&barrier)).unwrap();
        (pool, slots, barrier)
    }

    #[test]
    fn test_pool_runs_one_generation() {
        let (mut pool, slots, barrier) = pool_with(Arc::new(GzipCodec::default()), 4);
        assert_eq!(pool.size(), 4);
        barrier.reset(4);
        for index in 0 .. 4 {
            pool.enqueue(Task::compress(index, vec![index as u8; 1000])).unwrap();
        }
        barrier.wait();

        let codec = GzipCodec::default();
        for index in 0 .. 4 {
            let member = slots.take(index).unwrap().unwrap();
            assert_eq!(codec.decompress(&member, 1000).unwrap(), vec![index as u8; 1000]);
        }
        pool.shutdown().unwrap();
    }

    #[test]
    fn test_enqueue_after_shutdown_fails_and_workers_exit() {
        let (mut pool, _slots, _barrier) = pool_with(Arc::new(GzipCodec::default()), 3);
        pool.shutdown().unwrap();

        assert!(pool.is_closed());
        assert_eq!(pool.alive_workers(), 0);
        let result = pool.enqueue(Task::compress(0, vec![1, 2, 3]));
        assert!(matches!(result, Err(BlockzipError::PoolClosed)));

        // A second shutdown is harmless.
        pool.shutdown().unwrap();
    }

    #[test]
    fn test_shutdown_drains_pending_tasks() {
        let (mut pool, slots, barrier) = pool_with(Arc::new(GzipCodec::default()), 2);
        barrier.reset(2);
        pool.enqueue(Task::compress(0, vec![7; 4096])).unwrap();
        pool.enqueue(Task::compress(1, vec![8; 4096])).unwrap();
        pool.shutdown().unwrap();

        assert_eq!(barrier.completed(), 2);
        assert!(slots.take(0).unwrap().is_ok());
        assert!(slots.take(1).unwrap().is_ok());
    }

    #[test]
    fn test_failures_and_panics_still_complete() {
        let (mut pool, slots, barrier) = pool_with(Arc::new(FaultyCodec), 3);
        barrier.reset(3);
        pool.enqueue(Task::compress(0, vec![0; 4])).unwrap();
        pool.enqueue(Task::compress(1, vec![0; 5])).unwrap();
        pool.enqueue(Task::compress(2, b"!panic".to_vec())).unwrap();
        barrier.wait();

        assert!(slots.take(0).unwrap().is_ok());
        assert!(slots.take(1).unwrap().unwrap_err().contains("odd block"));
        assert!(slots.take(2).unwrap().unwrap_err().contains("boom"));

        // Workers survived the panic and keep serving tasks.
        barrier.reset(1);
        pool.enqueue(Task::compress(0, vec![0; 2])).unwrap();
        barrier.wait();
        assert!(slots.take(0).unwrap().is_ok());
        assert_eq!(pool.alive_workers(), 3);
        pool.shutdown().unwrap();
    }

    #[test]
    fn test_enqueue_rejects_out_of_range_index() {
        let (pool, _slots, _barrier) = pool_with(Arc::new(GzipCodec::default()), 2);
        let result = pool.enqueue(Task::compress(2, Vec::new()));
        assert!(matches!(result, Err(BlockzipError::Internal { .. })));
    }

    #[test]
    fn test_new_rejects_zero_workers() {
        let slots = Arc::new(BlockSlots::new(1));
        let result = WorkerPool::new(0, Arc::new(GzipCodec::default()), slots, Arc::new(BatchBarrier::new()));
        assert!(matches!(result, Err(BlockzipError::ConfigError { .. })));
    }
}
