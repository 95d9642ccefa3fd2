//! Process-wide pool of reusable parameter buffers.
//!
//! Queries borrow a [`Buffer`] for their bind parameters and hand it back when
//! they are dropped. The pool retains returned buffers up to an aggregate byte
//! budget; anything beyond the budget is freed rather than kept, so the pool
//! bounds steady-state memory without ever refusing an acquisition.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::BytesMut;
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::SQL_TARGET;

/// Capacity of freshly allocated buffers when no configuration is supplied.
pub const DEFAULT_INITIAL_CAPACITY: usize = 1024;

/// Aggregate retained bytes when no configuration is supplied.
pub const DEFAULT_MAX_RETAINED_BYTES: usize = 4 * 1024 * 1024;

static GLOBAL_POOL: OnceCell<Arc<BufferPool>> = OnceCell::new();

/// Sizing policy for a [`BufferPool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferPoolConfig {
    /// Capacity given to buffers allocated when the pool is empty.
    pub initial_capacity: usize,
    /// Upper bound on the bytes held by idle buffers.
    pub max_retained_bytes: usize,
}

impl Default for BufferPoolConfig {
    fn default() -> Self {
        Self {
            initial_capacity: DEFAULT_INITIAL_CAPACITY,
            max_retained_bytes: DEFAULT_MAX_RETAINED_BYTES,
        }
    }
}

/// Point-in-time accounting snapshot of a [`BufferPool`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Buffers handed out by [`BufferPool::acquire`].
    pub acquired: u64,
    /// Buffers handed back, whether retained or freed.
    pub released: u64,
    /// Acquisitions served by a fresh allocation.
    pub allocated: u64,
    /// Acquisitions served from the idle set.
    pub recycled: u64,
    /// Releases that were freed because retaining them would exceed the budget.
    pub discarded: u64,
    /// Buffers currently idle in the pool.
    pub idle: usize,
    /// Capacity, in bytes, currently held by idle buffers.
    pub retained_bytes: usize,
}

impl PoolStats {
    /// Buffers acquired but not yet released.
    #[must_use]
    pub const fn outstanding(&self) -> u64 {
        self.acquired.saturating_sub(self.released)
    }
}

#[derive(Default)]
struct IdleSet {
    buffers: Vec<BytesMut>,
    retained_bytes: usize,
}

/// Thread-safe pool of growable byte buffers.
pub struct BufferPool {
    config: BufferPoolConfig,
    idle: Mutex<IdleSet>,
    acquired: AtomicU64,
    released: AtomicU64,
    allocated: AtomicU64,
    recycled: AtomicU64,
    discarded: AtomicU64,
}

impl fmt::Debug for BufferPool {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("BufferPool")
            .field("config", &self.config)
            .field("stats", &self.stats())
            .finish()
    }
}

impl BufferPool {
    /// Creates an empty pool with the given sizing policy.
    #[must_use]
    pub fn new(config: BufferPoolConfig) -> Arc<Self> {
        Arc::new(Self {
            config,
            idle: Mutex::new(IdleSet::default()),
            acquired: AtomicU64::new(0),
            released: AtomicU64::new(0),
            allocated: AtomicU64::new(0),
            recycled: AtomicU64::new(0),
            discarded: AtomicU64::new(0),
        })
    }

    /// Installs the process-wide pool.
    ///
    /// Only the first call takes effect; later calls return the pool that is
    /// already installed.
    pub fn install_global(config: BufferPoolConfig) -> Arc<Self> {
        Arc::clone(GLOBAL_POOL.get_or_init(|| Self::new(config)))
    }

    /// Returns the process-wide pool, creating it with defaults on first use.
    #[must_use]
    pub fn global() -> Arc<Self> {
        Self::install_global(BufferPoolConfig::default())
    }

    /// Sizing policy of this pool.
    #[must_use]
    pub const fn config(&self) -> BufferPoolConfig {
        self.config
    }

    /// Hands out an empty buffer, recycling an idle one when available.
    ///
    /// Acquisition never fails: an empty pool falls back to allocation.
    #[must_use]
    pub fn acquire(self: &Arc<Self>) -> Buffer {
        self.acquired.fetch_add(1, Ordering::Relaxed);
        let recycled = {
            let mut idle = self.idle.lock();
            let buffer = idle.buffers.pop();
            if let Some(buffer) = buffer.as_ref() {
                idle.retained_bytes = idle.retained_bytes.saturating_sub(buffer.capacity());
            }
            buffer
        };

        let bytes = match recycled {
            Some(bytes) => {
                self.recycled.fetch_add(1, Ordering::Relaxed);
                bytes
            }
            None => {
                self.allocated.fetch_add(1, Ordering::Relaxed);
                trace!(
                    target: SQL_TARGET,
                    capacity = self.config.initial_capacity,
                    "allocating parameter buffer"
                );
                BytesMut::with_capacity(self.config.initial_capacity)
            }
        };

        Buffer {
            bytes: Some(bytes),
            pool: Arc::clone(self),
        }
    }

    /// Takes a buffer back, resetting its logical length.
    ///
    /// Buffers that would push the idle set past the byte budget are freed.
    fn release(&self, mut bytes: BytesMut) {
        self.released.fetch_add(1, Ordering::Relaxed);
        bytes.clear();
        let capacity = bytes.capacity();

        let mut idle = self.idle.lock();
        if idle.retained_bytes.saturating_add(capacity) > self.config.max_retained_bytes {
            drop(idle);
            self.discarded.fetch_add(1, Ordering::Relaxed);
            debug!(
                target: SQL_TARGET,
                capacity,
                budget = self.config.max_retained_bytes,
                "pool budget exhausted, freeing parameter buffer"
            );
            return;
        }
        idle.retained_bytes += capacity;
        idle.buffers.push(bytes);
    }

    /// Snapshot of the pool's accounting counters.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        let (idle, retained_bytes) = {
            let idle = self.idle.lock();
            (idle.buffers.len(), idle.retained_bytes)
        };
        PoolStats {
            acquired: self.acquired.load(Ordering::Relaxed),
            released: self.released.load(Ordering::Relaxed),
            allocated: self.allocated.load(Ordering::Relaxed),
            recycled: self.recycled.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
            idle,
            retained_bytes,
        }
    }
}

/// Growable byte arena borrowed from a [`BufferPool`].
///
/// Dropping the buffer returns it to its pool exactly once.
pub struct Buffer {
    bytes: Option<BytesMut>,
    pool: Arc<BufferPool>,
}

impl fmt::Debug for Buffer {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Buffer")
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .finish()
    }
}

impl Buffer {
    /// Logical length: bytes written since the last clear.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.as_ref().map_or(0, BytesMut::len)
    }

    /// Returns `true` when nothing has been written since the last clear.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bytes the buffer can hold before it has to grow.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.bytes.as_ref().map_or(0, BytesMut::capacity)
    }

    /// Appends `data`, growing in place, and returns the offset it starts at.
    pub fn append(&mut self, data: &[u8]) -> usize {
        let bytes = self.bytes.get_or_insert_with(BytesMut::new);
        let offset = bytes.len();
        bytes.extend_from_slice(data);
        offset
    }

    /// Resets the logical length while keeping the allocation.
    pub fn clear(&mut self) {
        if let Some(bytes) = self.bytes.as_mut() {
            bytes.clear();
        }
    }

    /// The written bytes.
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        self.bytes.as_deref().unwrap_or_default()
    }

    /// Returns `length` bytes starting at `offset`, if they lie within the
    /// written region.
    #[must_use]
    pub fn get(&self, offset: usize, length: usize) -> Option<&[u8]> {
        let end = offset.checked_add(length)?;
        self.as_slice().get(offset..end)
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        if let Some(bytes) = self.bytes.take() {
            self.pool.release(bytes);
        }
    }
}
