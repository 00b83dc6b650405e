//! Process-wide pools of reusable objects.
//!
//! Values are handed out through [`Pooled`] guards. Dropping the guard
//! resets the value and returns it to its pool, so release happens on
//! every exit path, including early returns through `?`.
//!
//! ```
//! use rswc::pool::scratch;
//!
//! let mut buf = scratch();
//! buf.extend_from_slice(b"transient");
//! assert_eq!(&buf[..], b"transient");
//! // `buf` is cleared and handed back when it goes out of scope
//! ```

use std::ops::{Deref, DerefMut};

use parking_lot::Mutex;

use crate::protocol::Frame;

/// Idle buffers kept by the scratch pool.
const MAX_IDLE_SCRATCH: usize = 64;

/// Idle frames kept by the frame pool.
const MAX_IDLE_FRAMES: usize = 128;

static SCRATCH: Pool<Vec<u8>> = Pool::new(MAX_IDLE_SCRATCH);
static FRAMES: Pool<Frame> = Pool::new(MAX_IDLE_FRAMES);

/// Values that can be wiped before being reused.
pub trait Reset {
    /// Bring the value back to its empty state, keeping allocations.
    fn reset(&mut self);
}

impl Reset for Vec<u8> {
    fn reset(&mut self) {
        self.clear();
    }
}

/// A bounded stack of idle values.
///
/// Values beyond `max_idle` are dropped on release instead of kept.
pub struct Pool<T> {
    idle: Mutex<Vec<T>>,
    max_idle: usize,
}

impl<T: Default + Reset> Pool<T> {
    /// Create an empty pool.
    #[must_use]
    pub const fn new(max_idle: usize) -> Self {
        Self {
            idle: parking_lot::const_mutex(Vec::new()),
            max_idle,
        }
    }

    /// Take an idle value, or a fresh default one when the pool is empty.
    pub fn acquire(&self) -> Pooled<'_, T> {
        let value = self.idle.lock().pop().unwrap_or_default();
        Pooled { value, pool: self }
    }

    /// Number of values waiting for reuse.
    #[must_use]
    pub fn idle(&self) -> usize {
        self.idle.lock().len()
    }

    fn release(&self, mut value: T) {
        value.reset();
        let mut idle = self.idle.lock();
        if idle.len() < self.max_idle {
            idle.push(value);
        }
    }
}

/// A value on loan from a [`Pool`].
pub struct Pooled<'a, T: Default + Reset> {
    value: T,
    pool: &'a Pool<T>,
}

impl<T: Default + Reset> Deref for Pooled<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T: Default + Reset> DerefMut for Pooled<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.value
    }
}

impl<T: Default + Reset> Drop for Pooled<'_, T> {
    fn drop(&mut self) {
        self.pool.release(std::mem::take(&mut self.value));
    }
}

impl<T: Default + Reset + std::fmt::Debug> std::fmt::Debug for Pooled<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Pooled").field(&self.value).finish()
    }
}

/// Borrow an empty byte buffer from the process-wide scratch pool.
pub fn scratch() -> Pooled<'static, Vec<u8>> {
    SCRATCH.acquire()
}

/// Borrow a reset frame from the process-wide frame pool.
pub fn acquire_frame() -> Pooled<'static, Frame> {
    FRAMES.acquire()
}
