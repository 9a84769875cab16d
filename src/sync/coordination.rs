//! Cross-process coordination.
//!
//! Every process using the engine maps one named shared region holding a
//! [`SharedState`]. The region carries:
//!
//! - an init lock guarding the process reference count, so the destructive
//!   controller reset runs exactly once when the first process arrives and
//!   the teardown runs once when the last one leaves;
//! - one lock per controller, held around multi-register channel sequences
//!   (start, halt, live relink) so they are not interleaved with another
//!   process's sequence on the same controller.
//!
//! All locks are spin locks on `AtomicU32` words with a bounded, delay-paced
//! acquisition budget. A process that dies holding a lock leaves it held.

use core::sync::atomic::{AtomicU32, Ordering};

use embedded_hal::delay::DelayNs;

use super::primitives::wait_for;
use crate::driver::error::{ResourceError, Result};
use crate::hal::{SharedMemory, SharedRegion};
use crate::internal::constants::{MAX_CONTROLLERS, POLL_INTERVAL_US, SHARED_MAGIC};

const UNLOCKED: u32 = 0;
const LOCKED: u32 = 1;

/// Layout of the process-shared coordination region.
#[repr(C)]
pub struct SharedState {
    magic: AtomicU32,
    init_lock: AtomicU32,
    refcount: AtomicU32,
    controller_locks: [AtomicU32; MAX_CONTROLLERS],
}

impl SharedState {
    /// Bytes to request from the shared memory collaborator
    pub const SIZE: usize = core::mem::size_of::<Self>();
}

/// RAII guard for one of the shared spin locks.
#[must_use = "the lock is released when the guard is dropped"]
pub struct SharedLock<'a> {
    word: &'a AtomicU32,
}

impl SharedLock<'_> {
    fn acquire<'a, D: DelayNs>(
        word: &'a AtomicU32,
        delay: &mut D,
        timeout_us: u32,
    ) -> Result<SharedLock<'a>> {
        let mut try_lock = || {
            word.compare_exchange(UNLOCKED, LOCKED, Ordering::Acquire, Ordering::Relaxed)
                .is_ok()
        };
        if wait_for(delay, timeout_us, POLL_INTERVAL_US, &mut try_lock) {
            Ok(SharedLock { word })
        } else {
            warn!("coordination lock timed out after {} us", timeout_us);
            Err(ResourceError::LockTimeout.into())
        }
    }
}

impl Drop for SharedLock<'_> {
    fn drop(&mut self) {
        self.word.store(UNLOCKED, Ordering::Release);
    }
}

/// This process's membership in the shared coordination region.
pub struct ProcessLease {
    region: SharedRegion,
    lock_timeout_us: u32,
}

impl ProcessLease {
    /// Map (or create) the coordination region named `name`.
    ///
    /// The creator stamps the magic word; everyone else waits for it so
    /// nobody uses a half-initialized region.
    pub fn open<S, D>(shm: &S, name: &str, delay: &mut D, lock_timeout_us: u32) -> Result<Self>
    where
        S: SharedMemory + ?Sized,
        D: DelayNs,
    {
        let region = shm
            .open_or_create(name, SharedState::SIZE)
            .map_err(|_| ResourceError::SharedMemoryFailed)?;

        let usable = region.len() >= SharedState::SIZE
            && region.as_ptr().as_ptr().align_offset(core::mem::align_of::<SharedState>()) == 0;
        if !usable {
            error!("coordination region too small or misaligned");
            shm.close(region);
            return Err(ResourceError::SharedMemoryFailed.into());
        }

        let lease = Self {
            region,
            lock_timeout_us,
        };

        if lease.region.created() {
            lease.state().magic.store(SHARED_MAGIC, Ordering::Release);
            debug!("coordination region created");
        } else if !wait_for(delay, lock_timeout_us, POLL_INTERVAL_US, || {
            lease.state().magic.load(Ordering::Acquire) == SHARED_MAGIC
        }) {
            error!("coordination region never initialized");
            lease.close(shm);
            return Err(ResourceError::SharedMemoryFailed.into());
        }

        Ok(lease)
    }

    fn state(&self) -> &SharedState {
        // SAFETY: size and alignment were checked in `open`; every field is an
        // atomic, so shared access from several processes is sound.
        unsafe { &*self.region.as_ptr().as_ptr().cast::<SharedState>() }
    }

    /// Register this process.
    ///
    /// `init` runs under the init lock with `true` if this process is the
    /// first, so it can reset controller-wide state before anyone else joins.
    pub fn join<D, F, R>(&self, delay: &mut D, init: F) -> Result<R>
    where
        D: DelayNs,
        F: FnOnce(bool) -> R,
    {
        let state = self.state();
        let _guard = SharedLock::acquire(&state.init_lock, delay, self.lock_timeout_us)?;
        let previous = state.refcount.fetch_add(1, Ordering::AcqRel);
        if previous == 0 {
            info!("first process on the engine");
        }
        Ok(init(previous == 0))
    }

    /// Deregister this process.
    ///
    /// `fini` runs under the init lock with `true` if this was the last
    /// process. If the lock cannot be taken the count is still dropped, but
    /// `fini` is skipped.
    pub fn leave<D, F>(&self, delay: &mut D, fini: F)
    where
        D: DelayNs,
        F: FnOnce(bool),
    {
        let state = self.state();
        let guard = SharedLock::acquire(&state.init_lock, delay, self.lock_timeout_us);
        let previous = state
            .refcount
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .unwrap_or(0);
        if guard.is_ok() {
            if previous == 1 {
                info!("last process left the engine");
            }
            fini(previous == 1);
        }
    }

    /// Take the lock for controller `index`.
    pub fn lock_controller<D: DelayNs>(&self, index: usize, delay: &mut D) -> Result<SharedLock<'_>> {
        let word = self
            .state()
            .controller_locks
            .get(index)
            .ok_or(ResourceError::LockTimeout)?;
        SharedLock::acquire(word, delay, self.lock_timeout_us)
    }

    /// Processes currently registered
    #[must_use]
    pub fn refcount(&self) -> u32 {
        self.state().refcount.load(Ordering::Acquire)
    }

    /// Unmap the region.
    pub fn close<S: SharedMemory + ?Sized>(self, shm: &S) {
        shm.close(self.region);
    }
}
