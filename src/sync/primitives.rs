//! Synchronization primitives for ISR-safe access and bounded waits.

use core::cell::RefCell;

use critical_section::Mutex;
use embedded_hal::delay::DelayNs;

/// Cell providing interior mutability with critical section protection.
///
/// Combines `critical_section::Mutex` with `RefCell` for safe mutable access
/// from both normal code and interrupt handlers.
pub struct CriticalSectionCell<T> {
    inner: Mutex<RefCell<T>>,
}

impl<T> CriticalSectionCell<T> {
    /// Create a new cell (const, suitable for static initialization).
    pub const fn new(value: T) -> Self {
        Self {
            inner: Mutex::new(RefCell::new(value)),
        }
    }

    /// Execute a closure with exclusive mutable access.
    ///
    /// Interrupts are disabled for the duration of the closure.
    #[inline]
    pub fn with<R, F>(&self, f: F) -> R
    where
        F: FnOnce(&mut T) -> R,
    {
        critical_section::with(|cs| {
            let mut value = self.inner.borrow_ref_mut(cs);
            f(&mut value)
        })
    }
}

// SAFETY: CriticalSectionCell uses critical sections to protect all access.
unsafe impl<T: Send> Sync for CriticalSectionCell<T> {}

/// Poll `done` every `poll_us` until it returns true or `timeout_us` elapses.
///
/// Returns whether the condition was met. The condition is checked once more
/// after the last delay so a budget of zero still samples it.
pub fn wait_for<D, F>(delay: &mut D, timeout_us: u32, poll_us: u32, mut done: F) -> bool
where
    D: DelayNs,
    F: FnMut() -> bool,
{
    let poll_us = poll_us.max(1);
    let max_iterations = timeout_us / poll_us;
    for _ in 0..max_iterations {
        if done() {
            return true;
        }
        delay.delay_us(poll_us);
    }
    done()
}
