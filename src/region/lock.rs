//! Cross-core lock guarding multi-field updates of the shared region.
//!
//! The lock is a thin busy-wait wrapper around a [`HwMutex`].  On the nRF53
//! the mutex is the MUTEX peripheral ([`RegisterMutex`]); [`SpinMutex`] is an
//! atomic flag for single-die use and for tests.

// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

use core::sync::atomic::{AtomicBool, Ordering};

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

use crate::{Error, Result};

/// A mutex both cores can take.
pub trait HwMutex {
    /// Try once to take the mutex.  Returns `true` if the caller now owns it.
    fn try_lock(&self) -> bool;

    /// Release the mutex.  Has no effect if it is not held.
    fn unlock(&self);
}

/// Mutex backed by a hardware MUTEX register.
///
/// Reading the register returns 0 if it was free, and the read itself takes
/// the mutex.  Writing 0 frees it.
pub struct RegisterMutex {
    addr: usize,
}

impl RegisterMutex {
    /// # Safety
    ///
    /// `addr` must be the address of a MUTEX register that no other code uses
    /// for a different purpose.
    pub const unsafe fn new(addr: usize) -> Self {
        Self { addr }
    }
}

impl HwMutex for RegisterMutex {
    fn try_lock(&self) -> bool {
        // SAFETY: `addr` is a MUTEX register, guaranteed by the caller of
        // `new()`
        unsafe { core::ptr::read_volatile(self.addr as *const u32) == 0 }
    }

    fn unlock(&self) {
        // SAFETY: as for `try_lock()`
        unsafe { core::ptr::write_volatile(self.addr as *mut u32, 0) };
    }
}

/// Mutex backed by an atomic flag.
pub struct SpinMutex {
    locked: AtomicBool,
}

impl SpinMutex {
    // We need a new() rather than a default() as it must be const.
    #[allow(clippy::new_without_default)]
    pub const fn new() -> Self {
        Self {
            locked: AtomicBool::new(false),
        }
    }
}

impl HwMutex for SpinMutex {
    fn try_lock(&self) -> bool {
        self.locked
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    fn unlock(&self) {
        self.locked.store(false, Ordering::Release);
    }
}

/// Busy-waiting lock over a [`HwMutex`].
///
/// Not reentrant.  Intended for short, non-nested critical sections (a struct
/// copy).  There is no fairness guarantee.
pub struct CrossCoreLock<M: HwMutex> {
    mutex: M,
    spin_limit: Option<u32>,
}

impl<M: HwMutex> CrossCoreLock<M> {
    /// Create a lock that spins until it gets the mutex, however long that
    /// takes.
    pub const fn new(mutex: M) -> Self {
        Self {
            mutex,
            spin_limit: None,
        }
    }

    /// Create a lock that gives up with [`Error::LockTimeout`] after
    /// `spin_limit` failed attempts.
    pub const fn with_spin_limit(mutex: M, spin_limit: u32) -> Self {
        Self {
            mutex,
            spin_limit: Some(spin_limit),
        }
    }

    /// Spin until the mutex is owned, or the spin limit is hit.
    pub fn acquire(&self) -> Result<()> {
        let mut spins: u32 = 0;
        while !self.mutex.try_lock() {
            if self.spin_limit.is_some_and(|limit| spins >= limit) {
                warn!("Cross-core lock still held after {spins} spins");
                return Err(Error::LockTimeout);
            }
            spins = spins.saturating_add(1);
            core::hint::spin_loop();
        }
        Ok(())
    }

    /// Release the lock.  Releasing an already released lock is a no-op.
    pub fn release(&self) {
        self.mutex.unlock();
    }

    /// Acquire the lock, releasing it when the returned guard drops.
    pub fn lock(&self) -> Result<LockGuard<'_, M>> {
        self.acquire()?;
        Ok(LockGuard { lock: self })
    }
}

/// Releases the [`CrossCoreLock`] when dropped.
pub struct LockGuard<'a, M: HwMutex> {
    lock: &'a CrossCoreLock<M>,
}

impl<M: HwMutex> Drop for LockGuard<'_, M> {
    fn drop(&mut self) {
        self.lock.release();
    }
}
