//! Single-slot mailbox for a radio frame captured in interrupt context.

// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

use core::cell::UnsafeCell;

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

use crate::channel::EventSlot;
use crate::region::MAX_PDU_SIZE;
use crate::{Error, Result};

/// Holds at most one frame.  Frames arriving while the slot is occupied are
/// dropped and counted in [`Self::overruns()`].
pub struct FrameSlot {
    slot: EventSlot,
    len: UnsafeCell<usize>,
    buf: UnsafeCell<[u8; MAX_PDU_SIZE]>,
}

// SAFETY: `len` and `buf` are written only by the side that moved the slot to
// `Filling`, and read only by the side that moved it to `Consumed`.
unsafe impl Sync for FrameSlot {}

impl FrameSlot {
    // We need a new() rather than a default() as it must be const.
    #[allow(clippy::new_without_default)]
    pub const fn new() -> Self {
        Self {
            slot: EventSlot::new(),
            len: UnsafeCell::new(0),
            buf: UnsafeCell::new([0; MAX_PDU_SIZE]),
        }
    }

    /// Interrupt side: copy `frame` in and mark it pending.
    pub fn store(&self, frame: &[u8]) -> Result<()> {
        if frame.len() > MAX_PDU_SIZE {
            return Err(Error::PayloadTooLarge);
        }
        if !self.slot.begin_fill() {
            return Err(Error::Busy);
        }

        // SAFETY: `Filling` gives this side exclusive access.
        unsafe {
            (&mut *self.buf.get())[..frame.len()].copy_from_slice(frame);
            *self.len.get() = frame.len();
        }

        self.slot.finish_fill();
        Ok(())
    }

    /// Main loop: copy the pending frame into `buf` and free the slot.
    ///
    /// Returns the frame length, or `None` if nothing is pending.
    pub fn take(&self, buf: &mut [u8]) -> Option<usize> {
        if !self.slot.take() {
            return None;
        }

        // SAFETY: `Consumed` gives this side exclusive access.
        let len = unsafe {
            let len = (*self.len.get()).min(buf.len());
            buf[..len].copy_from_slice(&(&*self.buf.get())[..len]);
            len
        };

        self.slot.release();
        Some(len)
    }

    pub fn is_pending(&self) -> bool {
        self.slot.is_pending()
    }

    pub fn overruns(&self) -> u32 {
        self.slot.overruns()
    }
}
