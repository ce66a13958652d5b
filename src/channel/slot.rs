//! Pending-event slots written from interrupt context.
//!
//! A slot moves `Idle -> Signaled -> Consumed -> Idle`.  The interrupt side
//! only ever signals; the main loop takes the event, handles it, and
//! completes it.  Data-carrying slots additionally pass through `Filling`
//! while the interrupt side copies data in.

// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

use core::sync::atomic::{AtomicU8, AtomicU32, Ordering};

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

use crate::channel::{CHANNEL_COUNT, Channel};

/// State of an [`EventSlot`]
#[repr(u8)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    #[default]
    Idle = 0,
    /// Interrupt side is writing the slot's data
    Filling = 1,
    /// Event pending, not yet taken by the main loop
    Signaled = 2,
    /// Main loop is handling the event
    Consumed = 3,
}

impl From<u8> for SlotState {
    fn from(value: u8) -> Self {
        match value {
            1 => SlotState::Filling,
            2 => SlotState::Signaled,
            3 => SlotState::Consumed,
            _ => SlotState::Idle,
        }
    }
}

/// Single-producer, single-consumer pending flag with overrun accounting.
pub struct EventSlot {
    state: AtomicU8,
    overruns: AtomicU32,
}

impl EventSlot {
    // We need a new() rather than a default() as it must be const.
    #[allow(clippy::new_without_default)]
    pub const fn new() -> Self {
        Self {
            state: AtomicU8::new(SlotState::Idle as u8),
            overruns: AtomicU32::new(0),
        }
    }

    pub fn state(&self) -> SlotState {
        SlotState::from(self.state.load(Ordering::Acquire))
    }

    pub fn is_pending(&self) -> bool {
        self.state() == SlotState::Signaled
    }

    /// Number of events coalesced or dropped because the slot was occupied.
    pub fn overruns(&self) -> u32 {
        self.overruns.load(Ordering::Relaxed)
    }

    /// Interrupt side: record that the event happened.
    ///
    /// An event arriving while one is already pending is coalesced into it
    /// and counted as an overrun.  An event arriving while the previous one is
    /// being handled re-arms the slot.  Returns `false` on overrun.
    pub fn signal(&self) -> bool {
        let mut current = self.state.load(Ordering::Acquire);
        loop {
            match SlotState::from(current) {
                SlotState::Signaled | SlotState::Filling => {
                    self.overruns.fetch_add(1, Ordering::Relaxed);
                    return false;
                }
                SlotState::Idle | SlotState::Consumed => {
                    match self.state.compare_exchange_weak(
                        current,
                        SlotState::Signaled as u8,
                        Ordering::AcqRel,
                        Ordering::Acquire,
                    ) {
                        Ok(_) => return true,
                        Err(actual) => current = actual,
                    }
                }
            }
        }
    }

    /// Main loop: take the pending event, if any.
    pub fn take(&self) -> bool {
        self.state
            .compare_exchange(
                SlotState::Signaled as u8,
                SlotState::Consumed as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Main loop: finish handling the taken event.  If the event was raised
    /// again meanwhile, the slot stays pending.
    pub fn complete(&self) {
        let _ = self.state.compare_exchange(
            SlotState::Consumed as u8,
            SlotState::Idle as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }

    /// Interrupt side: claim an idle slot to fill it with data.  Counts an
    /// overrun and returns `false` if the slot is occupied.
    pub(crate) fn begin_fill(&self) -> bool {
        let claimed = self
            .state
            .compare_exchange(
                SlotState::Idle as u8,
                SlotState::Filling as u8,
                Ordering::Acquire,
                Ordering::Relaxed,
            )
            .is_ok();
        if !claimed {
            self.overruns.fetch_add(1, Ordering::Relaxed);
        }
        claimed
    }

    /// Interrupt side: publish a filled slot.
    pub(crate) fn finish_fill(&self) {
        self.state.store(SlotState::Signaled as u8, Ordering::Release);
    }

    /// Main loop: finish reading a taken data slot, freeing it for the
    /// next fill.
    pub(crate) fn release(&self) {
        self.state.store(SlotState::Idle as u8, Ordering::Release);
    }
}

/// One [`EventSlot`] per channel, for a core's receive interrupt.
pub struct ChannelEvents {
    slots: [EventSlot; CHANNEL_COUNT],
}

impl ChannelEvents {
    // We need a new() rather than a default() as it must be const.
    #[allow(clippy::new_without_default)]
    pub const fn new() -> Self {
        Self {
            slots: [const { EventSlot::new() }; CHANNEL_COUNT],
        }
    }

    /// Interrupt side: `channel` fired.
    pub fn on_receive(&self, channel: Channel) {
        if !self.slots[channel.index()].signal() {
            trace!("Coalesced event on {channel:?}");
        }
    }

    /// Main loop: take and complete a pending event on `channel`.
    pub fn take(&self, channel: Channel) -> bool {
        let slot = &self.slots[channel.index()];
        if slot.take() {
            slot.complete();
            true
        } else {
            false
        }
    }

    pub fn slot(&self, channel: Channel) -> &EventSlot {
        &self.slots[channel.index()]
    }

    pub fn any_pending(&self) -> bool {
        self.slots.iter().any(EventSlot::is_pending)
    }
}
