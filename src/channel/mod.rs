//! Event channels between the two cores.
//!
//! Each channel is a one-shot, data-less wake-up line with one meaning.
//! Sending is fire-and-forget; the receiving side's interrupt handler only
//! records the event in an [`EventSlot`], which the main loop consumes.
//!
//! Channel numbers are part of the contract between the cores and must not
//! be renumbered on one side only.

// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

pub mod frame;
pub mod slot;

pub use frame::FrameSlot;
pub use slot::{ChannelEvents, EventSlot, SlotState};

use crate::{Error, Result};

/// Number of event channels in use
pub const CHANNEL_COUNT: usize = 7;

/// Hardware event channels, numbered as wired on both cores.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    /// Host has written a request into the shared region
    Request = 0,
    /// Radio receive event, hardware only
    RadioRx = 1,
    ExperimentStart = 2,
    ExperimentStop = 3,
    /// Host has written a log record into the shared region
    LogEvent = 4,
    /// OTA image size has been written into the shared region
    OtaStart = 5,
    /// An OTA chunk has been written into the shared region
    OtaChunk = 6,
}

impl Channel {
    pub const ALL: [Channel; CHANNEL_COUNT] = [
        Channel::Request,
        Channel::RadioRx,
        Channel::ExperimentStart,
        Channel::ExperimentStop,
        Channel::LogEvent,
        Channel::OtaStart,
        Channel::OtaChunk,
    ];

    pub const fn index(self) -> usize {
        self as usize
    }

    /// Bit for this channel in interrupt enable and routing masks
    pub const fn mask(self) -> u32 {
        1 << (self as u32)
    }
}

impl TryFrom<u8> for Channel {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        Channel::ALL
            .get(value as usize)
            .copied()
            .ok_or(Error::UnknownChannel)
    }
}

/// Sending side of the event channels.
pub trait SignalBus {
    /// Raise `channel` on the other core.  Never waits for the receiver.
    fn send(&mut self, channel: Channel);
}

impl<B: SignalBus + ?Sized> SignalBus for &mut B {
    fn send(&mut self, channel: Channel) {
        (**self).send(channel)
    }
}

/// Signal bus driving the IPC peripheral's `TASKS_SEND` registers.
#[derive(Clone, Copy)]
pub struct RegisterSignalBus {
    tasks_send: usize,
}

impl RegisterSignalBus {
    /// # Safety
    ///
    /// `tasks_send` must be the address of `TASKS_SEND[0]`, with the
    /// registers for the other channels following it at 4 byte intervals,
    /// and the send channels must already be routed to the other core.
    pub const unsafe fn new(tasks_send: usize) -> Self {
        Self { tasks_send }
    }
}

impl SignalBus for RegisterSignalBus {
    fn send(&mut self, channel: Channel) {
        let addr = self.tasks_send + channel.index() * 4;
        // SAFETY: guaranteed by the caller of `new()`
        unsafe { core::ptr::write_volatile(addr as *mut u32, 1) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_numbering_is_fixed() {
        assert_eq!(Channel::Request as u8, 0);
        assert_eq!(Channel::RadioRx as u8, 1);
        assert_eq!(Channel::ExperimentStart as u8, 2);
        assert_eq!(Channel::ExperimentStop as u8, 3);
        assert_eq!(Channel::LogEvent as u8, 4);
        assert_eq!(Channel::OtaStart as u8, 5);
        assert_eq!(Channel::OtaChunk as u8, 6);
        for channel in Channel::ALL {
            assert_eq!(Channel::try_from(channel as u8), Ok(channel));
        }
        assert_eq!(Channel::try_from(7), Err(Error::UnknownChannel));
        assert_eq!(Channel::LogEvent.mask(), 0x10);
    }

    #[test]
    fn register_bus_writes_task() {
        let mut tasks = [0u32; CHANNEL_COUNT];
        let mut bus = unsafe { RegisterSignalBus::new(tasks.as_mut_ptr() as usize) };
        bus.send(Channel::OtaChunk);
        bus.send(Channel::ExperimentStart);
        assert_eq!(tasks, [0, 0, 1, 0, 0, 0, 1]);
    }
}
