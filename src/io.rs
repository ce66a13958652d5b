//! Traits for the collaborators this crate drives but does not implement.
//!
//! The radio driver, the free-running timer and the trusted-domain logging
//! gate are board or SDK code.  The network core consumes them through these
//! traits, which also lets the event loop run against mocks on a PC.
//!
//! # Radio receive path
//!
//! The radio driver must forward every received frame from its receive
//! interrupt to [`crate::netcore::NetEvents::on_radio_frame()`].  That call
//! is bounded: it filters the frame and copies at most one PDU.

// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

use crate::{Error, Result};

/// Radio physical mode, as carried in the shared region's `radio.mode`.
#[repr(u8)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum RadioMode {
    #[default]
    Ble1Mbit = 0,
    Ble2Mbit = 1,
    BleLr125Kbit = 2,
    BleLr500Kbit = 3,
    Ieee802154 = 4,
}

impl TryFrom<u8> for RadioMode {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(RadioMode::Ble1Mbit),
            1 => Ok(RadioMode::Ble2Mbit),
            2 => Ok(RadioMode::BleLr125Kbit),
            3 => Ok(RadioMode::BleLr500Kbit),
            4 => Ok(RadioMode::Ieee802154),
            _ => Err(Error::UnknownMode),
        }
    }
}

/// Radio capability.
///
/// Calls are synchronous.  A call that never returns stalls the network
/// core's loop; no timeout is applied.
pub trait Radio {
    /// Power up and configure the radio for `mode`.
    fn init(&mut self, mode: RadioMode);

    fn set_frequency(&mut self, frequency: u8);

    fn set_channel(&mut self, channel: u8);

    fn set_network_address(&mut self, address: u32);

    /// Start receiving.
    fn receive(&mut self);

    /// Stop any transmit or receive in progress.
    fn disable(&mut self);

    /// Transmit `pdu`, at most [`crate::region::MAX_PDU_SIZE`] bytes.
    fn transmit(&mut self, pdu: &[u8]);

    /// Current received signal strength, dBm
    fn rssi(&mut self) -> i8;
}

/// Free-running timer of the network core.
pub trait Timer {
    /// Current counter value, in microseconds.  Wraps.
    fn now(&mut self) -> u32;

    /// Suspend the main loop for `ms` milliseconds.  Interrupts must still be
    /// delivered while waiting.
    fn delay_ms(&mut self, ms: u32);
}

/// One-way entry point from the non-trusted core into the trusted domain.
///
/// Fire-and-forget: there is no return value and records that cannot be
/// delivered are dropped.
pub trait TrustedLog {
    fn log_data(&mut self, data: &[u8]);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn radio_mode_codes() {
        for code in 0..=4u8 {
            assert_eq!(RadioMode::try_from(code).map(|m| m as u8), Ok(code));
        }
        assert_eq!(RadioMode::try_from(5), Err(Error::UnknownMode));
    }
}
