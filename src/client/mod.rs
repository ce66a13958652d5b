//! Host-core side of the fabric.
//!
//! The host core never touches the radio.  It asks the network core to act
//! on its behalf:
//! 1. parameters are written into the radio payload, under the lock
//! 2. `request_acknowledged` is cleared and `active_request` set
//! 3. the `Request` channel is raised
//! 4. the host waits until the network core sets `request_acknowledged`
//! 5. results (the RSSI) are read back, under the lock
//!
//! Only one request may be in flight.  [`HostClient`] enforces this by taking
//! `&mut self` for the whole issue-and-wait cycle.
//!
//! Log records go the other way with no acknowledgement: the record is
//! written into the region, `LogEvent` is raised, and the network core
//! transmits it when it next polls.  A record written before the previous
//! one was sent replaces it.
//!
//! Channels raised by the network core (experiment control, OTA) are received
//! by the host's IPC interrupt into a [`crate::channel::ChannelEvents`].
//!
//! See [`AsyncHostClient`] for async client usage.

// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

#[cfg(feature = "async")]
pub mod futures;

#[cfg(feature = "async")]
pub use futures::{AsyncHostClient, AsyncWait};

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

use crate::channel::{Channel, SignalBus};
use crate::io::{RadioMode, TrustedLog};
use crate::protocol::ota::{OtaReader, ReceivedChunk};
use crate::region::{HwMutex, LAYOUT_VERSION, Pdu, RequestKind, Shared};
use crate::{Error, Result};

/// Synchronous host client, spinning while it waits for the network core.
pub struct HostClient<'a, M: HwMutex, B: SignalBus> {
    shared: Shared<'a, M>,
    bus: B,
    spin_limit: Option<u32>,
}

impl<'a, M: HwMutex, B: SignalBus> HostClient<'a, M, B> {
    /// Create a client.  Waits are unbounded until
    /// [`Self::with_spin_limit()`] is used.
    ///
    /// Arguments:
    /// - `shared` - The shared region paired with the same mutex the network
    ///   core uses
    /// - `bus` - Raises channels towards the network core
    pub fn new(shared: Shared<'a, M>, bus: B) -> Self {
        Self {
            shared,
            bus,
            spin_limit: None,
        }
    }

    /// Give up waiting for the network core after `limit` polls, with
    /// [`Error::Timeout`].
    pub fn with_spin_limit(self, limit: u32) -> Self {
        Self {
            spin_limit: Some(limit),
            ..self
        }
    }

    pub fn shared(&self) -> Shared<'a, M> {
        self.shared
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    /// Whether the network core has started
    pub fn is_ready(&self) -> bool {
        self.shared.host_core_ready()
    }

    /// Whether the last request has been handled
    pub fn is_acknowledged(&self) -> bool {
        self.shared.request_acknowledged()
    }

    /// Check the network core has started and agrees on the region layout.
    pub fn check_ready(&self) -> Result<()> {
        if !self.is_ready() {
            return Err(Error::NotReady);
        }
        let version = self.shared.version();
        if version != LAYOUT_VERSION {
            warn!("Shared region version {version}, expected {LAYOUT_VERSION}");
            return Err(Error::VersionMismatch);
        }
        Ok(())
    }

    /// Wait for the network core to start, then check the layout version.
    pub fn wait_ready(&self) -> Result<()> {
        self.spin_until(|| self.is_ready())?;
        self.check_ready()
    }

    /// Issue `request` without waiting for it to complete.
    ///
    /// Any radio parameters must already be in place.
    pub fn issue(&mut self, request: RequestKind) -> Result<()> {
        if !self.is_ready() {
            return Err(Error::NotReady);
        }
        trace!("Issuing {request:?}");
        self.shared.set_request_acknowledged(false);
        self.shared.set_active_request(request);
        self.bus.send(Channel::Request);
        Ok(())
    }

    /// Wait for the network core to acknowledge the last request.
    pub fn wait_ack(&self) -> Result<()> {
        self.spin_until(|| self.is_acknowledged())
    }

    /// Issue `request` and wait for it to complete.
    pub fn request(&mut self, request: RequestKind) -> Result<()> {
        self.issue(request)?;
        self.wait_ack()
            .inspect_err(|_| warn!("No acknowledge for {request:?}"))
    }

    pub fn radio_init(&mut self, mode: RadioMode) -> Result<()> {
        self.shared.with_radio(|radio| radio.mode = mode as u8)?;
        self.request(RequestKind::RadioInit)
    }

    pub fn set_frequency(&mut self, frequency: u8) -> Result<()> {
        self.shared.with_radio(|radio| radio.frequency = frequency)?;
        self.request(RequestKind::RadioSetFrequency)
    }

    pub fn set_channel(&mut self, channel: u8) -> Result<()> {
        self.shared.with_radio(|radio| radio.channel = channel)?;
        self.request(RequestKind::RadioSetChannel)
    }

    pub fn set_network_address(&mut self, address: u32) -> Result<()> {
        self.shared
            .with_radio(|radio| radio.network_address = address)?;
        self.request(RequestKind::RadioSetAddress)
    }

    pub fn receive(&mut self) -> Result<()> {
        self.request(RequestKind::RadioRx)
    }

    pub fn disable(&mut self) -> Result<()> {
        self.request(RequestKind::RadioDisable)
    }

    /// Transmit `pdu`.  Fails closed on a PDU longer than the radio allows.
    pub fn transmit(&mut self, pdu: &[u8]) -> Result<()> {
        let pdu = Pdu::from_bytes(pdu)?;
        self.shared.with_radio(|radio| radio.tx_pdu = pdu)?;
        self.request(RequestKind::RadioTx)
    }

    /// Read the signal strength of the last received packet.
    pub fn rssi(&mut self) -> Result<i8> {
        self.request(RequestKind::RadioRssi)?;
        self.shared.with_radio(|radio| radio.rssi)
    }

    /// Hand a log record to the network core for transmission.
    pub fn log(&mut self, data: &[u8]) -> Result<()> {
        self.shared.write_log(data)?;
        self.bus.send(Channel::LogEvent);
        Ok(())
    }

    /// Image size announced by the last `OtaStart`
    pub fn ota_image_size(&self) -> Result<u32> {
        OtaReader::new(self.shared).image_size()
    }

    /// Copy the current OTA chunk out, after `OtaChunk` was raised.
    pub fn ota_chunk(&self) -> Result<ReceivedChunk> {
        OtaReader::new(self.shared).chunk()
    }

    fn spin_until(&self, done: impl Fn() -> bool) -> Result<()> {
        let mut spins: u32 = 0;
        while !done() {
            if self.spin_limit.is_some_and(|limit| spins >= limit) {
                return Err(Error::Timeout);
            }
            spins = spins.saturating_add(1);
            core::hint::spin_loop();
        }
        Ok(())
    }
}

impl<M: HwMutex, B: SignalBus> TrustedLog for HostClient<'_, M, B> {
    fn log_data(&mut self, data: &[u8]) {
        if let Err(e) = self.log(data) {
            warn!("Log record dropped: {e:?}");
        }
    }
}
