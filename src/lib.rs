//! Inter-processor communication fabric for a dual-core radio device.
//!
//! This crate implements the contract between a "host" application core and a
//! dedicated radio-controller ("network") core that share a fixed block of RAM
//! and a handful of one-shot hardware event channels.  The network core owns
//! the radio; the host core asks it to perform radio operations, pushes log
//! records through it, and receives experiment control and over-the-air (OTA)
//! firmware chunks that the network core decodes from radio frames.
//!
//! `no_std`.  Requires `alloc` for the async host client only.
//!
//! ## Architecture
//!
//! Two independently clocked, single-threaded execution contexts communicate
//! through:
//! - **Shared region** ([`region::SharedRegion`]): a versioned, fixed-layout
//!   block mapped by both cores, holding request/acknowledge flags, the active
//!   request code, and the log, OTA and radio payload areas.
//! - **Cross-core lock** ([`region::CrossCoreLock`]): a hardware mutex guarding
//!   every multi-field update of the OTA and radio payloads, so a reader never
//!   sees a torn update.
//! - **Event channels** ([`channel::Channel`]): fire-and-forget wake-up lines,
//!   one per semantic event.  Receipt is recorded in an
//!   [`channel::EventSlot`] by the interrupt handler and consumed by the main
//!   loop.
//!
//! On the network core, [`netcore::NetCore`] is a level-triggered poll loop
//! with three independent branches:
//! - radio frames carrying remote commands (experiment start/stop, OTA start,
//!   OTA chunk), see [`protocol`]
//! - host requests (radio init, frequency, channel, address, rx, disable, tx,
//!   RSSI)
//! - host log events, framed by [`protocol::notification`] and transmitted
//!
//! On the host core, [`client::HostClient`] (or the async
//! `client::AsyncHostClient`) issues requests, waits for acknowledgement and
//! reads results, and provides the one-way trusted logging entry point.
//!
//! Only a single request may be in flight.  The single-slot log and OTA
//! payloads are "last write wins": the protocol provides no queueing.
//!
//! ## Modules
//!
//! - [`region`] - Shared region layout, payload types and the cross-core lock
//! - [`channel`] - Event channel numbering, signalling and pending-event slots
//! - [`protocol`] - Remote command framing, OTA chunk transfer and
//!   notification framing
//! - [`io`] - Traits for the external collaborators: radio, timer, trusted
//!   logging
//! - [`netcore`] - The network-core event loop
//! - [`client`] - Host-core side of the fabric
//!
//! ## Getting Started
//!
//! **Network core**:
//! 1. Place a [`region::SharedRegion`] at the address both cores link against
//!    (or use [`region::SharedRegion::from_addr()`]) and pair it with the
//!    hardware mutex via [`region::Shared::new()`].
//! 2. Create a static [`netcore::NetEvents`] and call
//!    [`netcore::NetEvents::on_channel()`] from the IPC interrupt and
//!    [`netcore::NetEvents::on_radio_frame()`] from the radio receive callback.
//! 3. Build a [`netcore::NetCore`] with your [`io::Radio`], [`io::Timer`] and
//!    [`channel::SignalBus`] implementations, call
//!    [`netcore::NetCore::start()`], then [`netcore::NetCore::run()`] with the
//!    platform's wait-for-event.
//!
//! **Host core**:
//! 1. Pair the same region with the same mutex.
//! 2. Create a [`client::HostClient`], call
//!    [`client::HostClient::wait_ready()`], then issue requests.
//!
//! ## Features
//!
//! Default features:
//! - `async` - Enable the async host client (requires `alloc`).
//!
//! Compile with `--no-default-features` for the network core.

// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

#![cfg_attr(not(test), no_std)]

#[cfg(feature = "async")]
extern crate alloc;

pub mod channel;
pub mod client;
pub mod io;
pub mod netcore;
pub mod protocol;
pub mod region;

#[cfg(test)]
mod testing;

/// IPC errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Frame or record shorter than its fixed fields
    Truncated,
    /// Frame does not start with the expected preamble
    BadPreamble,
    /// Frame addressed to another device
    ForeignTarget,
    /// Unrecognized remote command tag
    UnknownCommand,
    /// Unrecognized notification kind
    UnknownNotification,
    /// Unrecognized request code
    UnknownRequest,
    /// Unrecognized channel number
    UnknownChannel,
    /// Unrecognized radio mode
    UnknownMode,
    /// OTA chunk larger than the chunk buffer
    ChunkTooLarge,
    /// Payload too large for buffer
    PayloadTooLarge,
    /// Buffer too small for operation
    BufferTooSmall,
    /// Slot still holds unconsumed data
    Busy,
    /// Gave up spinning on the cross-core lock
    LockTimeout,
    /// Timeout waiting for the other core
    Timeout,
    /// Network core has not reported ready
    NotReady,
    /// Shared region layout version differs between the cores
    VersionMismatch,
}

/// Type to represent the result of an IPC operation
pub type Result<T> = core::result::Result<T, Error>;
