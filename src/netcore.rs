//! Network-core event loop.
//!
//! The network core runs a single-threaded, level-triggered poll loop.
//! Interrupt handlers only record events in [`NetEvents`]; the main loop
//! sleeps until any interrupt fires, then [`NetCore::poll()`] re-checks every
//! source, in this order:
//!
//! 1. **Radio frame** - a filtered remote command captured by the radio
//!    receive callback.  Experiment control is forwarded as a channel event;
//!    OTA start and chunks are published into the shared region first.
//! 2. **Host request** - the [`RequestKind`] latched when the `Request`
//!    channel fired.  The radio operation runs to completion, results are
//!    written back, then the request is acknowledged.
//! 3. **Log event** - the host's log record is framed as a notification and
//!    transmitted.
//!
//! Malformed or foreign frames, unknown requests and unknown commands are
//! dropped.  There is no retry and no cancellation: a radio call that never
//! returns stalls the loop.
//!
//! Typical use on the network core:
//!
//! ```rust,ignore
//! static SHARED: SharedRegion = SharedRegion::new();
//! static LOCK: CrossCoreLock<RegisterMutex> =
//!     CrossCoreLock::new(unsafe { RegisterMutex::new(MUTEX0_ADDR) });
//! static EVENTS: NetEvents = NetEvents::new();
//!
//! // IPC interrupt, per received channel
//! EVENTS.on_channel(channel, &SHARED);
//! // Radio receive callback
//! EVENTS.on_radio_frame(&FILTER, frame);
//!
//! let shared = unsafe { Shared::new(&SHARED, &LOCK) };
//! let mut core = NetCore::new(config, shared, &EVENTS, radio, timer, bus);
//! core.start();
//! core.run(cortex_m::asm::wfe);
//! ```

// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

use core::sync::atomic::{AtomicU8, Ordering};

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

use crate::channel::{Channel, EventSlot, FrameSlot, SignalBus};
use crate::io::{Radio, RadioMode, Timer};
use crate::protocol::notification::NotificationFrame;
use crate::protocol::ota::OtaTransfer;
use crate::protocol::{DEFAULT_PREAMBLE, FrameFilter, PREAMBLE_LENGTH, RemoteCommand};
use crate::region::{
    HwMutex, LOG_RECORD_SIZE, MAX_PDU_SIZE, RadioPayload, RequestKind, Shared, SharedRegion,
};

/// Default wait before a host-requested transmit, letting the host finish
/// preparing the PDU.
pub const DEFAULT_TX_GUARD_MS: u32 = 9;

/// Network core configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetCoreConfig {
    /// This device's identity, as matched against frame targets and sent in
    /// notifications
    pub device_id: u64,
    /// Preamble marking remote command frames
    pub preamble: [u8; PREAMBLE_LENGTH],
    /// Wait before performing a `RadioTx` request
    pub tx_guard_ms: u32,
}

impl NetCoreConfig {
    pub const fn new(device_id: u64) -> Self {
        Self {
            device_id,
            preamble: DEFAULT_PREAMBLE,
            tx_guard_ms: DEFAULT_TX_GUARD_MS,
        }
    }

    pub fn with_tx_guard_ms(self, tx_guard_ms: u32) -> Self {
        Self {
            tx_guard_ms,
            ..self
        }
    }

    pub fn with_preamble(self, preamble: [u8; PREAMBLE_LENGTH]) -> Self {
        Self { preamble, ..self }
    }

    /// Filter for the radio receive callback
    pub fn filter(&self) -> FrameFilter {
        FrameFilter::new(self.device_id, self.preamble)
    }
}

/// Everything the network core's interrupt handlers write.
pub struct NetEvents {
    request: EventSlot,
    latched_request: AtomicU8,
    log: EventSlot,
    frame: FrameSlot,
}

impl NetEvents {
    // We need a new() rather than a default() as it must be const.
    #[allow(clippy::new_without_default)]
    pub const fn new() -> Self {
        Self {
            request: EventSlot::new(),
            latched_request: AtomicU8::new(RequestKind::None as u8),
            log: EventSlot::new(),
            frame: FrameSlot::new(),
        }
    }

    /// IPC interrupt body: `channel` was raised by the host core.
    ///
    /// For `Request`, the request code is latched from the region now so a
    /// later host write cannot change it under the handler.
    pub fn on_channel(&self, channel: Channel, region: &SharedRegion) {
        match channel {
            Channel::Request => {
                let raw = region.active_request_raw();
                self.latched_request.store(raw, Ordering::Release);
                self.request.signal();
            }
            Channel::LogEvent => {
                self.log.signal();
            }
            _ => {}
        }
    }

    /// Radio receive callback body.  Frames failing the preamble or identity
    /// check are discarded without trace.
    pub fn on_radio_frame(&self, filter: &FrameFilter, frame: &[u8]) {
        if let Ok(command) = filter.accept(frame) {
            // An occupied slot drops the frame, counted in overruns().
            let _ = self.frame.store(command);
        }
    }

    pub fn pending(&self) -> bool {
        self.request.is_pending() || self.log.is_pending() || self.frame.is_pending()
    }

    /// Events coalesced or dropped since boot, across all sources
    pub fn overruns(&self) -> u32 {
        self.request
            .overruns()
            .saturating_add(self.log.overruns())
            .saturating_add(self.frame.overruns())
    }
}

/// The network-core event loop.
pub struct NetCore<'a, M: HwMutex, R: Radio, T: Timer, B: SignalBus> {
    config: NetCoreConfig,
    shared: Shared<'a, M>,
    events: &'a NetEvents,
    radio: R,
    timer: T,
    bus: B,
    ota: OtaTransfer,
    notification: [u8; MAX_PDU_SIZE],
}

impl<'a, M: HwMutex, R: Radio, T: Timer, B: SignalBus> NetCore<'a, M, R, T, B> {
    /// Create the event loop.
    ///
    /// Arguments:
    /// - `config` - Device identity and tunables
    /// - `shared` - The shared region paired with its lock
    /// - `events` - State written by this core's interrupt handlers
    /// - `radio` - Radio driver
    /// - `timer` - Free-running timer used for timestamps and the transmit
    ///   guard
    /// - `bus` - Sends channel events to the host core
    pub fn new(
        config: NetCoreConfig,
        shared: Shared<'a, M>,
        events: &'a NetEvents,
        radio: R,
        timer: T,
        bus: B,
    ) -> Self {
        Self {
            config,
            shared,
            events,
            radio,
            timer,
            bus,
            ota: OtaTransfer::new(),
            notification: [0; MAX_PDU_SIZE],
        }
    }

    /// Publish the layout version and tell the host core requests may be
    /// issued.
    pub fn start(&mut self) {
        let region = self.shared.region();
        region.set_active_request(RequestKind::None);
        region.set_request_acknowledged(false);
        region.publish_version();
        region.set_host_core_ready(true);
        info!("Network core ready, device {:#018x}", self.config.device_id);
    }

    /// Run each branch once.  Returns the number of events handled.
    pub fn poll(&mut self) -> usize {
        let mut handled = 0;
        if self.poll_radio_frame() {
            handled += 1;
        }
        if self.poll_request() {
            handled += 1;
        }
        if self.poll_log() {
            handled += 1;
        }
        handled
    }

    /// Loop forever: `wait()` until woken, then poll everything.
    ///
    /// `wait` is the platform's wait-for-event.  Wake-ups do not say which
    /// event fired, so every source is checked on each pass.
    pub fn run(&mut self, mut wait: impl FnMut()) -> ! {
        loop {
            wait();
            self.poll();
        }
    }

    pub fn config(&self) -> &NetCoreConfig {
        &self.config
    }

    pub fn ota(&self) -> &OtaTransfer {
        &self.ota
    }

    pub fn radio(&self) -> &R {
        &self.radio
    }

    pub fn timer(&self) -> &T {
        &self.timer
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }
}

// Branch handlers
impl<M: HwMutex, R: Radio, T: Timer, B: SignalBus> NetCore<'_, M, R, T, B> {
    fn poll_radio_frame(&mut self) -> bool {
        let mut command = [0u8; MAX_PDU_SIZE];
        let Some(len) = self.events.frame.take(&mut command) else {
            return false;
        };

        match RemoteCommand::decode(&command[..len]) {
            Ok(command) => self.dispatch_command(command),
            Err(e) => debug!("Dropping remote command: {e:?}"),
        }
        true
    }

    fn dispatch_command(&mut self, command: RemoteCommand<'_>) {
        trace!("Remote command {:?}", command.tag());
        match command {
            RemoteCommand::ExperimentStart => self.bus.send(Channel::ExperimentStart),
            RemoteCommand::ExperimentStop => self.bus.send(Channel::ExperimentStop),
            RemoteCommand::OtaStart {
                image_size,
                expected_hash,
            } => match self.ota.start(&self.shared, image_size, expected_hash) {
                Ok(()) => self.bus.send(Channel::OtaStart),
                Err(e) => warn!("Dropping OTA start: {e:?}"),
            },
            RemoteCommand::OtaChunk { index, bytes } => {
                match self.ota.write_chunk(&self.shared, index, bytes) {
                    Ok(()) => self.bus.send(Channel::OtaChunk),
                    Err(e) => warn!("Dropping OTA chunk {index}: {e:?}"),
                }
            }
        }
    }

    fn poll_request(&mut self) -> bool {
        if !self.events.request.take() {
            return false;
        }

        let raw = self.events.latched_request.load(Ordering::Acquire);
        let region = self.shared.region();
        region.set_request_acknowledged(false);

        match RequestKind::try_from(raw) {
            Ok(request) => self.perform(request),
            Err(_) => debug!("Ignoring unknown request {raw:#04x}"),
        }

        // Back to idle before acknowledging, so the host's next request
        // cannot be overwritten.
        region.set_active_request(RequestKind::None);
        region.set_request_acknowledged(true);
        self.events.request.complete();
        true
    }

    fn perform(&mut self, request: RequestKind) {
        trace!("Host request {request:?}");
        match request {
            RequestKind::None => {}
            RequestKind::RadioInit => {
                if let Some(mode) = self.read_radio(|radio| radio.mode) {
                    match RadioMode::try_from(mode) {
                        Ok(mode) => self.radio.init(mode),
                        Err(_) => warn!("Ignoring radio init with unknown mode {mode}"),
                    }
                }
            }
            RequestKind::RadioSetFrequency => {
                if let Some(frequency) = self.read_radio(|radio| radio.frequency) {
                    self.radio.set_frequency(frequency);
                }
            }
            RequestKind::RadioSetChannel => {
                if let Some(channel) = self.read_radio(|radio| radio.channel) {
                    self.radio.set_channel(channel);
                }
            }
            RequestKind::RadioSetAddress => {
                if let Some(address) = self.read_radio(|radio| radio.network_address) {
                    self.radio.set_network_address(address);
                }
            }
            RequestKind::RadioRx => self.radio.receive(),
            RequestKind::RadioDisable => self.radio.disable(),
            RequestKind::RadioTx => {
                self.timer.delay_ms(self.config.tx_guard_ms);
                if let Some(pdu) = self.read_radio(|radio| radio.tx_pdu) {
                    self.radio.transmit(pdu.bytes());
                }
            }
            RequestKind::RadioRssi => {
                let rssi = self.radio.rssi();
                if let Err(e) = self.shared.with_radio(|radio| radio.rssi = rssi) {
                    warn!("RSSI not written back: {e:?}");
                }
            }
        }
    }

    fn read_radio<V>(&self, f: impl FnOnce(&RadioPayload) -> V) -> Option<V> {
        match self.shared.with_radio(|radio| f(radio)) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Radio parameters unavailable: {e:?}");
                None
            }
        }
    }

    fn poll_log(&mut self) -> bool {
        if !self.events.log.take() {
            return false;
        }

        let log = self.shared.read_log();
        let timestamp = self.timer.now();
        let mut record = [0u8; LOG_RECORD_SIZE];
        let encoded = log.encode(&mut record).and_then(|len| {
            NotificationFrame::log_event(self.config.device_id, timestamp, &record[..len])
                .encode(&mut self.notification)
        });

        match encoded {
            Ok(len) => {
                self.radio.disable();
                self.radio.transmit(&self.notification[..len]);
                debug!("Sent log event ({len} bytes)");
            }
            Err(e) => warn!("Dropping log event: {e:?}"),
        }

        self.events.log.complete();
        true
    }
}
