//! Shared region mapped by both cores.
//!
//! The region is the only cross-core mutable state.  Its layout is a
//! versioned schema: both cores build against this module, and the sizes and
//! offsets below are checked at compile time so neither side can drift.
//!
//! | Offset | Field                  | Size |
//! |--------|------------------------|------|
//! | 0      | `version`              | 4    |
//! | 4      | `host_core_ready`      | 1    |
//! | 5      | `request_acknowledged` | 1    |
//! | 6      | `active_request`       | 1    |
//! | 7      | reserved               | 1    |
//! | 8      | [`LogPayload`]         | 128  |
//! | 136    | [`OtaPayload`]         | 140  |
//! | 276    | [`RadioPayload`]       | 524  |
//!
//! Single scalar flags are written by one side and read by the other without
//! locking.  The OTA and radio payloads are only reachable through
//! [`Shared`], which holds the [`CrossCoreLock`] for the duration of each
//! access.  The log record is copied in and out whole, without the lock.

// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

pub mod lock;

pub use lock::{CrossCoreLock, HwMutex, LockGuard, RegisterMutex, SpinMutex};

use core::cell::UnsafeCell;
use core::mem::{offset_of, size_of};
use core::sync::atomic::{AtomicBool, AtomicU8, AtomicU32, Ordering};

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

use crate::{Error, Result};

/// Version of the shared region layout.  Bump on any layout change.
pub const LAYOUT_VERSION: u32 = 1;

/// Capacity of the log record data area
pub const LOG_DATA_SIZE: usize = 127;

/// Size of a log record as carried on the wire: length byte plus data
pub const LOG_RECORD_SIZE: usize = 1 + LOG_DATA_SIZE;

/// Capacity of the OTA chunk buffer
pub const OTA_CHUNK_SIZE: usize = 128;

/// Maximum radio PDU size
pub const MAX_PDU_SIZE: usize = 255;

/// Request issued by the host core to the network core.
///
/// Exactly one request may be in flight at a time.  `None` is both the
/// initial and the resting value.
#[repr(u8)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    #[default]
    None = 0,
    RadioInit = 1,
    RadioSetFrequency = 2,
    RadioSetChannel = 3,
    RadioSetAddress = 4,
    RadioRx = 5,
    RadioDisable = 6,
    RadioTx = 7,
    RadioRssi = 8,
}

impl RequestKind {
    pub const ALL: [RequestKind; 9] = [
        RequestKind::None,
        RequestKind::RadioInit,
        RequestKind::RadioSetFrequency,
        RequestKind::RadioSetChannel,
        RequestKind::RadioSetAddress,
        RequestKind::RadioRx,
        RequestKind::RadioDisable,
        RequestKind::RadioTx,
        RequestKind::RadioRssi,
    ];
}

impl TryFrom<u8> for RequestKind {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(RequestKind::None),
            1 => Ok(RequestKind::RadioInit),
            2 => Ok(RequestKind::RadioSetFrequency),
            3 => Ok(RequestKind::RadioSetChannel),
            4 => Ok(RequestKind::RadioSetAddress),
            5 => Ok(RequestKind::RadioRx),
            6 => Ok(RequestKind::RadioDisable),
            7 => Ok(RequestKind::RadioTx),
            8 => Ok(RequestKind::RadioRssi),
            _ => Err(Error::UnknownRequest),
        }
    }
}

/// Single-slot log record pushed by the host core.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogPayload {
    /// Number of valid bytes in `data`
    pub length: u8,
    pub data: [u8; LOG_DATA_SIZE],
}

impl LogPayload {
    pub const fn new() -> Self {
        Self {
            length: 0,
            data: [0; LOG_DATA_SIZE],
        }
    }

    /// Build a record from raw bytes.  Fails closed on oversize data.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() > LOG_DATA_SIZE {
            return Err(Error::PayloadTooLarge);
        }
        let mut payload = Self::new();
        payload.length = data.len() as u8;
        payload.data[..data.len()].copy_from_slice(data);
        Ok(payload)
    }

    /// The valid bytes of the record
    pub fn bytes(&self) -> Result<&[u8]> {
        let length = self.length as usize;
        if length > LOG_DATA_SIZE {
            return Err(Error::PayloadTooLarge);
        }
        Ok(&self.data[..length])
    }

    /// Serialize as a length-prefixed record.  Returns the number of bytes
    /// written.
    pub fn encode(&self, buf: &mut [u8]) -> Result<usize> {
        let data = self.bytes()?;
        let len = 1 + data.len();
        if buf.len() < len {
            return Err(Error::BufferTooSmall);
        }
        buf[0] = data.len() as u8;
        buf[1..len].copy_from_slice(data);
        Ok(len)
    }
}

impl Default for LogPayload {
    fn default() -> Self {
        Self::new()
    }
}

/// Single in-flight OTA chunk, plus the size of the image being transferred.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OtaPayload {
    pub image_size: u32,
    pub chunk_index: u32,
    /// Number of valid bytes in `chunk`, at most [`OTA_CHUNK_SIZE`]
    pub chunk_size: u32,
    pub chunk: [u8; OTA_CHUNK_SIZE],
}

impl OtaPayload {
    pub const fn new() -> Self {
        Self {
            image_size: 0,
            chunk_index: 0,
            chunk_size: 0,
            chunk: [0; OTA_CHUNK_SIZE],
        }
    }

    /// The valid bytes of the current chunk
    pub fn chunk_bytes(&self) -> Result<&[u8]> {
        let size = self.chunk_size as usize;
        if size > OTA_CHUNK_SIZE {
            return Err(Error::ChunkTooLarge);
        }
        Ok(&self.chunk[..size])
    }
}

impl Default for OtaPayload {
    fn default() -> Self {
        Self::new()
    }
}

/// Length-prefixed raw radio payload.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pdu {
    pub length: u8,
    pub buffer: [u8; MAX_PDU_SIZE],
}

impl Pdu {
    pub const fn new() -> Self {
        Self {
            length: 0,
            buffer: [0; MAX_PDU_SIZE],
        }
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() > MAX_PDU_SIZE {
            return Err(Error::PayloadTooLarge);
        }
        let mut pdu = Self::new();
        pdu.length = data.len() as u8;
        pdu.buffer[..data.len()].copy_from_slice(data);
        Ok(pdu)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.buffer[..self.length as usize]
    }
}

impl Default for Pdu {
    fn default() -> Self {
        Self::new()
    }
}

/// Radio request parameters and results.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RadioPayload {
    /// Raw [`crate::io::RadioMode`] for `RadioInit`
    pub mode: u8,
    /// Parameter for `RadioSetFrequency`
    pub frequency: u8,
    /// Parameter for `RadioSetChannel`
    pub channel: u8,
    _reserved: u8,
    /// Parameter for `RadioSetAddress`
    pub network_address: u32,
    /// PDU sent by `RadioTx`
    pub tx_pdu: Pdu,
    pub rx_pdu: Pdu,
    /// Result of `RadioRssi`
    pub rssi: i8,
}

impl RadioPayload {
    pub const fn new() -> Self {
        Self {
            mode: 0,
            frequency: 0,
            channel: 0,
            _reserved: 0,
            network_address: 0,
            tx_pdu: Pdu::new(),
            rx_pdu: Pdu::new(),
            rssi: 0,
        }
    }
}

impl Default for RadioPayload {
    fn default() -> Self {
        Self::new()
    }
}

/// The shared region itself.  Lives for the device's uptime at an address
/// both cores agree on.
#[repr(C)]
pub struct SharedRegion {
    version: AtomicU32,
    host_core_ready: AtomicBool,
    request_acknowledged: AtomicBool,
    active_request: AtomicU8,
    _reserved: u8,
    log: UnsafeCell<LogPayload>,
    ota: UnsafeCell<OtaPayload>,
    radio: UnsafeCell<RadioPayload>,
}

// SAFETY: The flags are atomics.  `ota` and `radio` are only dereferenced
// through `Shared`, under the cross-core lock.  `log` is only accessed by
// whole-record volatile copies.
unsafe impl Sync for SharedRegion {}

const _: () = {
    assert!(size_of::<LogPayload>() == LOG_RECORD_SIZE);
    assert!(size_of::<OtaPayload>() == 140);
    assert!(offset_of!(OtaPayload, chunk) == 12);
    assert!(size_of::<Pdu>() == 256);
    assert!(offset_of!(RadioPayload, network_address) == 4);
    assert!(offset_of!(RadioPayload, tx_pdu) == 8);
    assert!(offset_of!(RadioPayload, rx_pdu) == 264);
    assert!(offset_of!(RadioPayload, rssi) == 520);
    assert!(size_of::<RadioPayload>() == 524);
    assert!(SharedRegion::log_offset() == 8);
    assert!(SharedRegion::ota_offset() == 136);
    assert!(SharedRegion::radio_offset() == 276);
    assert!(size_of::<SharedRegion>() == SharedRegion::SIZE);
};

/// SharedRegion offsets
impl SharedRegion {
    /// Total size of the region in bytes
    pub const SIZE: usize = 800;

    pub const fn version_offset() -> usize {
        offset_of!(SharedRegion, version)
    }

    pub const fn host_core_ready_offset() -> usize {
        offset_of!(SharedRegion, host_core_ready)
    }

    pub const fn request_acknowledged_offset() -> usize {
        offset_of!(SharedRegion, request_acknowledged)
    }

    pub const fn active_request_offset() -> usize {
        offset_of!(SharedRegion, active_request)
    }

    pub const fn log_offset() -> usize {
        offset_of!(SharedRegion, log)
    }

    pub const fn ota_offset() -> usize {
        offset_of!(SharedRegion, ota)
    }

    pub const fn radio_offset() -> usize {
        offset_of!(SharedRegion, radio)
    }
}

impl SharedRegion {
    /// Create a zeroed region, e.g. for a `static` placed in the shared RAM
    /// section by the linker script.
    ///
    /// ```rust
    /// use netcore_ipc::region::SharedRegion;
    ///
    /// static SHARED: SharedRegion = SharedRegion::new();
    /// assert!(!SHARED.host_core_ready());
    /// ```
    // We need a new() rather than a default() as it must be const.
    #[allow(clippy::new_without_default)]
    pub const fn new() -> Self {
        Self {
            version: AtomicU32::new(0),
            host_core_ready: AtomicBool::new(false),
            request_acknowledged: AtomicBool::new(false),
            active_request: AtomicU8::new(RequestKind::None as u8),
            _reserved: 0,
            log: UnsafeCell::new(LogPayload::new()),
            ota: UnsafeCell::new(OtaPayload::new()),
            radio: UnsafeCell::new(RadioPayload::new()),
        }
    }

    /// View the region at a fixed physical address.
    ///
    /// # Safety
    ///
    /// `addr` must be 4-byte aligned, point at [`Self::SIZE`] bytes of RAM
    /// mapped by both cores for the rest of the program, and that RAM must
    /// only ever be accessed through this type.
    pub unsafe fn from_addr(addr: usize) -> &'static Self {
        // SAFETY: guaranteed by the caller
        unsafe { &*(addr as *const Self) }
    }

    /// Layout version published by the network core, 0 before start.
    pub fn version(&self) -> u32 {
        self.version.load(Ordering::Acquire)
    }

    pub(crate) fn publish_version(&self) {
        self.version.store(LAYOUT_VERSION, Ordering::Release);
    }

    pub fn host_core_ready(&self) -> bool {
        self.host_core_ready.load(Ordering::Acquire)
    }

    pub fn set_host_core_ready(&self, ready: bool) {
        self.host_core_ready.store(ready, Ordering::Release);
    }

    pub fn request_acknowledged(&self) -> bool {
        self.request_acknowledged.load(Ordering::Acquire)
    }

    pub fn set_request_acknowledged(&self, acknowledged: bool) {
        self.request_acknowledged.store(acknowledged, Ordering::Release);
    }

    /// Raw request code, which may not be a known [`RequestKind`].
    pub fn active_request_raw(&self) -> u8 {
        self.active_request.load(Ordering::Acquire)
    }

    pub fn active_request(&self) -> Result<RequestKind> {
        RequestKind::try_from(self.active_request_raw())
    }

    pub fn set_active_request(&self, request: RequestKind) {
        self.active_request.store(request as u8, Ordering::Release);
    }

    /// Copy the log record out.  Not synchronized with the writer: a record
    /// overwritten while being read is an accepted race.
    pub fn read_log(&self) -> LogPayload {
        // SAFETY: the pointer is valid and aligned; the record is plain bytes
        // so any interleaving yields a valid value.
        unsafe { core::ptr::read_volatile(self.log.get()) }
    }

    /// Overwrite the log record.  Last write wins.
    pub fn write_log(&self, data: &[u8]) -> Result<()> {
        let payload = LogPayload::from_bytes(data)?;
        // SAFETY: as for `read_log()`
        unsafe { core::ptr::write_volatile(self.log.get(), payload) };
        Ok(())
    }
}

/// A shared region paired with the cross-core lock that guards it.
///
/// All multi-field access to the OTA and radio payloads goes through here.
pub struct Shared<'a, M: HwMutex> {
    region: &'a SharedRegion,
    lock: &'a CrossCoreLock<M>,
}

impl<M: HwMutex> Clone for Shared<'_, M> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<M: HwMutex> Copy for Shared<'_, M> {}

impl<'a, M: HwMutex> Shared<'a, M> {
    /// Pair a region with its lock.
    ///
    /// # Safety
    ///
    /// Every `Shared` for `region`, on either core, must use a lock backed by
    /// the same mutex.  Pairing one region with two different mutexes would
    /// allow two contexts to mutate a payload at once.
    pub const unsafe fn new(region: &'a SharedRegion, lock: &'a CrossCoreLock<M>) -> Self {
        Self { region, lock }
    }

    pub fn region(&self) -> &'a SharedRegion {
        self.region
    }

    pub fn lock(&self) -> &'a CrossCoreLock<M> {
        self.lock
    }

    /// Run `f` on the OTA payload with the cross-core lock held.
    ///
    /// Critical sections must be short and must not nest: the lock is not
    /// reentrant.
    pub fn with_ota<R>(&self, f: impl FnOnce(&mut OtaPayload) -> R) -> Result<R> {
        let _guard = self.lock.lock()?;
        // SAFETY: the lock is held and every access to `ota` takes it.
        let ota = unsafe { &mut *self.region.ota.get() };
        Ok(f(ota))
    }

    /// Run `f` on the radio payload with the cross-core lock held.
    pub fn with_radio<R>(&self, f: impl FnOnce(&mut RadioPayload) -> R) -> Result<R> {
        let _guard = self.lock.lock()?;
        // SAFETY: the lock is held and every access to `radio` takes it.
        let radio = unsafe { &mut *self.region.radio.get() };
        Ok(f(radio))
    }
}

impl<M: HwMutex> core::ops::Deref for Shared<'_, M> {
    type Target = SharedRegion;

    fn deref(&self) -> &SharedRegion {
        self.region
    }
}
