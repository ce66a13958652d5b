//! Remote command protocol carried over the radio link.
//!
//! An inbound frame is laid out as:
//!
//! ```text
//! [preamble: 8][target device id: u64 LE][tag: u8][tag payload]
//! ```
//!
//! Frames without the preamble are noise and are discarded.  A target of
//! [`BROADCAST_ID`] addresses every device; any other target must equal this
//! device's identity.  The remainder is a [`RemoteCommand`]:
//!
//! | Tag    | Command           | Payload                                      |
//! |--------|-------------------|----------------------------------------------|
//! | `0x01` | `ExperimentStart` | none                                         |
//! | `0x02` | `ExperimentStop`  | none                                         |
//! | `0x03` | `OtaStart`        | `image_size: u32 LE`, `expected_hash: [u8; 32]` |
//! | `0x04` | `OtaChunk`        | `index: u32 LE`, `size: u8`, `bytes: [u8; size]` |
//!
//! The protocol is stateless per frame.  Trailing bytes after a command's
//! payload are ignored.
//!
//! - [`ota`] - OTA chunk transfer into the shared region
//! - [`notification`] - Outbound notification frames

// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

pub mod notification;
pub mod ota;

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

use crate::region::OTA_CHUNK_SIZE;
use crate::{Error, Result};

/// Length of the frame preamble
pub const PREAMBLE_LENGTH: usize = 8;

/// Preamble marking a remote command frame
pub const DEFAULT_PREAMBLE: [u8; PREAMBLE_LENGTH] =
    [0x8b, 0x02, 0x7e, 0x5a, 0xc1, 0x39, 0xf4, 0x0d];

/// Length of the target device identity
pub const DEVICE_ID_LENGTH: usize = 8;

/// Target identity matching every device
pub const BROADCAST_ID: u64 = 0;

/// Length of the expected image hash carried by `OtaStart`
pub const HASH_LENGTH: usize = 32;

/// Remote command tags
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandTag {
    ExperimentStart = 0x01,
    ExperimentStop = 0x02,
    OtaStart = 0x03,
    OtaChunk = 0x04,
}

impl TryFrom<u8> for CommandTag {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0x01 => Ok(CommandTag::ExperimentStart),
            0x02 => Ok(CommandTag::ExperimentStop),
            0x03 => Ok(CommandTag::OtaStart),
            0x04 => Ok(CommandTag::OtaChunk),
            _ => Err(Error::UnknownCommand),
        }
    }
}

/// A decoded remote command.  Chunk bytes borrow from the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteCommand<'a> {
    ExperimentStart,
    ExperimentStop,
    OtaStart {
        image_size: u32,
        expected_hash: [u8; HASH_LENGTH],
    },
    OtaChunk {
        index: u32,
        /// At most [`OTA_CHUNK_SIZE`] bytes
        bytes: &'a [u8],
    },
}

impl<'a> RemoteCommand<'a> {
    /// Decode a command from the bytes following the target identity.
    pub fn decode(command: &'a [u8]) -> Result<Self> {
        let (&tag, payload) = command.split_first().ok_or(Error::Truncated)?;
        match CommandTag::try_from(tag)? {
            CommandTag::ExperimentStart => Ok(RemoteCommand::ExperimentStart),
            CommandTag::ExperimentStop => Ok(RemoteCommand::ExperimentStop),
            CommandTag::OtaStart => {
                let image_size = le_u32(payload)?;
                let hash = payload
                    .get(4..4 + HASH_LENGTH)
                    .ok_or(Error::Truncated)?;
                let mut expected_hash = [0u8; HASH_LENGTH];
                expected_hash.copy_from_slice(hash);
                Ok(RemoteCommand::OtaStart {
                    image_size,
                    expected_hash,
                })
            }
            CommandTag::OtaChunk => {
                let index = le_u32(payload)?;
                let size = *payload.get(4).ok_or(Error::Truncated)? as usize;
                if size > OTA_CHUNK_SIZE {
                    return Err(Error::ChunkTooLarge);
                }
                let bytes = payload.get(5..5 + size).ok_or(Error::Truncated)?;
                Ok(RemoteCommand::OtaChunk { index, bytes })
            }
        }
    }

    pub fn tag(&self) -> CommandTag {
        match self {
            RemoteCommand::ExperimentStart => CommandTag::ExperimentStart,
            RemoteCommand::ExperimentStop => CommandTag::ExperimentStop,
            RemoteCommand::OtaStart { .. } => CommandTag::OtaStart,
            RemoteCommand::OtaChunk { .. } => CommandTag::OtaChunk,
        }
    }

    /// Encode the command (tag and payload) into `buf`.  Returns the number of
    /// bytes written.
    pub fn encode(&self, buf: &mut [u8]) -> Result<usize> {
        let len = match self {
            RemoteCommand::ExperimentStart | RemoteCommand::ExperimentStop => 1,
            RemoteCommand::OtaStart { .. } => 1 + 4 + HASH_LENGTH,
            RemoteCommand::OtaChunk { bytes, .. } => {
                if bytes.len() > OTA_CHUNK_SIZE {
                    return Err(Error::ChunkTooLarge);
                }
                1 + 4 + 1 + bytes.len()
            }
        };
        if buf.len() < len {
            return Err(Error::BufferTooSmall);
        }

        buf[0] = self.tag() as u8;
        match self {
            RemoteCommand::ExperimentStart | RemoteCommand::ExperimentStop => {}
            RemoteCommand::OtaStart {
                image_size,
                expected_hash,
            } => {
                buf[1..5].copy_from_slice(&image_size.to_le_bytes());
                buf[5..len].copy_from_slice(expected_hash);
            }
            RemoteCommand::OtaChunk { index, bytes } => {
                buf[1..5].copy_from_slice(&index.to_le_bytes());
                buf[5] = bytes.len() as u8;
                buf[6..len].copy_from_slice(bytes);
            }
        }
        Ok(len)
    }
}

/// Accepts frames carrying the preamble and addressed to this device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameFilter {
    preamble: [u8; PREAMBLE_LENGTH],
    device_id: u64,
}

impl FrameFilter {
    pub const fn new(device_id: u64, preamble: [u8; PREAMBLE_LENGTH]) -> Self {
        Self {
            preamble,
            device_id,
        }
    }

    pub fn device_id(&self) -> u64 {
        self.device_id
    }

    /// Check the preamble and target identity, returning the command bytes.
    pub fn accept<'f>(&self, frame: &'f [u8]) -> Result<&'f [u8]> {
        let rest = frame
            .strip_prefix(self.preamble.as_slice())
            .ok_or(Error::BadPreamble)?;
        let target = le_u64(rest)?;
        if target != BROADCAST_ID && target != self.device_id {
            return Err(Error::ForeignTarget);
        }
        Ok(&rest[DEVICE_ID_LENGTH..])
    }
}

/// Build a complete inbound frame for `target`, as the remote controller
/// sends it.  Returns the frame length.
pub fn write_frame(
    buf: &mut [u8],
    preamble: &[u8; PREAMBLE_LENGTH],
    target: u64,
    command: &RemoteCommand<'_>,
) -> Result<usize> {
    let header = PREAMBLE_LENGTH + DEVICE_ID_LENGTH;
    if buf.len() < header {
        return Err(Error::BufferTooSmall);
    }
    buf[..PREAMBLE_LENGTH].copy_from_slice(preamble);
    buf[PREAMBLE_LENGTH..header].copy_from_slice(&target.to_le_bytes());
    let len = command.encode(&mut buf[header..])?;
    Ok(header + len)
}

pub(crate) fn le_u32(bytes: &[u8]) -> Result<u32> {
    bytes
        .get(..4)
        .and_then(|b| b.try_into().ok())
        .map(u32::from_le_bytes)
        .ok_or(Error::Truncated)
}

pub(crate) fn le_u64(bytes: &[u8]) -> Result<u64> {
    bytes
        .get(..8)
        .and_then(|b| b.try_into().ok())
        .map(u64::from_le_bytes)
        .ok_or(Error::Truncated)
}
