//! Outbound notification frames.
//!
//! ```text
//! [device id: u64 LE][kind: u8][timestamp: u32 LE][payload]
//! ```
//!
//! No checksum is added here; the radio provides its own integrity check.

// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

use crate::protocol::{le_u32, le_u64};
use crate::region::MAX_PDU_SIZE;
use crate::{Error, Result};

/// Device identity and kind
pub const NOTIFICATION_HEADER_SIZE: usize = 9;

/// Length of the timestamp following the header
pub const TIMESTAMP_SIZE: usize = 4;

/// Largest payload that still fits a PDU
pub const MAX_NOTIFICATION_PAYLOAD: usize =
    MAX_PDU_SIZE - NOTIFICATION_HEADER_SIZE - TIMESTAMP_SIZE;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    /// Payload is a length-prefixed log record from the host core
    LogEvent = 0x86,
}

impl TryFrom<u8> for NotificationKind {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0x86 => Ok(NotificationKind::LogEvent),
            _ => Err(Error::UnknownNotification),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotificationFrame<'a> {
    pub device_id: u64,
    pub kind: NotificationKind,
    pub timestamp: u32,
    pub payload: &'a [u8],
}

impl<'a> NotificationFrame<'a> {
    pub fn log_event(device_id: u64, timestamp: u32, record: &'a [u8]) -> Self {
        Self {
            device_id,
            kind: NotificationKind::LogEvent,
            timestamp,
            payload: record,
        }
    }

    pub fn encoded_len(&self) -> usize {
        NOTIFICATION_HEADER_SIZE + TIMESTAMP_SIZE + self.payload.len()
    }

    /// Serialize into `buf`, returning the frame length.
    pub fn encode(&self, buf: &mut [u8]) -> Result<usize> {
        if self.payload.len() > MAX_NOTIFICATION_PAYLOAD {
            return Err(Error::PayloadTooLarge);
        }
        let len = self.encoded_len();
        if buf.len() < len {
            return Err(Error::BufferTooSmall);
        }

        buf[..8].copy_from_slice(&self.device_id.to_le_bytes());
        buf[8] = self.kind as u8;
        let payload_start = NOTIFICATION_HEADER_SIZE + TIMESTAMP_SIZE;
        buf[NOTIFICATION_HEADER_SIZE..payload_start].copy_from_slice(&self.timestamp.to_le_bytes());
        buf[payload_start..len].copy_from_slice(self.payload);
        Ok(len)
    }

    /// Parse a frame received from a device.
    pub fn decode(frame: &'a [u8]) -> Result<Self> {
        let payload_start = NOTIFICATION_HEADER_SIZE + TIMESTAMP_SIZE;
        if frame.len() < payload_start {
            return Err(Error::Truncated);
        }
        Ok(Self {
            device_id: le_u64(frame)?,
            kind: NotificationKind::try_from(frame[8])?,
            timestamp: le_u32(&frame[NOTIFICATION_HEADER_SIZE..])?,
            payload: &frame[payload_start..],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_event_layout() {
        let record = [3u8, 1, 2, 3];
        let frame = NotificationFrame::log_event(0x0102_0304_0506_0708, 0xAABB_CCDD, &record);
        let mut buf = [0u8; MAX_PDU_SIZE];
        let len = frame.encode(&mut buf).unwrap();
        assert_eq!(len, 17);
        assert_eq!(
            &buf[..len],
            &[
                0x08, 0x07, 0x06, 0x05, 0x04, 0x03, 0x02, 0x01, // device id
                0x86, // kind
                0xDD, 0xCC, 0xBB, 0xAA, // timestamp
                3, 1, 2, 3, // record
            ]
        );
        assert_eq!(NotificationFrame::decode(&buf[..len]), Ok(frame));
    }

    #[test]
    fn payload_must_fit_pdu() {
        let payload = [0u8; MAX_NOTIFICATION_PAYLOAD + 1];
        let frame = NotificationFrame::log_event(1, 0, &payload);
        let mut buf = [0u8; 512];
        assert_eq!(frame.encode(&mut buf), Err(Error::PayloadTooLarge));

        let frame = NotificationFrame::log_event(1, 0, &payload[..MAX_NOTIFICATION_PAYLOAD]);
        assert_eq!(frame.encode(&mut buf), Ok(MAX_PDU_SIZE));
        assert_eq!(frame.encode(&mut buf[..20]), Err(Error::BufferTooSmall));
    }

    #[test]
    fn decode_rejects_short_frames() {
        assert_eq!(NotificationFrame::decode(&[0; 12]), Err(Error::Truncated));
        let mut raw = [0u8; 13];
        raw[8] = 0x01;
        assert_eq!(
            NotificationFrame::decode(&raw),
            Err(Error::UnknownNotification)
        );
    }
}
