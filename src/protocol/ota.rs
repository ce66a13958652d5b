//! OTA chunk transfer through the shared region.
//!
//! The network core receives `OtaStart` and `OtaChunk` commands over the
//! radio and publishes them into the region's single chunk buffer, under the
//! cross-core lock, before raising [`crate::channel::Channel::OtaStart`] or
//! [`crate::channel::Channel::OtaChunk`].  The trusted flashing logic on the
//! host core copies the chunk out with [`OtaReader`], also under the lock.
//!
//! There is one chunk buffer and no acknowledgement: a chunk not consumed
//! before the next one arrives is lost.  Ordering and retransmission are the
//! sender's responsibility.  Chunks are not buffered or reordered here.

// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

use crate::protocol::HASH_LENGTH;
use crate::region::{HwMutex, OTA_CHUNK_SIZE, Shared};
use crate::{Error, Result};

/// Number of chunks needed to carry an image of `image_size` bytes
pub const fn chunk_count(image_size: u32) -> u32 {
    image_size.div_ceil(OTA_CHUNK_SIZE as u32)
}

/// State of the transfer announced by the last `OtaStart`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OtaSession {
    image_size: u32,
    expected_hash: [u8; HASH_LENGTH],
    next_index: u32,
    chunks_received: u32,
}

impl OtaSession {
    pub fn image_size(&self) -> u32 {
        self.image_size
    }

    /// Hash the image must match once written, checked by the flashing logic
    pub fn expected_hash(&self) -> &[u8; HASH_LENGTH] {
        &self.expected_hash
    }

    pub fn chunk_count(&self) -> u32 {
        chunk_count(self.image_size)
    }

    /// Chunks published since the session started, including repeats
    pub fn chunks_received(&self) -> u32 {
        self.chunks_received
    }

    /// Index following the last published chunk
    pub fn next_index(&self) -> u32 {
        self.next_index
    }
}

/// Network-core side of the transfer.
#[derive(Debug, Default)]
pub struct OtaTransfer {
    session: Option<OtaSession>,
}

impl OtaTransfer {
    pub const fn new() -> Self {
        Self { session: None }
    }

    pub fn session(&self) -> Option<&OtaSession> {
        self.session.as_ref()
    }

    /// Start a new transfer, replacing any previous one, and publish the image
    /// size.
    pub fn start<M: HwMutex>(
        &mut self,
        shared: &Shared<'_, M>,
        image_size: u32,
        expected_hash: [u8; HASH_LENGTH],
    ) -> Result<()> {
        shared.with_ota(|ota| ota.image_size = image_size)?;
        self.session = Some(OtaSession {
            image_size,
            expected_hash,
            next_index: 0,
            chunks_received: 0,
        });
        info!(
            "OTA started: {image_size} bytes in {} chunks",
            chunk_count(image_size)
        );
        Ok(())
    }

    /// Publish one chunk into the region.
    ///
    /// Fails closed on a chunk larger than the buffer.  Out of order chunks,
    /// and chunks beyond the announced image, are logged and published.
    pub fn write_chunk<M: HwMutex>(
        &mut self,
        shared: &Shared<'_, M>,
        index: u32,
        bytes: &[u8],
    ) -> Result<()> {
        if bytes.len() > OTA_CHUNK_SIZE {
            return Err(Error::ChunkTooLarge);
        }
        if let Some(session) = &self.session {
            if index >= session.chunk_count() {
                debug!(
                    "OTA chunk {index} beyond image of {} chunks",
                    session.chunk_count()
                );
            } else if index != session.next_index {
                debug!(
                    "OTA chunk {index} out of order, expected {}",
                    session.next_index
                );
            }
        }

        shared.with_ota(|ota| {
            ota.chunk_index = index;
            ota.chunk_size = bytes.len() as u32;
            ota.chunk[..bytes.len()].copy_from_slice(bytes);
        })?;

        if let Some(session) = &mut self.session {
            session.chunks_received = session.chunks_received.saturating_add(1);
            session.next_index = index.saturating_add(1);
        }
        Ok(())
    }
}

/// A chunk copied out of the region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceivedChunk {
    pub index: u32,
    pub size: usize,
    pub data: [u8; OTA_CHUNK_SIZE],
}

impl ReceivedChunk {
    pub fn bytes(&self) -> &[u8] {
        &self.data[..self.size]
    }

    /// Offset of this chunk within the image
    pub fn flash_offset(&self) -> u32 {
        self.index.saturating_mul(OTA_CHUNK_SIZE as u32)
    }
}

/// Consumer side of the transfer, used by the trusted flashing logic.
pub struct OtaReader<'a, M: HwMutex> {
    shared: Shared<'a, M>,
}

impl<'a, M: HwMutex> OtaReader<'a, M> {
    pub fn new(shared: Shared<'a, M>) -> Self {
        Self { shared }
    }

    /// Image size announced by the last `OtaStart`
    pub fn image_size(&self) -> Result<u32> {
        self.shared.with_ota(|ota| ota.image_size)
    }

    /// Copy the current chunk out.  Fails closed if the region holds a chunk
    /// size beyond the buffer.
    pub fn chunk(&self) -> Result<ReceivedChunk> {
        let ota = self.shared.with_ota(|ota| *ota)?;
        let size = ota.chunk_bytes()?.len();
        Ok(ReceivedChunk {
            index: ota.chunk_index,
            size,
            data: ota.chunk,
        })
    }
}
