//! Asynchronous host client.

// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

use alloc::boxed::Box;
use async_trait::async_trait;
#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

use crate::channel::SignalBus;
use crate::client::HostClient;
use crate::io::RadioMode;
use crate::protocol::ota::ReceivedChunk;
use crate::region::{HwMutex, Pdu, RequestKind, Shared};
use crate::{Error, Result};

/// Yield between polls of the shared region.
///
/// Application must provide an implementation of this trait in order for the
/// async client to be able to yield while the network core works.
///
/// This trait keeps `netcore-ipc` free of any specific async runtime.
///
/// Example:
///
/// ```rust,ignore
/// use embassy_time::{Duration, Timer};
/// struct Wait;
/// #[async_trait(?Send)]
/// impl AsyncWait for Wait {
///     async fn wait(&mut self) {
///         Timer::after(Duration::from_micros(50)).await;
///     }
/// }
/// ```
#[async_trait(?Send)]
pub trait AsyncWait {
    async fn wait(&mut self);
}

/// Async host client.
///
/// Same request cycle as [`HostClient`], but waits by awaiting
/// [`AsyncWait::wait()`] between checks instead of spinning.
///
/// ```rust,ignore
/// let shared = unsafe { Shared::new(&SHARED, &LOCK) };
/// let mut client = AsyncHostClient::new(shared, bus, Wait).with_max_polls(100);
/// client.wait_ready().await?;
/// client.radio_init(RadioMode::Ble1Mbit).await?;
/// let rssi = client.rssi().await?;
/// ```
pub struct AsyncHostClient<'a, M: HwMutex, B: SignalBus, W: AsyncWait> {
    inner: HostClient<'a, M, B>,
    waiter: W,
    max_polls: Option<u32>,
}

impl<'a, M: HwMutex, B: SignalBus, W: AsyncWait> AsyncHostClient<'a, M, B, W> {
    /// Create a new AsyncHostClient
    ///
    /// Arguments:
    /// - `shared` - The shared region paired with the network core's mutex
    /// - `bus` - Raises channels towards the network core
    /// - `waiter` - Yields between polls
    pub fn new(shared: Shared<'a, M>, bus: B, waiter: W) -> Self {
        Self {
            inner: HostClient::new(shared, bus),
            waiter,
            max_polls: None,
        }
    }

    /// Give up after `max_polls` waits, with [`Error::Timeout`].
    pub fn with_max_polls(self, max_polls: u32) -> Self {
        Self {
            max_polls: Some(max_polls),
            ..self
        }
    }

    /// The underlying synchronous client, for the non-blocking operations
    pub fn inner(&self) -> &HostClient<'a, M, B> {
        &self.inner
    }

    pub async fn wait_ready(&mut self) -> Result<()> {
        self.poll_until(HostClient::is_ready).await?;
        self.inner.check_ready()
    }

    /// Issue `request` and wait for the acknowledge.
    pub async fn request(&mut self, request: RequestKind) -> Result<()> {
        self.inner.issue(request)?;
        let result = self.poll_until(HostClient::is_acknowledged).await;
        if result.is_err() {
            warn!("No acknowledge for {request:?}");
        }
        result
    }

    pub async fn radio_init(&mut self, mode: RadioMode) -> Result<()> {
        self.inner
            .shared()
            .with_radio(|radio| radio.mode = mode as u8)?;
        self.request(RequestKind::RadioInit).await
    }

    pub async fn set_frequency(&mut self, frequency: u8) -> Result<()> {
        self.inner
            .shared()
            .with_radio(|radio| radio.frequency = frequency)?;
        self.request(RequestKind::RadioSetFrequency).await
    }

    pub async fn set_channel(&mut self, channel: u8) -> Result<()> {
        self.inner
            .shared()
            .with_radio(|radio| radio.channel = channel)?;
        self.request(RequestKind::RadioSetChannel).await
    }

    pub async fn set_network_address(&mut self, address: u32) -> Result<()> {
        self.inner
            .shared()
            .with_radio(|radio| radio.network_address = address)?;
        self.request(RequestKind::RadioSetAddress).await
    }

    pub async fn receive(&mut self) -> Result<()> {
        self.request(RequestKind::RadioRx).await
    }

    pub async fn disable(&mut self) -> Result<()> {
        self.request(RequestKind::RadioDisable).await
    }

    pub async fn transmit(&mut self, pdu: &[u8]) -> Result<()> {
        let pdu = Pdu::from_bytes(pdu)?;
        self.inner.shared().with_radio(|radio| radio.tx_pdu = pdu)?;
        self.request(RequestKind::RadioTx).await
    }

    pub async fn rssi(&mut self) -> Result<i8> {
        self.request(RequestKind::RadioRssi).await?;
        self.inner.shared().with_radio(|radio| radio.rssi)
    }

    /// Hand a log record to the network core.  Never waits.
    pub fn log(&mut self, data: &[u8]) -> Result<()> {
        self.inner.log(data)
    }

    pub fn ota_image_size(&self) -> Result<u32> {
        self.inner.ota_image_size()
    }

    pub fn ota_chunk(&self) -> Result<ReceivedChunk> {
        self.inner.ota_chunk()
    }

    async fn poll_until(&mut self, done: fn(&HostClient<'a, M, B>) -> bool) -> Result<()> {
        let mut polls: u32 = 0;
        while !done(&self.inner) {
            if self.max_polls.is_some_and(|max| polls >= max) {
                return Err(Error::Timeout);
            }
            polls = polls.saturating_add(1);
            self.waiter.wait().await;
        }
        Ok(())
    }
}
