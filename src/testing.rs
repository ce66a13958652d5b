//! Mock collaborators shared by the unit tests.

// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

use crate::channel::{Channel, SignalBus};
use crate::io::{Radio, RadioMode, Timer};
use crate::netcore::NetEvents;
use crate::region::SharedRegion;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RadioCall {
    Init(RadioMode),
    SetFrequency(u8),
    SetChannel(u8),
    SetNetworkAddress(u32),
    Receive,
    Disable,
    Transmit(Vec<u8>),
    Rssi,
}

#[derive(Default)]
pub struct MockRadio {
    pub calls: Vec<RadioCall>,
    pub rssi: i8,
}

impl MockRadio {
    pub fn with_rssi(rssi: i8) -> Self {
        Self {
            calls: Vec::new(),
            rssi,
        }
    }

    pub fn transmitted(&self) -> Vec<&[u8]> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                RadioCall::Transmit(pdu) => Some(pdu.as_slice()),
                _ => None,
            })
            .collect()
    }
}

impl Radio for MockRadio {
    fn init(&mut self, mode: RadioMode) {
        self.calls.push(RadioCall::Init(mode));
    }

    fn set_frequency(&mut self, frequency: u8) {
        self.calls.push(RadioCall::SetFrequency(frequency));
    }

    fn set_channel(&mut self, channel: u8) {
        self.calls.push(RadioCall::SetChannel(channel));
    }

    fn set_network_address(&mut self, address: u32) {
        self.calls.push(RadioCall::SetNetworkAddress(address));
    }

    fn receive(&mut self) {
        self.calls.push(RadioCall::Receive);
    }

    fn disable(&mut self) {
        self.calls.push(RadioCall::Disable);
    }

    fn transmit(&mut self, pdu: &[u8]) {
        self.calls.push(RadioCall::Transmit(pdu.to_vec()));
    }

    fn rssi(&mut self) -> i8 {
        self.calls.push(RadioCall::Rssi);
        self.rssi
    }
}

/// Microsecond counter that advances by one on every read and by the full
/// delay on every wait.
#[derive(Default)]
pub struct MockTimer {
    pub now: u32,
    pub delays: Vec<u32>,
}

impl Timer for MockTimer {
    fn now(&mut self) -> u32 {
        self.now = self.now.wrapping_add(1);
        self.now
    }

    fn delay_ms(&mut self, ms: u32) {
        self.delays.push(ms);
        self.now = self.now.wrapping_add(ms * 1000);
    }
}

/// Records the channels the network core raises towards the host.
#[derive(Default)]
pub struct RecordingBus {
    pub sent: Vec<Channel>,
}

impl SignalBus for RecordingBus {
    fn send(&mut self, channel: Channel) {
        self.sent.push(channel);
    }
}

/// Host-side bus delivering straight into the network core's IPC interrupt
/// handler.
pub struct HostBus<'a> {
    pub events: &'a NetEvents,
    pub region: &'a SharedRegion,
}

impl SignalBus for HostBus<'_> {
    fn send(&mut self, channel: Channel) {
        self.events.on_channel(channel, self.region);
    }
}
