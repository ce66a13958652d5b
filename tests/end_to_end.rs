use netcore_ipc::channel::{Channel, ChannelEvents, SignalBus};
use netcore_ipc::client::HostClient;
use netcore_ipc::io::{Radio, RadioMode, Timer};
use netcore_ipc::netcore::{NetCore, NetCoreConfig, NetEvents};
use netcore_ipc::protocol::notification::{NotificationFrame, NotificationKind};
use netcore_ipc::protocol::{
    BROADCAST_ID, DEFAULT_PREAMBLE, HASH_LENGTH, RemoteCommand, write_frame,
};
use netcore_ipc::region::{
    CrossCoreLock, LogPayload, MAX_PDU_SIZE, OtaPayload, RadioPayload, RequestKind, Shared,
    SharedRegion, SpinMutex,
};
use netcore_ipc::Result;
use std::sync::atomic::{AtomicBool, Ordering};

const DEVICE_ID: u64 = 0x0011_2233_4455_6677;

// --- Mock radio and timer for the network core ---
#[derive(Default)]
struct TestRadio {
    mode: Option<RadioMode>,
    frequency: Option<u8>,
    rssi: i8,
    sent: Vec<Vec<u8>>,
}

impl Radio for TestRadio {
    fn init(&mut self, mode: RadioMode) {
        self.mode = Some(mode);
    }

    fn set_frequency(&mut self, frequency: u8) {
        self.frequency = Some(frequency);
    }

    fn set_channel(&mut self, _channel: u8) {}

    fn set_network_address(&mut self, _address: u32) {}

    fn receive(&mut self) {}

    fn disable(&mut self) {}

    fn transmit(&mut self, pdu: &[u8]) {
        self.sent.push(pdu.to_vec());
    }

    fn rssi(&mut self) -> i8 {
        self.rssi
    }
}

/// 1 MHz counter, advanced by hand.
#[derive(Default)]
struct TestTimer {
    now: u32,
}

impl Timer for TestTimer {
    fn now(&mut self) -> u32 {
        self.now += 250;
        self.now
    }

    fn delay_ms(&mut self, ms: u32) {
        self.now += ms * 1000;
    }
}

// --- The two directions of the IPC peripheral ---

/// Network core to host: the host's IPC interrupt.
struct ToHost<'a>(&'a ChannelEvents);

impl SignalBus for ToHost<'_> {
    fn send(&mut self, channel: Channel) {
        self.0.on_receive(channel);
    }
}

/// Host to network core: the network core's IPC interrupt.
struct ToNetCore<'a> {
    events: &'a NetEvents,
    region: &'a SharedRegion,
}

impl SignalBus for ToNetCore<'_> {
    fn send(&mut self, channel: Channel) {
        self.events.on_channel(channel, self.region);
    }
}

struct Fabric {
    region: SharedRegion,
    lock: CrossCoreLock<SpinMutex>,
    net_events: NetEvents,
    host_events: ChannelEvents,
}

impl Fabric {
    fn new() -> Self {
        Self {
            region: SharedRegion::new(),
            lock: CrossCoreLock::new(SpinMutex::new()),
            net_events: NetEvents::new(),
            host_events: ChannelEvents::new(),
        }
    }

    fn shared(&self) -> Shared<'_, SpinMutex> {
        unsafe { Shared::new(&self.region, &self.lock) }
    }

    fn netcore(&self, rssi: i8) -> NetCore<'_, SpinMutex, TestRadio, TestTimer, ToHost<'_>> {
        let radio = TestRadio {
            rssi,
            ..TestRadio::default()
        };
        NetCore::new(
            NetCoreConfig::new(DEVICE_ID),
            self.shared(),
            &self.net_events,
            radio,
            TestTimer::default(),
            ToHost(&self.host_events),
        )
    }

    fn client(&self) -> HostClient<'_, SpinMutex, ToNetCore<'_>> {
        let bus = ToNetCore {
            events: &self.net_events,
            region: &self.region,
        };
        HostClient::new(self.shared(), bus)
    }

    /// Radio receive interrupt.
    fn receive(&self, preamble: &[u8; 8], target: u64, command: &RemoteCommand<'_>) {
        let mut frame = [0u8; MAX_PDU_SIZE];
        let len = write_frame(&mut frame, preamble, target, command).unwrap();
        self.net_events
            .on_radio_frame(&NetCoreConfig::new(DEVICE_ID).filter(), &frame[..len]);
    }

    fn snapshot(&self) -> Snapshot {
        let shared = self.shared();
        Snapshot {
            version: self.region.version(),
            ready: self.region.host_core_ready(),
            acknowledged: self.region.request_acknowledged(),
            request: self.region.active_request(),
            log: self.region.read_log(),
            ota: shared.with_ota(|ota| *ota).unwrap(),
            radio: shared.with_radio(|radio| *radio).unwrap(),
        }
    }
}

#[derive(Debug, PartialEq)]
struct Snapshot {
    version: u32,
    ready: bool,
    acknowledged: bool,
    request: Result<RequestKind>,
    log: LogPayload,
    ota: OtaPayload,
    radio: RadioPayload,
}

#[test]
fn test_end_to_end_scenario() {
    let fabric = Fabric::new();
    let mut core = fabric.netcore(-55);
    core.start();
    let mut client = fabric.client().with_spin_limit(10);
    client.wait_ready().unwrap();

    // --- Experiment control: signalled, nothing written ---
    let before = fabric.snapshot();
    fabric.receive(&DEFAULT_PREAMBLE, BROADCAST_ID, &RemoteCommand::ExperimentStart);
    assert_eq!(core.poll(), 1);
    assert!(fabric.host_events.take(Channel::ExperimentStart));
    assert!(!fabric.host_events.any_pending());
    assert_eq!(fabric.host_events.slot(Channel::ExperimentStart).overruns(), 0);
    assert_eq!(fabric.snapshot(), before);

    // --- OTA start ---
    let hash = [0xA5; HASH_LENGTH];
    fabric.receive(
        &DEFAULT_PREAMBLE,
        BROADCAST_ID,
        &RemoteCommand::OtaStart {
            image_size: 4096,
            expected_hash: hash,
        },
    );
    core.poll();
    assert!(fabric.host_events.take(Channel::OtaStart));
    assert_eq!(client.ota_image_size(), Ok(4096));

    // --- OTA chunk ---
    let bytes: [u8; 64] = std::array::from_fn(|i| (i * 3) as u8);
    fabric.receive(
        &DEFAULT_PREAMBLE,
        DEVICE_ID,
        &RemoteCommand::OtaChunk {
            index: 0,
            bytes: &bytes,
        },
    );
    core.poll();
    assert!(fabric.host_events.take(Channel::OtaChunk));
    let chunk = client.ota_chunk().unwrap();
    assert_eq!(chunk.index, 0);
    assert_eq!(chunk.size, 64);
    assert_eq!(chunk.bytes(), &bytes);
    assert_eq!(core.ota().session().unwrap().chunks_received(), 1);

    // --- RSSI request ---
    client.issue(RequestKind::RadioRssi).unwrap();
    core.poll();
    client.wait_ack().unwrap();
    assert_eq!(fabric.shared().with_radio(|radio| radio.rssi), Ok(-55));
    assert_eq!(fabric.region.active_request(), Ok(RequestKind::None));

    // --- Log event ---
    client.log(&[1, 2, 3]).unwrap();
    core.poll();
    let sent = core.radio().sent.last().unwrap();
    let notification = NotificationFrame::decode(sent).unwrap();
    assert_eq!(notification.device_id, DEVICE_ID);
    assert_eq!(notification.kind, NotificationKind::LogEvent);
    assert_ne!(notification.timestamp, 0);
    assert_eq!(notification.payload, &[3, 1, 2, 3]);

    // --- Idle ---
    for _ in 0..5 {
        assert_eq!(core.poll(), 0);
    }
    assert!(fabric.region.request_acknowledged());
    assert_eq!(fabric.region.active_request(), Ok(RequestKind::None));
}

#[test]
fn test_filtered_frames_change_nothing() {
    let fabric = Fabric::new();
    let mut core = fabric.netcore(0);
    core.start();
    let before = fabric.snapshot();

    let mut wrong_preamble = DEFAULT_PREAMBLE;
    wrong_preamble[7] ^= 0x01;
    fabric.receive(&wrong_preamble, BROADCAST_ID, &RemoteCommand::ExperimentStart);
    core.poll();
    fabric.receive(&DEFAULT_PREAMBLE, DEVICE_ID + 1, &RemoteCommand::ExperimentStop);
    core.poll();
    fabric.receive(
        &DEFAULT_PREAMBLE,
        DEVICE_ID + 1,
        &RemoteCommand::OtaChunk {
            index: 0,
            bytes: &[0xFF; 16],
        },
    );
    core.poll();

    assert!(!fabric.host_events.any_pending());
    assert!(core.radio().sent.is_empty());
    assert_eq!(fabric.snapshot(), before);
}

#[test]
fn test_cores_on_separate_threads() {
    let fabric = Fabric::new();
    let mut core = fabric.netcore(-70);
    let stop = AtomicBool::new(false);

    std::thread::scope(|s| {
        s.spawn(|| {
            core.start();
            while !stop.load(Ordering::Acquire) {
                core.poll();
                std::thread::yield_now();
            }
            // Drain anything raised just before the stop.
            core.poll();
        });

        let mut client = fabric.client();
        client.wait_ready().unwrap();
        client.radio_init(RadioMode::BleLr500Kbit).unwrap();
        client.set_frequency(26).unwrap();
        client.transmit(&[0x42; 37]).unwrap();
        assert_eq!(client.rssi(), Ok(-70));

        fabric.receive(&DEFAULT_PREAMBLE, BROADCAST_ID, &RemoteCommand::ExperimentStart);
        while !fabric.host_events.take(Channel::ExperimentStart) {
            std::thread::yield_now();
        }

        client.log(b"done").unwrap();
        stop.store(true, Ordering::Release);
    });

    let radio = core.radio();
    assert_eq!(radio.mode, Some(RadioMode::BleLr500Kbit));
    assert_eq!(radio.frequency, Some(26));
    assert_eq!(radio.sent.len(), 2);
    assert_eq!(radio.sent[0], vec![0x42; 37]);
    let notification = NotificationFrame::decode(&radio.sent[1]).unwrap();
    assert_eq!(notification.payload, b"\x04done");
    assert!(fabric.region.request_acknowledged());
}
