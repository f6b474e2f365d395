/// Test doubles: recording sender and target for the handler, in-memory bus
/// and timer for the service.
use korri_switchbank::{
    core::N2kMsg,
    protocol::{
        group_function::binary_status::{BinaryStatusTarget, INSTANCE_UNSET},
        messages::{
            binary_status::{set_binary_status, BinaryStatus},
            PGN_BINARY_STATUS, PGN_GROUP_FUNCTION,
        },
        transport::traits::{korri_timer::KorriTimer, msg_sender::MsgSender, n2k_bus::N2kBus},
    },
};
use std::cell::{Cell, RefCell};
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::time::{sleep, Duration, Instant};

#[allow(dead_code)]
pub const DEVICE_ADDRESS: u8 = 0x20;
#[allow(dead_code)]
pub const PEER_ADDRESS: u8 = 0x35;
#[allow(dead_code)]
pub const BROADCAST: u8 = 0xFF;

//==================================================================================SENDER
#[derive(Default)]
#[allow(dead_code)]
/// Keeps every outbound message in order.
pub struct RecordingSender {
    pub sent: Vec<(N2kMsg, usize)>,
}

#[allow(dead_code)]
impl RecordingSender {
    pub fn messages(&self) -> impl Iterator<Item = &N2kMsg> {
        self.sent.iter().map(|(msg, _)| msg)
    }

    pub fn status_messages(&self) -> Vec<&N2kMsg> {
        self.messages().filter(|m| m.pgn == PGN_BINARY_STATUS).collect()
    }

    pub fn group_function_messages(&self) -> Vec<&N2kMsg> {
        self.messages().filter(|m| m.pgn == PGN_GROUP_FUNCTION).collect()
    }
}

impl MsgSender for RecordingSender {
    type Error = Infallible;

    fn send_msg(&mut self, msg: &N2kMsg, device: usize) -> Result<(), Self::Error> {
        self.sent.push((msg.clone(), device));
        Ok(())
    }
}

//==================================================================================TARGET
#[allow(dead_code)]
/// Target with scripted answers that records every callback.
pub struct RecordingTarget {
    pub instances: Vec<u8>,
    pub provides_status: bool,
    pub allow_instance_change: bool,
    pub accept_interval: bool,
    pub has_instance_calls: RefCell<Vec<u8>>,
    pub status_calls: Cell<usize>,
    pub change_instance_calls: Vec<(u8, u8)>,
    pub interval_calls: Vec<(u8, u32, u16)>,
}

#[allow(dead_code)]
impl RecordingTarget {
    pub fn new(instances: &[u8]) -> Self {
        Self {
            instances: instances.to_vec(),
            provides_status: true,
            allow_instance_change: true,
            accept_interval: false,
            has_instance_calls: RefCell::new(Vec::new()),
            status_calls: Cell::new(0),
            change_instance_calls: Vec::new(),
            interval_calls: Vec::new(),
        }
    }
}

impl BinaryStatusTarget for RecordingTarget {
    fn has_instance(&self, instance: u8) -> bool {
        self.has_instance_calls.borrow_mut().push(instance);
        self.instances.contains(&instance)
    }

    fn next_status_message(&mut self, instance: &mut u8, msg: &mut N2kMsg, advance: bool) -> bool {
        self.status_calls.set(self.status_calls.get() + 1);
        let position = self.instances.iter().position(|i| *i == *instance);
        let next = match (advance, position) {
            (true, Some(p)) => p + 1,
            (true, None) if *instance == INSTANCE_UNSET => 0,
            (false, Some(p)) => p,
            (true, _) => {
                *instance = INSTANCE_UNSET;
                return false;
            }
            (false, None) => return false,
        };
        let Some(&found) = self.instances.get(next) else {
            *instance = INSTANCE_UNSET;
            return false;
        };
        *instance = found;
        set_binary_status(msg, found, BinaryStatus::unavailable()).is_ok()
    }

    fn provides_status(&self) -> bool {
        self.provides_status
    }

    fn change_instance(&mut self, old: u8, new: u8) -> bool {
        self.change_instance_calls.push((old, new));
        if !self.allow_instance_change {
            return false;
        }
        match self.instances.iter_mut().find(|i| **i == old) {
            Some(slot) => {
                *slot = new;
                true
            }
            None => false,
        }
    }

    fn change_transmission_interval(&mut self, instance: u8, interval_ms: u32, offset_ms: u16) -> bool {
        self.interval_calls.push((instance, interval_ms, offset_ms));
        self.accept_interval
    }
}

//==================================================================================MESSAGES
#[allow(dead_code)]
/// Request for 127501 from the peer; `pairs` is the raw pair list.
pub fn request_msg(destination: u8, interval: u32, offset: u16, count: u8, pairs: &[u8]) -> N2kMsg {
    let mut msg = N2kMsg::new(PGN_GROUP_FUNCTION, 3, destination);
    msg.source = PEER_ADDRESS;
    msg.add_u8(0).unwrap();
    msg.add_u24(PGN_BINARY_STATUS).unwrap();
    msg.add_u32(interval).unwrap();
    msg.add_u16(offset).unwrap();
    msg.add_u8(count).unwrap();
    for byte in pairs {
        msg.add_u8(*byte).unwrap();
    }
    msg
}

#[allow(dead_code)]
/// Write Fields for 127501 from the peer; `pairs` holds selection then parameter pairs.
pub fn write_fields_msg(destination: u8, selection: u8, parameters: u8, pairs: &[u8]) -> N2kMsg {
    let mut msg = N2kMsg::new(PGN_GROUP_FUNCTION, 3, destination);
    msg.source = PEER_ADDRESS;
    msg.add_u8(5).unwrap();
    msg.add_u24(PGN_BINARY_STATUS).unwrap();
    msg.add_u8(0x01).unwrap();
    msg.add_u8(selection).unwrap();
    msg.add_u8(parameters).unwrap();
    for byte in pairs {
        msg.add_u8(*byte).unwrap();
    }
    msg
}

//==================================================================================BUS
#[derive(Clone)]
#[allow(dead_code)]
/// In-memory message bus reproducing the `N2kBus` trait behavior.
pub struct MockBus {
    tx: mpsc::UnboundedSender<N2kMsg>,
    rx: Arc<Mutex<mpsc::UnboundedReceiver<N2kMsg>>>,
}

#[allow(dead_code)]
impl MockBus {
    /// Construct a pair of interconnected buses (DUT ↔ host).
    pub fn create_pair() -> (Self, Self) {
        let (dut_tx, host_rx) = mpsc::unbounded_channel();
        let (host_tx, dut_rx) = mpsc::unbounded_channel();

        let dut_bus = Self {
            tx: dut_tx,
            rx: Arc::new(Mutex::new(dut_rx)),
        };

        let host_bus = Self {
            tx: host_tx,
            rx: Arc::new(Mutex::new(host_rx)),
        };

        (dut_bus, host_bus)
    }
}

impl N2kBus for MockBus {
    type Error = ();

    async fn send<'a>(&'a mut self, msg: &'a N2kMsg) -> Result<(), Self::Error> {
        self.tx.send(msg.clone()).map_err(|_| ())?;
        Ok(())
    }

    async fn recv(&mut self) -> Result<N2kMsg, Self::Error> {
        let mut rx = self.rx.lock().await;
        rx.recv().await.ok_or(())
    }
}

#[allow(dead_code)]
/// Timer based on `tokio::time` to drive delays and the clock in tests.
pub struct MockTimer {
    origin: Instant,
}

#[allow(dead_code)]
impl MockTimer {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl KorriTimer for MockTimer {
    async fn delay_ms(&mut self, millis: u32) {
        sleep(Duration::from_millis(millis as u64)).await;
    }

    fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }
}
