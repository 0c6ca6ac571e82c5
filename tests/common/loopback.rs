//! Loopback TCP helpers for transport tests

use algoswitch::switching::{ReceiverFactory, SharedSender};
use algoswitch::transport::{
    Destination, ReceiverHandle, ReceiverMode, SerializerPair, TupleReceiver, TupleSender,
    TupleSink,
};
use algoswitch::tuple::{SerializerFormat, Tuple};
use std::net::{TcpListener, TcpStream};
use std::ops::Range;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

/// Sink remembering every delivery in arrival order.
#[derive(Default)]
pub struct RecordingSink {
    pub delivered: Mutex<Vec<(Destination, Tuple)>>,
    pub modes: Mutex<Vec<ReceiverMode>>,
}

impl RecordingSink {
    pub fn delivered(&self) -> Vec<(Destination, Tuple)> {
        self.delivered.lock().unwrap().clone()
    }

    pub fn modes(&self) -> Vec<ReceiverMode> {
        self.modes.lock().unwrap().clone()
    }
}

impl TupleSink for RecordingSink {
    fn enqueue(&self, destination: Destination, tuple: Tuple) {
        self.delivered.lock().unwrap().push((destination, tuple));
    }

    fn mode_applied(&self, mode: ReceiverMode) {
        self.modes.lock().unwrap().push(mode);
    }
}

/// A bound listener on an ephemeral localhost port.
pub fn listener() -> TcpListener {
    TcpListener::bind("127.0.0.1:0").expect("bind loopback listener")
}

/// Sender connected to a receiver that delivers into `sink`.
pub fn connected_pair(
    sink: Arc<dyn TupleSink>,
    format: SerializerFormat,
) -> (TupleSender, ReceiverHandle) {
    let listener = listener();
    let addr = listener.local_addr().unwrap();
    let client = TcpStream::connect(addr).unwrap();
    let (server, _) = listener.accept().unwrap();

    let serializers = SerializerPair::from_format(format);
    let receiver = TupleReceiver::new(server, serializers, sink, 1024 * 1024)
        .spawn()
        .unwrap();
    let sender = TupleSender::from_stream(client, SerializerPair::from_format(format));
    (sender, receiver)
}

/// Connect `count` upstream senders to receivers started by `factory`.
pub fn connect_upstreams(
    factory: &ReceiverFactory,
    count: usize,
) -> (Vec<SharedSender>, Vec<ReceiverHandle>) {
    let listener = listener();
    let addr = listener.local_addr().unwrap();
    let clients: Vec<TcpStream> = (0..count).map(|_| TcpStream::connect(addr).unwrap()).collect();
    let handles = factory.accept_upstreams(&listener, count).unwrap();

    let senders = clients
        .into_iter()
        .map(|stream| {
            Arc::new(Mutex::new(TupleSender::from_stream(
                stream,
                SerializerPair::from_format(factory.format()),
            )))
        })
        .collect();
    (senders, handles)
}

/// Send `make(seq)` for every sequence through `sender` as fast as the
/// connection accepts them, stopping at the first failed send.
pub fn spawn_feeder(
    sender: SharedSender,
    sequences: Range<u64>,
    make: fn(u64) -> Tuple,
) -> JoinHandle<()> {
    thread::spawn(move || {
        for seq in sequences {
            if sender.lock().unwrap().send_tuple(&make(seq)).is_err() {
                break;
            }
        }
    })
}

/// A sender whose peer accepts the connection but never reads from it.
pub fn silent_upstream(format: SerializerFormat) -> (SharedSender, TcpStream) {
    let listener = listener();
    let client = TcpStream::connect(listener.local_addr().unwrap()).unwrap();
    let (peer, _) = listener.accept().unwrap();
    let sender = TupleSender::from_stream(client, SerializerPair::from_format(format));
    (Arc::new(Mutex::new(sender)), peer)
}
