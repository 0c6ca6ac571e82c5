//! Integration tests for live algorithm cutover
//!
//! These tests validate the complete switching workflow over real sockets:
//! - Upstream keeps sending while the algorithm is replaced
//! - No tuple is lost or duplicated and order is kept
//! - State accumulated by the old algorithm reaches the new one
//! - Full queues block upstream without stalling the cutover
//! - Unacknowledged parking rolls back

mod common;

use algoswitch::switching::{AlgorithmSwitch, SwitchState};
use algoswitch::transport::{Destination, TupleSink};
use algoswitch::tuple::{SerializerFormat, Tuple, TupleValue};
use algoswitch::Intermediary;
use common::builders::{padded_tuple, tuple, IntermediaryBuilder, Totals};
use common::loopback::{connect_upstreams, silent_upstream, spawn_feeder};
use common::{test_timeout, wait_until};
use crossbeam_channel::Receiver;
use serial_test::serial;
use std::thread;
use std::time::{Duration, Instant};

const TUPLES: u64 = 400;

type Output = (u64, Option<TupleValue>);

fn collect(outputs: &Receiver<Tuple>, received: &mut Vec<Output>) {
    received.extend(outputs.try_iter().map(|t| (t.sequence, t.get(0).cloned())));
}

/// Step `node` until `count` outputs arrived or the test timeout elapses.
fn step_until(
    node: &mut Intermediary<Totals>,
    outputs: &Receiver<Tuple>,
    received: &mut Vec<Output>,
    count: usize,
) {
    let deadline = Instant::now() + test_timeout();
    while received.len() < count && Instant::now() < deadline {
        node.step();
        collect(outputs, received);
    }
}

fn sequences_in(received: &[Output], range: std::ops::Range<u64>) -> Vec<u64> {
    received
        .iter()
        .map(|(s, _)| *s)
        .filter(|s| range.contains(s))
        .collect()
}

/// Every output before `switch_point` went through `before`, every later one
/// through `after`.
fn assert_factors(received: &[Output], switch_point: usize, before: i64, after: i64) {
    for (index, (seq, value)) in received.iter().enumerate() {
        let factor = if index < switch_point { before } else { after };
        assert_eq!(value, &Some(TupleValue::Int(*seq as i64 * factor)), "tuple #{}", seq);
    }
}

#[test]
#[serial]
fn test_cutover_under_load_is_lossless_and_ordered() {
    let (mut node, outputs) = IntermediaryBuilder::new().build();
    let factory = node.strategy().receiver_factory();
    let (senders, receivers) = connect_upstreams(&factory, 2);
    for sender in &senders {
        node.add_upstream(sender.clone());
    }

    // Two upstreams with disjoint sequence ranges
    let feeders: Vec<_> = senders
        .iter()
        .enumerate()
        .map(|(i, sender)| {
            let sender = sender.clone();
            let base = i as u64 * 10_000;
            thread::spawn(move || {
                for seq in base..base + TUPLES {
                    sender.lock().unwrap().send_tuple(&tuple(seq)).unwrap();
                    if seq % 50 == 0 {
                        thread::sleep(Duration::from_millis(1));
                    }
                }
            })
        })
        .collect();

    let mut received = Vec::new();
    step_until(&mut node, &outputs, &mut received, 100);
    let before = received.len();
    let report = node
        .change_algorithm("triple", &Default::default())
        .expect("cutover");
    // the old algorithm emitted during the cutover, then the new one
    let switch_point = before + report.emitted;
    step_until(&mut node, &outputs, &mut received, 2 * TUPLES as usize);
    for feeder in feeders {
        feeder.join().unwrap();
    }

    assert_eq!(report.from, "double");
    assert_eq!(report.to, "triple");
    assert!(report.acknowledged);
    assert_eq!(received.len(), 2 * TUPLES as usize);

    // per upstream, sequences arrive complete and in order
    for base in [0u64, 10_000] {
        let range = base..base + TUPLES;
        assert_eq!(sequences_in(&received, range.clone()), range.collect::<Vec<_>>());
    }
    assert_factors(&received, switch_point, 2, 3);

    assert_eq!(node.strategy().switch_state(), SwitchState::Active);
    assert!(!node.strategy().queues().is_temporary_aliased());

    let state = node.into_state();
    assert_eq!(state.seen, 2 * TUPLES);
    assert_eq!(state.sequences.len(), 2 * TUPLES as usize);
    drop(receivers);
}

#[test]
#[serial]
fn test_cutover_completes_while_full_queues_block_upstream() {
    const TOTAL: u64 = 5000;
    let (mut node, outputs) = IntermediaryBuilder::new().capacity(4).build();
    let ack_timeout = node_ack_timeout();
    let factory = node.strategy().receiver_factory();
    let (senders, _receivers) = connect_upstreams(&factory, 1);
    node.add_upstream(senders[0].clone());
    // the feeder outruns the socket buffers and blocks holding its sender
    let feeder = spawn_feeder(senders[0].clone(), 0..TOTAL, padded_tuple);

    let mut received = Vec::new();
    step_until(&mut node, &outputs, &mut received, 50);
    let before = received.len();
    let started = Instant::now();
    let report = node
        .change_algorithm("triple", &Default::default())
        .expect("cutover");
    let took = started.elapsed();
    let switch_point = before + report.emitted;
    step_until(&mut node, &outputs, &mut received, TOTAL as usize);
    feeder.join().unwrap();

    assert!(report.acknowledged, "{:?}", report);
    assert!(took < ack_timeout, "cutover waited out its timeout: {:?}", took);
    assert_eq!(sequences_in(&received, 0..TOTAL), (0..TOTAL).collect::<Vec<_>>());
    assert_factors(&received, switch_point, 2, 3);
    assert!(!node.strategy().queues().is_temporary_aliased());
    assert_eq!(node.into_state().seen, TOTAL);
}

#[test]
#[serial]
fn test_repeated_cutovers_under_backpressure() {
    const PER_UPSTREAM: u64 = 1500;
    let (mut node, outputs) = IntermediaryBuilder::new().capacity(4).build();
    let factory = node.strategy().receiver_factory();
    let (senders, _receivers) = connect_upstreams(&factory, 2);
    for sender in &senders {
        node.add_upstream(sender.clone());
    }
    let feeders: Vec<_> = senders
        .iter()
        .enumerate()
        .map(|(i, sender)| {
            let base = i as u64 * 10_000;
            spawn_feeder(sender.clone(), base..base + PER_UPSTREAM, padded_tuple)
        })
        .collect();

    let mut received = Vec::new();
    for (round, next) in ["triple", "negate", "double"].into_iter().enumerate() {
        step_until(&mut node, &outputs, &mut received, 200 * (round + 1));
        let report = node.change_algorithm(next, &Default::default()).unwrap();
        assert!(report.acknowledged, "{:?}", report);
        collect(&outputs, &mut received);
    }
    step_until(&mut node, &outputs, &mut received, 2 * PER_UPSTREAM as usize);
    for feeder in feeders {
        feeder.join().unwrap();
    }

    assert_eq!(received.len(), 2 * PER_UPSTREAM as usize);
    for base in [0u64, 10_000] {
        let range = base..base + PER_UPSTREAM;
        assert_eq!(sequences_in(&received, range.clone()), range.collect::<Vec<_>>());
    }
    assert_eq!(node.into_state().seen, 2 * PER_UPSTREAM);
}

#[test]
#[serial]
fn test_repeated_cutovers_keep_accumulating_state() {
    let (mut node, outputs) = IntermediaryBuilder::new().build();
    let factory = node.strategy().receiver_factory();
    let (senders, _receivers) = connect_upstreams(&factory, 1);
    node.add_upstream(senders[0].clone());

    let mut sent = 0u64;
    for next in ["triple", "negate", "double"] {
        for _ in 0..10 {
            senders[0].lock().unwrap().send_tuple(&tuple(sent)).unwrap();
            sent += 1;
        }
        assert!(wait_until(|| node.strategy().queues().input().current_size() == 10));
        node.change_algorithm(next, &Default::default()).unwrap();
        assert_eq!(node.active_algorithm(), next);
    }

    assert_eq!(outputs.try_iter().count(), 30);
    assert_eq!(node.into_state().seen, 30);
}

#[test]
#[serial]
fn test_unacknowledged_parking_rolls_back() {
    let (mut node, outputs) = IntermediaryBuilder::new().ack_timeout_ms(150).build();

    // an upstream whose peer never reads, so no mode is acknowledged
    let (sender, _silent_peer) = silent_upstream(SerializerFormat::Bincode);
    node.add_upstream(sender);

    let queues = node.strategy().queues().clone();
    queues.enqueue(Destination::GeneralQueue, tuple(1));
    queues.enqueue(Destination::TemporaryQueue, tuple(5));

    let err = node
        .change_algorithm("triple", &Default::default())
        .unwrap_err();
    assert!(err.to_string().contains("Timeout"));
    assert_eq!(node.active_algorithm(), "double");
    assert_eq!(node.strategy().switch_state(), SwitchState::Active);

    // queued work went through the old algorithm, the parked tuple after it
    let values: Vec<_> = outputs.try_iter().map(|t| t.get(0).cloned()).collect();
    assert_eq!(values, vec![Some(TupleValue::Int(2)), Some(TupleValue::Int(10))]);
    assert_eq!(queues.temporary().current_size(), 0);
    assert!(!node.step());
}

#[test]
#[serial]
fn test_rollback_under_backpressure_keeps_order() {
    const TOTAL: u64 = 1000;
    let (mut node, outputs) = IntermediaryBuilder::new()
        .capacity(4)
        .ack_timeout_ms(300)
        .build();
    let factory = node.strategy().receiver_factory();
    let (senders, _receivers) = connect_upstreams(&factory, 1);
    node.add_upstream(senders[0].clone());
    let (silent, _silent_peer) = silent_upstream(factory.format());
    node.add_upstream(silent);
    let feeder = spawn_feeder(senders[0].clone(), 0..TOTAL, padded_tuple);

    let mut received = Vec::new();
    step_until(&mut node, &outputs, &mut received, 50);
    let err = node
        .change_algorithm("triple", &Default::default())
        .unwrap_err();
    assert!(err.to_string().contains("Timeout"));
    step_until(&mut node, &outputs, &mut received, TOTAL as usize);
    feeder.join().unwrap();

    assert_eq!(node.active_algorithm(), "double");
    assert_eq!(sequences_in(&received, 0..TOTAL), (0..TOTAL).collect::<Vec<_>>());
    assert_factors(&received, received.len(), 2, 2);
    assert_eq!(node.into_state().seen, TOTAL);
}

#[test]
#[serial]
fn test_out_stays_bounded_and_acknowledgements_release_it() {
    let (mut node, outputs) = IntermediaryBuilder::new().out_capacity(64).build();
    let queues = node.strategy().queues().clone();

    for seq in 0..5000 {
        queues.enqueue(Destination::GeneralQueue, tuple(seq));
        assert!(node.step());
    }
    assert_eq!(outputs.try_iter().count(), 5000);
    assert_eq!(queues.out_size(), 64);

    node.acknowledge(4989).unwrap();
    let pending: Vec<u64> = queues.unacknowledged().iter().map(|t| t.sequence).collect();
    assert_eq!(pending, (4990..5000).collect::<Vec<_>>());
}

fn node_ack_timeout() -> Duration {
    IntermediaryBuilder::new().config().cutover.ack_timeout()
}
