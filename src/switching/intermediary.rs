//! The intermediary element and its cutover driver.
//!
//! An [`Intermediary`] sits between upstream senders and downstream
//! consumers. It pulls tuples from its strategy, runs them through the active
//! [`Algorithm`] and forwards the results. [`Intermediary::cutover`] replaces
//! the algorithm while upstream keeps sending:
//!
//! 1. upstream is told to send switch tuples to `tmp`; the old algorithm keeps
//!    draining `in` until every upstream receiver has acknowledged,
//! 2. the strategy is passivated and `in` is drained through the old algorithm,
//! 3. the old algorithm's state is merged into the new one,
//! 4. `tmp` becomes `in`, the new algorithm takes over, the strategy is
//!    reactivated,
//! 5. upstream is told to go back to general tuples on `in`.
//!
//! If step 5 is not acknowledged in time, `tmp` keeps aliasing `in` and
//! [`Intermediary::step`] finishes the reset once the acknowledgements
//! arrive. If step 1 is not acknowledged in time, the cutover rolls back the
//! same way with the old algorithm kept.
//!
//! Every wait drains `in`: a receiver blocked on a full queue stops reading
//! its socket, and the sender feeding it stops with it.

use super::signal::SwitchSignal;
use super::strategy::SwitchStrategy;
use crate::command::{AlgorithmParameters, CommandError, ParameterValue};
use crate::config::SwitchConfig;
use crate::error::{Result, ResultExt, SwitchError};
use crate::state_transfer::{StateTransfer, Stateful};
use crate::transport::{Destination, ModeRequest, ReceiverMode, TupleSender};
use crate::tuple::Tuple;
use crossbeam_channel::Sender;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, TryLockError};
use std::thread;
use std::time::{Duration, Instant};

/// An upstream sender shared with the thread that feeds it.
pub type SharedSender = Arc<Mutex<TupleSender>>;

/// Pause between attempts to reach a busy upstream.
const ROUTE_RETRY: Duration = Duration::from_millis(1);

struct Upstream {
    sender: SharedSender,
    requests: ModeRequest,
}

enum Flush {
    Sent,
    Failed,
    Busy,
}

/// Write the pending mode request of an idle sender. A sender held by its
/// feeding thread is left alone: that thread writes the request itself.
fn flush_request(upstream: &Upstream) -> Flush {
    if !upstream.requests.is_pending() {
        return Flush::Sent;
    }
    let mut sender = match upstream.sender.try_lock() {
        Ok(guard) => guard,
        Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
        Err(TryLockError::WouldBlock) => return Flush::Busy,
    };
    match sender.apply_requested_mode() {
        Ok(_) => Flush::Sent,
        Err(e) => {
            tracing::warn!("failed to route upstream {}: {}", sender.target(), e);
            Flush::Failed
        }
    }
}

/// Upstreams a mode request reached, and those still busy at the deadline.
#[derive(Debug, Default, Clone, Copy)]
struct Routing {
    routed: usize,
    stalled: usize,
}

/// Tuples pushed through one algorithm while a cutover waits.
#[derive(Debug, Default)]
struct Forwarded {
    processed: usize,
    emitted: usize,
}

/// A replaceable processing algorithm.
pub trait Algorithm: Send {
    /// Accumulated state carried across a cutover.
    type State: Stateful;

    fn name(&self) -> &str;

    /// Process one tuple; `None` when nothing is emitted for it.
    fn process(&mut self, tuple: Tuple) -> Option<Tuple>;

    fn state(&self) -> &Self::State;

    fn state_mut(&mut self) -> &mut Self::State;

    /// Consume the algorithm, keeping only its state.
    fn into_state(self: Box<Self>) -> Self::State;

    /// Change a named runtime parameter.
    fn set_parameter(&mut self, name: &str, _value: &ParameterValue) -> Result<()> {
        Err(CommandError::InvalidArgument(format!(
            "algorithm '{}' has no parameter '{}'",
            self.name(),
            name
        ))
        .into())
    }
}

/// Boxed algorithm with state type `S`.
pub type BoxedAlgorithm<S> = Box<dyn Algorithm<State = S>>;

type AlgorithmFactory<S> =
    Box<dyn Fn(&AlgorithmParameters) -> Result<BoxedAlgorithm<S>> + Send + Sync>;

/// Maps algorithm names to constructors receiving the parameters of an
/// algorithm change.
pub struct AlgorithmRegistry<S> {
    factories: BTreeMap<String, AlgorithmFactory<S>>,
}

impl<S: Stateful> Default for AlgorithmRegistry<S> {
    fn default() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }
}

impl<S: Stateful> AlgorithmRegistry<S> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, name: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn(&AlgorithmParameters) -> Result<BoxedAlgorithm<S>> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Box::new(factory));
        self
    }

    pub fn create(
        &self,
        name: &str,
        parameters: &AlgorithmParameters,
    ) -> Result<BoxedAlgorithm<S>> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| SwitchError::NotRegistered(format!("algorithm '{}'", name)))?;
        factory(parameters).with_context(|| format!("Failed to create algorithm '{}'", name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }
}

/// Outcome of one cutover.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CutoverReport {
    pub from: String,
    pub to: String,
    /// Tuples the old algorithm processed during the cutover
    pub drained: usize,
    /// Tuples emitted downstream by the old algorithm during the cutover
    pub emitted: usize,
    /// Parked tuples handed to the new algorithm
    pub promoted: usize,
    /// Tuples the new algorithm processed while upstreams returned to `in`
    pub settled: usize,
    /// Whether every upstream acknowledged the return to the general queue
    pub acknowledged: bool,
}

/// Object-safe view of an intermediary, used by the coordinator.
pub trait AlgorithmSwitch: Send {
    /// Name of the active algorithm.
    fn active_algorithm(&self) -> &str;

    /// Replace the active algorithm by a registered one.
    fn change_algorithm(&mut self, name: &str, parameters: &AlgorithmParameters)
        -> Result<CutoverReport>;

    /// Forward a parameter change to the active algorithm.
    fn set_parameter(&mut self, name: &str, value: &ParameterValue) -> Result<()>;

    /// Downstream confirmed every emitted tuple up to and including `sequence`.
    fn acknowledge(&mut self, sequence: u64) -> Result<()>;
}

/// One intermediary element.
pub struct Intermediary<S: Stateful> {
    strategy: Box<dyn SwitchStrategy>,
    active: BoxedAlgorithm<S>,
    algorithms: AlgorithmRegistry<S>,
    transfer: StateTransfer,
    upstreams: Vec<Upstream>,
    downstream: Sender<Tuple>,
    ack_timeout: Duration,
    poll_timeout: Duration,
    /// Return-to-general acknowledgements still outstanding after a cutover
    pending_acks: usize,
}

impl<S: Stateful> Intermediary<S> {
    /// Wire an intermediary and activate its strategy.
    pub fn new(
        strategy: Box<dyn SwitchStrategy>,
        initial: BoxedAlgorithm<S>,
        downstream: Sender<Tuple>,
        config: &SwitchConfig,
    ) -> Result<Self> {
        strategy.handle_signal(&SwitchSignal::Activate)?;
        tracing::info!(
            "intermediary started with algorithm '{}' on strategy '{}'",
            initial.name(),
            strategy.name()
        );
        Ok(Self {
            strategy,
            active: initial,
            algorithms: AlgorithmRegistry::new(),
            transfer: StateTransfer::default(),
            upstreams: Vec::new(),
            downstream,
            ack_timeout: config.cutover.ack_timeout(),
            poll_timeout: config.queue.poll_timeout(),
            pending_acks: 0,
        })
    }

    pub fn with_algorithms(mut self, algorithms: AlgorithmRegistry<S>) -> Self {
        self.algorithms = algorithms;
        self
    }

    pub fn with_transfer(mut self, transfer: StateTransfer) -> Self {
        self.transfer = transfer;
        self
    }

    /// Register a sender whose receiver feeds this intermediary. Locks
    /// `sender` once to take its mode request handle.
    pub fn add_upstream(&mut self, sender: SharedSender) {
        let requests = match sender.lock() {
            Ok(guard) => guard.mode_request(),
            Err(poisoned) => poisoned.into_inner().mode_request(),
        };
        self.upstreams.push(Upstream { sender, requests });
    }

    pub fn strategy(&self) -> &dyn SwitchStrategy {
        self.strategy.as_ref()
    }

    pub fn algorithm(&self) -> &dyn Algorithm<State = S> {
        self.active.as_ref()
    }

    pub fn algorithms_mut(&mut self) -> &mut AlgorithmRegistry<S> {
        &mut self.algorithms
    }

    /// Whether a cutover is still waiting for upstream acknowledgements.
    pub fn is_settling(&self) -> bool {
        self.pending_acks > 0
    }

    /// Forward at most one tuple. Returns whether a tuple was consumed.
    pub fn step(&mut self) -> bool {
        self.settle();
        match self.strategy.produce_tuple() {
            Some(tuple) => {
                self.forward(tuple);
                true
            }
            None => false,
        }
    }

    fn forward(&mut self, tuple: Tuple) -> bool {
        match self.active.process(tuple) {
            Some(output) => {
                if self.downstream.send(output).is_err() {
                    tracing::warn!(
                        "downstream of '{}' is gone, output dropped",
                        self.active.name()
                    );
                    return false;
                }
                true
            }
            None => false,
        }
    }

    fn settle(&mut self) {
        if self.pending_acks == 0 {
            return;
        }
        let seen = self.strategy.queues().take_mode_acks(ReceiverMode::default());
        self.pending_acks = self.pending_acks.saturating_sub(seen);
        if self.pending_acks == 0 {
            self.signal(SwitchSignal::ResetTemporary);
            tracing::info!("late acknowledgements arrived, temporary queue reset");
        }
    }

    fn signal(&self, signal: SwitchSignal) {
        if let Err(e) = self.strategy.handle_signal(&signal) {
            tracing::warn!("strategy rejected signal {}: {}", signal, e);
        }
    }

    /// Route every upstream into `mode`.
    ///
    /// The request is left with each sender, so a feeding thread writes it
    /// before its next tuple. Idle senders are flushed here. A sender whose
    /// writer is blocked on a full connection is retried after draining `in`,
    /// which is what unblocks that writer.
    fn route_upstreams(&mut self, mode: ReceiverMode, forwarded: &mut Forwarded) -> Routing {
        for upstream in &self.upstreams {
            upstream.requests.request(mode);
        }
        self.signal(SwitchSignal::RouteTo(mode.destination));

        let deadline = Instant::now() + self.ack_timeout;
        let mut routing = Routing::default();
        let mut busy: Vec<usize> = (0..self.upstreams.len()).collect();
        loop {
            busy.retain(|&i| match flush_request(&self.upstreams[i]) {
                Flush::Sent => {
                    routing.routed += 1;
                    false
                }
                Flush::Failed => false,
                Flush::Busy => true,
            });
            if busy.is_empty() {
                break;
            }
            if Instant::now() >= deadline {
                routing.stalled = busy.len();
                tracing::warn!("{} upstreams stayed busy, {:?} still pending", busy.len(), mode);
                break;
            }
            if !self.drain_active(forwarded) {
                thread::sleep(ROUTE_RETRY);
            }
        }
        routing
    }

    /// Process everything queued on `in` through the active algorithm.
    /// Returns whether anything was queued.
    fn drain_active(&mut self, forwarded: &mut Forwarded) -> bool {
        let drained = self.strategy.drain_input();
        let any = !drained.is_empty();
        for tuple in drained {
            forwarded.processed += 1;
            if self.forward(tuple) {
                forwarded.emitted += 1;
            }
        }
        any
    }

    /// Wait for `expected` acknowledgements of `mode` and return how many
    /// arrived. The active algorithm keeps draining `in` meanwhile, so
    /// receivers blocked on a full queue can reach the mode frame.
    fn await_acks(
        &mut self,
        mode: ReceiverMode,
        expected: usize,
        forwarded: &mut Forwarded,
    ) -> usize {
        let deadline = Instant::now() + self.ack_timeout;
        let mut seen = 0;
        while seen < expected {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            seen += self.strategy.queues().wait_for_mode(
                mode,
                expected - seen,
                remaining.min(self.poll_timeout),
            );
            self.drain_active(forwarded);
        }
        if seen < expected {
            tracing::warn!("{} of {} upstreams acknowledged {:?}", seen, expected, mode);
        }
        seen
    }

    /// Hand `tmp` over as `in`, returning how many tuples it held.
    ///
    /// A receiver may still be delivering into the retired `in`. Those tuples
    /// predate everything parked on `tmp`, so they go through the active
    /// algorithm before this returns.
    fn promote_parked(&mut self, forwarded: &mut Forwarded) -> usize {
        let queues = self.strategy.queues().clone();
        let retired = queues.input();
        let promoted = queues.temporary().current_size();
        self.signal(SwitchSignal::PromoteTemporary);

        let deadline = Instant::now() + self.ack_timeout;
        loop {
            // once this is the last handle, nothing can be delivered into it
            let sole = Arc::strong_count(&retired) == 1;
            for tuple in retired.drain() {
                queues.record_sent(&tuple);
                forwarded.processed += 1;
                if self.forward(tuple) {
                    forwarded.emitted += 1;
                }
            }
            if sole {
                break;
            }
            if Instant::now() >= deadline {
                tracing::warn!("a receiver is still delivering into the retired input queue");
                break;
            }
            thread::sleep(ROUTE_RETRY);
        }
        promoted
    }

    /// Replace the active algorithm by `next`, carrying its state over.
    pub fn cutover(&mut self, next: BoxedAlgorithm<S>) -> Result<CutoverReport> {
        let mut next = next;
        let mut report = CutoverReport {
            from: self.active.name().to_string(),
            to: next.name().to_string(),
            drained: 0,
            emitted: 0,
            promoted: 0,
            settled: 0,
            acknowledged: false,
        };
        tracing::info!("cutover '{}' -> '{}' started", report.from, report.to);

        // A previous cutover may still be settling; its tmp is in now.
        if self.pending_acks > 0 {
            self.pending_acks = 0;
            self.signal(SwitchSignal::ResetTemporary);
        }

        // 1. park new traffic on tmp
        let mut old = Forwarded::default();
        self.strategy.queues().clear_mode_acks();
        let switching = ReceiverMode::switching();
        let routing = self.route_upstreams(switching, &mut old);
        let parked = self.await_acks(switching, routing.routed, &mut old);
        if parked < routing.routed || routing.stalled > 0 {
            self.abort_parking(&report, &mut old);
            return Err(SwitchError::Timeout(format!(
                "upstreams did not acknowledge {} within {:?}",
                Destination::TemporaryQueue,
                self.ack_timeout
            )));
        }
        tracing::debug!("cutover step 1 done: {} upstreams parked on tmp", routing.routed);

        // 2. finish in-flight work on the old algorithm
        self.signal(SwitchSignal::Passivate);
        self.drain_active(&mut old);
        report.drained = old.processed;
        tracing::debug!("cutover step 2 done: {} tuples drained", report.drained);

        // 3. carry the state over
        self.signal(SwitchSignal::RequestStateTransfer);
        if let Err(e) = self.transfer.transfer(next.state_mut(), self.active.state()) {
            tracing::error!("state transfer into '{}' failed: {}", report.to, e);
            // in is empty, so tmp can take its place without reordering
            self.promote_parked(&mut old);
            self.signal(SwitchSignal::Activate);
            self.finish_routing(&mut old);
            return Err(SwitchError::from(e)).context("Cutover aborted, keeping the old algorithm");
        }
        tracing::debug!("cutover step 3 done: state transferred");

        // 4. hand tmp and the authority to the new algorithm
        report.promoted = self.promote_parked(&mut old);
        report.drained = old.processed;
        report.emitted = old.emitted;
        let retired = std::mem::replace(&mut self.active, next);
        self.signal(SwitchSignal::Activate);
        drop(retired);
        tracing::debug!("cutover step 4 done: {} tuples promoted", report.promoted);

        // 5. back to general tuples on in
        let mut new = Forwarded::default();
        report.acknowledged = self.finish_routing(&mut new);
        report.settled = new.processed;

        tracing::info!(
            "cutover '{}' -> '{}' finished (drained {}, promoted {}, acknowledged {})",
            report.from,
            report.to,
            report.drained,
            report.promoted,
            report.acknowledged
        );
        Ok(report)
    }

    /// Send every upstream back to the general queue. Returns whether all of
    /// them acknowledged; otherwise `tmp` stays aliased to `in` until
    /// [`Intermediary::step`] sees the rest.
    fn finish_routing(&mut self, forwarded: &mut Forwarded) -> bool {
        let general = ReceiverMode::default();
        let routing = self.route_upstreams(general, forwarded);
        let seen = self.await_acks(general, routing.routed, forwarded);
        let missing = routing.routed - seen + routing.stalled;
        if missing == 0 {
            self.signal(SwitchSignal::ResetTemporary);
            true
        } else {
            self.pending_acks = missing;
            false
        }
    }

    /// Undo step 1 after a timeout. The old algorithm finishes `in`, then
    /// `tmp` takes its place and upstreams return to it, so every upstream's
    /// tuples are still processed in the order they were sent.
    fn abort_parking(&mut self, report: &CutoverReport, old: &mut Forwarded) {
        self.drain_active(old);
        self.promote_parked(old);
        self.finish_routing(old);
        tracing::warn!(
            "cutover '{}' -> '{}' rolled back, old algorithm stays active",
            report.from,
            report.to
        );
    }

    /// Release emitted tuples up to and including `sequence` from `out`.
    pub fn acknowledge(&self, sequence: u64) -> Result<()> {
        self.strategy.handle_signal(&SwitchSignal::Acknowledge(sequence))
    }

    /// Stop the intermediary and keep only the active algorithm's state.
    pub fn into_state(self) -> S {
        self.active.into_state()
    }
}

impl<S: Stateful> AlgorithmSwitch for Intermediary<S> {
    fn active_algorithm(&self) -> &str {
        self.active.name()
    }

    fn change_algorithm(
        &mut self,
        name: &str,
        parameters: &AlgorithmParameters,
    ) -> Result<CutoverReport> {
        let next = self.algorithms.create(name, parameters)?;
        self.cutover(next)
    }

    fn set_parameter(&mut self, name: &str, value: &ParameterValue) -> Result<()> {
        self.active.set_parameter(name, value)
    }

    fn acknowledge(&mut self, sequence: u64) -> Result<()> {
        Intermediary::acknowledge(self, sequence)
    }
}
