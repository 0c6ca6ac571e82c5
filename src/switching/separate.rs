//! Strategy that keeps its own queues, separate from any other instance.

use super::queue_holder::QueueHolder;
use super::signal::{names, SignalValue, SwitchSignal};
use super::state::SwitchState;
use super::strategy::{ReceiverFactory, SwitchStrategy};
use crate::command::ParameterValue;
use crate::config::SwitchConfig;
use crate::error::Result;
use crate::transport::{Destination, TupleSink};
use crate::tuple::{SerializerFormat, Tuple};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Registry name of [`SeparateIntermediaryStrategy`].
pub const SEPARATE_STRATEGY: &str = "separate";

/// Mutable part of the strategy. `produce_tuple` holds this lock while it
/// reads `in`, so a state flip never interleaves with a hand-off.
#[derive(Debug, Default)]
struct Control {
    state: SwitchState,
    routing: Destination,
    transfer_requested: bool,
    parameters: BTreeMap<String, ParameterValue>,
}

/// Intermediary strategy owning a private [`QueueHolder`].
#[derive(Debug)]
pub struct SeparateIntermediaryStrategy {
    queues: Arc<QueueHolder>,
    control: Mutex<Control>,
    format: SerializerFormat,
    max_frame_len: usize,
    poll_timeout: Duration,
}

impl SeparateIntermediaryStrategy {
    /// Create a passive strategy.
    pub fn new(
        capacity: usize,
        format: SerializerFormat,
        max_frame_len: usize,
        poll_timeout: Duration,
    ) -> Self {
        Self {
            queues: Arc::new(QueueHolder::new(capacity)),
            control: Mutex::new(Control::default()),
            format,
            max_frame_len,
            poll_timeout,
        }
    }

    pub fn from_config(config: &SwitchConfig) -> Self {
        Self::new(
            config.queue.capacity,
            config.transport.serializer,
            config.transport.max_frame_len,
            config.queue.poll_timeout(),
        )
        .with_out_capacity(config.queue.out_capacity)
    }

    /// Keep at most `out_capacity` unacknowledged tuples. Call before handing
    /// out receivers: the queues are replaced.
    pub fn with_out_capacity(mut self, out_capacity: usize) -> Self {
        let capacity = self.queues.capacity();
        self.queues = Arc::new(QueueHolder::with_out_capacity(capacity, out_capacity));
        self
    }

    fn control(&self) -> MutexGuard<'_, Control> {
        match self.control.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl SwitchStrategy for SeparateIntermediaryStrategy {
    fn name(&self) -> &str {
        SEPARATE_STRATEGY
    }

    fn produce_tuple(&self) -> Option<Tuple> {
        let control = self.control();
        if !control.state.is_active() {
            return None;
        }
        let tuple = self.queues.input().consume_timeout(self.poll_timeout)?;
        self.queues.record_sent(&tuple);
        drop(control);
        Some(tuple)
    }

    fn handle_signal(&self, signal: &SwitchSignal) -> Result<()> {
        tracing::debug!("strategy '{}' handling signal {}", SEPARATE_STRATEGY, signal);
        let mut control = self.control();
        match signal {
            SwitchSignal::Activate => {
                control.state = SwitchState::Active;
                control.transfer_requested = false;
            }
            SwitchSignal::Passivate => control.state = SwitchState::Passive,
            SwitchSignal::RouteTo(destination) => control.routing = *destination,
            SwitchSignal::RequestStateTransfer => control.transfer_requested = true,
            SwitchSignal::PromoteTemporary => {
                self.queues.promote_temporary();
            }
            SwitchSignal::ResetTemporary => self.queues.reset_temporary(),
            SwitchSignal::Acknowledge(sequence) => {
                let dropped = self.queues.acknowledge(*sequence);
                tracing::trace!("acknowledged {} tuples up to {}", dropped, sequence);
            }
            SwitchSignal::Configure { name, value } => {
                control.parameters.insert(name.clone(), value.clone());
            }
        }
        Ok(())
    }

    fn signal_value(&self, name: &str) -> Option<SignalValue> {
        let control = self.control();
        match name {
            names::STATE => Some(SignalValue::State(control.state)),
            names::DESTINATION => Some(SignalValue::Destination(control.routing)),
            names::IN_SIZE => Some(SignalValue::Size(self.queues.input().current_size())),
            names::TMP_SIZE => Some(SignalValue::Size(self.queues.temporary().current_size())),
            names::OUT_SIZE => Some(SignalValue::Size(self.queues.out_size())),
            names::TRANSFER_REQUESTED => Some(SignalValue::Flag(control.transfer_requested)),
            other => control
                .parameters
                .get(other)
                .cloned()
                .map(SignalValue::Parameter),
        }
    }

    fn receiver_factory(&self) -> ReceiverFactory {
        let sink: Arc<dyn TupleSink> = self.queues.clone();
        ReceiverFactory::new(sink, self.format, self.max_frame_len)
    }

    fn switch_state(&self) -> SwitchState {
        self.control().state
    }

    fn queues(&self) -> &Arc<QueueHolder> {
        &self.queues
    }

    fn drain_input(&self) -> Vec<Tuple> {
        let drained = self.queues.input().drain();
        for tuple in &drained {
            self.queues.record_sent(tuple);
        }
        drained
    }
}
