//! Test data builders for creating test objects

use algoswitch::command::ParameterValue;
use algoswitch::config::SwitchConfig;
use algoswitch::coordination::{ElementSignal, ElementSignalSender, SignalTarget};
use algoswitch::error::{Result, SwitchError};
use algoswitch::state_transfer::{MergeStrategy, StateField, StateSchema, Stateful};
use algoswitch::switching::{
    Algorithm, AlgorithmRegistry, BoxedAlgorithm, Intermediary, SeparateIntermediaryStrategy,
};
use algoswitch::tuple::{Tuple, TupleValue};
use crossbeam_channel::{unbounded, Receiver};
use std::sync::Mutex;

/// Running totals kept by [`Scale`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Totals {
    pub seen: u64,
    pub sequences: Vec<u64>,
}

impl Stateful for Totals {
    fn schema() -> StateSchema<Self> {
        StateSchema::all_fields()
            .field(StateField::value("seen", |s: &Self| &s.seen, |s| &mut s.seen))
            .field(
                StateField::value("sequences", |s: &Self| &s.sequences, |s| &mut s.sequences)
                    .with_strategy(MergeStrategy::Merge),
            )
    }
}

/// Multiplies the first value of every tuple by a factor.
pub struct Scale {
    name: String,
    factor: i64,
    state: Totals,
}

impl Scale {
    pub fn boxed(name: &str, factor: i64) -> BoxedAlgorithm<Totals> {
        Box::new(Self {
            name: name.to_string(),
            factor,
            state: Totals::default(),
        })
    }
}

impl Algorithm for Scale {
    type State = Totals;

    fn name(&self) -> &str {
        &self.name
    }

    fn process(&mut self, tuple: Tuple) -> Option<Tuple> {
        let value = tuple.get(0).and_then(TupleValue::as_int)?;
        self.state.seen += 1;
        self.state.sequences.push(tuple.sequence);
        Some(Tuple::new(tuple.sequence, vec![TupleValue::Int(value * self.factor)]))
    }

    fn state(&self) -> &Totals {
        &self.state
    }

    fn state_mut(&mut self) -> &mut Totals {
        &mut self.state
    }

    fn into_state(self: Box<Self>) -> Totals {
        self.state
    }

    fn set_parameter(&mut self, name: &str, value: &ParameterValue) -> Result<()> {
        match (name, value.as_int()) {
            ("factor", Some(factor)) => {
                self.factor = factor;
                Ok(())
            }
            _ => Err(SwitchError::InvalidState(format!("cannot set '{}'", name))),
        }
    }
}

/// Registry offering `double`, `triple` and `negate`.
pub fn scale_algorithms() -> AlgorithmRegistry<Totals> {
    let mut registry = AlgorithmRegistry::new();
    registry
        .register("double", |_| Ok(Scale::boxed("double", 2)))
        .register("triple", |_| Ok(Scale::boxed("triple", 3)))
        .register("negate", |_| Ok(Scale::boxed("negate", -1)));
    registry
}

/// Builder for intermediaries running [`Scale`] algorithms.
pub struct IntermediaryBuilder {
    config: SwitchConfig,
    initial: String,
}

impl IntermediaryBuilder {
    pub fn new() -> Self {
        let mut config = SwitchConfig::default();
        config.queue.capacity = 1024;
        config.queue.poll_timeout_ms = 5;
        config.cutover.ack_timeout_ms = 2000;
        Self {
            config,
            initial: "double".to_string(),
        }
    }

    /// Capacity of the `in` and `tmp` queues.
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.config.queue.capacity = capacity;
        self
    }

    pub fn out_capacity(mut self, out_capacity: usize) -> Self {
        self.config.queue.out_capacity = out_capacity;
        self
    }

    pub fn ack_timeout_ms(mut self, ms: u64) -> Self {
        self.config.cutover.ack_timeout_ms = ms;
        self
    }

    pub fn initial(mut self, name: &str) -> Self {
        self.initial = name.to_string();
        self
    }

    pub fn config(&self) -> &SwitchConfig {
        &self.config
    }

    pub fn build(self) -> (Intermediary<Totals>, Receiver<Tuple>) {
        let (tx, rx) = unbounded();
        let algorithms = scale_algorithms();
        let initial = algorithms
            .create(&self.initial, &Default::default())
            .expect("initial algorithm");
        let strategy = Box::new(SeparateIntermediaryStrategy::from_config(&self.config));
        let node = Intermediary::new(strategy, initial, tx, &self.config)
            .expect("intermediary")
            .with_algorithms(algorithms);
        (node, rx)
    }
}

/// Element signal sender that records every signal, failing for elements
/// named in `unreachable`.
#[derive(Default)]
pub struct RecordingSignals {
    pub sent: Mutex<Vec<(SignalTarget, ElementSignal)>>,
    pub unreachable: Vec<String>,
}

impl RecordingSignals {
    pub fn failing_for(elements: &[&str]) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            unreachable: elements.iter().map(|e| e.to_string()).collect(),
        }
    }

    pub fn sent(&self) -> Vec<(SignalTarget, ElementSignal)> {
        self.sent.lock().unwrap().clone()
    }
}

impl ElementSignalSender for RecordingSignals {
    fn send(&self, target: &SignalTarget, signal: &ElementSignal) -> Result<()> {
        if let SignalTarget::Element(element) = target {
            if self.unreachable.contains(&element.element) {
                return Err(SwitchError::Channel(format!("{} unreachable", element)));
            }
        }
        self.sent.lock().unwrap().push((target.clone(), signal.clone()));
        Ok(())
    }
}

/// Tuple whose first value equals its sequence number.
pub fn tuple(sequence: u64) -> Tuple {
    Tuple::new(sequence, vec![TupleValue::Int(sequence as i64)])
}

/// Like [`tuple`] with a kilobyte of padding, so a few thousand of them
/// overflow the socket buffers of a loopback connection.
pub fn padded_tuple(sequence: u64) -> Tuple {
    Tuple::new(
        sequence,
        vec![TupleValue::Int(sequence as i64), TupleValue::Bytes(vec![0; 1024])],
    )
}
