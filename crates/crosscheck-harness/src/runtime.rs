//! Single-threaded message pump wiring the driver to the verifier.
//!
//! The pump owns both protocol ends and two frame queues, one per
//! direction, and moves one unit of work per tick. Frames cross the queues
//! as encoded bytes, so everything the wire codec rejects is exercised here
//! exactly as it would be across a real channel. Fault injections perturb
//! delivery to prove the failure paths stay loud.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use crosscheck_core::{Driver, DriverStatus, Fault, Phase, StepOutput};
use crosscheck_protocol::{Envelope, HandleId, Info, Subject};

use crate::sim::{Readiness, SimResource, SimState};
use crate::verifier::Verifier;

/// Default state value produced by a successful append.
pub const DEFAULT_APPEND_STATE: f64 = 1.5;

/// Delivery perturbations, each applied at most once.
#[derive(Clone, Debug)]
pub enum FaultInjection {
    /// Rewrite the numeric payload inside the next acknowledgement echo.
    CorruptNextAckNumber,
    /// Silently discard the next acknowledgement.
    DropNextAck,
    /// Deliver the readiness notification twice.
    DuplicateReadinessNotification,
    /// Post these raw bytes to the producer ahead of any real traffic.
    InjectRawFrame(Vec<u8>),
}

/// How a pumped run ended.
#[derive(Clone, Debug, PartialEq)]
pub enum RunOutcome {
    /// `work-complete` delivered and everything drained.
    Complete,
    /// The driver halted on a fault.
    ProducerFault(Fault),
    /// A verification did not hold, or a frame to the verifier was
    /// undecodable.
    VerifierFailure(String),
    /// The tick budget ran out, or no deliverable work remained, with the
    /// driver still running.
    Stalled { phase: Phase },
}

enum Tick {
    Worked,
    Idle,
    Ended(RunOutcome),
}

/// The pump. One instance runs one protocol end to end.
pub struct Harness {
    driver: Driver,
    resource: SimResource,
    shared: Rc<RefCell<SimState>>,
    verifier: Verifier,
    to_verifier: VecDeque<Vec<u8>>,
    to_producer: VecDeque<Vec<u8>>,
    notifications_pending: usize,
    append_result: f64,
    injections: Vec<FaultInjection>,
    started: bool,
    trace: Option<Box<dyn Fn(&str)>>,
}

impl Harness {
    pub fn new() -> Self {
        let resource = SimResource::new();
        let shared = resource.shared();
        Harness {
            driver: Driver::new(HandleId::mint()),
            resource,
            shared,
            verifier: Verifier::new(),
            to_verifier: VecDeque::new(),
            to_producer: VecDeque::new(),
            notifications_pending: 0,
            append_result: DEFAULT_APPEND_STATE,
            injections: Vec::new(),
            started: false,
            trace: None,
        }
    }

    /// Arm a delivery perturbation.
    pub fn with_injection(mut self, injection: FaultInjection) -> Self {
        self.injections.push(injection);
        self
    }

    /// Override the state value a successful append produces.
    pub fn with_append_result(mut self, value: f64) -> Self {
        self.append_result = value;
        self
    }

    /// Receive a line per pumped event.
    pub fn with_trace(mut self, trace: Box<dyn Fn(&str)>) -> Self {
        self.trace = Some(trace);
        self
    }

    pub fn verifier(&self) -> &Verifier {
        &self.verifier
    }

    /// The authoritative resource cell, for pre-run setup in tests.
    pub fn shared_state(&self) -> Rc<RefCell<SimState>> {
        Rc::clone(&self.shared)
    }

    /// Pump until the protocol ends or `budget` ticks elapse.
    pub fn run(&mut self, budget: usize) -> RunOutcome {
        if !self.started {
            self.started = true;

            // Injected raw frames go in ahead of any real traffic.
            let mut kept = Vec::new();
            for injection in self.injections.drain(..) {
                match injection {
                    FaultInjection::InjectRawFrame(raw) => self.to_producer.push_back(raw),
                    other => kept.push(other),
                }
            }
            self.injections = kept;

            let out = self.driver.start(&mut self.resource);
            self.post_to_verifier(out);
        }

        for _ in 0..budget {
            if let Some(outcome) = self.settle() {
                return outcome;
            }
            match self.tick() {
                Tick::Worked => {}
                Tick::Ended(outcome) => return outcome,
                Tick::Idle => break,
            }
        }
        self.settle().unwrap_or(RunOutcome::Stalled {
            phase: self.driver.phase(),
        })
    }

    /// Terminal-state check. A driver fault drains the queue first so the
    /// verifier records the `protocol-error` diagnostic.
    fn settle(&mut self) -> Option<RunOutcome> {
        match self.driver.status() {
            DriverStatus::Faulted => {
                while let Some(raw) = self.to_verifier.pop_front() {
                    if let Ok(frame) = Envelope::decode(&raw) {
                        let _ = self.verifier.on_frame(&frame);
                    }
                }
                self.driver
                    .last_fault()
                    .cloned()
                    .map(RunOutcome::ProducerFault)
            }
            DriverStatus::Done
                if self.verifier.completed()
                    && self.to_verifier.is_empty()
                    && self.to_producer.is_empty() =>
            {
                Some(RunOutcome::Complete)
            }
            _ => None,
        }
    }

    /// Move one unit of work.
    fn tick(&mut self) -> Tick {
        // The verifier's observation of the resource refreshes between
        // deliveries, never during one. This may release a parked await.
        let (state, readiness) = {
            let sim = self.shared.borrow();
            (sim.state, sim.readiness)
        };
        for ack in self.verifier.observe(state, readiness) {
            self.trace(&format!("verifier -> producer: {}", ack));
            self.to_producer.push_back(ack.encode());
        }

        if self.notifications_pending > 0 {
            self.notifications_pending -= 1;
            self.trace("resource: readiness notification");
            let out = self.driver.on_became_interactive(&mut self.resource);
            self.post_to_verifier(out);
            return Tick::Worked;
        }

        let append_requested = self.shared.borrow().append_requested;
        if append_requested {
            {
                let mut sim = self.shared.borrow_mut();
                sim.append_requested = false;
                sim.state = self.append_result;
                sim.readiness = Readiness::MetadataKnown;
            }
            self.trace(&format!("resource: append complete, state {}", self.append_result));
            let out = self.driver.on_append_complete(&mut self.resource);
            self.post_to_verifier(out);
            return Tick::Worked;
        }

        if let Some(raw) = self.to_producer.pop_front() {
            let raw = match self.perturb_producer_frame(raw) {
                Some(raw) => raw,
                None => return Tick::Worked, // dropped by injection
            };
            let out = self.driver.on_inbound(&mut self.resource, &raw);
            self.post_to_verifier(out);
            return Tick::Worked;
        }

        if let Some(raw) = self.to_verifier.pop_front() {
            return self.deliver_to_verifier(&raw);
        }

        Tick::Idle
    }

    fn deliver_to_verifier(&mut self, raw: &[u8]) -> Tick {
        let frame = match Envelope::decode(raw) {
            Ok(frame) => frame,
            Err(e) => return Tick::Ended(RunOutcome::VerifierFailure(e.to_string())),
        };
        self.trace(&format!("producer -> verifier: {}", frame));

        match self.verifier.on_frame(&frame) {
            Ok(out) => {
                if out.attach.is_some() {
                    self.shared.borrow_mut().attached = true;
                    self.notifications_pending = if self.take_injection(|i| {
                        matches!(i, FaultInjection::DuplicateReadinessNotification)
                    }) {
                        2
                    } else {
                        1
                    };
                }
                for ack in out.acks {
                    self.trace(&format!("verifier -> producer: {}", ack));
                    self.to_producer.push_back(ack.encode());
                }
                Tick::Worked
            }
            Err(failure) => Tick::Ended(RunOutcome::VerifierFailure(failure.0)),
        }
    }

    /// Apply at most one armed injection to a producer-bound frame.
    fn perturb_producer_frame(&mut self, raw: Vec<u8>) -> Option<Vec<u8>> {
        let is_ack = matches!(
            Envelope::decode(&raw),
            Ok(Envelope {
                subject: Subject::AckVerified,
                ..
            })
        );
        if !is_ack {
            return Some(raw);
        }

        if self.take_injection(|i| matches!(i, FaultInjection::DropNextAck)) {
            self.trace("injection: acknowledgement dropped");
            return None;
        }

        let armed = self
            .injections
            .iter()
            .any(|i| matches!(i, FaultInjection::CorruptNextAckNumber));
        if armed {
            if let Ok(mut frame) = Envelope::decode(&raw) {
                if let Some(Info::Echo(echo)) = &mut frame.info {
                    if let Some(Info::Number(n)) = &mut echo.info {
                        *n = if n.is_nan() { 0.25 } else { *n + 1.0 };
                        self.take_injection(|i| {
                            matches!(i, FaultInjection::CorruptNextAckNumber)
                        });
                        self.trace("injection: acknowledgement payload corrupted");
                        return Some(frame.encode());
                    }
                }
            }
        }

        Some(raw)
    }

    fn take_injection<F: Fn(&FaultInjection) -> bool>(&mut self, pred: F) -> bool {
        match self.injections.iter().position(pred) {
            Some(pos) => {
                self.injections.remove(pos);
                true
            }
            None => false,
        }
    }

    fn post_to_verifier(&mut self, out: StepOutput) {
        for frame in out.outbound {
            self.to_verifier.push_back(frame.encode());
        }
    }

    fn trace(&self, msg: &str) {
        if let Some(trace) = &self.trace {
            trace(msg);
        }
    }
}

impl Default for Harness {
    fn default() -> Self {
        Harness::new()
    }
}
