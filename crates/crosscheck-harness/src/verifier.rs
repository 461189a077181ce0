//! The verifier side of the protocol.
//!
//! The verifier holds its own view of the resource, updated only through
//! [`Verifier::observe`], never by reading producer-side state directly.
//! Every satisfied request is acknowledged by echoing it back verbatim; a
//! failed verification is a terminal failure reported to the embedding.

use crosscheck_protocol::{same_value, Envelope, HandleId, Info, Subject};

use crate::sim::Readiness;

/// What the verifier wants the embedding to do after a frame.
#[derive(Debug, Default)]
pub struct VerifierOutput {
    /// Acknowledgements to post back to the producer.
    pub acks: Vec<Envelope>,
    /// The producer's handle was received; attach it to the resource.
    pub attach: Option<HandleId>,
}

/// Terminal verifier-side failure: the assertion named by a request does not
/// hold against the observed view.
#[derive(Clone, Debug, PartialEq)]
pub struct VerifyFailure(pub String);

impl core::fmt::Display for VerifyFailure {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Verifier state: an observed view of the resource plus at most one parked
/// `await-state-value` request.
pub struct Verifier {
    observed_state: f64,
    readiness: Readiness,
    handle: Option<HandleId>,
    /// An `await-state-value` request whose value has not been observed yet.
    parked: Option<Envelope>,
    completed: bool,
    producer_error: Option<String>,
}

impl Verifier {
    pub fn new() -> Self {
        Verifier {
            observed_state: f64::NAN,
            readiness: Readiness::Nothing,
            handle: None,
            parked: None,
            completed: false,
            producer_error: None,
        }
    }

    /// Whether `work-complete` has been received.
    pub fn completed(&self) -> bool {
        self.completed
    }

    /// The producer's `protocol-error` diagnostic, if one arrived.
    pub fn producer_error(&self) -> Option<&str> {
        self.producer_error.as_deref()
    }

    /// Whether an `await-state-value` request is parked.
    pub fn has_parked_await(&self) -> bool {
        self.parked.is_some()
    }

    /// Process one inbound frame from the producer.
    pub fn on_frame(&mut self, frame: &Envelope) -> Result<VerifierOutput, VerifyFailure> {
        let mut out = VerifierOutput::default();
        match (&frame.subject, &frame.info) {
            (Subject::ObjectHandleReady, Some(Info::Handle(handle))) => {
                if self.handle.is_some() {
                    return Err(VerifyFailure("received a second resource handle".into()));
                }
                self.handle = Some(*handle);
                out.attach = Some(*handle);
            }

            (Subject::VerifyStateEquals, Some(Info::Number(expected))) => {
                if !same_value(self.observed_state, *expected) {
                    return Err(VerifyFailure(format!(
                        "state check failed: expected {}, observed {}",
                        expected, self.observed_state
                    )));
                }
                out.acks.push(Envelope::ack_of(frame.clone()));
            }

            (Subject::VerifyQuiescence, None) => {
                if self.readiness != Readiness::Nothing {
                    return Err(VerifyFailure(format!(
                        "readiness advanced to {:?} without content activity",
                        self.readiness
                    )));
                }
                out.acks.push(Envelope::ack_of(frame.clone()));
            }

            (Subject::AwaitStateValue, Some(Info::Number(awaited))) => {
                if self.parked.is_some() {
                    return Err(VerifyFailure(
                        "a second await arrived while one was still parked".into(),
                    ));
                }
                if same_value(self.observed_state, *awaited) {
                    out.acks.push(Envelope::ack_of(frame.clone()));
                } else {
                    self.parked = Some(frame.clone());
                }
            }

            (Subject::VerifyMinimumReadiness, None) => {
                if self.readiness < Readiness::MetadataKnown {
                    return Err(VerifyFailure(format!(
                        "readiness is {:?}, expected at least MetadataKnown",
                        self.readiness
                    )));
                }
                out.acks.push(Envelope::ack_of(frame.clone()));
            }

            (Subject::WorkComplete, None) => {
                self.completed = true;
            }

            (Subject::ProtocolError, Some(Info::Text(text))) => {
                self.producer_error = Some(text.clone());
            }

            (subject, _) => {
                return Err(VerifyFailure(format!(
                    "verifier cannot handle subject [{}] with that payload",
                    subject.wire_name()
                )));
            }
        }
        Ok(out)
    }

    /// Refresh the observed view.
    ///
    /// Releases the parked await if the newly observed state reaches the
    /// awaited value.
    pub fn observe(&mut self, state: f64, readiness: Readiness) -> Vec<Envelope> {
        self.observed_state = state;
        self.readiness = readiness;

        let release = match &self.parked {
            Some(Envelope {
                info: Some(Info::Number(awaited)),
                ..
            }) => same_value(self.observed_state, *awaited),
            _ => false,
        };
        if release {
            // parked is Some here; release was derived from it
            self.parked.take().into_iter().map(Envelope::ack_of).collect()
        } else {
            Vec::new()
        }
    }
}

impl Default for Verifier {
    fn default() -> Self {
        Verifier::new()
    }
}
