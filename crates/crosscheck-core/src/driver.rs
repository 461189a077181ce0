//! The producer-side driver: per-phase logic and trigger dispatch.
//!
//! The driver issues one verification request at a time, holds it as the
//! pending request, and correlates the eventual acknowledgement against it.
//! Two external trigger sources exist: the resource's one-shot readiness
//! notification and inbound acknowledgement frames. Both funnel into
//! [`Driver::advance`], the sole authority for phase transitions and
//! outbound messages.
//!
//! Phases with no producer-side work chain straight into the next phase's
//! top-of-phase processing without waiting for an external trigger.

use crosscheck_protocol::{correlates, Envelope, HandleId, Info, Subject};

use crate::fault::{Fault, FaultKind};
use crate::phase::Phase;
use crate::resource::ResourceAdapter;

/// Sentinel value written in [`Phase::VerifyExplicitState`].
pub const EXPLICIT_STATE_VALUE: f64 = 0.1;

/// Why `advance` is being invoked.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Trigger {
    /// First part of processing for the current phase, typically sending a
    /// verification request.
    TopOfPhase,
    /// Tail processing of the current phase following acknowledgement
    /// receipt.
    AckReceived,
}

/// Driver lifecycle status.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DriverStatus {
    /// Accepting triggers.
    Running,
    /// `work-complete` emitted; the protocol finished.
    Done,
    /// A fault was detected; `protocol-error` emitted, triggers ignored.
    Faulted,
}

/// Result of one trigger: the frames to post to the verifier.
#[derive(Clone, Debug, Default)]
pub struct StepOutput {
    /// Outbound envelopes, in send order.
    pub outbound: Vec<Envelope>,
}

impl StepOutput {
    fn none() -> Self {
        StepOutput::default()
    }
}

/// The phase state machine. One instance drives one protocol run.
///
/// All state lives here: no ambient or static state, exactly one current
/// phase, transitions strictly forward.
pub struct Driver {
    phase: Phase,
    status: DriverStatus,
    /// Handle minted at construction, sent in `Initial`, retired on attach.
    handle: Option<HandleId>,
    /// The request sent by the current phase, retained for correlation.
    pending: Option<Envelope>,
    /// The echo carried by the most recently received acknowledgement.
    ack_echo: Option<Envelope>,
    /// The fault that halted the driver, if any.
    last_fault: Option<Fault>,
}

impl Driver {
    /// Create a driver at `Initial` for the resource behind `handle`.
    pub fn new(handle: HandleId) -> Self {
        Driver {
            phase: Phase::Initial,
            status: DriverStatus::Running,
            handle: Some(handle),
            pending: None,
            ack_echo: None,
            last_fault: None,
        }
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Current lifecycle status.
    pub fn status(&self) -> DriverStatus {
        self.status
    }

    /// The fault that halted the driver, if it faulted.
    pub fn last_fault(&self) -> Option<&Fault> {
        self.last_fault.as_ref()
    }

    /// Kick off the protocol: top-of-phase processing for `Initial`.
    pub fn start<R: ResourceAdapter>(&mut self, res: &mut R) -> StepOutput {
        self.advance(res, Trigger::TopOfPhase)
    }

    /// The resource's one-shot readiness notification fired.
    ///
    /// Legal only while `Attaching`; in every other phase a stray or
    /// duplicate notification is a protocol error.
    pub fn on_became_interactive<R: ResourceAdapter>(&mut self, res: &mut R) -> StepOutput {
        if self.status != DriverStatus::Running {
            return StepOutput::none();
        }

        let mut out = Vec::new();
        if self.phase != Phase::Attaching {
            self.fault_into(
                &mut out,
                FaultKind::OutOfPhaseEvent,
                "unexpected readiness notification".to_string(),
            );
            return StepOutput { outbound: out };
        }

        if let Some(handle) = self.handle.take() {
            res.retire_handle(handle);
        }

        self.phase = Phase::VerifyPostAttachState;
        self.chain_top_of_phase(res, &mut out);
        StepOutput { outbound: out }
    }

    /// An inbound frame arrived from the verifier.
    ///
    /// Decodes and validates the frame, records the echoed request, then
    /// runs `advance(AckReceived)`. A malformed frame faults the driver
    /// without mutating the phase.
    pub fn on_inbound<R: ResourceAdapter>(&mut self, res: &mut R, raw: &[u8]) -> StepOutput {
        if self.status != DriverStatus::Running {
            return StepOutput::none();
        }

        let mut out = Vec::new();
        let envelope = match Envelope::decode(raw) {
            Ok(e) => e,
            Err(e) => {
                self.fault_into(&mut out, FaultKind::MalformedMessage, e.to_string());
                return StepOutput { outbound: out };
            }
        };

        match (envelope.subject, envelope.info) {
            (Subject::AckVerified, Some(Info::Echo(echoed))) => {
                self.ack_echo = Some(*echoed);
                self.advance_into(res, Trigger::AckReceived, &mut out);
            }
            (subject, _) => {
                self.fault_into(
                    &mut out,
                    FaultKind::MalformedMessage,
                    format!(
                        "inbound message has subject [{}], expected an acknowledgement",
                        subject.wire_name()
                    ),
                );
            }
        }
        StepOutput { outbound: out }
    }

    /// The append operation armed in `AwaitActivityState` completed.
    ///
    /// Sanity-checks that the resource now reports a positive finite state,
    /// then emits the `await-state-value` request carrying it.
    pub fn on_append_complete<R: ResourceAdapter>(&mut self, res: &mut R) -> StepOutput {
        if self.status != DriverStatus::Running {
            return StepOutput::none();
        }

        let mut out = Vec::new();
        if self.phase != Phase::AwaitActivityState {
            self.fault_into(
                &mut out,
                FaultKind::OutOfPhaseEvent,
                "append completion outside the activity phase".to_string(),
            );
            return StepOutput { outbound: out };
        }

        let state = res.current_state();
        if !(state.is_finite() && state > 0.0) {
            self.fault_into(
                &mut out,
                FaultKind::InvariantViolation,
                format!("state {} after append is not positive and finite", state),
            );
            return StepOutput { outbound: out };
        }

        self.send_request(
            Envelope::with_info(Subject::AwaitStateValue, Info::Number(state)),
            &mut out,
        );
        StepOutput { outbound: out }
    }

    /// Run the current phase's processing for `trigger`.
    ///
    /// This is the phase switch: it decides, per phase, what to send and
    /// what transition an acknowledgement triggers.
    pub fn advance<R: ResourceAdapter>(&mut self, res: &mut R, trigger: Trigger) -> StepOutput {
        if self.status != DriverStatus::Running {
            return StepOutput::none();
        }
        let mut out = Vec::new();
        self.advance_into(res, trigger, &mut out);
        StepOutput { outbound: out }
    }

    fn advance_into<R: ResourceAdapter>(
        &mut self,
        res: &mut R,
        trigger: Trigger,
        out: &mut Vec<Envelope>,
    ) {
        // Nothing was ever requested that a verifier could acknowledge yet.
        if trigger == Trigger::AckReceived
            && (self.phase == Phase::Initial || self.phase == Phase::Attaching)
        {
            self.fault_into(
                out,
                FaultKind::OutOfPhaseEvent,
                "phase does not expect acknowledgement receipt".to_string(),
            );
            return;
        }

        match self.phase {
            Phase::Initial => {
                // Precondition: a freshly constructed, unattached resource
                // must report "no state known".
                if !res.current_state().is_nan() {
                    self.fault_into(
                        out,
                        FaultKind::PreconditionViolation,
                        format!(
                            "initial unattached state must be NaN, found {}",
                            res.current_state()
                        ),
                    );
                    return;
                }

                let handle = match self.handle {
                    Some(h) => h,
                    None => {
                        self.fault_into(
                            out,
                            FaultKind::InvariantViolation,
                            "no handle available to offer".to_string(),
                        );
                        return;
                    }
                };
                self.phase = Phase::Attaching;
                out.push(Envelope::with_info(
                    Subject::ObjectHandleReady,
                    Info::Handle(handle),
                ));
            }

            Phase::Attaching => {
                // This phase is exited only by the readiness notification.
                self.fault_into(
                    out,
                    FaultKind::OutOfPhaseEvent,
                    "Attaching is driven by the readiness notification, not advance".to_string(),
                );
            }

            Phase::VerifyPostAttachState => match trigger {
                Trigger::TopOfPhase => {
                    self.send_request(
                        Envelope::with_info(Subject::VerifyStateEquals, Info::Number(f64::NAN)),
                        out,
                    );
                }
                Trigger::AckReceived => {
                    if self.settle_pending_ack(out) {
                        self.phase = Phase::VerifyPostAttachQuiescence;
                        self.chain_top_of_phase(res, out);
                    }
                }
            },

            Phase::VerifyPostAttachQuiescence => match trigger {
                Trigger::TopOfPhase => {
                    self.send_request(Envelope::new(Subject::VerifyQuiescence), out);
                }
                Trigger::AckReceived => {
                    if self.settle_pending_ack(out) {
                        self.phase = Phase::VerifyExplicitState;
                        self.chain_top_of_phase(res, out);
                    }
                }
            },

            Phase::VerifyExplicitState => match trigger {
                Trigger::TopOfPhase => {
                    // Set the state, then await the verifier observing it.
                    res.set_state(EXPLICIT_STATE_VALUE);
                    self.send_request(
                        Envelope::with_info(
                            Subject::AwaitStateValue,
                            Info::Number(EXPLICIT_STATE_VALUE),
                        ),
                        out,
                    );
                }
                Trigger::AckReceived => {
                    if self.settle_pending_ack(out) {
                        self.phase = Phase::VerifyPostExplicitQuiescence;
                        self.chain_top_of_phase(res, out);
                    }
                }
            },

            Phase::VerifyPostExplicitQuiescence => match trigger {
                Trigger::TopOfPhase => {
                    self.send_request(Envelope::new(Subject::VerifyQuiescence), out);
                }
                Trigger::AckReceived => {
                    if self.settle_pending_ack(out) {
                        self.phase = Phase::AwaitActivityState;
                        self.chain_top_of_phase(res, out);
                    }
                }
            },

            Phase::AwaitActivityState => match trigger {
                Trigger::TopOfPhase => {
                    // Arm the append; the request is emitted only when the
                    // completion callback fires with a sane state value.
                    res.begin_append();
                }
                Trigger::AckReceived => {
                    if self.pending.is_none() {
                        self.ack_echo = None;
                        self.fault_into(
                            out,
                            FaultKind::OutOfPhaseEvent,
                            "acknowledgement received with no request outstanding".to_string(),
                        );
                        return;
                    }
                    // The expected request is recomputed from a fresh state
                    // read rather than taken from the snapshot sent earlier:
                    // the state may legitimately keep changing between send
                    // and acknowledgement.
                    let state = res.current_state();
                    if state.is_nan() {
                        self.fault_into(
                            out,
                            FaultKind::InvariantViolation,
                            "state is NaN at acknowledgement time".to_string(),
                        );
                        return;
                    }
                    let expected =
                        Envelope::with_info(Subject::AwaitStateValue, Info::Number(state));
                    self.pending = None;
                    if self.settle_ack(expected, out) {
                        self.phase = Phase::VerifyMinimumReadiness;
                        self.chain_top_of_phase(res, out);
                    }
                }
            },

            Phase::VerifyMinimumReadiness => match trigger {
                Trigger::TopOfPhase => {
                    self.send_request(Envelope::new(Subject::VerifyMinimumReadiness), out);
                }
                Trigger::AckReceived => {
                    if self.settle_pending_ack(out) {
                        self.phase = Phase::Done;
                        self.status = DriverStatus::Done;
                        out.push(Envelope::new(Subject::WorkComplete));
                    }
                }
            },

            Phase::Done => {
                // Unreachable while Running; the status guard above filters
                // triggers once Done is set.
            }
        }
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    /// Record `request` as pending and queue it for sending.
    fn send_request(&mut self, request: Envelope, out: &mut Vec<Envelope>) {
        self.pending = Some(request.clone());
        out.push(request);
    }

    /// Re-enter top-of-phase processing for the (new) current phase.
    fn chain_top_of_phase<R: ResourceAdapter>(&mut self, res: &mut R, out: &mut Vec<Envelope>) {
        self.advance_into(res, Trigger::TopOfPhase, out);
    }

    /// Correlate the received echo against the stored pending request.
    fn settle_pending_ack(&mut self, out: &mut Vec<Envelope>) -> bool {
        let expected = match self.pending.take() {
            Some(p) => p,
            None => {
                self.ack_echo = None;
                self.fault_into(
                    out,
                    FaultKind::OutOfPhaseEvent,
                    "acknowledgement received with no request outstanding".to_string(),
                );
                return false;
            }
        };
        self.settle_ack(expected, out)
    }

    /// Correlate the received echo against `expected`.
    ///
    /// The echo is consumed regardless of outcome so stale data can never
    /// leak into a future comparison.
    fn settle_ack(&mut self, expected: Envelope, out: &mut Vec<Envelope>) -> bool {
        let actual = match self.ack_echo.take() {
            Some(a) => a,
            None => {
                self.fault_into(
                    out,
                    FaultKind::OutOfPhaseEvent,
                    "acknowledgement trigger without an echoed request".to_string(),
                );
                return false;
            }
        };

        if correlates(&expected, &actual) {
            return true;
        }

        self.fault_into(
            out,
            FaultKind::CorrelationMismatch,
            format!(
                "acknowledgement was for a mismatching request: expected request that would \
                 produce an ack in this phase=[{}], actual request reported with the ack=[{}]",
                expected, actual
            ),
        );
        false
    }

    /// Halt with `kind` and emit the single `protocol-error` envelope.
    fn fault_into(&mut self, out: &mut Vec<Envelope>, kind: FaultKind, detail: String) {
        let fault = Fault::new(kind, self.phase, detail);
        out.push(fault.to_envelope());
        self.last_fault = Some(fault);
        self.status = DriverStatus::Faulted;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crosscheck_protocol::same_value;

    /// Producer-side resource stub recording every adapter call.
    struct MockResource {
        state: f64,
        set_calls: Vec<f64>,
        retired: Vec<HandleId>,
        appends: usize,
    }

    impl MockResource {
        fn detached() -> Self {
            MockResource {
                state: f64::NAN,
                set_calls: Vec::new(),
                retired: Vec::new(),
                appends: 0,
            }
        }
    }

    impl ResourceAdapter for MockResource {
        fn current_state(&self) -> f64 {
            self.state
        }

        fn set_state(&mut self, value: f64) {
            self.set_calls.push(value);
        }

        fn retire_handle(&mut self, handle: HandleId) {
            self.retired.push(handle);
        }

        fn begin_append(&mut self) {
            self.appends += 1;
        }
    }

    fn ack_frame(request: Envelope) -> Vec<u8> {
        Envelope::ack_of(request).encode()
    }

    fn started() -> (Driver, MockResource) {
        let mut res = MockResource::detached();
        let mut driver = Driver::new(HandleId::mint());
        let out = driver.start(&mut res);
        assert_eq!(out.outbound.len(), 1);
        assert_eq!(out.outbound[0].subject, Subject::ObjectHandleReady);
        (driver, res)
    }

    /// Drive a fresh machine to `VerifyExplicitState` with its
    /// `await-state-value` request outstanding.
    fn at_explicit_state() -> (Driver, MockResource) {
        let (mut driver, mut res) = started();
        driver.on_became_interactive(&mut res);
        driver.on_inbound(
            &mut res,
            &ack_frame(Envelope::with_info(
                Subject::VerifyStateEquals,
                Info::Number(f64::NAN),
            )),
        );
        let out = driver.on_inbound(&mut res, &ack_frame(Envelope::new(Subject::VerifyQuiescence)));
        assert_eq!(driver.phase(), Phase::VerifyExplicitState);
        assert_eq!(out.outbound.len(), 1);
        (driver, res)
    }

    // =========================================================================
    // Phase walk-through
    // =========================================================================

    #[test]
    fn test_initial_requires_nan_state() {
        let mut res = MockResource::detached();
        res.state = 5.0;
        let mut driver = Driver::new(HandleId::mint());

        let out = driver.start(&mut res);

        assert_eq!(out.outbound.len(), 1);
        assert_eq!(out.outbound[0].subject, Subject::ProtocolError);
        assert_eq!(driver.status(), DriverStatus::Faulted);
        assert_eq!(
            driver.last_fault().unwrap().kind,
            FaultKind::PreconditionViolation
        );
    }

    #[test]
    fn test_notification_attaches_and_chains_first_verification() {
        let (mut driver, mut res) = started();
        assert_eq!(driver.phase(), Phase::Attaching);

        let out = driver.on_became_interactive(&mut res);

        // Handle retired, first verification request emitted.
        assert_eq!(res.retired.len(), 1);
        assert_eq!(driver.phase(), Phase::VerifyPostAttachState);
        assert_eq!(out.outbound.len(), 1);
        assert_eq!(out.outbound[0].subject, Subject::VerifyStateEquals);
        match out.outbound[0].info {
            Some(Info::Number(n)) => assert!(n.is_nan()),
            ref other => panic!("expected NaN payload, got {:?}", other),
        }
    }

    #[test]
    fn test_matching_acks_chain_through_quiescence_to_explicit_state() {
        let (mut driver, mut res) = started();
        driver.on_became_interactive(&mut res);

        // Ack the NaN verification: quiescence check goes out immediately.
        let out = driver.on_inbound(
            &mut res,
            &ack_frame(Envelope::with_info(
                Subject::VerifyStateEquals,
                Info::Number(f64::NAN),
            )),
        );
        assert_eq!(driver.phase(), Phase::VerifyPostAttachQuiescence);
        assert_eq!(out.outbound.len(), 1);
        assert_eq!(out.outbound[0].subject, Subject::VerifyQuiescence);

        // Ack the quiescence check: explicit-state phase mutates the
        // resource and awaits the sentinel, with no extra trigger needed.
        let out = driver.on_inbound(&mut res, &ack_frame(Envelope::new(Subject::VerifyQuiescence)));
        assert_eq!(driver.phase(), Phase::VerifyExplicitState);
        assert_eq!(res.set_calls, vec![EXPLICIT_STATE_VALUE]);
        assert_eq!(out.outbound.len(), 1);
        assert_eq!(out.outbound[0].subject, Subject::AwaitStateValue);
        match out.outbound[0].info {
            Some(Info::Number(n)) => assert!(same_value(n, EXPLICIT_STATE_VALUE)),
            ref other => panic!("expected sentinel payload, got {:?}", other),
        }
    }

    #[test]
    fn test_full_run_emits_exactly_one_work_complete() {
        let (mut driver, mut res) = at_explicit_state();

        driver.on_inbound(
            &mut res,
            &ack_frame(Envelope::with_info(
                Subject::AwaitStateValue,
                Info::Number(EXPLICIT_STATE_VALUE),
            )),
        );
        assert_eq!(driver.phase(), Phase::VerifyPostExplicitQuiescence);

        let out = driver.on_inbound(&mut res, &ack_frame(Envelope::new(Subject::VerifyQuiescence)));
        assert_eq!(driver.phase(), Phase::AwaitActivityState);
        // The activity phase arms the append and sends nothing yet.
        assert_eq!(res.appends, 1);
        assert!(out.outbound.is_empty());

        // Append lands: resource now reports a real state value.
        res.state = 1.5;
        let out = driver.on_append_complete(&mut res);
        assert_eq!(out.outbound.len(), 1);
        assert_eq!(out.outbound[0].subject, Subject::AwaitStateValue);

        let out = driver.on_inbound(
            &mut res,
            &ack_frame(Envelope::with_info(
                Subject::AwaitStateValue,
                Info::Number(1.5),
            )),
        );
        assert_eq!(driver.phase(), Phase::VerifyMinimumReadiness);
        assert_eq!(out.outbound.len(), 1);
        assert_eq!(out.outbound[0].subject, Subject::VerifyMinimumReadiness);

        let out = driver.on_inbound(
            &mut res,
            &ack_frame(Envelope::new(Subject::VerifyMinimumReadiness)),
        );
        assert_eq!(out.outbound.len(), 1);
        assert_eq!(out.outbound[0].subject, Subject::WorkComplete);
        assert_eq!(driver.status(), DriverStatus::Done);
        assert_eq!(driver.phase(), Phase::Done);

        // Terminal: further triggers produce nothing.
        let out = driver.on_inbound(
            &mut res,
            &ack_frame(Envelope::new(Subject::VerifyMinimumReadiness)),
        );
        assert!(out.outbound.is_empty());
    }

    #[test]
    fn test_await_state_recomputes_expectation_at_ack_time() {
        let (mut driver, mut res) = at_explicit_state();
        driver.on_inbound(
            &mut res,
            &ack_frame(Envelope::with_info(
                Subject::AwaitStateValue,
                Info::Number(EXPLICIT_STATE_VALUE),
            )),
        );
        driver.on_inbound(&mut res, &ack_frame(Envelope::new(Subject::VerifyQuiescence)));

        res.state = 1.5;
        driver.on_append_complete(&mut res);

        // The state kept moving after the request was sent; the ack echoes
        // the newer value and must still correlate.
        res.state = 2.5;
        let out = driver.on_inbound(
            &mut res,
            &ack_frame(Envelope::with_info(
                Subject::AwaitStateValue,
                Info::Number(2.5),
            )),
        );
        assert_eq!(driver.phase(), Phase::VerifyMinimumReadiness);
        assert_eq!(out.outbound.len(), 1);
        assert_eq!(out.outbound[0].subject, Subject::VerifyMinimumReadiness);
    }

    // =========================================================================
    // Fault paths
    // =========================================================================

    #[test]
    fn test_ack_in_initial_is_out_of_phase() {
        let mut res = MockResource::detached();
        let mut driver = Driver::new(HandleId::mint());

        let out = driver.advance(&mut res, Trigger::AckReceived);

        assert_eq!(out.outbound.len(), 1);
        assert_eq!(out.outbound[0].subject, Subject::ProtocolError);
        assert_eq!(driver.last_fault().unwrap().kind, FaultKind::OutOfPhaseEvent);
    }

    #[test]
    fn test_ack_in_attaching_is_out_of_phase() {
        let (mut driver, mut res) = started();

        let out = driver.on_inbound(
            &mut res,
            &ack_frame(Envelope::with_info(
                Subject::VerifyStateEquals,
                Info::Number(f64::NAN),
            )),
        );

        assert_eq!(out.outbound.len(), 1);
        assert_eq!(out.outbound[0].subject, Subject::ProtocolError);
        assert_eq!(driver.last_fault().unwrap().kind, FaultKind::OutOfPhaseEvent);
    }

    #[test]
    fn test_advance_must_not_drive_attaching() {
        let (mut driver, mut res) = started();

        let out = driver.advance(&mut res, Trigger::TopOfPhase);

        assert_eq!(out.outbound.len(), 1);
        assert_eq!(out.outbound[0].subject, Subject::ProtocolError);
        assert_eq!(driver.last_fault().unwrap().kind, FaultKind::OutOfPhaseEvent);
    }

    #[test]
    fn test_mismatching_ack_halts_with_full_context() {
        let (mut driver, mut res) = at_explicit_state();

        // Verifier echoes 0.2 where 0.1 is outstanding.
        let out = driver.on_inbound(
            &mut res,
            &ack_frame(Envelope::with_info(
                Subject::AwaitStateValue,
                Info::Number(0.2),
            )),
        );

        assert_eq!(out.outbound.len(), 1);
        assert_eq!(out.outbound[0].subject, Subject::ProtocolError);
        let fault = driver.last_fault().unwrap();
        assert_eq!(fault.kind, FaultKind::CorrelationMismatch);
        assert_eq!(fault.phase, Phase::VerifyExplicitState);
        assert!(fault.detail.contains("0.1"));
        assert!(fault.detail.contains("0.2"));

        // Halted: nothing further is processed.
        let out = driver.on_inbound(
            &mut res,
            &ack_frame(Envelope::with_info(
                Subject::AwaitStateValue,
                Info::Number(EXPLICIT_STATE_VALUE),
            )),
        );
        assert!(out.outbound.is_empty());
        assert_eq!(driver.phase(), Phase::VerifyExplicitState);
    }

    #[test]
    fn test_stray_notification_is_out_of_phase() {
        let (mut driver, mut res) = at_explicit_state();
        driver.on_inbound(
            &mut res,
            &ack_frame(Envelope::with_info(
                Subject::AwaitStateValue,
                Info::Number(EXPLICIT_STATE_VALUE),
            )),
        );
        driver.on_inbound(&mut res, &ack_frame(Envelope::new(Subject::VerifyQuiescence)));
        res.state = 1.5;
        driver.on_append_complete(&mut res);
        driver.on_inbound(
            &mut res,
            &ack_frame(Envelope::with_info(
                Subject::AwaitStateValue,
                Info::Number(1.5),
            )),
        );
        assert_eq!(driver.phase(), Phase::VerifyMinimumReadiness);

        // A duplicate readiness notification this late is a protocol error.
        let out = driver.on_became_interactive(&mut res);
        assert_eq!(out.outbound.len(), 1);
        assert_eq!(out.outbound[0].subject, Subject::ProtocolError);
        assert_eq!(driver.last_fault().unwrap().kind, FaultKind::OutOfPhaseEvent);
    }

    #[test]
    fn test_unrecognized_subject_faults_without_phase_change() {
        let (mut driver, mut res) = started();
        let phase_before = driver.phase();

        let out = driver.on_inbound(&mut res, br#"{"subject":"frobnicate"}"#);

        assert_eq!(out.outbound.len(), 1);
        assert_eq!(out.outbound[0].subject, Subject::ProtocolError);
        assert_eq!(
            driver.last_fault().unwrap().kind,
            FaultKind::MalformedMessage
        );
        assert_eq!(driver.phase(), phase_before);
    }

    #[test]
    fn test_non_ack_subject_from_verifier_is_malformed() {
        let (mut driver, mut res) = at_explicit_state();

        let frame = Envelope::with_info(Subject::AwaitStateValue, Info::Number(0.1)).encode();
        let out = driver.on_inbound(&mut res, &frame);

        assert_eq!(out.outbound.len(), 1);
        assert_eq!(
            driver.last_fault().unwrap().kind,
            FaultKind::MalformedMessage
        );
    }

    #[test]
    fn test_append_completion_rejects_bogus_state() {
        for bad in [f64::NAN, 0.0, -1.0, f64::INFINITY] {
            let (mut driver, mut res) = at_explicit_state();
            driver.on_inbound(
                &mut res,
                &ack_frame(Envelope::with_info(
                    Subject::AwaitStateValue,
                    Info::Number(EXPLICIT_STATE_VALUE),
                )),
            );
            driver.on_inbound(&mut res, &ack_frame(Envelope::new(Subject::VerifyQuiescence)));

            res.state = bad;
            let out = driver.on_append_complete(&mut res);

            assert_eq!(out.outbound.len(), 1, "state {}", bad);
            assert_eq!(
                driver.last_fault().unwrap().kind,
                FaultKind::InvariantViolation,
                "state {}",
                bad
            );
        }
    }

    #[test]
    fn test_ack_before_append_completes_is_out_of_phase() {
        let (mut driver, mut res) = at_explicit_state();
        driver.on_inbound(
            &mut res,
            &ack_frame(Envelope::with_info(
                Subject::AwaitStateValue,
                Info::Number(EXPLICIT_STATE_VALUE),
            )),
        );
        driver.on_inbound(&mut res, &ack_frame(Envelope::new(Subject::VerifyQuiescence)));
        assert_eq!(driver.phase(), Phase::AwaitActivityState);

        // The append has not completed, so nothing is outstanding.
        let out = driver.on_inbound(
            &mut res,
            &ack_frame(Envelope::with_info(
                Subject::AwaitStateValue,
                Info::Number(EXPLICIT_STATE_VALUE),
            )),
        );

        assert_eq!(out.outbound.len(), 1);
        assert_eq!(out.outbound[0].subject, Subject::ProtocolError);
        assert_eq!(driver.last_fault().unwrap().kind, FaultKind::OutOfPhaseEvent);
    }

    #[test]
    fn test_append_completion_outside_activity_phase() {
        let (mut driver, mut res) = at_explicit_state();

        let out = driver.on_append_complete(&mut res);

        assert_eq!(out.outbound.len(), 1);
        assert_eq!(driver.last_fault().unwrap().kind, FaultKind::OutOfPhaseEvent);
    }
}
