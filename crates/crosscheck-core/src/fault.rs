//! Terminal error taxonomy.
//!
//! Every fault ends the protocol: there is no local recovery and no retry.
//! A fault is surfaced as a single `protocol-error` envelope carrying enough
//! context (current phase, expected vs. actual) to diagnose without
//! re-running, and the driver stops accepting triggers afterwards.

use core::fmt;

use crosscheck_protocol::{Envelope, Info, Subject};

use crate::phase::Phase;

/// Classes of terminal protocol failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FaultKind {
    /// Resource state wrong at a phase's entry.
    PreconditionViolation,
    /// Readiness notification or acknowledgement arrived in a phase that
    /// cannot legally receive it.
    OutOfPhaseEvent,
    /// Acknowledgement payload does not match the outstanding request.
    CorrelationMismatch,
    /// Inbound frame missing required fields or carrying an unrecognized
    /// subject.
    MalformedMessage,
    /// Resource state violated a mid-phase invariant (e.g. NaN or
    /// non-positive where a positive value was required).
    InvariantViolation,
}

impl FaultKind {
    /// Get human-readable display name.
    pub fn name(&self) -> &'static str {
        match self {
            FaultKind::PreconditionViolation => "precondition-violation",
            FaultKind::OutOfPhaseEvent => "out-of-phase-event",
            FaultKind::CorrelationMismatch => "correlation-mismatch",
            FaultKind::MalformedMessage => "malformed-message",
            FaultKind::InvariantViolation => "invariant-violation",
        }
    }
}

/// A fault with full diagnostic context.
#[derive(Clone, Debug, PartialEq)]
pub struct Fault {
    /// Failure class
    pub kind: FaultKind,
    /// Phase that was current when the fault was detected
    pub phase: Phase,
    /// What went wrong, with expected vs. actual where applicable
    pub detail: String,
}

impl Fault {
    pub fn new(kind: FaultKind, phase: Phase, detail: impl Into<String>) -> Self {
        Fault {
            kind,
            phase,
            detail: detail.into(),
        }
    }

    /// The `protocol-error` envelope announcing this fault.
    pub fn to_envelope(&self) -> Envelope {
        Envelope::with_info(Subject::ProtocolError, Info::Text(self.to_string()))
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} in phase [{}]: {}", self.kind.name(), self.phase, self.detail)
    }
}
