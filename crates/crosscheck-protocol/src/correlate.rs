//! Correlation rules: matching an acknowledgement to its request.
//!
//! The verifier echoes the request it just satisfied inside its
//! acknowledgement; the producer compares that echo against the request it
//! actually has outstanding. The comparison uses same-value semantics, not
//! IEEE equality: two NaN payloads are equal to each other and unequal to
//! anything else. This is a deliberate domain rule, kept as an explicit
//! helper rather than an `Eq` impl.
//!
//! All functions here are pure and total; they only read their inputs.
//! Reporting a mismatch is the caller's job.

use crate::envelope::{Envelope, Info};

/// Same-value equality for numeric payloads: NaN equals NaN, everything else
/// is ordinary `==`. Does not distinguish +0 from -0.
pub fn same_value(a: f64, b: f64) -> bool {
    (a.is_nan() && b.is_nan()) || a == b
}

/// Payload equality under the same-value rule.
///
/// Absent info is a distinct comparable value: `None` matches only `None`.
pub fn info_matches(a: Option<&Info>, b: Option<&Info>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(Info::Number(x)), Some(Info::Number(y))) => same_value(*x, *y),
        (Some(Info::Handle(x)), Some(Info::Handle(y))) => x == y,
        (Some(Info::Text(x)), Some(Info::Text(y))) => x == y,
        (Some(Info::Echo(x)), Some(Info::Echo(y))) => correlates(x, y),
        _ => false,
    }
}

/// Whether `actual` is the acknowledgement echo of `expected`.
///
/// Subjects must be equal and the info payloads must match under the
/// same-value rule. Total and side-effect-free.
pub fn correlates(expected: &Envelope, actual: &Envelope) -> bool {
    expected.subject == actual.subject && info_matches(expected.info.as_ref(), actual.info.as_ref())
}
