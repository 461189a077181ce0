//! Crosscheck Harness - In-Process Protocol Embedding
//!
//! This crate closes the loop around `crosscheck-core`: a simulated
//! resource, the verifier side of the protocol, and a deterministic
//! single-threaded message pump that carries encoded frames between the
//! two ends. It exists to exercise whole protocol runs, including the
//! failure paths, without any real transport.
//!
//! # Module Organization
//!
//! - `sim` - the shared resource cell and its producer-side adapter
//! - `verifier` - the observing end: verification checks and acks
//! - `runtime` - the message pump, run outcomes, and fault injection

pub mod runtime;
pub mod sim;
pub mod verifier;

// Re-export all public types for convenient access
pub use runtime::{FaultInjection, Harness, RunOutcome, DEFAULT_APPEND_STATE};
pub use sim::{Readiness, SimResource, SimState};
pub use verifier::{Verifier, VerifierOutput, VerifyFailure};
