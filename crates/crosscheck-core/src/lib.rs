//! Crosscheck Core - Pure Phase State Machine
//!
//! This crate contains the **pure, transport-free** producer-side driver of
//! the crosscheck verification protocol.
//!
//! # Design Principles
//!
//! 1. **No transport dependency**: frames in, frames out; delivery lives in
//!    the embedding (see `crosscheck-harness`)
//! 2. **No I/O or side effects**: the driver only touches the resource
//!    through the [`ResourceAdapter`] seam, and only where a phase says so
//! 3. **Deterministic**: same phase + trigger always produces same output
//! 4. **Single authority**: the driver alone decides phase transitions;
//!    both external trigger sources (readiness notification, inbound
//!    acknowledgements) funnel into it
//!
//! # Architecture
//!
//! ```text
//! readiness notification ──▶ on_became_interactive ─┐
//!                                                    ├─▶ advance(phase, trigger)
//! inbound frames ──────────▶ on_inbound ────────────┘        │
//!                                                            ▼
//!                                              StepOutput { outbound frames }
//! ```
//!
//! # Module Organization
//!
//! - `phase` - the fixed, totally ordered phase sequence
//! - `fault` - terminal error taxonomy and diagnostics
//! - `resource` - the `ResourceAdapter` seam to the observed resource
//! - `driver` - the `Driver` state machine and per-phase logic

pub mod driver;
pub mod fault;
pub mod phase;
pub mod resource;

// Re-export all public types for convenient access
pub use driver::{Driver, DriverStatus, StepOutput, Trigger, EXPLICIT_STATE_VALUE};
pub use fault::{Fault, FaultKind};
pub use phase::Phase;
pub use resource::ResourceAdapter;
