//! Wire Protocol for the Crosscheck Verification Driver
//!
//! This crate defines:
//! - **Message subjects** (the closed set of message kinds exchanged between
//!   the producer driver and the verifier counterpart)
//! - **Envelope** (the `{ subject, info? }` record both sides exchange)
//! - **Wire codec** (JSON frames, including the NaN-bearing number
//!   representation plain JSON cannot express)
//! - **Correlation rules** (NaN-aware same-value matching of a request
//!   against the acknowledgement that echoes it)
//!
//! It is the **single source of truth** for all wire names and payload
//! shapes, eliminating duplication across crates.
//!
//! # Message Subjects
//!
//! | Wire name                       | Info            | Direction           |
//! |---------------------------------|-----------------|---------------------|
//! | `object-handle-ready`           | handle          | producer → verifier |
//! | `verify-state-equals`           | number (or NaN) | producer → verifier |
//! | `verify-quiescence`             | —               | producer → verifier |
//! | `await-state-value`             | number          | producer → verifier |
//! | `verify-minimum-readiness`      | —               | producer → verifier |
//! | `acknowledgement-of-verification` | echoed request | verifier → producer |
//! | `protocol-error`                | diagnostic text | either direction    |
//! | `work-complete`                 | —               | producer → verifier |

pub mod correlate;
pub mod envelope;

// Re-export core types at crate root
pub use correlate::{correlates, info_matches, same_value};
pub use envelope::{Envelope, HandleId, Info, Subject, WireError};
