//! The phase sequence of the verification protocol.
//!
//! Phases form a fixed, totally ordered sequence; exactly one phase is
//! current at any time and transitions are strictly forward. No phase is
//! ever revisited.

/// Protocol phase, in execution order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    /// Assert the unattached resource reports no state (NaN), then send the
    /// freshly minted object handle to the verifier.
    Initial,
    /// Waiting for the resource's one-shot readiness notification. The only
    /// legal exit is that notification; `advance` must not be called here.
    Attaching,
    /// Verify the post-attach state is still NaN.
    VerifyPostAttachState,
    /// Verify readiness is still at its minimum after attaching.
    VerifyPostAttachQuiescence,
    /// Explicitly set the state to a sentinel value and await the verifier
    /// observing it.
    VerifyExplicitState,
    /// Verify the explicit mutation alone did not advance readiness.
    VerifyPostExplicitQuiescence,
    /// Feed real content into the resource and await the resulting state.
    AwaitActivityState,
    /// Verify readiness has reached at least metadata-known.
    VerifyMinimumReadiness,
    /// Terminal: `work-complete` has been emitted.
    Done,
}

impl Phase {
    /// Get human-readable display name.
    pub fn name(&self) -> &'static str {
        match self {
            Phase::Initial => "Initial",
            Phase::Attaching => "Attaching",
            Phase::VerifyPostAttachState => "VerifyPostAttachState",
            Phase::VerifyPostAttachQuiescence => "VerifyPostAttachQuiescence",
            Phase::VerifyExplicitState => "VerifyExplicitState",
            Phase::VerifyPostExplicitQuiescence => "VerifyPostExplicitQuiescence",
            Phase::AwaitActivityState => "AwaitActivityState",
            Phase::VerifyMinimumReadiness => "VerifyMinimumReadiness",
            Phase::Done => "Done",
        }
    }
}

impl core::fmt::Display for Phase {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}
