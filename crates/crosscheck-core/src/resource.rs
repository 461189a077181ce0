//! The seam between the driver and the observed resource.
//!
//! The resource's authoritative state is only fully observable from the
//! verifier context; on the producer side the driver sees it through this
//! adapter. The one-shot "became interactive" notification is not part of
//! the trait: the embedding delivers it as a driver entry point
//! ([`crate::Driver::on_became_interactive`]) so that the phase machine
//! remains the single authority over what the notification means.

use crosscheck_protocol::HandleId;

/// Producer-side view of the observed resource.
pub trait ResourceAdapter {
    /// Read the resource's present numeric state. NaN until the resource is
    /// attached and has derived a state value.
    fn current_state(&self) -> f64;

    /// Explicitly mutate the resource's numeric state. The authoritative
    /// value is observed asynchronously by the verifier; this call has no
    /// guaranteed immediate effect on `current_state` reads in this context.
    fn set_state(&mut self, value: f64);

    /// Retire the object handle minted for attachment. Called exactly once,
    /// when the resource becomes interactive.
    fn retire_handle(&mut self, handle: HandleId);

    /// Start feeding real content into the resource. Completion is delivered
    /// back to the driver as [`crate::Driver::on_append_complete`].
    fn begin_append(&mut self);
}
