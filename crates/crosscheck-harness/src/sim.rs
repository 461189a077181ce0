//! Simulated resource shared between the producer and the pump.
//!
//! The real resource lives in another execution context and changes state
//! asynchronously. Here it is a cell the pump mutates between ticks, which
//! reproduces the property the protocol cares about: the producer's reads
//! and the verifier's observations of the same value are not synchronized.

use std::cell::RefCell;
use std::rc::Rc;

use crosscheck_core::ResourceAdapter;
use crosscheck_protocol::HandleId;

/// How far the resource has progressed toward being consumable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Readiness {
    /// No content information yet.
    Nothing,
    /// Enough content has been ingested to know the metadata.
    MetadataKnown,
}

/// Authoritative resource state, mutated by the pump.
#[derive(Debug)]
pub struct SimState {
    /// The numeric state value. NaN until derived or explicitly set.
    pub state: f64,
    /// Current readiness level.
    pub readiness: Readiness,
    /// Whether the verifier has attached the handle.
    pub attached: bool,
    /// Handles retired through the adapter.
    pub retired: Vec<HandleId>,
    /// Set by `begin_append`, consumed by the pump.
    pub append_requested: bool,
}

/// Producer-side adapter over the shared cell.
pub struct SimResource {
    shared: Rc<RefCell<SimState>>,
}

impl SimResource {
    /// A detached resource: state NaN, readiness at minimum.
    pub fn new() -> Self {
        SimResource {
            shared: Rc::new(RefCell::new(SimState {
                state: f64::NAN,
                readiness: Readiness::Nothing,
                attached: false,
                retired: Vec::new(),
                append_requested: false,
            })),
        }
    }

    /// Another owner of the same cell (for the pump).
    pub fn shared(&self) -> Rc<RefCell<SimState>> {
        Rc::clone(&self.shared)
    }
}

impl Default for SimResource {
    fn default() -> Self {
        SimResource::new()
    }
}

impl ResourceAdapter for SimResource {
    fn current_state(&self) -> f64 {
        self.shared.borrow().state
    }

    fn set_state(&mut self, value: f64) {
        self.shared.borrow_mut().state = value;
    }

    fn retire_handle(&mut self, handle: HandleId) {
        self.shared.borrow_mut().retired.push(handle);
    }

    fn begin_append(&mut self) {
        self.shared.borrow_mut().append_requested = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_resource_reports_no_state() {
        let res = SimResource::new();
        assert!(res.current_state().is_nan());
        assert_eq!(res.shared().borrow().readiness, Readiness::Nothing);
    }

    #[test]
    fn test_adapter_writes_are_visible_through_the_shared_cell() {
        let mut res = SimResource::new();
        let cell = res.shared();

        res.set_state(0.1);
        assert_eq!(cell.borrow().state, 0.1);

        res.begin_append();
        assert!(cell.borrow().append_requested);

        let handle = HandleId::mint();
        res.retire_handle(handle);
        assert_eq!(cell.borrow().retired, vec![handle]);
    }

    #[test]
    fn test_readiness_levels_are_ordered() {
        assert!(Readiness::Nothing < Readiness::MetadataKnown);
    }
}
