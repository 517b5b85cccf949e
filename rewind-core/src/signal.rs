//! Connect/emit signals for stack lifecycle events.
//!
//! Slots are held as `Rc` closures so the stack can snapshot them and invoke
//! them only after its own internal borrows are released. Callbacks must not
//! re-enter the stack that emitted them.

use std::fmt;
use std::rc::Rc;

/// Handle returned by [`Signal::connect`], used to disconnect the slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotId(usize);

/// A list of callables invoked when the signal is emitted.
pub struct Signal {
    next_id: usize,
    slots: Vec<(SlotId, Rc<dyn Fn()>)>,
}

impl Signal {
    /// Create a signal with no connected slots.
    pub fn new() -> Self {
        Self {
            next_id: 0,
            slots: Vec::new(),
        }
    }

    /// Connect a slot; it is called on every subsequent emit.
    pub fn connect(&mut self, slot: impl Fn() + 'static) -> SlotId {
        let id = SlotId(self.next_id);
        self.next_id += 1;
        self.slots.push((id, Rc::new(slot)));
        id
    }

    /// Disconnect a previously connected slot.
    ///
    /// Returns whether the slot was still connected.
    pub fn disconnect(&mut self, id: SlotId) -> bool {
        let before = self.slots.len();
        self.slots.retain(|(slot_id, _)| *slot_id != id);
        before != self.slots.len()
    }

    /// Invoke every connected slot, in connection order.
    pub fn emit(&self) {
        for (_, slot) in &self.slots {
            slot();
        }
    }

    /// Number of connected slots.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether no slot is connected.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub(crate) fn handlers(&self) -> Vec<Rc<dyn Fn()>> {
        self.slots.iter().map(|(_, slot)| Rc::clone(slot)).collect()
    }
}

impl Default for Signal {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("slots", &self.slots.len())
            .finish()
    }
}
