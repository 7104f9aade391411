//! Signal/slot system for Trellis.
//!
//! Signals are typed lists of callbacks. Unlike a free-standing observer,
//! a Trellis signal lives *inside* the state it reports on (a widget node in
//! the widget tree, a controller entry, …) and its slots receive a mutable
//! reference to that owning context when invoked. Emission is therefore a
//! two-step affair:
//!
//! 1. [`Signal::snapshot`] clones the slot handles out of the signal while
//!    the context is borrowed immutably.
//! 2. [`emit`] invokes the snapshot with the context borrowed mutably.
//!
//! Slots may freely connect or disconnect handlers, or tear down the object
//! that owns the signal, during emission; the snapshot is unaffected.
//! Handlers connected to the same signal run in connection order.
//!
//! # Example
//!
//! ```
//! use trellis_core::signal::{self, Signal};
//!
//! struct Counter {
//!     value: i32,
//!     changed: Signal<Counter, i32>,
//! }
//!
//! let mut counter = Counter { value: 0, changed: Signal::new() };
//! counter.changed.connect(|c: &mut Counter, delta: &i32| c.value += *delta);
//!
//! let slots = counter.changed.snapshot();
//! signal::emit(&mut counter, &slots, &5);
//! assert_eq!(counter.value, 5);
//! ```

use std::fmt;
use std::rc::Rc;

use slotmap::{SlotMap, new_key_type};

new_key_type! {
    /// A unique identifier for a signal-slot connection.
    ///
    /// Returned by [`Signal::connect`]; pass it to [`Signal::disconnect`] to
    /// remove the slot.
    pub struct ConnectionId;
}

/// A connected slot.
///
/// Slots are reference counted so that emission can run on a snapshot while
/// the signal itself is mutated.
pub type Slot<C, A, R = ()> = Rc<dyn Fn(&mut C, &A) -> R>;

/// A type-safe signal owned by a context of type `C`.
///
/// - `C`: the context handed mutably to each slot.
/// - `A`: the argument type.
/// - `R`: the slot return type, `()` for plain notifications. Signals with a
///   non-unit return use [`emit_until`] to stop at the first handler whose
///   result satisfies a predicate.
pub struct Signal<C: ?Sized, A, R = ()> {
    /// Active connections.
    slots: SlotMap<ConnectionId, Slot<C, A, R>>,
    /// Connection order; slotmap iteration order is not insertion order.
    order: Vec<ConnectionId>,
    /// Whether emission is temporarily blocked.
    blocked: bool,
}

impl<C: ?Sized, A, R> Default for Signal<C, A, R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: ?Sized, A, R> fmt::Debug for Signal<C, A, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("connections", &self.order.len())
            .field("blocked", &self.blocked)
            .finish()
    }
}

impl<C: ?Sized, A, R> Signal<C, A, R> {
    /// Create a signal with no connections.
    pub fn new() -> Self {
        Self {
            slots: SlotMap::with_key(),
            order: Vec::new(),
            blocked: false,
        }
    }

    /// Connect a slot.
    pub fn connect<F>(&mut self, slot: F) -> ConnectionId
    where
        F: Fn(&mut C, &A) -> R + 'static,
    {
        let id = self.slots.insert(Rc::new(slot));
        self.order.push(id);
        id
    }

    /// Disconnect a slot.
    ///
    /// Returns `true` if the connection existed.
    pub fn disconnect(&mut self, id: ConnectionId) -> bool {
        if self.slots.remove(id).is_some() {
            self.order.retain(|&c| c != id);
            true
        } else {
            false
        }
    }

    /// Disconnect every slot.
    pub fn disconnect_all(&mut self) {
        self.slots.clear();
        self.order.clear();
    }

    /// Number of connected slots.
    pub fn connection_count(&self) -> usize {
        self.order.len()
    }

    /// Block or unblock emission.
    pub fn set_blocked(&mut self, blocked: bool) {
        self.blocked = blocked;
    }

    /// Whether emission is blocked.
    pub fn is_blocked(&self) -> bool {
        self.blocked
    }

    /// Clone the slots for emission, in connection order.
    ///
    /// A blocked signal yields an empty snapshot.
    pub fn snapshot(&self) -> Vec<Slot<C, A, R>> {
        if self.blocked {
            tracing::trace!(target: "trellis::signal", "signal blocked, skipping emit");
            return Vec::new();
        }
        self.order
            .iter()
            .filter_map(|id| self.slots.get(*id).cloned())
            .collect()
    }
}

/// Invoke every slot of a snapshot.
pub fn emit<C: ?Sized, A>(ctx: &mut C, slots: &[Slot<C, A>], args: &A) {
    for slot in slots {
        slot(ctx, args);
    }
}

/// Invoke slots until one returns a value accepted by `stop`.
///
/// Returns the accepted value, or `None` if every slot ran.
pub fn emit_until<C: ?Sized, A, R>(
    ctx: &mut C,
    slots: &[Slot<C, A, R>],
    args: &A,
    stop: impl Fn(&R) -> bool,
) -> Option<R> {
    for slot in slots {
        let result = slot(ctx, args);
        if stop(&result) {
            return Some(result);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Log {
        entries: Vec<&'static str>,
        sig: Signal<Log, ()>,
    }

    #[test]
    fn slots_run_in_connection_order() {
        let mut log = Log::default();
        log.sig.connect(|l, _| l.entries.push("a"));
        let b = log.sig.connect(|l, _| l.entries.push("b"));
        log.sig.connect(|l, _| l.entries.push("c"));
        log.sig.disconnect(b);
        log.sig.connect(|l, _| l.entries.push("d"));

        let slots = log.sig.snapshot();
        emit(&mut log, &slots, &());
        assert_eq!(log.entries, vec!["a", "c", "d"]);
    }

    #[test]
    fn connecting_during_emit_is_deferred() {
        let mut log = Log::default();
        log.sig.connect(|l, _| {
            l.entries.push("first");
            l.sig.connect(|l, _| l.entries.push("late"));
        });

        let slots = log.sig.snapshot();
        emit(&mut log, &slots, &());
        assert_eq!(log.entries, vec!["first"]);
        assert_eq!(log.sig.connection_count(), 2);
    }

    #[test]
    fn blocked_signal_is_silent() {
        let mut log = Log::default();
        log.sig.connect(|l, _| l.entries.push("x"));
        log.sig.set_blocked(true);
        assert!(log.sig.snapshot().is_empty());
    }

    #[test]
    fn emit_until_stops() {
        let mut sig: Signal<u32, u32, bool> = Signal::new();
        sig.connect(|n, _| {
            *n += 1;
            false
        });
        sig.connect(|n, _| {
            *n += 10;
            true
        });
        sig.connect(|n, _| {
            *n += 100;
            true
        });
        let slots = sig.snapshot();
        let mut n = 0;
        assert_eq!(emit_until(&mut n, &slots, &0, |r| *r), Some(true));
        assert_eq!(n, 11);
    }
}
