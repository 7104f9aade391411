//! Event controllers and sequence arbitration.
//!
//! Controllers are attached to a widget with a [`PropagationPhase`] and see
//! events as the dispatcher walks the widget chain. They have no direct
//! access to the tree: a controller talks back through its
//! [`ControllerContext`], queuing sequence state requests and
//! [`GestureNotify`] values that the tree applies and emits once the
//! controller returns.

use trellis_core::logging::targets;
use trellis_core::{Settings, Signal, signal};

use super::events::{Event, EventSequence, Propagation};
use super::gesture::GestureCore;
use super::traits::{AsAny, short_type_name};
use super::tree::precondition;
use super::{ControllerId, WidgetId, WidgetTree};
use crate::error::WidgetError;

/// When a controller sees events travelling along the widget chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PropagationPhase {
    /// Never run by the dispatcher.
    None,
    /// On the way down from the root to the target.
    Capture,
    /// On the way up from the target to the root.
    #[default]
    Bubble,
    /// Only when the widget is the target.
    Target,
}

/// Resolution of an input sequence for one gesture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SequenceState {
    /// Undecided.
    #[default]
    None,
    /// The gesture owns the sequence.
    Claimed,
    /// The gesture gave up the sequence.
    Denied,
}

impl SequenceState {
    fn name(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Claimed => "claimed",
            Self::Denied => "denied",
        }
    }
}

/// Something a controller reports to its handlers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GestureNotify {
    /// The gesture started tracking a sequence.
    Begin(EventSequence),
    /// A tracked sequence ended normally.
    End(EventSequence),
    /// A tracked sequence was cancelled.
    Cancel(EventSequence),
    /// A tracked sequence changed state.
    SequenceStateChanged {
        /// The sequence.
        sequence: EventSequence,
        /// Its new state.
        state: SequenceState,
    },
    /// A drag started at a position.
    DragBegin {
        /// Start x.
        x: f64,
        /// Start y.
        y: f64,
    },
    /// A drag moved; the offset is relative to the start.
    DragUpdate {
        /// Horizontal offset.
        dx: f64,
        /// Vertical offset.
        dy: f64,
    },
    /// A drag finished.
    DragEnd {
        /// Horizontal offset.
        dx: f64,
        /// Vertical offset.
        dy: f64,
    },
    /// A press was held long enough.
    LongPressed {
        /// Press x.
        x: f64,
        /// Press y.
        y: f64,
    },
    /// A long press was abandoned before it triggered.
    LongPressCancelled,
    /// A press in a multi-press series.
    Pressed {
        /// Presses so far, starting at 1.
        n_press: u32,
        /// Press x.
        x: f64,
        /// Press y.
        y: f64,
    },
    /// A release in a multi-press series.
    Released {
        /// Presses so far.
        n_press: u32,
        /// Release x.
        x: f64,
        /// Release y.
        y: f64,
    },
    /// A multi-press series ended.
    Stopped,
}

/// Channel between a running controller and the tree.
pub struct ControllerContext<'a> {
    controller: ControllerId,
    widget: WidgetId,
    settings: &'a Settings,
    requests: Vec<(EventSequence, SequenceState)>,
    notifications: Vec<GestureNotify>,
}

impl<'a> ControllerContext<'a> {
    fn new(controller: ControllerId, widget: WidgetId, settings: &'a Settings) -> Self {
        Self {
            controller,
            widget,
            settings,
            requests: Vec::new(),
            notifications: Vec::new(),
        }
    }

    /// The running controller.
    pub fn controller(&self) -> ControllerId {
        self.controller
    }

    /// The widget the controller is attached to.
    pub fn widget(&self) -> WidgetId {
        self.widget
    }

    /// The tree's settings.
    pub fn settings(&self) -> &Settings {
        self.settings
    }

    /// Ask for the sequence to be claimed once the controller returns.
    pub fn claim(&mut self, sequence: EventSequence) {
        self.requests.push((sequence, SequenceState::Claimed));
    }

    /// Ask for the sequence to be denied once the controller returns.
    pub fn deny(&mut self, sequence: EventSequence) {
        self.requests.push((sequence, SequenceState::Denied));
    }

    /// Report a notification to the controller's handlers.
    pub fn notify(&mut self, notify: GestureNotify) {
        self.notifications.push(notify);
    }
}

/// An event listener attached to a widget.
pub trait EventController: AsAny {
    /// Short name used in logs.
    fn type_name(&self) -> &'static str {
        short_type_name(std::any::type_name::<Self>())
    }

    /// Look at an event. Returning [`Propagation::Stop`] ends delivery.
    fn handle_event(&mut self, cx: &mut ControllerContext<'_>, event: &Event) -> Propagation;

    /// Drop any in-progress interaction.
    fn reset(&mut self, _cx: &mut ControllerContext<'_>) {}

    /// Sequence tracking, for gestures.
    fn gesture(&self) -> Option<&GestureCore> {
        None
    }

    /// Mutable sequence tracking, for gestures.
    fn gesture_mut(&mut self) -> Option<&mut GestureCore> {
        None
    }

    /// A tracked sequence moved out of [`SequenceState::None`].
    fn sequence_state_changed(
        &mut self,
        _cx: &mut ControllerContext<'_>,
        _sequence: EventSequence,
        _state: SequenceState,
    ) {
    }

    /// A tracked sequence is about to be forgotten without ending.
    fn sequence_cancelled(&mut self, _cx: &mut ControllerContext<'_>, _sequence: EventSequence) {}

    /// Time passed; `now_ms` uses the clock of event timestamps.
    fn check_timeout(&mut self, _cx: &mut ControllerContext<'_>, _now_ms: u32) {}
}

type EventCallback = Box<dyn FnMut(&mut ControllerContext<'_>, &Event) -> Propagation>;

/// A controller running a closure for every event.
pub struct CallbackController {
    callback: EventCallback,
}

impl CallbackController {
    /// Wrap a closure.
    pub fn new(
        callback: impl FnMut(&mut ControllerContext<'_>, &Event) -> Propagation + 'static,
    ) -> Self {
        Self {
            callback: Box::new(callback),
        }
    }
}

impl EventController for CallbackController {
    fn handle_event(&mut self, cx: &mut ControllerContext<'_>, event: &Event) -> Propagation {
        (self.callback)(cx, event)
    }
}

/// Signals of a controller.
#[derive(Default)]
pub struct ControllerSignals {
    /// Notifications reported by the controller.
    pub notify: Signal<WidgetTree, (ControllerId, GestureNotify)>,
}

pub(crate) struct ControllerEntry {
    /// `None` while the controller runs.
    pub(crate) controller: Option<Box<dyn EventController>>,
    pub(crate) widget: WidgetId,
    pub(crate) phase: PropagationPhase,
    /// Group label: gestures sharing a label are grouped. An ungrouped
    /// gesture carries its own id.
    pub(crate) group: ControllerId,
    pub(crate) signals: ControllerSignals,
}

impl WidgetTree {
    // =========================================================================
    // Attaching
    // =========================================================================

    /// Attach a controller to a widget.
    pub fn add_controller(
        &mut self,
        widget: WidgetId,
        controller: impl EventController,
        phase: PropagationPhase,
    ) -> Option<ControllerId> {
        self.add_controller_boxed(widget, Box::new(controller), phase)
    }

    /// Attach a boxed controller to a widget.
    pub fn add_controller_boxed(
        &mut self,
        widget: WidgetId,
        controller: Box<dyn EventController>,
        phase: PropagationPhase,
    ) -> Option<ControllerId> {
        if !self.nodes.contains_key(widget) {
            precondition!(
                targets::GESTURES,
                "add_controller",
                Err::<(), _>(WidgetError::InvalidWidget(widget))
            );
            return None;
        }
        let name = controller.type_name();
        let id = self.controllers.insert_with_key(|id| ControllerEntry {
            controller: Some(controller),
            widget,
            phase,
            group: id,
            signals: ControllerSignals::default(),
        });
        if let Some(node) = self.nodes.get_mut(widget) {
            node.controllers.push(id);
        }
        tracing::trace!(target: targets::GESTURES, controller = name, ?phase, "controller added");
        Some(id)
    }

    /// Detach and drop a controller, cancelling what it tracks.
    pub fn remove_controller(&mut self, id: ControllerId) {
        if !self.controllers.contains_key(id) {
            return;
        }
        self.reset_controller(id);
        self.ungroup_gesture(id);
        let Some(entry) = self.controllers.remove(id) else {
            return;
        };
        if let Some(node) = self.nodes.get_mut(entry.widget) {
            node.controllers.retain(|c| *c != id);
        }
    }

    /// Controllers attached to a widget, in registration order.
    pub fn controllers(&self, widget: WidgetId) -> &[ControllerId] {
        self.nodes
            .get(widget)
            .map_or(&[], |n| n.controllers.as_slice())
    }

    /// The widget a controller is attached to.
    pub fn controller_widget(&self, id: ControllerId) -> Option<WidgetId> {
        self.controllers.get(id).map(|e| e.widget)
    }

    /// The phase a controller runs in.
    pub fn controller_phase(&self, id: ControllerId) -> Option<PropagationPhase> {
        self.controllers.get(id).map(|e| e.phase)
    }

    /// Move a controller to another phase.
    pub fn set_controller_phase(&mut self, id: ControllerId, phase: PropagationPhase) {
        if let Some(entry) = self.controllers.get_mut(id) {
            entry.phase = phase;
        }
    }

    /// Borrow a controller as its concrete type.
    pub fn controller<T: EventController>(&self, id: ControllerId) -> Option<&T> {
        let controller: &dyn EventController = self.controllers.get(id)?.controller.as_deref()?;
        controller.as_any().downcast_ref::<T>()
    }

    /// Mutably borrow a controller as its concrete type.
    pub fn controller_mut<T: EventController>(&mut self, id: ControllerId) -> Option<&mut T> {
        let controller: &mut dyn EventController =
            self.controllers.get_mut(id)?.controller.as_deref_mut()?;
        controller.as_any_mut().downcast_mut::<T>()
    }

    /// Signals of a controller, for connecting handlers.
    pub fn controller_signals_mut(&mut self, id: ControllerId) -> Option<&mut ControllerSignals> {
        Some(&mut self.controllers.get_mut(id)?.signals)
    }

    /// Whether the controller is a gesture.
    pub fn is_gesture(&self, id: ControllerId) -> bool {
        self.gesture_core(id).is_some()
    }

    fn gesture_core(&self, id: ControllerId) -> Option<&GestureCore> {
        self.controllers.get(id)?.controller.as_deref()?.gesture()
    }

    // =========================================================================
    // Running
    // =========================================================================

    /// Run `f` with the controller taken out of the tree, then emit the
    /// notifications and apply the state requests it queued.
    pub(crate) fn with_controller<R>(
        &mut self,
        id: ControllerId,
        f: impl FnOnce(&mut dyn EventController, &mut ControllerContext<'_>) -> R,
    ) -> Option<R> {
        let entry = self.controllers.get_mut(id)?;
        let widget = entry.widget;
        let mut controller = entry.controller.take()?;
        let mut cx = ControllerContext::new(id, widget, &self.settings);
        let result = f(controller.as_mut(), &mut cx);
        let ControllerContext {
            requests,
            notifications,
            ..
        } = cx;
        if let Some(entry) = self.controllers.get_mut(id) {
            entry.controller = Some(controller);
        }
        for notify in notifications {
            self.emit_controller_notify(id, notify);
        }
        for (sequence, state) in requests {
            self.set_sequence_state(id, sequence, state);
        }
        Some(result)
    }

    fn emit_controller_notify(&mut self, id: ControllerId, notify: GestureNotify) {
        let Some(entry) = self.controllers.get(id) else {
            return;
        };
        let slots = entry.signals.notify.snapshot();
        if !slots.is_empty() {
            signal::emit(self, &slots, &(id, notify));
        }
    }

    /// Deliver an event to one controller.
    ///
    /// Gestures only see events carrying a sequence. The tree tracks the
    /// sequence for them; a denied sequence is not shown to the gesture
    /// again. A gesture consumes every event of a sequence it claimed, and
    /// a capture-phase gesture consumes a begin event while it leaves the
    /// sequence undecided.
    pub(crate) fn run_controller(
        &mut self,
        id: ControllerId,
        event: &Event,
        target: WidgetId,
    ) -> Propagation {
        let Some(entry) = self.controllers.get(id) else {
            return Propagation::Proceed;
        };
        let phase = entry.phase;
        let is_gesture = entry
            .controller
            .as_deref()
            .is_some_and(|c| c.gesture().is_some());
        if !is_gesture {
            return self
                .with_controller(id, |controller, cx| controller.handle_event(cx, event))
                .unwrap_or_default();
        }
        let Some(sequence) = event.sequence() else {
            return Propagation::Proceed;
        };

        let outcome = self.with_controller(id, |controller, cx| {
            let tracked = match controller.gesture_mut() {
                Some(core) if event.is_begin() => core.begin(sequence, event, target),
                Some(core) => core.update(sequence, event),
                None => false,
            };
            if !tracked {
                return (false, Propagation::Proceed);
            }
            if event.is_begin() {
                cx.notify(GestureNotify::Begin(sequence));
            }
            let denied = controller
                .gesture()
                .is_some_and(|core| core.sequence_state(sequence) == SequenceState::Denied);
            if denied {
                return (true, Propagation::Proceed);
            }
            (true, controller.handle_event(cx, event))
        });
        let Some((true, mut result)) = outcome else {
            return Propagation::Proceed;
        };

        match self.gesture_core(id).map(|c| c.sequence_state(sequence)) {
            Some(SequenceState::Claimed) => result = Propagation::Stop,
            Some(SequenceState::Denied) => result = Propagation::Proceed,
            Some(SequenceState::None) if phase == PropagationPhase::Capture && event.is_begin() => {
                if let Some(core) = self.gesture_core_mut(id) {
                    core.set_press_handled(sequence, true);
                }
                result = Propagation::Stop;
            }
            _ => {}
        }

        if event.is_end() {
            let ended = self.with_controller(id, |controller, cx| {
                let removed = controller
                    .gesture_mut()
                    .and_then(|core| core.remove(sequence));
                if removed.is_some() {
                    cx.notify(GestureNotify::End(sequence));
                }
            });
            debug_assert!(ended.is_some());
        }
        result
    }

    fn gesture_core_mut(&mut self, id: ControllerId) -> Option<&mut GestureCore> {
        self.controllers
            .get_mut(id)?
            .controller
            .as_deref_mut()?
            .gesture_mut()
    }

    /// Cancel everything the widget's controllers are doing.
    pub(crate) fn reset_controllers(&mut self, widget: WidgetId) {
        for id in self.controllers(widget).to_vec() {
            self.reset_controller(id);
        }
    }

    fn reset_controller(&mut self, id: ControllerId) {
        self.with_controller(id, |controller, cx| {
            let sequences = controller.gesture().map(|c| c.sequences()).unwrap_or_default();
            for sequence in sequences {
                controller.sequence_cancelled(cx, sequence);
                cx.notify(GestureNotify::Cancel(sequence));
            }
            if let Some(core) = controller.gesture_mut() {
                core.clear();
            }
            controller.reset(cx);
        });
    }

    /// Cancel a sequence in every gesture tracking it.
    pub fn cancel_sequence(&mut self, sequence: EventSequence) {
        let tracking: Vec<ControllerId> = self
            .controllers
            .iter()
            .filter(|(_, e)| {
                e.controller
                    .as_deref()
                    .and_then(|c| c.gesture())
                    .is_some_and(|c| c.handles_sequence(sequence))
            })
            .map(|(id, _)| id)
            .collect();
        if !tracking.is_empty() {
            tracing::debug!(target: targets::GESTURES, ?sequence, gestures = tracking.len(), "sequence cancelled");
        }
        for id in tracking {
            self.with_controller(id, |controller, cx| {
                controller.sequence_cancelled(cx, sequence);
                cx.notify(GestureNotify::Cancel(sequence));
                if let Some(core) = controller.gesture_mut() {
                    core.remove(sequence);
                }
            });
        }
    }

    /// Forget a finished sequence in gestures that did not see its end.
    ///
    /// Gestures that still had it undecided or claimed are cancelled.
    pub(crate) fn finish_sequence(&mut self, sequence: EventSequence) {
        let leftover: Vec<ControllerId> = self
            .controllers
            .iter()
            .filter(|(_, e)| {
                e.controller
                    .as_deref()
                    .and_then(|c| c.gesture())
                    .is_some_and(|c| c.handles_sequence(sequence))
            })
            .map(|(id, _)| id)
            .collect();
        for id in leftover {
            self.with_controller(id, |controller, cx| {
                let live = controller
                    .gesture()
                    .is_some_and(|c| c.sequence_state(sequence) != SequenceState::Denied);
                if live {
                    controller.sequence_cancelled(cx, sequence);
                    cx.notify(GestureNotify::Cancel(sequence));
                }
                if let Some(core) = controller.gesture_mut() {
                    core.remove(sequence);
                }
            });
        }
    }

    /// Give every controller a chance to act on elapsed time, such as a
    /// long press being held long enough. `now_ms` uses the clock of event
    /// timestamps.
    pub fn check_gesture_timeouts(&mut self, now_ms: u32) {
        let ids: Vec<ControllerId> = self.controllers.keys().collect();
        for id in ids {
            self.with_controller(id, |controller, cx| controller.check_timeout(cx, now_ms));
        }
    }

    // =========================================================================
    // Sequence state
    // =========================================================================

    /// State of a sequence in a gesture; [`SequenceState::None`] if the
    /// gesture does not track it.
    pub fn sequence_state(&self, id: ControllerId, sequence: EventSequence) -> SequenceState {
        self.gesture_core(id)
            .map_or(SequenceState::None, |c| c.sequence_state(sequence))
    }

    /// Whether a gesture tracks a sequence.
    pub fn handles_sequence(&self, id: ControllerId, sequence: EventSequence) -> bool {
        self.gesture_core(id)
            .is_some_and(|c| c.handles_sequence(sequence))
    }

    /// The latest event a gesture saw for a sequence.
    pub fn last_event(&self, id: ControllerId, sequence: EventSequence) -> Option<&Event> {
        self.gesture_core(id)?.last_event(sequence)
    }

    fn check_sequence_transition(
        &self,
        id: ControllerId,
        sequence: EventSequence,
        state: SequenceState,
    ) -> Result<(), WidgetError> {
        if !self.controllers.contains_key(id) {
            return Err(WidgetError::InvalidController(id));
        }
        let core = self.gesture_core(id).ok_or(WidgetError::NotAGesture(id))?;
        let current = core
            .point(sequence)
            .map(|p| p.state)
            .ok_or(WidgetError::UnhandledSequence(id))?;
        if current != SequenceState::None || state == SequenceState::None {
            return Err(WidgetError::InvalidSequenceTransition {
                from: current.name(),
                to: state.name(),
            });
        }
        Ok(())
    }

    /// Claim or deny a sequence in a gesture.
    ///
    /// Only `None → Claimed` and `None → Denied` are accepted; anything else
    /// is rejected with a warning and `false`. Grouped gestures on the same
    /// widget follow the new state. A claim makes every other gesture
    /// tracking the sequence, on this widget or any other, deny it. When
    /// the last capture-phase gesture that consumed the begin event denies,
    /// the begin event is re-delivered, marked as synthesized, to the
    /// widgets below so they see a complete sequence.
    pub fn set_sequence_state(
        &mut self,
        id: ControllerId,
        sequence: EventSequence,
        state: SequenceState,
    ) -> bool {
        if let Err(err) = self.check_sequence_transition(id, sequence, state) {
            tracing::warn!(target: targets::GESTURES, operation = "set_sequence_state", %err, "precondition failed");
            return false;
        }
        let Some(entry) = self.controllers.get(id) else {
            return false;
        };
        let widget = entry.widget;
        let group = entry.group;
        tracing::debug!(
            target: targets::GESTURES,
            widget = self.type_name(widget).unwrap_or("?"),
            ?sequence,
            state = state.name(),
            "sequence state changed"
        );

        let undecided = |tree: &Self, other: ControllerId| {
            tree.gesture_core(other)
                .and_then(|c| c.point(sequence))
                .is_some_and(|p| p.state == SequenceState::None)
        };
        let mut changes = vec![(id, state)];
        for &other in self.controllers(widget) {
            if other == id || !undecided(self, other) {
                continue;
            }
            if self.controllers.get(other).is_some_and(|e| e.group == group) {
                changes.push((other, state));
            } else if state == SequenceState::Claimed {
                changes.push((other, SequenceState::Denied));
            }
        }
        if state == SequenceState::Claimed {
            for (other, entry) in self.controllers.iter() {
                if entry.widget != widget && undecided(self, other) {
                    changes.push((other, SequenceState::Denied));
                }
            }
        }

        for (controller, new_state) in changes {
            self.with_controller(controller, |controller, cx| {
                if let Some(core) = controller.gesture_mut() {
                    core.set_state(sequence, new_state);
                }
                cx.notify(GestureNotify::SequenceStateChanged {
                    sequence,
                    state: new_state,
                });
                controller.sequence_state_changed(cx, sequence, new_state);
            });
        }
        if state == SequenceState::Denied {
            self.emulate_press_below(widget, sequence);
        }
        true
    }

    /// Re-deliver a consumed begin event to the widgets below `widget` once
    /// every capture-phase gesture there that consumed it has denied.
    fn emulate_press_below(&mut self, widget: WidgetId, sequence: EventSequence) {
        let mut consumed = Vec::new();
        for &id in self.controllers(widget) {
            if self.controller_phase(id) != Some(PropagationPhase::Capture) {
                continue;
            }
            let Some(point) = self.gesture_core(id).and_then(|c| c.point(sequence)) else {
                continue;
            };
            if point.press_handled {
                consumed.push((id, point.state, point.begin_event.clone(), point.target));
            }
        }
        if consumed.is_empty() || consumed.iter().any(|(_, s, _, _)| *s != SequenceState::Denied) {
            return;
        }
        for (id, ..) in &consumed {
            if let Some(core) = self.gesture_core_mut(*id) {
                core.set_press_handled(sequence, false);
            }
        }
        let (_, _, begin, target) = consumed.swap_remove(0);
        let chain = self.path_from_root(target);
        let Some(position) = chain.iter().position(|w| *w == widget) else {
            return;
        };
        let below = &chain[position + 1..];
        if below.is_empty() {
            return;
        }
        tracing::debug!(
            target: targets::GESTURES,
            widget = self.type_name(widget).unwrap_or("?"),
            ?sequence,
            "emulating press for widgets below a denied capture gesture"
        );
        self.propagate(below, &begin.synthesized_press());
    }

    // =========================================================================
    // Groups
    // =========================================================================

    /// Put gesture `b`, and every gesture grouped with it, into `a`'s group.
    ///
    /// Both gestures must be attached to the same widget.
    pub fn group_gestures(&mut self, a: ControllerId, b: ControllerId) {
        precondition!(targets::GESTURES, "group_gestures", self.try_group_gestures(a, b));
    }

    fn try_group_gestures(&mut self, a: ControllerId, b: ControllerId) -> Result<(), WidgetError> {
        self.check_groupable(a, b)?;
        let (Some(label_a), Some(label_b)) = (
            self.controllers.get(a).map(|e| e.group),
            self.controllers.get(b).map(|e| e.group),
        ) else {
            return Ok(());
        };
        for entry in self.controllers.values_mut() {
            if entry.group == label_b {
                entry.group = label_a;
            }
        }
        Ok(())
    }

    fn check_groupable(&self, a: ControllerId, b: ControllerId) -> Result<(), WidgetError> {
        for id in [a, b] {
            if !self.controllers.contains_key(id) {
                return Err(WidgetError::InvalidController(id));
            }
            if !self.is_gesture(id) {
                return Err(WidgetError::NotAGesture(id));
            }
        }
        if self.controller_widget(a) != self.controller_widget(b) {
            return Err(WidgetError::GesturesOnDifferentWidgets(a, b));
        }
        Ok(())
    }

    /// Take a gesture out of its group.
    pub fn ungroup_gesture(&mut self, id: ControllerId) {
        let Some(label) = self.controllers.get(id).map(|e| e.group) else {
            return;
        };
        if label == id {
            // the remaining members need a label of their own
            let members: Vec<ControllerId> = self
                .controllers
                .iter()
                .filter(|(other, e)| *other != id && e.group == id)
                .map(|(other, _)| other)
                .collect();
            if let Some(&new_label) = members.first() {
                for member in members {
                    if let Some(entry) = self.controllers.get_mut(member) {
                        entry.group = new_label;
                    }
                }
            }
        } else if let Some(entry) = self.controllers.get_mut(id) {
            entry.group = id;
        }
    }

    /// Whether two gestures are in the same group.
    pub fn is_grouped_with(&self, a: ControllerId, b: ControllerId) -> bool {
        match (self.controllers.get(a), self.controllers.get(b)) {
            (Some(ea), Some(eb)) => a != b && ea.group == eb.group,
            _ => false,
        }
    }

    /// Every gesture in the group of `id`, including `id`.
    pub fn gesture_group(&self, id: ControllerId) -> Vec<ControllerId> {
        let Some(label) = self.controllers.get(id).map(|e| e.group) else {
            return Vec::new();
        };
        self.controllers
            .iter()
            .filter(|(_, e)| e.group == label)
            .map(|(other, _)| other)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::display::HeadlessDisplay;
    use crate::widget::gesture::{GestureDrag, GestureLongPress};
    use crate::widget::tests::count_warnings;
    use crate::widget::widgets::Window;
    use crate::widget::{Event, Widget};

    struct Leaf;
    impl Widget for Leaf {}

    fn tree_with_leaf() -> (WidgetTree, WidgetId, WidgetId) {
        let mut tree = WidgetTree::new(Box::new(HeadlessDisplay::new()), Settings::default());
        let window = tree.create(Window::new());
        let leaf = tree.create(Leaf);
        tree.container_add(window, leaf);
        tree.show_all(window);
        (tree, window, leaf)
    }

    fn begin(tree: &mut WidgetTree, ids: &[ControllerId], target: WidgetId, seq: u32) {
        let event = Event::touch_begin(seq, 1.0, 1.0);
        for id in ids {
            tree.run_controller(*id, &event, target);
        }
    }

    #[test]
    fn transitions_out_of_a_terminal_state_are_rejected() {
        let (mut tree, _, leaf) = tree_with_leaf();
        let drag = tree
            .add_controller(leaf, GestureDrag::new(), PropagationPhase::Bubble)
            .unwrap();
        let seq = EventSequence::Touch(1);
        assert!(!tree.set_sequence_state(drag, seq, SequenceState::Claimed));

        begin(&mut tree, &[drag], leaf, 1);
        assert!(tree.set_sequence_state(drag, seq, SequenceState::Denied));
        assert!(!tree.set_sequence_state(drag, seq, SequenceState::Claimed));
        assert_eq!(tree.sequence_state(drag, seq), SequenceState::Denied);
    }

    #[test]
    fn claiming_denies_outside_the_group_and_claims_inside() {
        let (mut tree, _, leaf) = tree_with_leaf();
        let a = tree
            .add_controller(leaf, GestureDrag::new(), PropagationPhase::Bubble)
            .unwrap();
        let b = tree
            .add_controller(leaf, GestureLongPress::new(), PropagationPhase::Bubble)
            .unwrap();
        let c = tree
            .add_controller(leaf, GestureDrag::new(), PropagationPhase::Bubble)
            .unwrap();
        tree.group_gestures(a, b);
        assert!(tree.is_grouped_with(a, b));
        assert!(!tree.is_grouped_with(a, c));

        begin(&mut tree, &[a, b, c], leaf, 1);
        let seq = EventSequence::Touch(1);
        assert!(tree.set_sequence_state(a, seq, SequenceState::Claimed));
        assert_eq!(tree.sequence_state(b, seq), SequenceState::Claimed);
        assert_eq!(tree.sequence_state(c, seq), SequenceState::Denied);
    }

    #[test]
    fn grouping_across_widgets_is_refused() {
        let (mut tree, window, leaf) = tree_with_leaf();
        let a = tree
            .add_controller(leaf, GestureDrag::new(), PropagationPhase::Bubble)
            .unwrap();
        let b = tree
            .add_controller(window, GestureDrag::new(), PropagationPhase::Bubble)
            .unwrap();
        let ((), warnings) = count_warnings(|| tree.group_gestures(a, b));
        assert_eq!(warnings, 1);
        assert!(!tree.is_grouped_with(a, b));
        assert_eq!(tree.gesture_group(a), vec![a]);
    }

    #[test]
    fn ungrouping_the_label_keeps_the_rest_together() {
        let (mut tree, _, leaf) = tree_with_leaf();
        let ids: Vec<ControllerId> = (0..3)
            .map(|_| {
                tree.add_controller(leaf, GestureDrag::new(), PropagationPhase::Bubble)
                    .unwrap()
            })
            .collect();
        tree.group_gestures(ids[0], ids[1]);
        tree.group_gestures(ids[0], ids[2]);
        tree.ungroup_gesture(ids[0]);
        assert!(!tree.is_grouped_with(ids[0], ids[1]));
        assert!(tree.is_grouped_with(ids[1], ids[2]));
    }

    #[test]
    fn reset_cancels_tracked_sequences() {
        let (mut tree, _, leaf) = tree_with_leaf();
        let drag = tree
            .add_controller(leaf, GestureDrag::new(), PropagationPhase::Bubble)
            .unwrap();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let log = seen.clone();
        tree.controller_signals_mut(drag)
            .unwrap()
            .notify
            .connect(move |_, (_, notify)| log.borrow_mut().push(*notify));

        begin(&mut tree, &[drag], leaf, 3);
        tree.reset_controllers(leaf);
        assert!(!tree.handles_sequence(drag, EventSequence::Touch(3)));
        assert!(seen
            .borrow()
            .contains(&GestureNotify::Cancel(EventSequence::Touch(3))));
    }

    #[test]
    fn callback_controllers_see_every_event() {
        let (mut tree, _, leaf) = tree_with_leaf();
        let count = Rc::new(RefCell::new(0));
        let seen = count.clone();
        let id = tree
            .add_controller(
                leaf,
                CallbackController::new(move |cx, _| {
                    *seen.borrow_mut() += 1;
                    cx.notify(GestureNotify::Stopped);
                    Propagation::Stop
                }),
                PropagationPhase::Target,
            )
            .unwrap();
        let result = tree.run_controller(id, &Event::motion(0.0, 0.0), leaf);
        assert_eq!(result, Propagation::Stop);
        assert_eq!(*count.borrow(), 1);
        assert!(!tree.is_gesture(id));

        tree.remove_controller(id);
        assert!(tree.controllers(leaf).is_empty());
    }
}
