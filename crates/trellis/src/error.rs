//! Error types for the widget core.
//!
//! Public entry points of [`WidgetTree`](crate::widget::WidgetTree) never
//! return these for programmer errors: the precondition check produces a
//! [`WidgetError`], the entry point logs it at `WARN` level and returns
//! without effect. Backend and builder failures are surfaced as
//! [`DisplayError`] and [`BuilderError`] to the code that can act on them.

use thiserror::Error;

use crate::widget::{ControllerId, WidgetId};

/// A violated precondition of a widget operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WidgetError {
    /// The widget id does not refer to a live widget.
    #[error("invalid widget id {0:?}")]
    InvalidWidget(WidgetId),

    /// The controller id does not refer to a live controller.
    #[error("invalid controller id {0:?}")]
    InvalidController(ControllerId),

    /// The controller is not a gesture.
    #[error("controller {0:?} is not a gesture")]
    NotAGesture(ControllerId),

    /// Gestures can only be grouped with gestures on the same widget.
    #[error("gestures {0:?} and {1:?} are attached to different widgets")]
    GesturesOnDifferentWidgets(ControllerId, ControllerId),

    /// The child already has a parent.
    #[error("can't set a parent on widget {child} which already has parent {parent}")]
    AlreadyParented {
        /// Type of the child.
        child: &'static str,
        /// Type of the existing parent.
        parent: &'static str,
    },

    /// Toplevel widgets cannot be placed inside another widget.
    #[error("can't set a parent on a toplevel widget ({0})")]
    ToplevelParent(&'static str),

    /// A widget cannot become its own ancestor.
    #[error("can't make {0} a descendant of itself")]
    CircularParent(&'static str),

    /// The widget class does not hold children.
    #[error("{0} is not a container")]
    NotAContainer(&'static str),

    /// The operation needs a toplevel widget.
    #[error("{0} is not a toplevel")]
    NotAToplevel(&'static str),

    /// The container refused another child.
    #[error("{container} already holds its only child")]
    ContainerFull {
        /// Type of the container.
        container: &'static str,
    },

    /// The widget is not a child of the given container.
    #[error("{child} is not a child of {container}")]
    NotAChild {
        /// Type of the child.
        child: &'static str,
        /// Type of the container.
        container: &'static str,
    },

    /// Event masks of a realized widget without its own window are frozen.
    #[error("can't set events on a realized no-window widget ({0})")]
    EventsAfterRealize(&'static str),

    /// Mapping requires the widget to be visible.
    #[error("can't map invisible widget {0}")]
    NotVisible(&'static str),

    /// Mapping requires the widget to be child-visible.
    #[error("can't map widget {0} whose child-visible flag is unset")]
    NotChildVisible(&'static str),

    /// Mapping a child requires a mapped parent.
    #[error("can't map {child} while its parent {parent} is unmapped")]
    ParentNotMapped {
        /// Type of the child.
        child: &'static str,
        /// Type of the parent.
        parent: &'static str,
    },

    /// Re-parenting onto the current parent.
    #[error("{0} is already a child of the new parent")]
    SameParent(&'static str),

    /// Sequence states only move away from `none`.
    #[error("invalid sequence state transition {from} -> {to}")]
    InvalidSequenceTransition {
        /// Current state.
        from: &'static str,
        /// Requested state.
        to: &'static str,
    },

    /// The gesture is not tracking the sequence.
    #[error("gesture {0:?} does not handle the sequence")]
    UnhandledSequence(ControllerId),

    /// The property is not part of the dynamic property set.
    #[error("unknown property '{0}'")]
    UnknownProperty(String),

    /// The value cannot be converted to the property type.
    #[error("invalid value '{value}' for property '{property}'")]
    InvalidPropertyValue {
        /// Property name.
        property: String,
        /// Offending value.
        value: String,
    },

    /// The tick callback id is not registered on the widget.
    #[error("unknown tick callback {0}")]
    UnknownTickCallback(u64),

    /// Size groups must have at least one widget coupled per axis.
    #[error("invalid size group")]
    InvalidSizeGroup,

    /// The action name has no `prefix.name` form or is not registered.
    #[error("no action named '{0}'")]
    UnknownAction(String),
}

/// A failure reported by the display backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DisplayError {
    /// The backend could not create a native window.
    #[error("native window creation failed: {0}")]
    WindowCreation(String),

    /// The native window is unknown to the backend.
    #[error("no such native window")]
    NoSuchWindow,

    /// Paint setup or teardown failed.
    #[error("render backend error: {0}")]
    Paint(String),

    /// The frame clock is not available.
    #[error("frame clock unavailable")]
    NoFrameClock,
}

/// A failure while reading builder XML or instantiating a template.
#[derive(Debug, Error)]
pub enum BuilderError {
    /// Malformed XML.
    #[error("xml error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// Malformed attribute.
    #[error("xml attribute error: {0}")]
    Attribute(#[from] quick_xml::events::attributes::AttrError),

    /// A required attribute is absent.
    #[error("<{element}> is missing the '{attribute}' attribute")]
    MissingAttribute {
        /// Element name.
        element: String,
        /// Attribute name.
        attribute: &'static str,
    },

    /// An element appeared where it is not allowed.
    #[error("unexpected element <{0}>")]
    UnexpectedElement(String),

    /// No factory is registered for the class.
    #[error("unknown class '{0}'")]
    UnknownClass(String),

    /// No callback symbol is registered under the handler name.
    #[error("unknown callback symbol '{0}'")]
    UnknownCallback(String),

    /// The signal name is not one a template can connect.
    #[error("unknown signal '{0}'")]
    UnknownSignal(String),

    /// The class has no template registered.
    #[error("no template registered for class '{0}'")]
    NoTemplate(String),

    /// The template declares a different class than the instance.
    #[error("template is for class '{found}', instance is '{expected}'")]
    TemplateMismatch {
        /// Instance class.
        expected: String,
        /// Class named by the template.
        found: String,
    },

    /// A builder id was referenced but never declared.
    #[error("unknown object id '{0}'")]
    UnknownObject(String),

    /// The accelerator key or modifiers could not be parsed.
    #[error("invalid accelerator '{0}'")]
    InvalidAccelerator(String),

    /// A template child refused to be added.
    #[error("failed to add child: {0}")]
    Widget(#[from] WidgetError),
}
