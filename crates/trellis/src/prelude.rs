//! Prelude module for Trellis.
//!
//! Re-exports the types most programs need:
//!
//! ```ignore
//! use trellis::prelude::*;
//! ```

// ============================================================================
// Tree and widget classes
// ============================================================================

pub use crate::widget::{BoxContainer, Widget, WidgetId, WidgetTree, Window};

// ============================================================================
// Layout
// ============================================================================

pub use crate::widget::{Align, Measurement, Orientation, TextDirection};
pub use trellis_core::{LayoutDirection, Point, Rect, Settings, Size};

// ============================================================================
// Events and gestures
// ============================================================================

pub use crate::widget::gesture::{GestureDrag, GestureLongPress, GestureMultiPress};
pub use crate::widget::{
    Event, EventKind, EventSequence, Propagation, PropagationPhase, SequenceState,
};

// ============================================================================
// Backends
// ============================================================================

pub use crate::display::{Display, HeadlessDisplay};
