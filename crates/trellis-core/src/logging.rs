//! Logging and debugging facilities for Trellis.
//!
//! Trellis uses the `tracing` crate for instrumentation. Install a subscriber
//! in the application to see output:
//!
//! ```ignore
//! tracing_subscriber::fmt()
//!     .with_env_filter("trellis::layout=debug,trellis=warn")
//!     .init();
//! ```
//!
//! Programmer errors (calling an operation whose preconditions do not hold)
//! are reported at `WARN` level on the target of the subsystem involved and
//! the operation returns without effect. Backend failures and template
//! failures are reported at `ERROR` level.

/// Target names for log filtering.
///
/// Use these with `tracing` directives to filter logs by subsystem.
pub mod targets {
    /// Widget creation, parenting, realize/map and destruction.
    pub const LIFECYCLE: &str = "trellis::lifecycle";
    /// Size requests, allocation, size groups and the resize queue.
    pub const LAYOUT: &str = "trellis::layout";
    /// Event routing, grabs and crossing synthesis.
    pub const EVENTS: &str = "trellis::events";
    /// Gesture sequence tracking and claiming.
    pub const GESTURES: &str = "trellis::gestures";
    /// State flag, direction and scale propagation.
    pub const STATE: &str = "trellis::state";
    /// Frame clocks, tick callbacks and painting.
    pub const FRAME: &str = "trellis::frame";
    /// Style contexts and widget paths.
    pub const STYLE: &str = "trellis::style";
    /// Builder custom tags and templates.
    pub const BUILDER: &str = "trellis::builder";
    /// Calls into the display backend.
    pub const BACKEND: &str = "trellis::backend";
}

/// Style options for widget tree visualization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TreeStyle {
    /// ASCII characters for tree branches.
    Ascii,
    /// Unicode box-drawing characters.
    #[default]
    Unicode,
    /// Compact single-line representation.
    Compact,
}

impl TreeStyle {
    /// Branch prefix for a child, depending on whether it is the last one.
    pub fn branch(self, is_last: bool) -> &'static str {
        match (self, is_last) {
            (Self::Ascii, false) => "|-- ",
            (Self::Ascii, true) => "`-- ",
            (Self::Unicode, false) => "├── ",
            (Self::Unicode, true) => "└── ",
            (Self::Compact, _) => "",
        }
    }

    /// Continuation prefix under a child, depending on whether it was last.
    pub fn continuation(self, is_last: bool) -> &'static str {
        match (self, is_last) {
            (Self::Ascii, false) => "|   ",
            (Self::Unicode, false) => "│   ",
            (Self::Ascii | Self::Unicode, true) => "    ",
            (Self::Compact, _) => "",
        }
    }
}

/// Configuration for widget tree debug output.
#[derive(Debug, Clone)]
pub struct TreeFormatOptions {
    /// The style of tree visualization.
    pub style: TreeStyle,
    /// Whether to show widget ids.
    pub show_ids: bool,
    /// Whether to show lifecycle flags (visible/realized/mapped).
    pub show_flags: bool,
    /// Whether to show allocations.
    pub show_allocation: bool,
    /// Maximum depth to traverse (None for unlimited).
    pub max_depth: Option<usize>,
}

impl Default for TreeFormatOptions {
    fn default() -> Self {
        Self {
            style: TreeStyle::default(),
            show_ids: true,
            show_flags: true,
            show_allocation: false,
            max_depth: None,
        }
    }
}

impl TreeFormatOptions {
    /// Options for detailed debugging output.
    pub fn detailed() -> Self {
        Self {
            show_allocation: true,
            ..Default::default()
        }
    }

    /// Options for minimal output.
    pub fn minimal() -> Self {
        Self {
            show_ids: false,
            show_flags: false,
            show_allocation: false,
            ..Default::default()
        }
    }
}
