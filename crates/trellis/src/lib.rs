//! Trellis - a retained-mode widget core.
//!
//! Widgets live in a [`WidgetTree`] arena. The tree drives their lifecycle
//! (show, realize, map and their inverses), negotiates layout through
//! height-for-width measurement and allocation, routes backend events
//! through capture, target and bubble phases with gesture arbitration, and
//! cascades state such as sensitivity and reading direction.
//!
//! Windowing is abstracted behind the [`Display`] trait; the bundled
//! [`HeadlessDisplay`] records everything in memory and is what the tests
//! run against.
//!
//! # Example
//!
//! ```no_run
//! use trellis::prelude::*;
//!
//! let mut tree = WidgetTree::new(Box::new(HeadlessDisplay::new()), Settings::default());
//! let window = tree.create(Window::new().with_title("Hello"));
//! let row = tree.create(BoxContainer::new(Orientation::Horizontal).with_spacing(6));
//! tree.container_add(window, row);
//! tree.show_all(window);
//!
//! if let Some(clock) = tree.frame_clock(window) {
//!     tree.run_frame(clock, 16_000);
//! }
//! ```

pub mod display;
pub mod error;
pub mod prelude;
pub mod widget;

pub use trellis_core::*;

pub use display::{Display, DrawingContext, HeadlessDisplay, NativeWindowId, WindowAttributes};
pub use error::{BuilderError, DisplayError, WidgetError};
pub use widget::{Widget, WidgetId, WidgetTree};
