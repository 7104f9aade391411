//! Reference widget classes.
//!
//! [`Window`] is the toplevel every other widget ends up inside;
//! [`BoxContainer`] packs children in a row or a column. Both are
//! registered in the default [`ClassRegistry`](super::ClassRegistry).

mod box_container;
mod window;

pub use box_container::{BaselinePosition, BoxContainer};
pub use window::Window;
