//! Core systems for Trellis.
//!
//! This crate provides the foundation the widget core is built on:
//!
//! - **Geometry**: integer points, sizes and rectangles
//! - **Damage**: union-based damage accumulation per surface
//! - **Signals**: typed, ordered callback lists that receive their owning
//!   context mutably
//! - **Settings**: toolkit configuration loadable from TOML
//! - **Logging**: `tracing` targets and tree-debug formatting options

pub mod damage;
mod error;
mod geometry;
pub mod logging;
mod settings;
pub mod signal;

pub use damage::DamageTracker;
pub use error::SettingsError;
pub use geometry::{Point, Rect, Size};
pub use logging::{TreeFormatOptions, TreeStyle};
pub use settings::{LayoutDirection, Settings};
pub use signal::{ConnectionId, Signal, Slot};

static_assertions::assert_impl_all!(Rect: Copy, Send, Sync);
static_assertions::assert_impl_all!(Settings: Clone, Send, Sync);
static_assertions::assert_impl_all!(ConnectionId: Copy, Send, Sync);
