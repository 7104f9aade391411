//! In-memory display backend.
//!
//! `HeadlessDisplay` is a cheap, cloneable handle over shared state. Hand one
//! clone to the widget tree and keep another to inspect what the core asked
//! the backend to do.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use slotmap::SlotMap;
use trellis_core::{Point, Rect};

use super::{Display, DrawingContext, NativeWindowId, Operator, WindowAttributes, WindowKind};
use crate::error::DisplayError;
use crate::widget::{DeviceId, EventMask};

/// A native window as recorded by the headless backend.
#[derive(Debug, Clone, PartialEq)]
pub struct HeadlessWindow {
    /// Toplevel or child.
    pub kind: WindowKind,
    /// Parent window.
    pub parent: Option<NativeWindowId>,
    /// Current geometry.
    pub rect: Rect,
    /// Whether the window is shown.
    pub visible: bool,
    /// Core event mask.
    pub event_mask: EventMask,
    /// Per-device event masks.
    pub device_masks: HashMap<DeviceId, EventMask>,
    /// Devices whose events are enabled on this window.
    pub enabled_devices: Vec<DeviceId>,
    /// Opacity in `0.0..=1.0`.
    pub opacity: f64,
    /// Shape mask.
    pub shape: Option<Rect>,
    /// Input shape mask.
    pub input_shape: Option<Rect>,
    /// Monitor scale.
    pub scale: i32,
    /// Title of a toplevel.
    pub title: Option<String>,
}

/// One drawing call recorded during a paint.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    /// `save`
    Save,
    /// `restore`
    Restore,
    /// `translate`
    Translate(i32, i32),
    /// `clip_rect`
    Clip(Rect),
    /// `set_operator`
    Operator(Operator),
    /// `push_group`
    PushGroup,
    /// `pop_group_to_source`
    PopGroupToSource,
    /// `paint_with_alpha`
    PaintWithAlpha(f64),
    /// `fill_rect`
    Fill(Rect, u32),
}

/// One painted frame of one window.
#[derive(Debug, Clone, PartialEq)]
pub struct PaintRecord {
    /// Window painted.
    pub window: NativeWindowId,
    /// Region handed to `begin_paint`.
    pub region: Rect,
    /// Drawing calls in order.
    pub ops: Vec<DrawOp>,
    /// Whether `end_paint` was called.
    pub finished: bool,
}

#[derive(Debug)]
struct HeadlessState {
    windows: SlotMap<NativeWindowId, HeadlessWindow>,
    invalidations: Vec<(NativeWindowId, Rect)>,
    paints: Vec<PaintRecord>,
    frame_requests: Vec<NativeWindowId>,
    beeps: u32,
    default_scale: i32,
    pointer: HashMap<DeviceId, (NativeWindowId, Point)>,
    fail_next_create: Option<String>,
    fail_next_paint: Option<String>,
}

impl Default for HeadlessState {
    fn default() -> Self {
        Self {
            windows: SlotMap::with_key(),
            invalidations: Vec::new(),
            paints: Vec::new(),
            frame_requests: Vec::new(),
            beeps: 0,
            default_scale: 1,
            pointer: HashMap::new(),
            fail_next_create: None,
            fail_next_paint: None,
        }
    }
}

impl HeadlessState {
    fn is_viewable(&self, window: NativeWindowId) -> bool {
        let mut current = Some(window);
        while let Some(id) = current {
            match self.windows.get(id) {
                Some(w) if w.visible => current = w.parent,
                _ => return false,
            }
        }
        true
    }
}

/// A display backend that keeps everything in memory.
#[derive(Debug, Clone, Default)]
pub struct HeadlessDisplay {
    state: Arc<Mutex<HeadlessState>>,
}

impl HeadlessDisplay {
    /// Create a new headless display.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of a native window.
    pub fn window(&self, window: NativeWindowId) -> Option<HeadlessWindow> {
        self.state.lock().windows.get(window).cloned()
    }

    /// Number of live native windows.
    pub fn window_count(&self) -> usize {
        self.state.lock().windows.len()
    }

    /// Whether the window exists.
    pub fn contains(&self, window: NativeWindowId) -> bool {
        self.state.lock().windows.contains_key(window)
    }

    /// All invalidations received so far.
    pub fn invalidations(&self) -> Vec<(NativeWindowId, Rect)> {
        self.state.lock().invalidations.clone()
    }

    /// Paint records, oldest first.
    pub fn paints(&self) -> Vec<PaintRecord> {
        self.state.lock().paints.clone()
    }

    /// Forget recorded invalidations and paints.
    pub fn clear_log(&self) {
        let mut state = self.state.lock();
        state.invalidations.clear();
        state.paints.clear();
        state.frame_requests.clear();
    }

    /// Number of frames requested so far.
    pub fn frame_requests(&self) -> usize {
        self.state.lock().frame_requests.len()
    }

    /// Number of times the bell rang.
    pub fn beeps(&self) -> u32 {
        self.state.lock().beeps
    }

    /// Make the next `create_window` call fail with the given status.
    pub fn fail_next_window_creation(&self, status: impl Into<String>) {
        self.state.lock().fail_next_create = Some(status.into());
    }

    /// Make the next `begin_paint` call fail with the given status.
    pub fn fail_next_paint(&self, status: impl Into<String>) {
        self.state.lock().fail_next_paint = Some(status.into());
    }

    /// Change the scale factor of a window's monitor.
    pub fn set_scale_factor(&self, window: NativeWindowId, scale: i32) {
        if let Some(w) = self.state.lock().windows.get_mut(window) {
            w.scale = scale;
        }
    }

    /// Scale factor given to newly created windows.
    pub fn set_default_scale_factor(&self, scale: i32) {
        self.state.lock().default_scale = scale;
    }

    /// Record where a pointing device is.
    pub fn set_device_position(&self, device: DeviceId, window: NativeWindowId, at: Point) {
        self.state.lock().pointer.insert(device, (window, at));
    }
}

impl Display for HeadlessDisplay {
    fn create_window(
        &mut self,
        attributes: &WindowAttributes,
    ) -> Result<NativeWindowId, DisplayError> {
        let mut state = self.state.lock();
        if let Some(status) = state.fail_next_create.take() {
            return Err(DisplayError::WindowCreation(status));
        }
        if attributes
            .parent
            .is_some_and(|parent| !state.windows.contains_key(parent))
        {
            return Err(DisplayError::NoSuchWindow);
        }
        let scale = attributes
            .parent
            .and_then(|p| state.windows.get(p))
            .map_or(state.default_scale, |p| p.scale);
        let id = state.windows.insert(HeadlessWindow {
            kind: attributes.kind,
            parent: attributes.parent,
            rect: attributes.rect,
            visible: false,
            event_mask: attributes.event_mask,
            device_masks: HashMap::new(),
            enabled_devices: Vec::new(),
            opacity: 1.0,
            shape: None,
            input_shape: None,
            scale,
            title: attributes.title.clone(),
        });
        tracing::trace!(target: "trellis::backend", ?id, rect = ?attributes.rect, "created window");
        Ok(id)
    }

    fn destroy_window(&mut self, window: NativeWindowId) {
        let mut state = self.state.lock();
        let mut doomed = vec![window];
        let mut i = 0;
        while i < doomed.len() {
            let parent = doomed[i];
            doomed.extend(
                state
                    .windows
                    .iter()
                    .filter(|(_, w)| w.parent == Some(parent))
                    .map(|(id, _)| id),
            );
            i += 1;
        }
        for id in doomed {
            state.windows.remove(id);
        }
    }

    fn show_window(&mut self, window: NativeWindowId) {
        if let Some(w) = self.state.lock().windows.get_mut(window) {
            w.visible = true;
        }
    }

    fn hide_window(&mut self, window: NativeWindowId) {
        if let Some(w) = self.state.lock().windows.get_mut(window) {
            w.visible = false;
        }
    }

    fn move_resize(&mut self, window: NativeWindowId, rect: Rect) {
        if let Some(w) = self.state.lock().windows.get_mut(window) {
            w.rect = rect;
        }
    }

    fn reparent_window(&mut self, window: NativeWindowId, new_parent: NativeWindowId, at: Point) {
        if let Some(w) = self.state.lock().windows.get_mut(window) {
            w.parent = Some(new_parent);
            w.rect = Rect::new(at.x, at.y, w.rect.width, w.rect.height);
        }
    }

    fn invalidate(&mut self, window: NativeWindowId, rect: Rect) {
        self.state.lock().invalidations.push((window, rect));
    }

    fn set_event_mask(&mut self, window: NativeWindowId, mask: EventMask) {
        if let Some(w) = self.state.lock().windows.get_mut(window) {
            w.event_mask = mask;
        }
    }

    fn set_device_events(&mut self, window: NativeWindowId, device: DeviceId, mask: EventMask) {
        if let Some(w) = self.state.lock().windows.get_mut(window) {
            w.device_masks.insert(device, mask);
        }
    }

    fn set_device_enabled(&mut self, window: NativeWindowId, device: DeviceId, enabled: bool) {
        if let Some(w) = self.state.lock().windows.get_mut(window) {
            w.enabled_devices.retain(|d| *d != device);
            if enabled {
                w.enabled_devices.push(device);
            }
        }
    }

    fn shape_combine(&mut self, window: NativeWindowId, shape: Option<Rect>) {
        if let Some(w) = self.state.lock().windows.get_mut(window) {
            w.shape = shape;
        }
    }

    fn input_shape_combine(&mut self, window: NativeWindowId, shape: Option<Rect>) {
        if let Some(w) = self.state.lock().windows.get_mut(window) {
            w.input_shape = shape;
        }
    }

    fn set_opacity(&mut self, window: NativeWindowId, opacity: f64) {
        if let Some(w) = self.state.lock().windows.get_mut(window) {
            w.opacity = opacity;
        }
    }

    fn scale_factor(&self, window: NativeWindowId) -> i32 {
        let state = self.state.lock();
        state
            .windows
            .get(window)
            .map_or(state.default_scale, |w| w.scale)
    }

    fn is_viewable(&self, window: NativeWindowId) -> bool {
        self.state.lock().is_viewable(window)
    }

    fn device_position(&self, device: DeviceId) -> Option<(NativeWindowId, Point)> {
        self.state.lock().pointer.get(&device).copied()
    }

    fn begin_paint(
        &mut self,
        window: NativeWindowId,
        region: Rect,
    ) -> Result<Box<dyn DrawingContext>, DisplayError> {
        let mut state = self.state.lock();
        if let Some(status) = state.fail_next_paint.take() {
            return Err(DisplayError::Paint(status));
        }
        if !state.windows.contains_key(window) {
            return Err(DisplayError::NoSuchWindow);
        }
        state.paints.push(PaintRecord {
            window,
            region,
            ops: Vec::new(),
            finished: false,
        });
        Ok(Box::new(HeadlessContext {
            state: Arc::clone(&self.state),
            record: state.paints.len() - 1,
        }))
    }

    fn end_paint(
        &mut self,
        window: NativeWindowId,
        _context: Box<dyn DrawingContext>,
    ) -> Result<(), DisplayError> {
        let mut state = self.state.lock();
        let record = state
            .paints
            .iter_mut()
            .rev()
            .find(|p| p.window == window && !p.finished)
            .ok_or(DisplayError::NoSuchWindow)?;
        record.finished = true;
        Ok(())
    }

    fn request_frame(&mut self, window: NativeWindowId) {
        self.state.lock().frame_requests.push(window);
    }

    fn beep(&mut self, _window: Option<NativeWindowId>) {
        self.state.lock().beeps += 1;
    }
}

/// Drawing context that appends to a paint record.
struct HeadlessContext {
    state: Arc<Mutex<HeadlessState>>,
    record: usize,
}

impl HeadlessContext {
    fn push(&mut self, op: DrawOp) {
        if let Some(record) = self.state.lock().paints.get_mut(self.record) {
            record.ops.push(op);
        }
    }
}

impl DrawingContext for HeadlessContext {
    fn save(&mut self) {
        self.push(DrawOp::Save);
    }

    fn restore(&mut self) {
        self.push(DrawOp::Restore);
    }

    fn translate(&mut self, dx: i32, dy: i32) {
        self.push(DrawOp::Translate(dx, dy));
    }

    fn clip_rect(&mut self, rect: Rect) {
        self.push(DrawOp::Clip(rect));
    }

    fn set_operator(&mut self, operator: Operator) {
        self.push(DrawOp::Operator(operator));
    }

    fn push_group(&mut self) {
        self.push(DrawOp::PushGroup);
    }

    fn pop_group_to_source(&mut self) {
        self.push(DrawOp::PopGroupToSource);
    }

    fn paint_with_alpha(&mut self, alpha: f64) {
        self.push(DrawOp::PaintWithAlpha(alpha));
    }

    fn fill_rect(&mut self, rect: Rect, rgba: u32) {
        self.push(DrawOp::Fill(rect, rgba));
    }
}
