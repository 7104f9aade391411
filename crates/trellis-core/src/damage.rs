//! Damage accumulation for native windows.
//!
//! Invalidated rectangles are unioned into a single bounding rectangle per
//! surface. This matches how the render driver consumes damage: one drawing
//! context per native window per frame, clipped to the damaged bounds.

use crate::geometry::Rect;

/// Accumulates damaged regions that need repainting.
///
/// # Example
///
/// ```
/// use trellis_core::damage::DamageTracker;
/// use trellis_core::Rect;
///
/// let mut tracker = DamageTracker::new();
/// tracker.add_damage(Rect::new(10, 10, 50, 30));
/// tracker.add_damage(Rect::new(100, 100, 20, 20));
///
/// assert_eq!(tracker.damage_region(), Some(Rect::new(10, 10, 110, 110)));
/// tracker.clear();
/// assert!(!tracker.has_damage());
/// ```
#[derive(Debug, Clone, Default)]
pub struct DamageTracker {
    /// The accumulated damage region (union of all dirty rects).
    damage: Option<Rect>,
    /// Number of regions added since the last clear.
    damage_count: u32,
    /// Surface bounds used to clip incoming damage.
    viewport: Option<Rect>,
}

impl DamageTracker {
    /// Create a new damage tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a damage tracker clipped to the given surface bounds.
    pub fn with_viewport(viewport: Rect) -> Self {
        Self {
            viewport: Some(viewport),
            ..Self::default()
        }
    }

    /// Update the surface bounds.
    pub fn set_viewport(&mut self, viewport: Rect) {
        self.viewport = Some(viewport);
        if let Some(damage) = self.damage {
            self.damage = damage.intersect(&viewport);
        }
    }

    /// Add a damaged region.
    pub fn add_damage(&mut self, rect: Rect) {
        if rect.is_empty() {
            return;
        }

        let rect = match &self.viewport {
            Some(viewport) => match rect.intersect(viewport) {
                Some(clipped) => clipped,
                None => return,
            },
            None => rect,
        };

        self.damage_count += 1;
        self.damage = Some(match self.damage {
            Some(existing) => existing.union(&rect),
            None => rect,
        });
    }

    /// Whether anything needs repainting.
    #[inline]
    pub fn has_damage(&self) -> bool {
        self.damage.is_some()
    }

    /// The union of all damage since the last clear.
    #[inline]
    pub fn damage_region(&self) -> Option<Rect> {
        self.damage
    }

    /// Number of damage calls accumulated since the last clear.
    #[inline]
    pub fn damage_count(&self) -> u32 {
        self.damage_count
    }

    /// Take the damage region, leaving the tracker clean.
    pub fn take(&mut self) -> Option<Rect> {
        self.damage_count = 0;
        self.damage.take()
    }

    /// Clear all damage.
    pub fn clear(&mut self) {
        self.damage = None;
        self.damage_count = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_damage_is_ignored() {
        let mut tracker = DamageTracker::new();
        tracker.add_damage(Rect::new(5, 5, 0, 10));
        assert!(!tracker.has_damage());
        assert_eq!(tracker.damage_count(), 0);
    }

    #[test]
    fn viewport_clips_damage() {
        let mut tracker = DamageTracker::with_viewport(Rect::new(0, 0, 100, 100));
        tracker.add_damage(Rect::new(90, 90, 50, 50));
        assert_eq!(tracker.damage_region(), Some(Rect::new(90, 90, 10, 10)));

        tracker.add_damage(Rect::new(200, 200, 10, 10));
        assert_eq!(tracker.damage_count(), 1);
    }

    #[test]
    fn take_resets() {
        let mut tracker = DamageTracker::new();
        tracker.add_damage(Rect::new(0, 0, 4, 4));
        assert_eq!(tracker.take(), Some(Rect::new(0, 0, 4, 4)));
        assert!(!tracker.has_damage());
        assert_eq!(tracker.damage_count(), 0);
    }
}
