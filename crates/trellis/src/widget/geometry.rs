//! Layout vocabulary: orientation, alignment, margins and request results.

use trellis_core::LayoutDirection;

/// Layout axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Orientation {
    /// Along x.
    Horizontal,
    /// Along y.
    Vertical,
}

impl Orientation {
    /// The other axis.
    pub fn opposite(self) -> Self {
        match self {
            Self::Horizontal => Self::Vertical,
            Self::Vertical => Self::Horizontal,
        }
    }
}

/// Which axis a widget negotiates first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SizeRequestMode {
    /// Width first, then height as a function of width.
    HeightForWidth,
    /// Height first, then width as a function of height.
    WidthForHeight,
    /// Neither axis depends on the other.
    #[default]
    ConstantSize,
}

/// How a widget uses extra space along an axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Align {
    /// Take all available space.
    #[default]
    Fill,
    /// Natural size at the start edge.
    Start,
    /// Natural size at the end edge.
    End,
    /// Natural size, centered.
    Center,
    /// Align baselines; behaves as `Fill` horizontally.
    Baseline,
}

impl Align {
    /// Swap start and end for right-to-left layouts.
    pub fn for_direction(self, direction: TextDirection) -> Self {
        match (self, direction) {
            (Self::Start, TextDirection::Rtl) => Self::End,
            (Self::End, TextDirection::Rtl) => Self::Start,
            (align, _) => align,
        }
    }
}

/// Reading direction of a widget.
///
/// `None` means "inherit": the parent's direction, or the default direction
/// for roots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextDirection {
    /// Inherit.
    #[default]
    None,
    /// Left to right.
    Ltr,
    /// Right to left.
    Rtl,
}

impl From<LayoutDirection> for TextDirection {
    fn from(direction: LayoutDirection) -> Self {
        match direction {
            LayoutDirection::Ltr => Self::Ltr,
            LayoutDirection::Rtl => Self::Rtl,
        }
    }
}

/// Space around a widget. `start` and `end` follow the text direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Margin {
    /// Leading edge.
    pub start: i32,
    /// Trailing edge.
    pub end: i32,
    /// Top edge.
    pub top: i32,
    /// Bottom edge.
    pub bottom: i32,
}

impl Margin {
    /// Equal margins on every side.
    pub const fn uniform(value: i32) -> Self {
        Self {
            start: value,
            end: value,
            top: value,
            bottom: value,
        }
    }

    /// Physical left and right margins for a direction.
    pub fn horizontal(&self, direction: TextDirection) -> (i32, i32) {
        match direction {
            TextDirection::Rtl => (self.end, self.start),
            _ => (self.start, self.end),
        }
    }

    /// Sum of the margins along an axis.
    pub fn along(&self, orientation: Orientation) -> i32 {
        match orientation {
            Orientation::Horizontal => self.start + self.end,
            Orientation::Vertical => self.top + self.bottom,
        }
    }
}

/// Result of measuring one axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Measurement {
    /// Smallest usable size.
    pub minimum: i32,
    /// Preferred size.
    pub natural: i32,
    /// Baseline at minimum size, `-1` if none.
    pub minimum_baseline: i32,
    /// Baseline at natural size, `-1` if none.
    pub natural_baseline: i32,
}

impl Default for Measurement {
    fn default() -> Self {
        Self {
            minimum: 0,
            natural: 0,
            minimum_baseline: -1,
            natural_baseline: -1,
        }
    }
}

impl Measurement {
    /// A measurement without baselines.
    pub const fn new(minimum: i32, natural: i32) -> Self {
        Self {
            minimum,
            natural,
            minimum_baseline: -1,
            natural_baseline: -1,
        }
    }

    /// A measurement with baselines.
    pub const fn with_baselines(
        minimum: i32,
        natural: i32,
        minimum_baseline: i32,
        natural_baseline: i32,
    ) -> Self {
        Self {
            minimum,
            natural,
            minimum_baseline,
            natural_baseline,
        }
    }

    /// Whether a baseline was reported.
    pub fn has_baseline(&self) -> bool {
        self.minimum_baseline >= 0 || self.natural_baseline >= 0
    }
}

/// One axis of an allocation being adjusted for margins and alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AxisAllocation {
    /// Minimum request along the axis, margins included.
    pub minimum: i32,
    /// Natural request along the axis, margins included.
    pub natural: i32,
    /// Allocated position.
    pub position: i32,
    /// Allocated size.
    pub size: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rtl_mirrors_start_and_end() {
        assert_eq!(Align::Start.for_direction(TextDirection::Rtl), Align::End);
        assert_eq!(Align::End.for_direction(TextDirection::Rtl), Align::Start);
        assert_eq!(Align::Center.for_direction(TextDirection::Rtl), Align::Center);
        assert_eq!(Align::Start.for_direction(TextDirection::Ltr), Align::Start);

        let margin = Margin {
            start: 1,
            end: 2,
            top: 0,
            bottom: 0,
        };
        assert_eq!(margin.horizontal(TextDirection::Ltr), (1, 2));
        assert_eq!(margin.horizontal(TextDirection::Rtl), (2, 1));
    }
}
