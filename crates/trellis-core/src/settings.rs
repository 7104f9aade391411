//! Runtime settings for the widget core.
//!
//! Settings replace the toolkit-wide globals (default direction, gesture
//! thresholds, click timing) with an explicit value handed to the widget
//! tree at construction. They can be loaded from TOML:
//!
//! ```
//! use trellis_core::{LayoutDirection, Settings};
//!
//! let settings = Settings::from_toml_str(r#"
//!     default_direction = "rtl"
//!     drag_threshold = 12
//! "#).unwrap();
//!
//! assert_eq!(settings.default_direction, LayoutDirection::Rtl);
//! assert_eq!(settings.drag_threshold, 12);
//! assert_eq!(settings.long_press_time_ms, 500);
//! ```

use serde::{Deserialize, Serialize};

use crate::error::SettingsError;

/// Reading direction used when a widget does not set its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayoutDirection {
    /// Left to right.
    #[default]
    Ltr,
    /// Right to left.
    Rtl,
}

/// Toolkit configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Default text direction for widgets whose direction is unset.
    pub default_direction: LayoutDirection,
    /// Distance in pixels a pointer must travel before a drag starts.
    pub drag_threshold: i32,
    /// Time a press must be held to count as a long press.
    pub long_press_time_ms: u32,
    /// Maximum time between presses of a multi-press.
    pub double_click_time_ms: u32,
    /// Maximum distance between presses of a multi-press.
    pub double_click_distance: i32,
    /// Whether an error bell rings the display bell.
    pub error_bell: bool,
    /// `ignore_hidden` value for newly created size groups.
    pub size_group_ignore_hidden_default: bool,
    /// `redraw_on_alloc` value for newly created widgets.
    pub redraw_on_alloc_default: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            default_direction: LayoutDirection::Ltr,
            drag_threshold: 8,
            long_press_time_ms: 500,
            double_click_time_ms: 400,
            double_click_distance: 5,
            error_bell: true,
            size_group_ignore_hidden_default: false,
            redraw_on_alloc_default: true,
        }
    }
}

impl Settings {
    /// Parse settings from a TOML document. Missing keys take defaults.
    pub fn from_toml_str(source: &str) -> Result<Self, SettingsError> {
        let settings: Settings = toml::from_str(source)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Serialize settings to a TOML document.
    pub fn to_toml_string(&self) -> Result<String, SettingsError> {
        Ok(toml::to_string(self)?)
    }

    fn validate(&self) -> Result<(), SettingsError> {
        if self.drag_threshold < 0 {
            return Err(SettingsError::InvalidValue {
                key: "drag_threshold",
                message: format!("must not be negative, got {}", self.drag_threshold),
            });
        }
        if self.double_click_distance < 0 {
            return Err(SettingsError::InvalidValue {
                key: "double_click_distance",
                message: format!("must not be negative, got {}", self.double_click_distance),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_is_default() {
        assert_eq!(Settings::from_toml_str("").unwrap(), Settings::default());
    }

    #[test]
    fn round_trip_preserves_values() {
        let settings = Settings {
            default_direction: LayoutDirection::Rtl,
            error_bell: false,
            ..Settings::default()
        };
        let text = settings.to_toml_string().unwrap();
        assert_eq!(Settings::from_toml_str(&text).unwrap(), settings);
    }

    #[test]
    fn negative_threshold_rejected() {
        let err = Settings::from_toml_str("drag_threshold = -3").unwrap_err();
        assert!(matches!(
            err,
            SettingsError::InvalidValue {
                key: "drag_threshold",
                ..
            }
        ));
    }

    #[test]
    fn malformed_document_is_parse_error() {
        assert!(matches!(
            Settings::from_toml_str("drag_threshold = \"far\""),
            Err(SettingsError::Parse(_))
        ));
    }
}
