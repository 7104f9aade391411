//! Loading settings documents the way an application would.

use trellis_core::{LayoutDirection, Settings, SettingsError};

#[test]
fn full_document() {
    let text = r#"
        default_direction = "rtl"
        drag_threshold = 4
        long_press_time_ms = 650
        double_click_time_ms = 250
        double_click_distance = 3
        error_bell = false
        size_group_ignore_hidden_default = true
        redraw_on_alloc_default = false
    "#;
    let settings = Settings::from_toml_str(text).unwrap();
    assert_eq!(settings.default_direction, LayoutDirection::Rtl);
    assert_eq!(settings.drag_threshold, 4);
    assert_eq!(settings.long_press_time_ms, 650);
    assert_eq!(settings.double_click_time_ms, 250);
    assert_eq!(settings.double_click_distance, 3);
    assert!(!settings.error_bell);
    assert!(settings.size_group_ignore_hidden_default);
    assert!(!settings.redraw_on_alloc_default);
}

#[test]
fn unknown_direction_is_rejected() {
    let err = Settings::from_toml_str(r#"default_direction = "up""#).unwrap_err();
    assert!(matches!(err, SettingsError::Parse(_)));
    assert!(err.to_string().starts_with("failed to parse settings"));
}

#[test]
fn negative_distance_is_rejected() {
    let err = Settings::from_toml_str("double_click_distance = -1").unwrap_err();
    assert_eq!(
        err.to_string(),
        "invalid value for setting 'double_click_distance': must not be negative, got -1"
    );
}
