//! Error types for Trellis core.

/// Errors produced while loading or saving [`Settings`](crate::Settings).
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    /// The TOML document could not be parsed.
    #[error("failed to parse settings: {0}")]
    Parse(#[from] toml::de::Error),

    /// The settings could not be serialized.
    #[error("failed to serialize settings: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// A key held a value outside its valid range.
    #[error("invalid value for setting '{key}': {message}")]
    InvalidValue {
        /// The offending key.
        key: &'static str,
        /// Why the value was rejected.
        message: String,
    },
}
