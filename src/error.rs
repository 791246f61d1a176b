use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ProptreeError>;

#[derive(Debug, Error)]
pub enum ProptreeError {
    #[error("Invalid {type_name} value '{raw}': {reason}")]
    ValueFormat {
        type_name: String,
        raw: String,
        reason: String,
    },

    #[error("Can't access value: {0}")]
    ValueAccess(String),

    #[error("Value at '{path}' is {found}, expected {expected}")]
    TypeMismatch {
        path: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("Can't evaluate '{expression}': {reason}")]
    Evaluation { expression: String, reason: String },

    #[error("Failed to parse {origin}: {reason}")]
    Parse { origin: String, reason: String },

    #[error("Unknown key '{key}' in {origin} (line {line})")]
    UnknownKey {
        key: String,
        origin: String,
        line: usize,
    },

    #[error("Unknown keys in configuration source")]
    UnknownKeys(Vec<ProptreeError>),

    #[error("Element '{name}' exists already in {container}")]
    DuplicateElement { name: String, container: String },

    #[error("Failed to load configuration {location}: {reason}")]
    ConfigurationLoad { location: String, reason: String },

    #[error("Property '{path}' is not found in configuration '{configuration}'")]
    PropertyNotFound { path: String, configuration: String },

    #[error("Binding error: {0}")]
    Binding(String),

    #[error("Configuration '{0}' is not loaded")]
    UnknownConfiguration(String),

    #[error("Reload service is stopped")]
    ReloadStopped,

    #[error("Reload scheduling needs a running Tokio runtime")]
    NoRuntime,

    #[error("Service options error: {0}")]
    Options(#[from] confique::Error),
}

impl ProptreeError {
    /// True for access failures, including cast mismatches and evaluation errors.
    pub fn is_value_access(&self) -> bool {
        matches!(
            self,
            Self::ValueAccess(_) | Self::TypeMismatch { .. } | Self::Evaluation { .. }
        )
    }

    /// True for structural problems with a configuration source.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Self::Parse { .. }
                | Self::UnknownKey { .. }
                | Self::UnknownKeys(_)
                | Self::DuplicateElement { .. }
        )
    }

    pub(crate) fn format(type_name: &str, raw: &str, reason: impl Into<String>) -> Self {
        Self::ValueFormat {
            type_name: type_name.to_string(),
            raw: raw.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn parse(origin: &str, reason: impl Into<String>) -> Self {
        Self::Parse {
            origin: origin.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn load(location: &str, reason: impl Into<String>) -> Self {
        Self::ConfigurationLoad {
            location: location.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn evaluation(expression: &str, reason: impl Into<String>) -> Self {
        Self::Evaluation {
            expression: expression.to_string(),
            reason: reason.into(),
        }
    }
}
