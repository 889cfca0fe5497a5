#[derive(Debug, thiserror::Error)]
pub enum ToastError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("level `{0}` already exists")]
    DuplicateLevel(String),
    #[error("level name must contain at least one non-whitespace character")]
    EmptyLevel,
    #[error("presenter is no longer running")]
    PresenterClosed,
}

/// Non-fatal findings produced while merging options or settings.
///
/// Diagnostics never stop processing: the offending key is ignored and the
/// rest of the request goes through.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Diagnostic {
    #[error("unrecognized option `{0}` ignored")]
    UnknownOption(String),
    #[error("unrecognized setting `{0}` ignored")]
    UnknownSetting(String),
    #[error("invalid value for `{key}`: {reason}")]
    InvalidValue { key: String, reason: String },
    #[error("unknown level `{0}`; keeping the default")]
    UnknownLevel(String),
}

impl Diagnostic {
    pub fn invalid(key: &str, reason: impl Into<String>) -> Self {
        Diagnostic::InvalidValue {
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}
