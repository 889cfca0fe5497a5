//! Per-notification options and the permissive parser that feeds them.

use serde_json::{Map, Value};

use crate::domain::{Integrate, Level};
use crate::error::{Diagnostic, ToastError};
use crate::time::TimeTerm;

/// Options accepted alongside a message.
///
/// Every field is optional; the record factory fills in defaults. Parsing from
/// loosely typed input collects [`Diagnostic`]s instead of failing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToastOptions {
    pub level: Option<String>,
    pub pause: Option<TimeTerm>,
    pub delay: Option<TimeTerm>,
    pub integrate: Option<Integrate>,
    pub once: Option<bool>,
    pub diagnostics: Vec<Diagnostic>,
}

impl ToastOptions {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn level(mut self, level: impl Into<String>) -> Self {
        self.level = Some(level.into());
        self
    }

    #[must_use]
    pub fn pause(mut self, pause: impl Into<TimeTerm>) -> Self {
        self.pause = Some(pause.into());
        self
    }

    #[must_use]
    pub fn delay(mut self, delay: impl Into<TimeTerm>) -> Self {
        self.delay = Some(delay.into());
        self
    }

    #[must_use]
    pub fn integrate(mut self, integrate: Integrate) -> Self {
        self.integrate = Some(integrate);
        self
    }

    #[must_use]
    pub fn once(mut self, once: bool) -> Self {
        self.once = Some(once);
        self
    }

    /// Reads options from a JSON object. Keys are matched case-insensitively;
    /// unknown keys and unusable values become diagnostics.
    pub fn from_map(map: &Map<String, Value>) -> Self {
        let mut options = Self::default();
        for (key, value) in map {
            match key.to_ascii_lowercase().as_str() {
                "level" => match value.as_str() {
                    Some(level) => options.level = Some(level.to_string()),
                    None => options
                        .diagnostics
                        .push(Diagnostic::invalid(key, "expected a level name")),
                },
                "pause" => match TimeTerm::from_json(value) {
                    Some(term) => options.pause = Some(term),
                    None => options
                        .diagnostics
                        .push(Diagnostic::invalid(key, "expected milliseconds or a span name")),
                },
                "delay" => match TimeTerm::from_json(value) {
                    Some(term) => options.delay = Some(term),
                    None => options
                        .diagnostics
                        .push(Diagnostic::invalid(key, "expected milliseconds or a span name")),
                },
                "integrate" => match Integrate::from_json(value) {
                    Some(integrate) => options.integrate = Some(integrate),
                    None => options
                        .diagnostics
                        .push(Diagnostic::invalid(key, "expected true, false or auto")),
                },
                "once" => match value.as_bool() {
                    Some(once) => options.once = Some(once),
                    None => options
                        .diagnostics
                        .push(Diagnostic::invalid(key, "expected a boolean")),
                },
                "callback" => options.diagnostics.push(Diagnostic::invalid(
                    key,
                    "callbacks can only be attached through the API",
                )),
                _ => options
                    .diagnostics
                    .push(Diagnostic::UnknownOption(key.clone())),
            }
        }
        options
    }
}

/// Convenience operations with preset options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shortcut {
    Alert,
    Error,
    Warning,
    Success,
    /// Held until updated or dismissed (a "spinner").
    Persist,
    /// Replaces the active notification in place.
    Update,
}

impl Shortcut {
    pub fn options(self) -> ToastOptions {
        let reading = ToastOptions::new().pause(TimeTerm::Reading);
        match self {
            Shortcut::Alert => reading.level(Level::Alert.as_str()),
            Shortcut::Error => reading.level(Level::Error.as_str()),
            Shortcut::Warning => reading.level(Level::Warning.as_str()),
            Shortcut::Success => reading.level(Level::Success.as_str()),
            Shortcut::Persist => ToastOptions::new().pause(TimeTerm::Persist),
            Shortcut::Update => reading.delay(TimeTerm::Immediate),
        }
    }
}

/// A message plus its options, as read from an untyped source.
#[derive(Debug, Clone, PartialEq)]
pub struct ToastRequest {
    pub message: String,
    pub options: ToastOptions,
}

impl ToastRequest {
    pub fn from_json(value: Value) -> Result<Self, ToastError> {
        let Value::Object(mut map) = value else {
            return Err(ToastError::InvalidInput(
                "request must be a JSON object".into(),
            ));
        };
        let message = match map.remove("message") {
            Some(Value::String(message)) => message,
            Some(other) => {
                return Err(ToastError::InvalidInput(format!(
                    "message must be a string, got {other}"
                )));
            }
            None => return Err(ToastError::InvalidInput("message is missing".into())),
        };
        Ok(Self {
            message,
            options: ToastOptions::from_map(&map),
        })
    }

    /// Parses one input line: a JSON object, or plain text optionally led by
    /// a built-in level (`"error: disk full"`). Escaped `\n` sequences in
    /// plain text become line breaks.
    pub fn parse_line(line: &str) -> Result<Self, ToastError> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Err(ToastError::InvalidInput("empty line".into()));
        }
        if trimmed.starts_with('{') {
            let value: Value = serde_json::from_str(trimmed)
                .map_err(|e| ToastError::InvalidInput(format!("malformed JSON: {e}")))?;
            return Self::from_json(value);
        }
        let (options, text) = match trimmed.split_once(':') {
            Some((head, rest)) if Level::builtin(&head.trim().to_ascii_lowercase()).is_some() => (
                ToastOptions::new().level(head.trim().to_ascii_lowercase()),
                rest.trim(),
            ),
            _ => (ToastOptions::new(), trimmed),
        };
        Ok(Self {
            message: text.replace("\\n", "\n"),
            options,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unknown_keys_are_diagnosed_not_fatal() {
        let request = ToastRequest::from_json(json!({
            "message": "Saved",
            "level": "success",
            "colour": "green",
        }))
        .unwrap();
        assert_eq!(request.options.level.as_deref(), Some("success"));
        assert_eq!(
            request.options.diagnostics,
            vec![Diagnostic::UnknownOption("colour".into())]
        );
    }

    #[test]
    fn option_keys_match_case_insensitively() {
        let request = ToastRequest::from_json(json!({
            "message": "x",
            "Pause": "ample",
            "DELAY": -1,
            "Integrate": null,
        }))
        .unwrap();
        assert_eq!(request.options.pause, Some(TimeTerm::Ample));
        assert_eq!(request.options.delay, Some(TimeTerm::Millis(-1)));
        assert_eq!(request.options.integrate, Some(Integrate::Auto));
        assert!(request.options.diagnostics.is_empty());
    }

    #[test]
    fn bad_values_are_ignored_with_a_diagnostic() {
        let request = ToastRequest::from_json(json!({
            "message": "x",
            "pause": true,
            "once": "yes",
            "callback": "alert()",
        }))
        .unwrap();
        assert_eq!(request.options.pause, None);
        assert_eq!(request.options.once, None);
        assert_eq!(request.options.diagnostics.len(), 3);
    }

    #[test]
    fn non_string_message_is_invalid_input() {
        assert!(matches!(
            ToastRequest::from_json(json!({ "message": 42 })),
            Err(ToastError::InvalidInput(_))
        ));
        assert!(matches!(
            ToastRequest::from_json(json!({ "level": "error" })),
            Err(ToastError::InvalidInput(_))
        ));
        assert!(matches!(
            ToastRequest::from_json(json!(["message"])),
            Err(ToastError::InvalidInput(_))
        ));
    }

    #[test]
    fn plain_lines_take_an_optional_level_prefix() {
        let request = ToastRequest::parse_line("Error: disk full").unwrap();
        assert_eq!(request.message, "disk full");
        assert_eq!(request.options.level.as_deref(), Some("error"));

        let request = ToastRequest::parse_line("note: not a level").unwrap();
        assert_eq!(request.message, "note: not a level");
        assert_eq!(request.options.level, None);

        let request = ToastRequest::parse_line("first\\nsecond").unwrap();
        assert_eq!(request.message, "first\nsecond");
    }

    #[test]
    fn json_lines_are_parsed_as_requests() {
        let request =
            ToastRequest::parse_line(r#"{"message":"Upload done","level":"success"}"#).unwrap();
        assert_eq!(request.message, "Upload done");
        assert!(ToastRequest::parse_line("{not json").is_err());
        assert!(ToastRequest::parse_line("   ").is_err());
    }

    #[test]
    fn shortcuts_preset_pause_and_delay() {
        let persist = Shortcut::Persist.options();
        assert_eq!(persist.pause, Some(TimeTerm::Persist));
        assert_eq!(persist.level, None);

        let update = Shortcut::Update.options();
        assert_eq!(update.delay, Some(TimeTerm::Immediate));
        assert_eq!(update.pause, Some(TimeTerm::Reading));

        assert_eq!(Shortcut::Error.options().level.as_deref(), Some("error"));
    }
}
