use std::fmt;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

use crate::error::ToastError;

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub u64);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Intent of a notification; drives styling on the renderer side.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Level {
    Error,
    Warning,
    Alert,
    Success,
    /// A level registered at runtime through [`LevelRegistry::register`].
    Custom(String),
}

impl Level {
    pub const BUILTIN: [Level; 4] = [Level::Error, Level::Warning, Level::Alert, Level::Success];

    pub fn as_str(&self) -> &str {
        match self {
            Level::Error => "error",
            Level::Warning => "warning",
            Level::Alert => "alert",
            Level::Success => "success",
            Level::Custom(name) => name,
        }
    }

    pub fn builtin(name: &str) -> Option<Level> {
        Self::BUILTIN.into_iter().find(|l| l.as_str() == name)
    }

    /// Levels whose name is shown in front of the message when prefixing is on.
    pub fn is_prefixed(&self) -> bool {
        matches!(self, Level::Error | Level::Warning | Level::Success)
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for Level {
    fn from(value: String) -> Self {
        Level::builtin(&value).unwrap_or(Level::Custom(value))
    }
}

impl From<Level> for String {
    fn from(value: Level) -> Self {
        value.as_str().to_string()
    }
}

/// Built-in levels plus the custom names registered during this process.
#[derive(Debug, Clone, Default)]
pub struct LevelRegistry {
    custom: Vec<String>,
}

impl LevelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resolve(&self, name: &str) -> Option<Level> {
        Level::builtin(name).or_else(|| {
            self.custom
                .iter()
                .find(|c| c.as_str() == name)
                .map(|c| Level::Custom(c.clone()))
        })
    }

    /// Registers a custom level. Whitespace is stripped from `name`; the
    /// result must be non-empty and must not collide with a known level.
    /// Returns every level known after registration.
    pub fn register(&mut self, name: &str) -> Result<Vec<Level>, ToastError> {
        let name: String = name.chars().filter(|c| !c.is_whitespace()).collect();
        if name.is_empty() {
            return Err(ToastError::EmptyLevel);
        }
        if self.resolve(&name).is_some() {
            return Err(ToastError::DuplicateLevel(name));
        }
        self.custom.push(name);
        Ok(self.all())
    }

    pub fn all(&self) -> Vec<Level> {
        Level::BUILTIN
            .into_iter()
            .chain(self.custom.iter().cloned().map(Level::Custom))
            .collect()
    }
}

/// How long a notification stays visible.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Pause {
    /// Visible until superseded by an update or dismissed.
    Persist,
    Millis(u64),
}

impl Pause {
    pub fn is_persist(&self) -> bool {
        matches!(self, Pause::Persist)
    }

    pub fn duration(&self) -> Option<Duration> {
        match self {
            Pause::Persist => None,
            Pause::Millis(ms) => Some(Duration::from_millis(*ms)),
        }
    }
}

/// Wait before a notification becomes visible.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Delay {
    /// Usurp the active notification in place when one is showing.
    Immediate,
    Millis(u64),
}

impl Delay {
    pub fn is_immediate(&self) -> bool {
        matches!(self, Delay::Immediate)
    }
}

/// Tri-state presentation override: forced on, forced off, or left to policy.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum Integrate {
    #[default]
    Auto,
    Always,
    Never,
}

impl Integrate {
    pub fn forced(&self) -> Option<bool> {
        match self {
            Integrate::Auto => None,
            Integrate::Always => Some(true),
            Integrate::Never => Some(false),
        }
    }

    /// Lenient reading of a loosely typed value (`null`, booleans, 0/1,
    /// "auto", "true", ...). Returns `None` when nothing sensible matches.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Null => Some(Integrate::Auto),
            Value::Bool(true) => Some(Integrate::Always),
            Value::Bool(false) => Some(Integrate::Never),
            Value::Number(n) => match n.as_i64() {
                Some(1) => Some(Integrate::Always),
                Some(0) => Some(Integrate::Never),
                _ => None,
            },
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "auto" | "null" => Some(Integrate::Auto),
                "true" | "1" | "always" => Some(Integrate::Always),
                "false" | "0" | "never" => Some(Integrate::Never),
                _ => None,
            },
            _ => None,
        }
    }
}

impl From<bool> for Integrate {
    fn from(value: bool) -> Self {
        if value {
            Integrate::Always
        } else {
            Integrate::Never
        }
    }
}

impl Serialize for Integrate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.forced() {
            Some(forced) => serializer.serialize_bool(forced),
            None => serializer.serialize_none(),
        }
    }
}

/// One requested notification.
///
/// `created` is the wall-clock stamp shown in history; `created_at` is the
/// monotonic instant used to shorten delays for records that waited in queue.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub id: RecordId,
    pub user: String,
    pub message: String,
    pub created: DateTime<Utc>,
    pub created_at: Instant,
    pub level: Level,
    pub href: String,
    pub pause: Pause,
    pub delay: Delay,
    pub integrate: Integrate,
    /// Reserved for cross-session reiteration suppression; stored, not acted on.
    pub once: bool,
}

impl Record {
    /// Two records share a profile when level and message match exactly.
    pub fn same_profile(&self, other: &Record) -> bool {
        self.level == other.level && self.message == other.message
    }

    pub fn char_len(&self) -> usize {
        self.message.chars().count()
    }

    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.message.split('\n')
    }

    pub fn elapsed_at(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.created_at)
    }
}

// History rows as exposed to operators and scripts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntryDto {
    pub id: RecordId,
    pub user: String,
    pub created: String, // RFC3339 UTC
    pub level: Level,
    pub message: String,
    pub href: String,
}

impl From<&Record> for HistoryEntryDto {
    fn from(record: &Record) -> Self {
        Self {
            id: record.id,
            user: record.user.clone(),
            created: record.created.to_rfc3339(),
            level: record.level.clone(),
            message: record.message.clone(),
            href: record.href.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_resolves_builtin_levels() {
        let registry = LevelRegistry::new();
        assert_eq!(registry.resolve("error"), Some(Level::Error));
        assert_eq!(registry.resolve("success"), Some(Level::Success));
        assert_eq!(registry.resolve("Error"), None);
        assert_eq!(registry.resolve("notice"), None);
    }

    #[test]
    fn registry_strips_whitespace_from_custom_levels() {
        let mut registry = LevelRegistry::new();
        let levels = registry.register(" dead line ").unwrap();
        assert_eq!(levels.len(), 5);
        assert_eq!(
            registry.resolve("deadline"),
            Some(Level::Custom("deadline".into()))
        );
    }

    #[test]
    fn registry_rejects_duplicates_and_empty_names() {
        let mut registry = LevelRegistry::new();
        assert!(matches!(
            registry.register("warning"),
            Err(ToastError::DuplicateLevel(name)) if name == "warning"
        ));
        registry.register("notice").unwrap();
        assert!(matches!(
            registry.register("notice"),
            Err(ToastError::DuplicateLevel(_))
        ));
        assert!(matches!(registry.register("  "), Err(ToastError::EmptyLevel)));
    }

    #[test]
    fn level_round_trips_through_strings() {
        assert_eq!(Level::from("alert".to_string()), Level::Alert);
        assert_eq!(
            Level::from("notice".to_string()),
            Level::Custom("notice".into())
        );
        assert_eq!(String::from(Level::Warning), "warning");
    }

    #[test]
    fn integrate_reads_loose_values() {
        assert_eq!(Integrate::from_json(&Value::Null), Some(Integrate::Auto));
        assert_eq!(Integrate::from_json(&Value::from("auto")), Some(Integrate::Auto));
        assert_eq!(Integrate::from_json(&Value::from(true)), Some(Integrate::Always));
        assert_eq!(Integrate::from_json(&Value::from(0)), Some(Integrate::Never));
        assert_eq!(Integrate::from_json(&Value::from("sometimes")), None);
    }

    #[test]
    fn only_error_warning_and_success_are_prefixed() {
        assert!(Level::Error.is_prefixed());
        assert!(Level::Warning.is_prefixed());
        assert!(Level::Success.is_prefixed());
        assert!(!Level::Alert.is_prefixed());
        assert!(!Level::Custom("notice".into()).is_prefixed());
    }
}
