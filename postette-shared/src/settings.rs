//! Presenter configuration and its validated partial updates.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::domain::Integrate;
use crate::error::Diagnostic;

/// Highest z-index a renderer is asked to use.
pub const ZMAX: u32 = 2_147_483_647;

const CSS_UNITS: [&str; 13] = [
    "px", "mm", "cm", "in", "pt", "pc", "em", "ex", "ch", "rem", "vw", "vh", "%",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Settings {
    /// Mirror every accepted message to the log sink.
    pub echo: bool,
    /// Log every state transition.
    pub trace: bool,
    /// Accept duplicates of the current or queued message.
    pub reiterate: bool,
    /// Show the level name in front of error, warning and success messages.
    pub prefix: bool,
    pub integration: Integrate,
    /// Messages longer than this many characters count as important.
    pub tldr: usize,
    pub modal_selectors: Vec<String>,
    pub z_index: u32,
    pub z_index_log: u32,
    pub top: String,
    pub downwards: bool,
    pub parent: Option<String>,
    pub click_away: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            echo: false,
            trace: false,
            reiterate: false,
            prefix: true,
            integration: Integrate::Auto,
            tldr: 72,
            modal_selectors: vec!["[id^=modal].active".to_string()],
            z_index: ZMAX - 100,
            z_index_log: ZMAX - 500,
            top: "50px".to_string(),
            downwards: true,
            parent: None,
            click_away: true,
        }
    }
}

impl Settings {
    /// Applies every field the patch carries.
    pub fn merge(&mut self, patch: SettingsPatch) {
        if let Some(v) = patch.echo {
            self.echo = v;
        }
        if let Some(v) = patch.trace {
            self.trace = v;
        }
        if let Some(v) = patch.reiterate {
            self.reiterate = v;
        }
        if let Some(v) = patch.prefix {
            self.prefix = v;
        }
        if let Some(v) = patch.integration {
            self.integration = v;
        }
        if let Some(v) = patch.tldr {
            self.tldr = v;
        }
        if let Some(v) = patch.modal_selectors {
            self.modal_selectors = v;
        }
        if let Some(v) = patch.z_index {
            self.z_index = v;
        }
        if let Some(v) = patch.z_index_log {
            self.z_index_log = v;
        }
        if let Some(v) = patch.top {
            self.top = v;
        }
        if let Some(v) = patch.downwards {
            self.downwards = v;
        }
        if let Some(v) = patch.parent {
            self.parent = v;
        }
        if let Some(v) = patch.click_away {
            self.click_away = v;
        }
    }

    /// Appends a selector unless it is already configured. Returns whether
    /// the list changed.
    pub fn add_modal_selector(&mut self, selector: &str) -> bool {
        let selector = selector.trim();
        if selector.is_empty() || self.modal_selectors.iter().any(|s| s == selector) {
            return false;
        }
        self.modal_selectors.push(selector.to_string());
        true
    }
}

/// A partial settings update. `None` leaves the current value alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettingsPatch {
    pub echo: Option<bool>,
    pub trace: Option<bool>,
    pub reiterate: Option<bool>,
    pub prefix: Option<bool>,
    pub integration: Option<Integrate>,
    pub tldr: Option<usize>,
    pub modal_selectors: Option<Vec<String>>,
    pub z_index: Option<u32>,
    pub z_index_log: Option<u32>,
    pub top: Option<String>,
    pub downwards: Option<bool>,
    pub parent: Option<Option<String>>,
    pub click_away: Option<bool>,
}

fn normalize_key(key: &str) -> String {
    key.chars()
        .filter(|c| *c != '_' && *c != '-')
        .flat_map(char::to_lowercase)
        .collect()
}

fn bool_value(key: &str, value: &Value, diagnostics: &mut Vec<Diagnostic>) -> Option<bool> {
    let parsed = value.as_bool();
    if parsed.is_none() {
        diagnostics.push(Diagnostic::invalid(key, "expected a boolean"));
    }
    parsed
}

fn positive_value(key: &str, value: &Value, diagnostics: &mut Vec<Diagnostic>) -> Option<u64> {
    match value.as_u64() {
        Some(n) if n > 0 => Some(n),
        _ => {
            diagnostics.push(Diagnostic::invalid(key, "expected a positive integer"));
            None
        }
    }
}

fn z_index_value(key: &str, value: &Value, diagnostics: &mut Vec<Diagnostic>) -> Option<u32> {
    positive_value(key, value, diagnostics).map(|n| u32::try_from(n).unwrap_or(ZMAX).min(ZMAX))
}

fn top_value(key: &str, value: &Value, diagnostics: &mut Vec<Diagnostic>) -> Option<String> {
    match value {
        Value::Number(n) if n.as_i64().is_some() => Some(format!("{n}px")),
        Value::String(s) => {
            let s = s.trim();
            let has_unit = CSS_UNITS.iter().any(|unit| {
                s.strip_suffix(unit)
                    .is_some_and(|num| !num.is_empty() && num.trim().parse::<f64>().is_ok())
            });
            if has_unit {
                Some(s.to_string())
            } else {
                diagnostics.push(Diagnostic::invalid(key, "expected a length with a CSS unit"));
                None
            }
        }
        _ => {
            diagnostics.push(Diagnostic::invalid(key, "expected a length"));
            None
        }
    }
}

fn selectors_value(
    key: &str,
    value: &Value,
    diagnostics: &mut Vec<Diagnostic>,
) -> Option<Vec<String>> {
    match value {
        Value::String(s) => Some(vec![s.clone()]),
        Value::Array(items) => {
            let selectors: Option<Vec<String>> = items
                .iter()
                .map(|item| item.as_str().map(str::to_string))
                .collect();
            if selectors.is_none() {
                diagnostics.push(Diagnostic::invalid(key, "every selector must be a string"));
            }
            selectors
        }
        _ => {
            diagnostics.push(Diagnostic::invalid(key, "expected a selector or a list of them"));
            None
        }
    }
}

impl SettingsPatch {
    /// Builds a patch from loosely typed input. Keys are matched ignoring
    /// case, `_` and `-`; offending entries are skipped and reported.
    pub fn from_map(map: &Map<String, Value>) -> (Self, Vec<Diagnostic>) {
        let mut patch = Self::default();
        let mut diagnostics = Vec::new();
        let diags = &mut diagnostics;
        for (key, value) in map {
            match normalize_key(key).as_str() {
                "echo" => patch.echo = bool_value(key, value, diags),
                "trace" => patch.trace = bool_value(key, value, diags),
                "reiterate" => patch.reiterate = bool_value(key, value, diags),
                "prefix" => patch.prefix = bool_value(key, value, diags),
                "downwards" => patch.downwards = bool_value(key, value, diags),
                "clickaway" => patch.click_away = bool_value(key, value, diags),
                "integration" | "integrate" => {
                    patch.integration = Integrate::from_json(value);
                    if patch.integration.is_none() {
                        diags.push(Diagnostic::invalid(key, "expected true, false or auto"));
                    }
                }
                "tldr" => {
                    patch.tldr = positive_value(key, value, diags)
                        .map(|n| usize::try_from(n).unwrap_or(usize::MAX));
                }
                "zindex" => patch.z_index = z_index_value(key, value, diags),
                "zindexlog" => patch.z_index_log = z_index_value(key, value, diags),
                "top" => patch.top = top_value(key, value, diags),
                "modalselector" | "modalselectors" => {
                    patch.modal_selectors = selectors_value(key, value, diags);
                }
                "parent" => match value {
                    Value::Null => patch.parent = Some(None),
                    Value::String(s) => patch.parent = Some(Some(s.clone())),
                    _ => diags.push(Diagnostic::invalid(key, "expected a container name or null")),
                },
                _ => diags.push(Diagnostic::UnknownSetting(key.clone())),
            }
        }
        (patch, diagnostics)
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
