//! Symbolic durations and their resolution to milliseconds.

use std::convert::Infallible;
use std::str::FromStr;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;

use crate::domain::{Delay, Pause};

/// Lowest per-character reading factor accepted, in milliseconds.
pub const MIN_PER_CHARACTER_FACTOR: u64 = 10;

/// Millisecond constants backing the named spans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Timings {
    /// Floor for usurping updates and negative delays.
    pub immediate: u64,
    /// Floor for regular delays and pauses.
    pub minimal: u64,
    pub brief: u64,
    pub moderate: u64,
    pub ample: u64,
    /// Stand-in duration for a persisting notification.
    pub persisting: u64,
    /// Hide/update transition window.
    pub transition: u64,
    pub per_character_factor: u64,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            immediate: 300,
            minimal: 400,
            brief: 2_000,
            moderate: 3_000,
            ample: 8_000,
            persisting: 60 * 60 * 1_000,
            transition: 300,
            per_character_factor: 100,
        }
    }
}

/// A duration as requested by a caller, before resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimeTerm {
    /// Literal milliseconds; negative values mean "immediate".
    Millis(i64),
    Immediate,
    Brief,
    Moderate,
    Ample,
    Persist,
    /// Reading time estimated from the message length.
    Compute,
    /// The longer of [`TimeTerm::Moderate`] and [`TimeTerm::Compute`].
    Reading,
}

impl FromStr for TimeTerm {
    type Err = Infallible;

    /// Never fails: anything unrecognized falls back to [`TimeTerm::Compute`].
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let term = s.trim().to_ascii_lowercase();
        if let Ok(ms) = term.parse::<i64>() {
            return Ok(TimeTerm::Millis(ms));
        }
        Ok(match term.as_str() {
            "immediate" | "update" | "stop" => TimeTerm::Immediate,
            "brief" => TimeTerm::Brief,
            "moderate" => TimeTerm::Moderate,
            "ample" => TimeTerm::Ample,
            "reading" => TimeTerm::Reading,
            t if t == "persist" || t.starts_with("infini") || t.starts_with("spin") => {
                TimeTerm::Persist
            }
            _ => TimeTerm::Compute,
        })
    }
}

impl TimeTerm {
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f.round() as i64))
                .map(TimeTerm::Millis),
            Value::String(s) => s.parse().ok(),
            _ => None,
        }
    }
}

impl From<u64> for TimeTerm {
    fn from(value: u64) -> Self {
        TimeTerm::Millis(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

#[derive(Debug, Clone, Default)]
pub struct TimeResolver {
    timings: Timings,
}

impl TimeResolver {
    pub fn new(timings: Timings) -> Self {
        Self { timings }
    }

    pub fn timings(&self) -> &Timings {
        &self.timings
    }

    pub fn immediate(&self) -> Duration {
        Duration::from_millis(self.timings.immediate)
    }

    pub fn minimal(&self) -> Duration {
        Duration::from_millis(self.timings.minimal)
    }

    pub fn transition(&self) -> Duration {
        Duration::from_millis(self.timings.transition)
    }

    /// Sets the reading factor, clamping values under
    /// [`MIN_PER_CHARACTER_FACTOR`]. Returns the factor now in force.
    pub fn set_per_character_factor(&mut self, ms: u64) -> u64 {
        self.timings.per_character_factor = ms.max(MIN_PER_CHARACTER_FACTOR);
        self.timings.per_character_factor
    }

    pub fn resolve(&self, term: &TimeTerm, message: Option<&str>) -> Duration {
        Duration::from_millis(self.resolve_millis(term, message))
    }

    pub fn resolve_millis(&self, term: &TimeTerm, message: Option<&str>) -> u64 {
        let t = &self.timings;
        match term {
            TimeTerm::Millis(ms) if *ms < 0 => t.immediate,
            TimeTerm::Millis(ms) => t.immediate.max(ms.unsigned_abs()),
            TimeTerm::Immediate => t.immediate,
            TimeTerm::Brief => t.brief,
            TimeTerm::Moderate => t.moderate,
            TimeTerm::Ample => t.ample,
            TimeTerm::Persist => t.persisting,
            TimeTerm::Compute => self.compute(message),
            TimeTerm::Reading => self.compute(message).max(t.moderate),
        }
    }

    /// Reading-time estimate: `max(brief, chars × factor)`, or the moderate
    /// span when there is nothing to read.
    pub fn compute(&self, message: Option<&str>) -> u64 {
        match message {
            Some(m) if !m.is_empty() => {
                let chars = m.chars().count() as u64;
                self.timings
                    .brief
                    .max(chars.saturating_mul(self.timings.per_character_factor))
            }
            _ => self.timings.moderate,
        }
    }

    /// Pause for a record; anything but the persist sentinel is floored at
    /// the minimal span.
    pub fn pause(&self, term: &TimeTerm, message: &str) -> Pause {
        let minimal = self.timings.minimal;
        match term {
            TimeTerm::Persist => Pause::Persist,
            TimeTerm::Millis(ms) => Pause::Millis(minimal.max((*ms).max(0).unsigned_abs())),
            TimeTerm::Immediate => Pause::Millis(minimal),
            other => Pause::Millis(minimal.max(self.resolve_millis(other, Some(message)))),
        }
    }

    /// Delay for a record; negative literals and the immediate term keep the
    /// sentinel, everything else is floored at the minimal span.
    pub fn delay(&self, term: &TimeTerm, message: &str) -> Delay {
        let minimal = self.timings.minimal;
        match term {
            TimeTerm::Immediate => Delay::Immediate,
            TimeTerm::Millis(ms) if *ms < 0 => Delay::Immediate,
            TimeTerm::Millis(ms) => Delay::Millis(minimal.max(ms.unsigned_abs())),
            other => Delay::Millis(minimal.max(self.resolve_millis(other, Some(message)))),
        }
    }

    /// Wait actually applied before showing a record that may have spent
    /// `waited` in the queue. Nominal delays above the minimal span are
    /// reduced by the time already waited, never below the minimal span.
    pub fn effective_delay(&self, delay: Delay, waited: Duration) -> Duration {
        match delay {
            Delay::Immediate => self.immediate(),
            Delay::Millis(ms) => {
                let nominal = Duration::from_millis(ms);
                let minimal = self.minimal();
                if nominal > minimal {
                    nominal.saturating_sub(waited).max(minimal)
                } else {
                    nominal
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_and_named_terms_resolve() {
        let resolver = TimeResolver::default();
        assert_eq!(resolver.resolve_millis(&TimeTerm::Millis(5000), None), 5000);
        assert_eq!(resolver.resolve_millis(&TimeTerm::Millis(-1), None), 300);
        assert_eq!(resolver.resolve_millis(&TimeTerm::Millis(10), None), 300);
        assert_eq!(resolver.resolve_millis(&TimeTerm::Brief, None), 2000);
        assert_eq!(resolver.resolve_millis(&TimeTerm::Moderate, None), 3000);
        assert_eq!(resolver.resolve_millis(&TimeTerm::Ample, None), 8000);
        assert_eq!(
            resolver.resolve_millis(&TimeTerm::Persist, None),
            60 * 60 * 1000
        );
    }

    #[test]
    fn compute_scales_with_message_length() {
        let resolver = TimeResolver::default();
        let fifty = "x".repeat(50);
        assert_eq!(resolver.resolve_millis(&TimeTerm::Compute, Some(&fifty)), 5000);
        assert_eq!(resolver.resolve_millis(&TimeTerm::Compute, Some("hi")), 2000);
        assert_eq!(resolver.resolve_millis(&TimeTerm::Compute, Some("")), 3000);
        assert_eq!(resolver.resolve_millis(&TimeTerm::Compute, None), 3000);
    }

    #[test]
    fn compute_counts_characters_not_bytes() {
        let resolver = TimeResolver::default();
        let accented = "é".repeat(30);
        assert_eq!(resolver.compute(Some(&accented)), 3000);
    }

    #[test]
    fn reading_never_drops_below_moderate() {
        let resolver = TimeResolver::default();
        assert_eq!(resolver.resolve_millis(&TimeTerm::Reading, Some("ok")), 3000);
        let long = "y".repeat(80);
        assert_eq!(resolver.resolve_millis(&TimeTerm::Reading, Some(&long)), 8000);
    }

    #[test]
    fn per_character_factor_is_clamped() {
        let mut resolver = TimeResolver::default();
        assert_eq!(resolver.set_per_character_factor(3), MIN_PER_CHARACTER_FACTOR);
        assert_eq!(resolver.set_per_character_factor(250), 250);
        let ten = "z".repeat(10);
        assert_eq!(resolver.compute(Some(&ten)), 2500);
    }

    #[test]
    fn terms_parse_from_strings() {
        let parse = |s: &str| s.parse::<TimeTerm>().unwrap();
        assert_eq!(parse("1500"), TimeTerm::Millis(1500));
        assert_eq!(parse("-1"), TimeTerm::Millis(-1));
        assert_eq!(parse("Ample"), TimeTerm::Ample);
        assert_eq!(parse("stop"), TimeTerm::Immediate);
        assert_eq!(parse("infinite"), TimeTerm::Persist);
        assert_eq!(parse("spinner"), TimeTerm::Persist);
        assert_eq!(parse("whenever"), TimeTerm::Compute);
    }

    #[test]
    fn terms_parse_from_json() {
        assert_eq!(TimeTerm::from_json(&Value::from(250)), Some(TimeTerm::Millis(250)));
        assert_eq!(TimeTerm::from_json(&Value::from(2.6)), Some(TimeTerm::Millis(3)));
        assert_eq!(TimeTerm::from_json(&Value::from("brief")), Some(TimeTerm::Brief));
        assert_eq!(TimeTerm::from_json(&Value::from(true)), None);
    }

    #[test]
    fn pause_and_delay_are_floored() {
        let resolver = TimeResolver::default();
        assert_eq!(resolver.pause(&TimeTerm::Millis(50), "m"), Pause::Millis(400));
        assert_eq!(resolver.pause(&TimeTerm::Millis(-5), "m"), Pause::Millis(400));
        assert_eq!(resolver.pause(&TimeTerm::Persist, "m"), Pause::Persist);
        assert_eq!(resolver.pause(&TimeTerm::Ample, "m"), Pause::Millis(8000));
        assert_eq!(resolver.delay(&TimeTerm::Millis(-1), "m"), Delay::Immediate);
        assert_eq!(resolver.delay(&TimeTerm::Millis(0), "m"), Delay::Millis(400));
        assert_eq!(resolver.delay(&TimeTerm::Millis(900), "m"), Delay::Millis(900));
        assert_eq!(resolver.delay(&TimeTerm::Immediate, "m"), Delay::Immediate);
    }

    #[test]
    fn queued_wait_shortens_long_delays() {
        let resolver = TimeResolver::default();
        let delay = Delay::Millis(2000);
        assert_eq!(
            resolver.effective_delay(delay, Duration::from_millis(500)),
            Duration::from_millis(1500)
        );
        assert_eq!(
            resolver.effective_delay(delay, Duration::from_secs(10)),
            Duration::from_millis(400)
        );
        assert_eq!(
            resolver.effective_delay(Delay::Millis(400), Duration::from_secs(10)),
            Duration::from_millis(400)
        );
        assert_eq!(
            resolver.effective_delay(Delay::Immediate, Duration::ZERO),
            Duration::from_millis(300)
        );
    }
}
