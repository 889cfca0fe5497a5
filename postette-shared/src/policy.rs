//! Admission and presentation decisions. Both are pure functions of their
//! inputs; the scheduler supplies current state on every call.

use crate::domain::{Level, Record};
use crate::settings::Settings;

/// Whether `candidate` reiterates something already showing or waiting.
///
/// The candidate is compared with the current record (or, with nothing
/// current, the most recently queued one) and then with every queued record.
/// Always `false` while `reiterate` is enabled.
pub fn is_duplicate<'a>(
    settings: &Settings,
    candidate: &Record,
    current: Option<&Record>,
    queued: impl IntoIterator<Item = &'a Record>,
) -> bool {
    if settings.reiterate {
        return false;
    }
    let mut queued = queued.into_iter().peekable();
    let reference = current.or_else(|| queued.peek().copied());
    if reference.is_some_and(|r| r.same_profile(candidate)) {
        return true;
    }
    queued.any(|r| r.same_profile(candidate))
}

/// Integrated or detached presentation for `record`.
///
/// An empty message is always detached. Past that, a forced record override
/// wins, then a forced global override. Otherwise
/// only important messages (errors, or longer than `tldr`) integrate, and
/// only when `obstructed` reports no configured modal selector as live.
pub fn should_integrate(
    record: &Record,
    settings: &Settings,
    obstructed: impl Fn(&str) -> bool,
) -> bool {
    if record.message.is_empty() {
        return false;
    }
    if let Some(forced) = record.integrate.forced() {
        return forced;
    }
    if let Some(forced) = settings.integration.forced() {
        return forced;
    }
    let important = record.level == Level::Error || record.char_len() > settings.tldr;
    important && !settings.modal_selectors.iter().any(|s| obstructed(s))
}
