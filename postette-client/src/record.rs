use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use postette_shared::{
    Delay, Diagnostic, Integrate, Level, LevelRegistry, Record, RecordId, TimeResolver, TimeTerm,
    ToastOptions,
};

static NEXT_RECORD_ID: AtomicU64 = AtomicU64::new(1);

fn next_record_id() -> RecordId {
    RecordId(NEXT_RECORD_ID.fetch_add(1, Ordering::Relaxed))
}

/// Where requests come from: the requesting user and the originating
/// location, both stored verbatim on every record.
pub trait Provenance: Send + Sync {
    fn user(&self) -> String;
    fn href(&self) -> String;
}

/// Provenance of the running process: `$USER` (or a generated id) and the
/// working directory.
#[derive(Debug, Clone)]
pub struct SessionProvenance {
    user: String,
    href: String,
}

impl SessionProvenance {
    pub fn detect() -> Self {
        let user = std::env::var("USER")
            .ok()
            .filter(|u| !u.trim().is_empty())
            .unwrap_or_else(|| format!("postette-{}", uuid::Uuid::new_v4()));
        let href = std::env::current_dir()
            .map(|p| p.display().to_string())
            .unwrap_or_default();
        Self { user, href }
    }
}

impl Provenance for SessionProvenance {
    fn user(&self) -> String {
        self.user.clone()
    }

    fn href(&self) -> String {
        self.href.clone()
    }
}

#[derive(Debug, Clone)]
pub struct StaticProvenance {
    pub user: String,
    pub href: String,
}

impl StaticProvenance {
    pub fn new(user: impl Into<String>, href: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            href: href.into(),
        }
    }
}

impl Provenance for StaticProvenance {
    fn user(&self) -> String {
        self.user.clone()
    }

    fn href(&self) -> String {
        self.href.clone()
    }
}

/// Builds records from messages and options, applying defaults and clamps.
pub struct RecordFactory {
    provenance: Box<dyn Provenance>,
    last_created: Option<DateTime<Utc>>,
}

impl RecordFactory {
    pub fn new(provenance: Box<dyn Provenance>) -> Self {
        Self {
            provenance,
            last_created: None,
        }
    }

    /// Wall-clock stamp that never goes backwards within this factory.
    fn stamp(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let created = match self.last_created {
            Some(last) if last > now => last,
            _ => now,
        };
        self.last_created = Some(created);
        created
    }

    pub fn build(
        &mut self,
        message: String,
        options: &ToastOptions,
        levels: &LevelRegistry,
        resolver: &TimeResolver,
    ) -> (Record, Vec<Diagnostic>) {
        let mut diagnostics = options.diagnostics.clone();

        let level = match options.level.as_deref() {
            None => Level::Alert,
            Some(name) => levels.resolve(name).unwrap_or_else(|| {
                diagnostics.push(Diagnostic::UnknownLevel(name.to_string()));
                Level::Alert
            }),
        };
        let pause = resolver.pause(options.pause.as_ref().unwrap_or(&TimeTerm::Moderate), &message);
        let delay = match &options.delay {
            Some(term) => resolver.delay(term, &message),
            None => Delay::Millis(resolver.timings().minimal),
        };

        let record = Record {
            id: next_record_id(),
            user: self.provenance.user(),
            created: self.stamp(),
            created_at: tokio::time::Instant::now().into_std(),
            level,
            href: self.provenance.href(),
            pause,
            delay,
            integrate: options.integrate.unwrap_or(Integrate::Auto),
            once: options.once.unwrap_or(false),
            message,
        };
        (record, diagnostics)
    }
}

#[cfg(test)]
mod tests {
    use postette_shared::Pause;

    use super::*;

    fn factory() -> RecordFactory {
        RecordFactory::new(Box::new(StaticProvenance::new("ops", "/srv/app")))
    }

    #[test]
    fn defaults_apply_without_options() {
        let mut factory = factory();
        let (record, diagnostics) = factory.build(
            "hello".into(),
            &ToastOptions::new(),
            &LevelRegistry::new(),
            &TimeResolver::default(),
        );
        assert!(diagnostics.is_empty());
        assert_eq!(record.level, Level::Alert);
        assert_eq!(record.pause, Pause::Millis(3000));
        assert_eq!(record.delay, Delay::Millis(400));
        assert_eq!(record.integrate, Integrate::Auto);
        assert!(!record.once);
        assert_eq!(record.user, "ops");
        assert_eq!(record.href, "/srv/app");
    }

    #[test]
    fn ids_increase_and_stamps_never_go_back() {
        let mut factory = factory();
        let levels = LevelRegistry::new();
        let resolver = TimeResolver::default();
        let (a, _) = factory.build("a".into(), &ToastOptions::new(), &levels, &resolver);
        let (b, _) = factory.build("b".into(), &ToastOptions::new(), &levels, &resolver);
        assert!(b.id > a.id);
        assert!(b.created >= a.created);
    }

    #[test]
    fn unknown_level_keeps_default_with_diagnostic() {
        let mut factory = factory();
        let (record, diagnostics) = factory.build(
            "x".into(),
            &ToastOptions::new().level("fatal"),
            &LevelRegistry::new(),
            &TimeResolver::default(),
        );
        assert_eq!(record.level, Level::Alert);
        assert_eq!(diagnostics, vec![Diagnostic::UnknownLevel("fatal".into())]);
    }

    #[test]
    fn custom_levels_resolve_once_registered() {
        let mut factory = factory();
        let mut levels = LevelRegistry::new();
        levels.register("notice").unwrap();
        let (record, _) = factory.build(
            "x".into(),
            &ToastOptions::new().level("notice"),
            &levels,
            &TimeResolver::default(),
        );
        assert_eq!(record.level, Level::Custom("notice".into()));
    }

    #[test]
    fn out_of_range_timings_are_clamped() {
        let mut factory = factory();
        let (record, _) = factory.build(
            "x".into(),
            &ToastOptions::new().pause(0u64).delay(TimeTerm::Millis(-20)),
            &LevelRegistry::new(),
            &TimeResolver::default(),
        );
        assert_eq!(record.pause, Pause::Millis(400));
        assert_eq!(record.delay, Delay::Immediate);
    }

    #[test]
    fn session_provenance_has_a_user() {
        assert!(!SessionProvenance::detect().user().is_empty());
    }
}
