pub mod log;
pub mod recording;

#[cfg(all(unix, not(target_os = "macos")))]
pub mod desktop;

use async_trait::async_trait;
use postette_shared::{Level, Record, RecordId, Settings};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("renderer unavailable: {0}")]
    Unavailable(String),
    #[error("render failed: {0}")]
    Failed(String),
}

/// Outcome of [`Renderer::attach`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attachment {
    Ready,
    /// The surface will announce readiness with [`RendererEvent::Ready`].
    Pending,
}

/// Events a renderer raises towards the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RendererEvent {
    Ready,
    DismissRequested,
    TransitionSettled,
    ClickAway,
}

/// Sending half handed to a renderer on attach.
#[derive(Debug, Clone)]
pub struct RendererEvents {
    tx: mpsc::UnboundedSender<RendererEvent>,
}

impl RendererEvents {
    pub fn new(tx: mpsc::UnboundedSender<RendererEvent>) -> Self {
        Self { tx }
    }

    pub fn emit(&self, event: RendererEvent) {
        if self.tx.send(event).is_err() {
            debug!(?event, "renderer event dropped; presenter stopped");
        }
    }
}

/// Placement of the notification surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    pub top: String,
    pub downwards: bool,
    pub parent: Option<String>,
    pub z_index: u32,
    pub z_index_log: u32,
    pub click_away: bool,
}

impl From<&Settings> for Layout {
    fn from(settings: &Settings) -> Self {
        Self {
            top: settings.top.clone(),
            downwards: settings.downwards,
            parent: settings.parent.clone(),
            z_index: settings.z_index,
            z_index_log: settings.z_index_log,
            click_away: settings.click_away,
        }
    }
}

/// Content of one notification, ready to draw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendition {
    pub id: RecordId,
    pub level: Level,
    pub prefix: Option<String>,
    pub lines: Vec<String>,
    pub integrated: bool,
    pub persist: bool,
}

impl Rendition {
    pub fn new(record: &Record, settings: &Settings, integrated: bool) -> Self {
        let prefix = (settings.prefix && record.level.is_prefixed()).then(|| {
            let name = record.level.as_str();
            let mut chars = name.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        });
        Self {
            id: record.id,
            level: record.level.clone(),
            prefix,
            lines: record.lines().map(str::to_string).collect(),
            integrated,
            persist: record.pause.is_persist(),
        }
    }

    /// Single-string form: `"Error: first line\nsecond line"`.
    pub fn text(&self) -> String {
        let body = self.lines.join("\n");
        match &self.prefix {
            Some(prefix) => format!("{prefix}: {body}"),
            None => body,
        }
    }
}

/// Presentation flags of the surface.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VisualState {
    pub active: bool,
    pub integrated: bool,
    pub persist: bool,
    /// Content is being replaced in place.
    pub updating: bool,
    /// Content was replaced in place at least once.
    pub updated: bool,
}

/// Surface that draws notifications.
///
/// Calls arrive from the presenter task only, one at a time.
#[async_trait]
pub trait Renderer: Send {
    async fn attach(
        &mut self,
        layout: &Layout,
        events: RendererEvents,
    ) -> Result<Attachment, RenderError>;
    async fn render(&mut self, rendition: &Rendition) -> Result<(), RenderError>;
    async fn set_visual_state(&mut self, state: VisualState) -> Result<(), RenderError>;
    /// Removes displayed content; the surface stays attached.
    async fn teardown(&mut self) -> Result<(), RenderError>;
    /// Whether `selector` currently matches something obscuring the surface.
    fn is_obstructed(&self, selector: &str) -> bool;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum RendererKind {
    #[default]
    Log,
    Desktop,
}

/// Renderer for `kind`, falling back to log output where desktop
/// notifications are not supported.
pub fn from_kind(kind: RendererKind) -> Box<dyn Renderer> {
    match kind {
        RendererKind::Log => Box::new(log::LogRenderer::new()),
        #[cfg(all(unix, not(target_os = "macos")))]
        RendererKind::Desktop => Box::new(desktop::DesktopRenderer::new()),
        #[cfg(not(all(unix, not(target_os = "macos"))))]
        RendererKind::Desktop => {
            tracing::warn!("desktop notifications are not supported here; using log renderer");
            Box::new(log::LogRenderer::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use chrono::Utc;
    use postette_shared::{Delay, Integrate, Pause};

    use super::*;

    fn record(level: Level, message: &str) -> Record {
        Record {
            id: RecordId(7),
            user: "u".into(),
            message: message.into(),
            created: Utc::now(),
            created_at: Instant::now(),
            level,
            href: "/".into(),
            pause: Pause::Persist,
            delay: Delay::Immediate,
            integrate: Integrate::Auto,
            once: false,
        }
    }

    #[test]
    fn rendition_prefixes_selected_levels() {
        let settings = Settings::default();
        let error = Rendition::new(&record(Level::Error, "disk full\nretrying"), &settings, true);
        assert_eq!(error.text(), "Error: disk full\nretrying");
        assert_eq!(error.lines.len(), 2);
        assert!(error.persist && error.integrated);

        let alert = Rendition::new(&record(Level::Alert, "hello"), &settings, false);
        assert_eq!(alert.text(), "hello");
    }

    #[test]
    fn prefix_can_be_disabled() {
        let settings = Settings {
            prefix: false,
            ..Settings::default()
        };
        let success = Rendition::new(&record(Level::Success, "saved"), &settings, false);
        assert_eq!(success.prefix, None);
    }
}
