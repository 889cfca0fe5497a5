use async_trait::async_trait;
use postette_shared::Level;
use tracing::{debug, info, warn};

use super::log::log_rendition;
use super::{Attachment, Layout, RenderError, Renderer, RendererEvents, Rendition, VisualState};

const APP_NAME: &str = "Postette";

#[derive(Debug)]
pub enum RendererMode {
    NotifyRust,
    LogOnly,
}

/// Desktop notifications through the freedesktop notification service.
///
/// Every notification reuses one replace id, so the desktop shows at most
/// one postette bubble at a time.
#[derive(Debug)]
pub struct DesktopRenderer {
    mode: RendererMode,
    replace_id: u32,
    handle: Option<notify_rust::NotificationHandle>,
}

impl Default for DesktopRenderer {
    fn default() -> Self {
        Self::new()
    }
}

fn urgency(level: &Level) -> notify_rust::Urgency {
    match level {
        Level::Error => notify_rust::Urgency::Critical,
        Level::Warning => notify_rust::Urgency::Normal,
        _ => notify_rust::Urgency::Low,
    }
}

impl DesktopRenderer {
    pub fn new() -> Self {
        // Start optimistic; the first failed show downgrades to LogOnly.
        let s = Self {
            mode: RendererMode::NotifyRust,
            replace_id: 1001u32,
            handle: None,
        };
        debug!("DesktopRenderer created: using notify-rust backend initially");
        s
    }

    async fn show(&mut self, rendition: &Rendition) {
        match self.mode {
            RendererMode::NotifyRust => {
                debug!(
                    id = rendition.id.0,
                    replace_id = self.replace_id,
                    "show: building notification"
                );
                let summary = rendition
                    .prefix
                    .clone()
                    .unwrap_or_else(|| APP_NAME.to_string());
                let mut n = notify_rust::Notification::new();
                let res = n
                    .appname(APP_NAME)
                    .summary(&summary)
                    .body(&rendition.lines.join("\n"))
                    .id(self.replace_id)
                    .urgency(urgency(&rendition.level))
                    .timeout(notify_rust::Timeout::Never)
                    .show_async()
                    .await;
                match res {
                    Ok(handle) => {
                        debug!(id = rendition.id.0, "show: notification shown");
                        self.handle = Some(handle);
                    }
                    Err(e) => {
                        warn!(error=%e, "notify-rust failed; downgrading to LogOnly renderer");
                        self.mode = RendererMode::LogOnly;
                        self.handle = None;
                        log_rendition(rendition);
                    }
                }
            }
            RendererMode::LogOnly => log_rendition(rendition),
        }
    }

    async fn close(&mut self) {
        match self.mode {
            RendererMode::NotifyRust => {
                if self.handle.take().is_some() {
                    debug!("close: replacing with short-timeout notification");
                    let mut n = notify_rust::Notification::new();
                    // Replace the bubble with one that expires right away.
                    let _ = n
                        .appname(APP_NAME)
                        .summary(APP_NAME)
                        .id(self.replace_id)
                        .urgency(notify_rust::Urgency::Low)
                        .timeout(notify_rust::Timeout::Milliseconds(1))
                        .show_async()
                        .await;
                }
            }
            RendererMode::LogOnly => {}
        }
    }
}

#[async_trait]
impl Renderer for DesktopRenderer {
    async fn attach(
        &mut self,
        layout: &Layout,
        _events: RendererEvents,
    ) -> Result<Attachment, RenderError> {
        if layout.parent.is_some() {
            info!("desktop notifications ignore the parent container setting");
        }
        Ok(Attachment::Ready)
    }

    async fn render(&mut self, rendition: &Rendition) -> Result<(), RenderError> {
        self.show(rendition).await;
        Ok(())
    }

    async fn set_visual_state(&mut self, state: VisualState) -> Result<(), RenderError> {
        if !state.active {
            self.close().await;
        }
        Ok(())
    }

    async fn teardown(&mut self) -> Result<(), RenderError> {
        self.close().await;
        Ok(())
    }

    fn is_obstructed(&self, _selector: &str) -> bool {
        false
    }
}
