use async_trait::async_trait;
use postette_shared::Level;
use tracing::{debug, error, info, warn};

use super::{
    Attachment, Layout, RenderError, Renderer, RendererEvent, RendererEvents, Rendition,
    VisualState,
};

/// Writes notifications to the tracing sink.
///
/// Has no animation, so in-place updates settle as soon as they start.
#[derive(Debug, Default)]
pub struct LogRenderer {
    events: Option<RendererEvents>,
    shown: bool,
}

impl LogRenderer {
    pub fn new() -> Self {
        Self::default()
    }
}

pub(crate) fn log_rendition(rendition: &Rendition) {
    let text = rendition.text();
    let id = rendition.id.0;
    match rendition.level {
        Level::Error => error!(id, integrated = rendition.integrated, "[TOAST] {text}"),
        Level::Warning => warn!(id, integrated = rendition.integrated, "[TOAST] {text}"),
        _ => info!(
            id,
            level = %rendition.level,
            integrated = rendition.integrated,
            "[TOAST] {text}"
        ),
    }
}

#[async_trait]
impl Renderer for LogRenderer {
    async fn attach(
        &mut self,
        layout: &Layout,
        events: RendererEvents,
    ) -> Result<Attachment, RenderError> {
        debug!(top = %layout.top, downwards = layout.downwards, "log renderer attached");
        self.events = Some(events);
        Ok(Attachment::Ready)
    }

    async fn render(&mut self, rendition: &Rendition) -> Result<(), RenderError> {
        log_rendition(rendition);
        self.shown = true;
        Ok(())
    }

    async fn set_visual_state(&mut self, state: VisualState) -> Result<(), RenderError> {
        debug!(?state, "visual state");
        if state.updating
            && let Some(events) = &self.events
        {
            events.emit(RendererEvent::TransitionSettled);
        }
        Ok(())
    }

    async fn teardown(&mut self) -> Result<(), RenderError> {
        if std::mem::take(&mut self.shown) {
            debug!("log renderer cleared");
        }
        Ok(())
    }

    fn is_obstructed(&self, _selector: &str) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::mpsc;

    use super::*;

    #[tokio::test]
    async fn updates_settle_immediately() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut renderer = LogRenderer::new();
        let attached = renderer
            .attach(&Layout::from(&postette_shared::Settings::default()), RendererEvents::new(tx))
            .await
            .unwrap();
        assert_eq!(attached, Attachment::Ready);

        renderer
            .set_visual_state(VisualState {
                active: true,
                ..VisualState::default()
            })
            .await
            .unwrap();
        assert!(rx.try_recv().is_err());

        renderer
            .set_visual_state(VisualState {
                active: true,
                updating: true,
                ..VisualState::default()
            })
            .await
            .unwrap();
        assert_eq!(rx.try_recv().unwrap(), RendererEvent::TransitionSettled);
    }

    #[test]
    fn nothing_obstructs_the_log() {
        assert!(!LogRenderer::new().is_obstructed("[id^=modal].active"));
    }
}
