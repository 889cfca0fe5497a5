//! In-memory renderer that records every call, for driving the presenter
//! headless and asserting on what it drew.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use postette_shared::RecordId;

use super::{
    Attachment, Layout, RenderError, Renderer, RendererEvent, RendererEvents, Rendition,
    VisualState,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderCall {
    Attach,
    Render(Rendition),
    Visual(VisualState),
    Teardown,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AttachMode {
    #[default]
    Ready,
    Pending,
    /// Fail this many attempts, then report ready.
    Fail(u32),
}

#[derive(Debug, Default)]
struct Shared {
    calls: Vec<RenderCall>,
    attach: AttachMode,
    obstructed: Vec<String>,
    fail_renders: u32,
    events: Option<RendererEvents>,
}

#[derive(Debug)]
pub struct RecordingRenderer {
    shared: Arc<Mutex<Shared>>,
}

/// Inspection and control side of a [`RecordingRenderer`].
#[derive(Debug, Clone)]
pub struct RecordingProbe {
    shared: Arc<Mutex<Shared>>,
}

fn lock(shared: &Mutex<Shared>) -> MutexGuard<'_, Shared> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

impl RecordingRenderer {
    pub fn new() -> (Self, RecordingProbe) {
        Self::with_attach(AttachMode::Ready)
    }

    pub fn with_attach(mode: AttachMode) -> (Self, RecordingProbe) {
        let shared = Arc::new(Mutex::new(Shared {
            attach: mode,
            ..Shared::default()
        }));
        (
            Self {
                shared: shared.clone(),
            },
            RecordingProbe { shared },
        )
    }
}

impl RecordingProbe {
    pub fn calls(&self) -> Vec<RenderCall> {
        lock(&self.shared).calls.clone()
    }

    /// Ids in the order they were drawn.
    pub fn rendered(&self) -> Vec<RecordId> {
        lock(&self.shared)
            .calls
            .iter()
            .filter_map(|c| match c {
                RenderCall::Render(r) => Some(r.id),
                _ => None,
            })
            .collect()
    }

    pub fn last_visual(&self) -> Option<VisualState> {
        lock(&self.shared).calls.iter().rev().find_map(|c| match c {
            RenderCall::Visual(v) => Some(*v),
            _ => None,
        })
    }

    pub fn count(&self, wanted: fn(&RenderCall) -> bool) -> usize {
        lock(&self.shared).calls.iter().filter(|c| wanted(c)).count()
    }

    /// Makes `selector` report a live obstruction.
    pub fn obstruct(&self, selector: &str) {
        lock(&self.shared).obstructed.push(selector.to_string());
    }

    pub fn fail_next_renders(&self, n: u32) {
        lock(&self.shared).fail_renders = n;
    }

    /// Raises `event` as the attached surface would. Returns `false` when
    /// nothing is attached yet.
    pub fn emit(&self, event: RendererEvent) -> bool {
        match &lock(&self.shared).events {
            Some(events) => {
                events.emit(event);
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl Renderer for RecordingRenderer {
    async fn attach(
        &mut self,
        _layout: &Layout,
        events: RendererEvents,
    ) -> Result<Attachment, RenderError> {
        let mut shared = lock(&self.shared);
        shared.calls.push(RenderCall::Attach);
        shared.events = Some(events);
        match shared.attach {
            AttachMode::Ready => Ok(Attachment::Ready),
            AttachMode::Pending => Ok(Attachment::Pending),
            AttachMode::Fail(0) => Ok(Attachment::Ready),
            AttachMode::Fail(n) => {
                shared.attach = AttachMode::Fail(n - 1);
                Err(RenderError::Unavailable("surface not mounted".into()))
            }
        }
    }

    async fn render(&mut self, rendition: &Rendition) -> Result<(), RenderError> {
        let mut shared = lock(&self.shared);
        if shared.fail_renders > 0 {
            shared.fail_renders -= 1;
            return Err(RenderError::Failed(format!("cannot draw {}", rendition.id)));
        }
        shared.calls.push(RenderCall::Render(rendition.clone()));
        Ok(())
    }

    async fn set_visual_state(&mut self, state: VisualState) -> Result<(), RenderError> {
        lock(&self.shared).calls.push(RenderCall::Visual(state));
        Ok(())
    }

    async fn teardown(&mut self) -> Result<(), RenderError> {
        lock(&self.shared).calls.push(RenderCall::Teardown);
        Ok(())
    }

    fn is_obstructed(&self, selector: &str) -> bool {
        lock(&self.shared).obstructed.iter().any(|s| s == selector)
    }
}
