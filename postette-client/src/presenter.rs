//! The presenter task and the handle used to talk to it.
//!
//! One task owns the [`Scheduler`] and is the only place state changes. It
//! waits on commands, renderer events, the scheduler's deadline and a
//! cancellation token.

use std::sync::Arc;
use std::time::Duration;

use postette_shared::{
    Diagnostic, Level, Record, Settings, Shortcut, TimeResolver, Timings, ToastError,
    ToastOptions, ToastRequest,
};
use serde_json::{Map, Value};
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::queue::{Callback, Completion};
use crate::record::{Provenance, SessionProvenance};
use crate::renderer::{Renderer, RendererEvent, RendererEvents};
use crate::scheduler::{Scheduler, State};

const COMMAND_BUFFER: usize = 64;
const SHUTDOWN_GRACE: Duration = Duration::from_secs(3);

type Apply = Box<dyn FnOnce(&mut Scheduler) + Send>;

enum Command {
    Submit {
        message: String,
        options: ToastOptions,
        callback: Option<Callback>,
        reply: oneshot::Sender<bool>,
    },
    Dismiss(oneshot::Sender<bool>),
    ClickAway,
    Reset(oneshot::Sender<()>),
    ClearQueue(oneshot::Sender<usize>),
    /// Synchronous access to the scheduler.
    Apply(Apply),
    WhenIdle(oneshot::Sender<()>),
}

/// Configures and starts a presenter task.
pub struct Presenter {
    renderer: Box<dyn Renderer>,
    provenance: Box<dyn Provenance>,
    settings: Settings,
    timings: Timings,
    cancel: CancellationToken,
}

impl Presenter {
    pub fn new(renderer: Box<dyn Renderer>) -> Self {
        Self {
            renderer,
            provenance: Box::new(SessionProvenance::detect()),
            settings: Settings::default(),
            timings: Timings::default(),
            cancel: CancellationToken::new(),
        }
    }

    #[must_use]
    pub fn settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    #[must_use]
    pub fn timings(mut self, timings: Timings) -> Self {
        self.timings = timings;
        self
    }

    #[must_use]
    pub fn provenance(mut self, provenance: Box<dyn Provenance>) -> Self {
        self.provenance = provenance;
        self
    }

    /// Stops the task when `cancel` fires, in addition to [`PresenterHandle::shutdown`].
    #[must_use]
    pub fn cancel_token(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Spawns the presenter on the current tokio runtime.
    pub fn spawn(self) -> PresenterHandle {
        let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let scheduler = Scheduler::new(
            self.renderer,
            RendererEvents::new(events_tx),
            self.provenance,
            self.settings,
            TimeResolver::new(self.timings),
        );
        let cancel = self.cancel.clone();
        let task = tokio::spawn(run_loop(scheduler, rx, events_rx, self.cancel));
        PresenterHandle {
            tx,
            cancel,
            task: Arc::new(Mutex::new(Some(task))),
        }
    }
}

async fn run_loop(
    mut scheduler: Scheduler,
    mut rx: mpsc::Receiver<Command>,
    mut events: mpsc::UnboundedReceiver<RendererEvent>,
    cancel: CancellationToken,
) {
    let mut idle_waiters: Vec<oneshot::Sender<()>> = Vec::new();
    debug!("presenter task started");
    loop {
        let deadline = scheduler.deadline();
        // Renderer events go before commands so a settle emitted for one
        // update is never applied to the update submitted after it.
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("presenter: cancelled");
                break;
            }
            Some(event) = events.recv() => {
                scheduler.handle_event(event).await;
            }
            cmd = rx.recv() => {
                let Some(cmd) = cmd else {
                    debug!("presenter: all handles dropped; exiting");
                    break;
                };
                match cmd {
                    Command::Submit { message, options, callback, reply } => {
                        let accepted = scheduler
                            .submit(message, options, Completion::from(callback))
                            .await;
                        let _ = reply.send(accepted);
                    }
                    Command::Dismiss(reply) => {
                        let _ = reply.send(scheduler.dismiss_active().await);
                    }
                    Command::ClickAway => {
                        scheduler.handle_event(RendererEvent::ClickAway).await;
                    }
                    Command::Reset(reply) => {
                        scheduler.reset_all().await;
                        let _ = reply.send(());
                    }
                    Command::ClearQueue(reply) => {
                        let _ = reply.send(scheduler.clear_queue().await);
                    }
                    Command::Apply(apply) => apply(&mut scheduler),
                    Command::WhenIdle(waiter) => idle_waiters.push(waiter),
                }
            }
            _ = tokio::time::sleep_until(deadline.unwrap_or_else(tokio::time::Instant::now)), if deadline.is_some() => {
                scheduler.on_timer().await;
            }
        }
        if scheduler.is_idle() {
            for waiter in idle_waiters.drain(..) {
                let _ = waiter.send(());
            }
        }
    }
    scheduler.reset_all().await;
    info!("presenter stopped");
}

/// Cloneable access to a running presenter. Every call is processed in order
/// by the presenter task.
#[derive(Clone)]
pub struct PresenterHandle {
    tx: mpsc::Sender<Command>,
    cancel: CancellationToken,
    task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl PresenterHandle {
    async fn send(&self, cmd: Command) -> Result<(), ToastError> {
        self.tx
            .send(cmd)
            .await
            .map_err(|_| ToastError::PresenterClosed)
    }

    /// Runs `f` against the scheduler on the presenter task.
    async fn query<R, F>(&self, f: F) -> Result<R, ToastError>
    where
        R: Send + 'static,
        F: FnOnce(&mut Scheduler) -> R + Send + 'static,
    {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Apply(Box::new(move |scheduler| {
            let _ = reply.send(f(scheduler));
        })))
        .await?;
        rx.await.map_err(|_| ToastError::PresenterClosed)
    }

    async fn submit_inner(
        &self,
        message: String,
        options: ToastOptions,
        callback: Option<Callback>,
    ) -> Result<bool, ToastError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Submit {
            message,
            options,
            callback,
            reply,
        })
        .await?;
        rx.await.map_err(|_| ToastError::PresenterClosed)
    }

    /// Queues a notification. `Ok(false)` means it duplicated one already
    /// showing or waiting and was dropped.
    pub async fn submit(
        &self,
        message: impl Into<String>,
        options: ToastOptions,
    ) -> Result<bool, ToastError> {
        self.submit_inner(message.into(), options, None).await
    }

    /// Like [`PresenterHandle::submit`], calling `callback` once with
    /// whether the notification was displayed.
    pub async fn submit_with<F>(
        &self,
        message: impl Into<String>,
        options: ToastOptions,
        callback: F,
    ) -> Result<bool, ToastError>
    where
        F: FnOnce(bool) + Send + 'static,
    {
        self.submit_inner(message.into(), options, Some(Box::new(callback)))
            .await
    }

    pub async fn submit_request(&self, request: ToastRequest) -> Result<bool, ToastError> {
        self.submit(request.message, request.options).await
    }

    pub async fn shortcut(
        &self,
        shortcut: Shortcut,
        message: impl Into<String>,
    ) -> Result<bool, ToastError> {
        self.submit(message, shortcut.options()).await
    }

    pub async fn alert(&self, message: impl Into<String>) -> Result<bool, ToastError> {
        self.shortcut(Shortcut::Alert, message).await
    }

    pub async fn error(&self, message: impl Into<String>) -> Result<bool, ToastError> {
        self.shortcut(Shortcut::Error, message).await
    }

    pub async fn warning(&self, message: impl Into<String>) -> Result<bool, ToastError> {
        self.shortcut(Shortcut::Warning, message).await
    }

    pub async fn success(&self, message: impl Into<String>) -> Result<bool, ToastError> {
        self.shortcut(Shortcut::Success, message).await
    }

    /// Shows `message` until it is updated or dismissed.
    pub async fn persist(&self, message: impl Into<String>) -> Result<bool, ToastError> {
        self.shortcut(Shortcut::Persist, message).await
    }

    pub async fn spinner(&self, message: impl Into<String>) -> Result<bool, ToastError> {
        self.persist(message).await
    }

    /// Replaces the active notification in place.
    pub async fn update(&self, message: impl Into<String>) -> Result<bool, ToastError> {
        self.shortcut(Shortcut::Update, message).await
    }

    pub async fn done(&self, message: impl Into<String>) -> Result<bool, ToastError> {
        self.update(message).await
    }

    pub async fn dismiss_active(&self) -> Result<bool, ToastError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Dismiss(reply)).await?;
        rx.await.map_err(|_| ToastError::PresenterClosed)
    }

    /// Dismisses the active notification if click-away is enabled.
    pub async fn click_away(&self) -> Result<(), ToastError> {
        self.send(Command::ClickAway).await
    }

    pub async fn reset_all(&self) -> Result<(), ToastError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Reset(reply)).await?;
        rx.await.map_err(|_| ToastError::PresenterClosed)
    }

    /// Drops pending and current notifications but keeps the history.
    /// Returns how many queued notifications were dropped.
    pub async fn clear_queue(&self) -> Result<usize, ToastError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::ClearQueue(reply)).await?;
        rx.await.map_err(|_| ToastError::PresenterClosed)
    }

    pub async fn queue_snapshot(&self) -> Result<Vec<Record>, ToastError> {
        self.query(|s| s.queue_snapshot()).await
    }

    pub async fn active(&self) -> Result<Option<Record>, ToastError> {
        self.query(|s| s.active()).await
    }

    pub async fn previous(&self) -> Result<Option<Record>, ToastError> {
        self.query(|s| s.previous()).await
    }

    pub async fn state(&self) -> Result<State, ToastError> {
        self.query(|s| s.state()).await
    }

    /// Every accepted record, newest first.
    pub async fn history_snapshot(&self) -> Result<Vec<Record>, ToastError> {
        self.query(|s| s.history_snapshot()).await
    }

    pub async fn clear_history(&self) -> Result<(), ToastError> {
        self.query(|s| s.clear_history()).await
    }

    /// Writes the history to the log sink.
    pub async fn echo_history(&self) -> Result<(), ToastError> {
        self.query(|s| s.echo_history()).await
    }

    pub async fn configure(&self, patch: Map<String, Value>) -> Result<Vec<Diagnostic>, ToastError> {
        self.query(move |s| s.configure(&patch)).await
    }

    pub async fn settings(&self) -> Result<Settings, ToastError> {
        self.query(|s| s.settings().clone()).await
    }

    pub async fn levels(&self) -> Result<Vec<Level>, ToastError> {
        self.query(|s| s.levels()).await
    }

    pub async fn register_custom_level(
        &self,
        name: impl Into<String>,
    ) -> Result<Vec<Level>, ToastError> {
        let name = name.into();
        self.query(move |s| s.register_custom_level(&name)).await?
    }

    /// Millisecond values behind the named spans, including the current
    /// per-character factor.
    pub async fn timings(&self) -> Result<Timings, ToastError> {
        self.query(|s| s.timings()).await
    }

    /// Sets the per-character reading factor; returns the value in force.
    pub async fn set_compute_factor(&self, ms: u64) -> Result<u64, ToastError> {
        self.query(move |s| s.set_compute_factor(ms)).await
    }

    pub async fn toggle_reiterate(&self) -> Result<bool, ToastError> {
        self.query(|s| s.toggle_reiterate()).await
    }

    pub async fn toggle_echo(&self) -> Result<bool, ToastError> {
        self.query(|s| s.toggle_echo()).await
    }

    pub async fn toggle_trace(&self) -> Result<bool, ToastError> {
        self.query(|s| s.toggle_trace()).await
    }

    pub async fn set_click_away(&self, enabled: bool) -> Result<(), ToastError> {
        self.query(move |s| s.set_click_away(enabled)).await
    }

    pub async fn add_modal_selector(&self, selector: impl Into<String>) -> Result<bool, ToastError> {
        let selector = selector.into();
        self.query(move |s| s.add_modal_selector(&selector)).await
    }

    /// Resolves once nothing is showing and nothing is waiting.
    pub async fn when_idle(&self) -> Result<(), ToastError> {
        let (waiter, rx) = oneshot::channel();
        self.send(Command::WhenIdle(waiter)).await?;
        rx.await.map_err(|_| ToastError::PresenterClosed)
    }

    /// Stops the presenter. Pending notifications complete with `false`.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let task = self.task.lock().await.take();
        if let Some(task) = task {
            match tokio::time::timeout(SHUTDOWN_GRACE, task).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(error = %e, "presenter task failed"),
                Err(_) => warn!("presenter task did not stop in time"),
            }
        }
    }
}
