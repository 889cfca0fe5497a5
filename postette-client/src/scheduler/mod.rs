//! Single-active-notification state machine.
//!
//! The scheduler owns the queue, the current/previous slots, the history and
//! the renderer. It never sleeps: each transition arms the one [`Timer`] and
//! the owning task calls [`Scheduler::on_timer`] once the deadline passes.

pub mod timer;

use postette_shared::policy;
use postette_shared::{
    Diagnostic, Integrate, Level, LevelRegistry, Pause, Record, Settings, SettingsPatch,
    TimeResolver, Timings, ToastError, ToastOptions,
};
use serde_json::{Map, Value};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::history::{HistoryLog, echo_record};
use crate::queue::{Completion, Entry, NotificationQueue};
use crate::record::{Provenance, RecordFactory};
use crate::renderer::{
    Attachment, Layout, RenderError, Renderer, RendererEvent, RendererEvents, Rendition,
    VisualState,
};
use timer::{Step, Timer};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Idle,
    /// Waiting for the renderer surface.
    Attaching,
    /// A record is selected; its delay is running.
    Delaying,
    Active,
    /// The active record is being replaced in place.
    Updating,
    /// Hide window before the next record.
    Dismissing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Surface {
    Detached,
    Attaching,
    Ready,
}

pub struct Scheduler {
    settings: Settings,
    resolver: TimeResolver,
    levels: LevelRegistry,
    factory: RecordFactory,
    queue: NotificationQueue,
    history: HistoryLog,
    renderer: Box<dyn Renderer>,
    events: RendererEvents,
    surface: Surface,
    state: State,
    current: Option<Entry>,
    previous: Option<Record>,
    /// Presentation mode of the current slot.
    integrated: bool,
    timer: Timer,
}

impl Scheduler {
    pub fn new(
        renderer: Box<dyn Renderer>,
        events: RendererEvents,
        provenance: Box<dyn Provenance>,
        settings: Settings,
        resolver: TimeResolver,
    ) -> Self {
        Self {
            settings,
            resolver,
            levels: LevelRegistry::new(),
            factory: RecordFactory::new(provenance),
            queue: NotificationQueue::new(),
            history: HistoryLog::new(),
            renderer,
            events,
            surface: Surface::Detached,
            state: State::Idle,
            current: None,
            previous: None,
            integrated: false,
            timer: Timer::default(),
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.timer.deadline()
    }

    /// Nothing showing and nothing waiting.
    pub fn is_idle(&self) -> bool {
        self.state == State::Idle && self.queue.is_empty()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn levels(&self) -> Vec<Level> {
        self.levels.all()
    }

    pub fn queue_snapshot(&self) -> Vec<Record> {
        self.queue.snapshot()
    }

    /// The selected record, from the start of its delay until it is hidden.
    pub fn active(&self) -> Option<Record> {
        self.current.as_ref().map(|e| e.record.clone())
    }

    pub fn previous(&self) -> Option<Record> {
        self.previous.clone()
    }

    pub fn history_snapshot(&self) -> Vec<Record> {
        self.history.snapshot()
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    pub fn echo_history(&self) {
        self.history.echo();
    }

    pub fn register_custom_level(&mut self, name: &str) -> Result<Vec<Level>, ToastError> {
        let levels = self.levels.register(name)?;
        info!(level = name.trim(), "custom level registered");
        Ok(levels)
    }

    /// Merges a loosely typed settings patch; invalid entries are skipped and
    /// returned as diagnostics.
    pub fn configure(&mut self, patch: &Map<String, Value>) -> Vec<Diagnostic> {
        let (patch, diagnostics) = SettingsPatch::from_map(patch);
        for diagnostic in &diagnostics {
            warn!(%diagnostic, "configure");
        }
        self.apply(patch);
        diagnostics
    }

    pub fn apply(&mut self, patch: SettingsPatch) {
        if !patch.is_empty() {
            self.settings.merge(patch);
            debug!(settings = ?self.settings, "settings updated");
        }
    }

    pub fn timings(&self) -> Timings {
        *self.resolver.timings()
    }

    pub fn set_compute_factor(&mut self, ms: u64) -> u64 {
        self.resolver.set_per_character_factor(ms)
    }

    pub fn toggle_reiterate(&mut self) -> bool {
        self.settings.reiterate = !self.settings.reiterate;
        self.settings.reiterate
    }

    pub fn toggle_echo(&mut self) -> bool {
        self.settings.echo = !self.settings.echo;
        self.settings.echo
    }

    pub fn toggle_trace(&mut self) -> bool {
        self.settings.trace = !self.settings.trace;
        self.settings.trace
    }

    pub fn set_click_away(&mut self, enabled: bool) {
        self.settings.click_away = enabled;
    }

    pub fn add_modal_selector(&mut self, selector: &str) -> bool {
        self.settings.add_modal_selector(selector)
    }

    fn transition(&mut self, next: State) {
        let id = self.current.as_ref().map(|e| e.record.id.0);
        if self.settings.trace {
            info!(from = ?self.state, to = ?next, ?id, "transition");
        } else {
            debug!(from = ?self.state, to = ?next, ?id, "transition");
        }
        self.state = next;
    }

    /// Accepts a notification. Returns `false` when it was rejected as a
    /// duplicate; its completion has then already fired with `false`.
    pub async fn submit(
        &mut self,
        message: String,
        options: ToastOptions,
        completion: Completion,
    ) -> bool {
        let (record, diagnostics) =
            self.factory
                .build(message, &options, &self.levels, &self.resolver);
        for diagnostic in &diagnostics {
            warn!(id = %record.id, %diagnostic, "notification option ignored");
        }
        let mut entry = Entry::new(record, completion);

        let current = self.current.as_ref().map(|e| &e.record);
        if policy::is_duplicate(&self.settings, &entry.record, current, self.queue.records()) {
            debug!(id = %entry.record.id, "duplicate notification rejected");
            entry.reject();
            return false;
        }
        if self.settings.echo {
            echo_record(&entry.record);
        }
        self.history.append(entry.record.clone());

        if entry.record.delay.is_immediate() && matches!(self.state, State::Active | State::Updating)
        {
            self.usurp(entry).await;
        } else {
            self.queue.push(entry);
            self.pump().await;
        }
        true
    }

    /// Starts the next record if the machine is free to.
    async fn pump(&mut self) {
        if !matches!(self.state, State::Idle | State::Attaching) || self.queue.is_empty() {
            return;
        }
        match self.surface {
            Surface::Ready => self.begin_delay(),
            Surface::Attaching => {}
            Surface::Detached => {
                if !self.timer.is_pending(Step::Reattach) {
                    self.attach().await;
                    if self.surface == Surface::Ready {
                        self.begin_delay();
                    }
                }
            }
        }
    }

    async fn attach(&mut self) {
        self.transition(State::Attaching);
        let layout = Layout::from(&self.settings);
        match self.renderer.attach(&layout, self.events.clone()).await {
            Ok(Attachment::Ready) => {
                debug!("renderer attached");
                self.surface = Surface::Ready;
            }
            Ok(Attachment::Pending) => {
                debug!("waiting for renderer to become ready");
                self.surface = Surface::Attaching;
            }
            Err(e) => {
                warn!(error = %e, "renderer attach failed; retrying");
                self.surface = Surface::Detached;
                self.timer.arm(self.resolver.minimal(), Step::Reattach);
            }
        }
    }

    fn begin_delay(&mut self) {
        let Some(entry) = self.queue.pop() else {
            self.transition(State::Idle);
            return;
        };
        let waited = entry.record.elapsed_at(Instant::now().into_std());
        let wait = self.resolver.effective_delay(entry.record.delay, waited);
        if let Some(old) = self.current.replace(entry) {
            self.previous = Some(old.record);
        }
        self.transition(State::Delaying);
        self.timer.arm(wait, Step::Reveal);
    }

    fn arm_pause(&mut self, pause: Pause) {
        match pause.duration() {
            Some(pause) => self.timer.arm(pause, Step::Expire),
            None => self.timer.cancel(),
        }
    }

    async fn reveal(&mut self) {
        let prepared = self.current.as_ref().map(|entry| {
            let integrated = policy::should_integrate(&entry.record, &self.settings, |selector| {
                self.renderer.is_obstructed(selector)
            });
            let rendition = Rendition::new(&entry.record, &self.settings, integrated);
            (rendition, entry.record.pause, integrated)
        });
        let Some((rendition, pause, integrated)) = prepared else {
            self.transition(State::Idle);
            self.pump().await;
            return;
        };
        self.integrated = integrated;

        if let Err(e) = self.renderer.render(&rendition).await {
            return self.fail(e).await;
        }
        let visual = VisualState {
            active: true,
            integrated,
            persist: pause.is_persist(),
            ..VisualState::default()
        };
        if let Err(e) = self.renderer.set_visual_state(visual).await {
            return self.fail(e).await;
        }
        if let Some(entry) = self.current.as_mut() {
            entry.shown = true;
        }
        self.transition(State::Active);
        self.arm_pause(pause);
    }

    async fn expire(&mut self) {
        let persist = self
            .current
            .as_ref()
            .is_some_and(|e| e.record.pause.is_persist());
        let visual = VisualState {
            active: false,
            integrated: self.integrated,
            persist,
            ..VisualState::default()
        };
        if let Err(e) = self.renderer.set_visual_state(visual).await {
            warn!(error = %e, "hiding notification failed");
        }
        self.transition(State::Dismissing);
        self.timer.arm(self.resolver.transition(), Step::Advance);
    }

    async fn advance(&mut self) {
        if let Some(entry) = self.current.as_mut() {
            entry.complete();
        }
        if self.queue.is_empty() {
            self.go_idle().await;
        } else {
            self.transition(State::Idle);
            self.begin_delay();
        }
    }

    /// Clears both slots and the drawn content; the surface stays attached.
    async fn go_idle(&mut self) {
        self.timer.cancel();
        self.current = None;
        self.previous = None;
        if self.surface == Surface::Ready
            && let Err(e) = self.renderer.teardown().await
        {
            warn!(error = %e, "renderer teardown failed");
        }
        self.transition(State::Idle);
    }

    async fn fail(&mut self, error: RenderError) {
        let id = self.current.as_ref().map(|e| e.record.id.0);
        warn!(%error, ?id, "rendering notification failed");
        if let Some(entry) = self.current.as_mut() {
            entry.reject();
        }
        self.go_idle().await;
        self.pump().await;
    }

    /// Replaces the active record in place, keeping the slot's presentation.
    async fn usurp(&mut self, mut entry: Entry) {
        self.timer.cancel();
        if let Some(mut old) = self.current.take() {
            old.complete();
            self.previous = Some(old.record);
        }
        let persist_before = self
            .previous
            .as_ref()
            .is_some_and(|r| r.pause.is_persist());
        entry.record.integrate = Integrate::from(self.integrated);
        let rendition = Rendition::new(&entry.record, &self.settings, self.integrated);
        self.current = Some(entry);
        self.transition(State::Updating);

        let visual = VisualState {
            active: true,
            integrated: self.integrated,
            persist: persist_before,
            updating: true,
            updated: false,
        };
        if let Err(e) = self.renderer.set_visual_state(visual).await {
            return self.fail(e).await;
        }
        if let Err(e) = self.renderer.render(&rendition).await {
            return self.fail(e).await;
        }
        if let Some(current) = self.current.as_mut() {
            current.shown = true;
        }
        self.timer.arm(self.resolver.transition(), Step::Settle);
    }

    async fn settle(&mut self) {
        if self.state != State::Updating {
            return;
        }
        let Some(pause) = self.current.as_ref().map(|e| e.record.pause) else {
            return;
        };
        let visual = VisualState {
            active: true,
            integrated: self.integrated,
            persist: pause.is_persist(),
            updating: false,
            updated: true,
        };
        if let Err(e) = self.renderer.set_visual_state(visual).await {
            warn!(error = %e, "settling update failed");
        }
        self.transition(State::Active);
        self.arm_pause(pause);
    }

    /// Hides the current record now. A record still in its delay is never
    /// shown and completes with `false`. Returns whether anything was
    /// dismissed.
    pub async fn dismiss_active(&mut self) -> bool {
        match self.state {
            State::Active | State::Updating => {
                self.timer.cancel();
                self.expire().await;
                true
            }
            State::Delaying => {
                self.timer.cancel();
                self.transition(State::Dismissing);
                self.timer.arm(self.resolver.transition(), Step::Advance);
                true
            }
            _ => false,
        }
    }

    /// Drops everything: timers, queue, slots and history. Queued records
    /// complete with `false`; the current one with whether it was shown.
    pub async fn reset_all(&mut self) {
        let dropped = self.stop().await;
        self.history.clear();
        info!(dropped, "presenter reset");
    }

    /// Like [`Scheduler::reset_all`] but keeps the history.
    pub async fn clear_queue(&mut self) -> usize {
        let dropped = self.stop().await;
        info!(dropped, "queue cleared");
        dropped
    }

    /// Cancels the timer, empties the queue and both slots, and tears down
    /// the drawn content. Returns how many queued records were dropped.
    async fn stop(&mut self) -> usize {
        self.timer.cancel();
        let mut dropped = 0usize;
        for mut entry in self.queue.drain() {
            entry.reject();
            dropped += 1;
        }
        if let Some(mut entry) = self.current.take() {
            entry.complete();
        }
        self.previous = None;
        if self.surface == Surface::Ready
            && let Err(e) = self.renderer.teardown().await
        {
            warn!(error = %e, "renderer teardown failed");
        }
        if self.surface == Surface::Detached && self.state == State::Attaching {
            debug!("pending attach retry abandoned");
        }
        self.transition(State::Idle);
        dropped
    }

    pub async fn handle_event(&mut self, event: RendererEvent) {
        match event {
            RendererEvent::Ready => {
                if self.surface != Surface::Attaching {
                    debug!("stale ready event ignored");
                    return;
                }
                self.surface = Surface::Ready;
                self.pump().await;
            }
            RendererEvent::DismissRequested => {
                self.dismiss_active().await;
            }
            RendererEvent::ClickAway => {
                if self.settings.click_away {
                    self.dismiss_active().await;
                }
            }
            RendererEvent::TransitionSettled => self.settle().await,
        }
    }

    /// Runs the armed step. Call once [`Scheduler::deadline`] has passed.
    pub async fn on_timer(&mut self) {
        let Some(step) = self.timer.take() else {
            return;
        };
        match step {
            Step::Reveal => self.reveal().await,
            Step::Expire => self.expire().await,
            Step::Settle => self.settle().await,
            Step::Advance => self.advance().await,
            Step::Reattach => self.pump().await,
        }
    }
}
