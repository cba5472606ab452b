//! Window focus and idle ("sleep") tracking.
//!
//! While the wallet window is unfocused the tracker counts whole sleep steps
//! of [`SLEEP_STEP`] and announces every new step on the `sleep` signal. The
//! step is always derived from elapsed clock time, never from the number of
//! ticks, so a late tick still lands on the right step.

use crate::idle::overlay::Overlay;
use crate::signal::{Signal, Subscription};
use crate::timer::{Clock, Scheduler, TimerId};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

pub const TICK_INTERVAL: Duration = Duration::from_secs(1); // Re-check sleep step every second
pub const SLEEP_STEP: Duration = Duration::from_secs(5 * 60); // One sleep step per 5 idle minutes

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FocusChange {
    Gained,
    Lost,
}

#[derive(Debug, Clone)]
pub struct IdleSignals {
    pub window_blur: Signal<()>,
    pub window_focus: Signal<()>,
    pub sleep: Signal<u32>,
    pub wake_up: Signal<()>,
}

impl IdleSignals {
    pub fn new() -> Self {
        Self {
            window_blur: Signal::new("window.blur"),
            window_focus: Signal::new("window.focus"),
            sleep: Signal::new("sleep"),
            wake_up: Signal::new("wakeUp"),
        }
    }

    /// Subscribes to all four signals at once. Nothing dispatched after this
    /// returns is missed, however late the subscriptions are first polled.
    pub fn subscribe(&self) -> IdleSubscriptions {
        IdleSubscriptions {
            window_blur: self.window_blur.subscribe(),
            window_focus: self.window_focus.subscribe(),
            sleep: self.sleep.subscribe(),
            wake_up: self.wake_up.subscribe(),
        }
    }
}

impl Default for IdleSignals {
    fn default() -> Self {
        Self::new()
    }
}

pub struct IdleSubscriptions {
    pub window_blur: Subscription<()>,
    pub window_focus: Subscription<()>,
    pub sleep: Subscription<u32>,
    pub wake_up: Subscription<()>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdleState {
    pub window_focused: bool,
    pub sleep_started_at: Option<Instant>,
    pub sleep_step: Option<u32>,
    pub max_sleep: Option<u32>,
}

pub struct IdleTracker<S: Scheduler, C: Clock> {
    state: IdleState,
    scheduler: S,
    clock: C,
    overlay: Box<dyn Overlay + Send>,
    pending_tick: Option<TimerId>,
    signals: IdleSignals,
}

impl<S: Scheduler, C: Clock> IdleTracker<S, C> {
    pub fn new(scheduler: S, clock: C, overlay: Box<dyn Overlay + Send>) -> Self {
        Self {
            state: IdleState {
                window_focused: true,
                sleep_started_at: None,
                sleep_step: None,
                max_sleep: None,
            },
            scheduler,
            clock,
            overlay,
            pending_tick: None,
            signals: IdleSignals::new(),
        }
    }

    pub fn signals(&self) -> &IdleSignals {
        &self.signals
    }

    pub fn state(&self) -> IdleState {
        self.state
    }

    /// Sets the step count at which the overlay reaches full opacity.
    /// Zero turns dimming off. Steps themselves are never capped.
    pub fn set_max_sleep(&mut self, steps: u32) {
        self.state.max_sleep = (steps > 0).then_some(steps);
        tracing::debug!(event = "idle.max_sleep.set", max_sleep = ?self.state.max_sleep);
    }

    pub fn handle(&mut self, change: FocusChange) {
        match change {
            FocusChange::Gained => self.on_focus_gained(),
            FocusChange::Lost => self.on_focus_lost(),
        }
    }

    pub fn on_focus_gained(&mut self) {
        self.state.window_focused = true;
        self.signals.window_focus.dispatch(());
        self.wake_up();
    }

    pub fn on_focus_lost(&mut self) {
        self.state.window_focused = false;
        self.signals.window_blur.dispatch(());
        self.begin_sleep();
    }

    /// Runs the sleep tick. Timers other than the pending tick are stale and
    /// ignored.
    pub fn on_timer(&mut self, id: TimerId) {
        if self.pending_tick != Some(id) {
            tracing::trace!(event = "idle.tick.stale", timer = ?id);
            return;
        }
        self.pending_tick = None;

        let Some(started_at) = self.state.sleep_started_at else {
            return;
        };
        let elapsed = self.clock.now().saturating_duration_since(started_at);
        self.set_sleep_step(step_for(elapsed));
        self.schedule_tick();
    }

    /// Cancels the pending tick and takes the overlay down.
    pub fn shutdown(&mut self) {
        self.cancel_tick();
        if self.overlay.is_attached() {
            self.overlay.detach();
        }
    }

    fn wake_up(&mut self) {
        let slept = self.state.sleep_step;
        self.state.sleep_started_at = None;
        self.state.sleep_step = None;
        self.cancel_tick();
        if self.overlay.is_attached() {
            self.overlay.detach();
        }
        tracing::info!(event = "idle.wake_up", slept_steps = ?slept);
        self.signals.wake_up.dispatch(());
    }

    fn begin_sleep(&mut self) {
        self.cancel_tick();
        if self.state.sleep_started_at.is_none() {
            if self.state.max_sleep.is_some() {
                self.overlay.attach();
            }
            self.state.sleep_started_at = Some(self.clock.now());
            // Step 0 is the baseline, not a step change.
            self.state.sleep_step = Some(0);
            self.apply_opacity(0);
            tracing::info!(event = "idle.sleep.started");
        }
        self.schedule_tick();
    }

    fn set_sleep_step(&mut self, step: u32) {
        if let Some(current) = self.state.sleep_step
            && step <= current
        {
            return;
        }
        self.state.sleep_step = Some(step);
        self.apply_opacity(step);
        tracing::info!(event = "idle.sleep.step_changed", step);
        self.signals.sleep.dispatch(step);
    }

    fn apply_opacity(&mut self, step: u32) {
        if let Some(max) = self.state.max_sleep {
            self.overlay.set_opacity(dim_ratio(step, max));
        }
    }

    fn schedule_tick(&mut self) {
        self.pending_tick = Some(self.scheduler.schedule(TICK_INTERVAL));
    }

    fn cancel_tick(&mut self) {
        if let Some(id) = self.pending_tick.take() {
            self.scheduler.cancel(id);
        }
    }
}

impl<S: Scheduler, C: Clock> Drop for IdleTracker<S, C> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Whole sleep steps contained in `elapsed`.
pub fn step_for(elapsed: Duration) -> u32 {
    u32::try_from(elapsed.as_secs() / SLEEP_STEP.as_secs()).unwrap_or(u32::MAX)
}

/// Overlay opacity for `step` out of `max` steps, clamped to 1.
pub fn dim_ratio(step: u32, max: u32) -> f64 {
    if max == 0 {
        return 0.0;
    }
    (f64::from(step) / f64::from(max)).min(1.0)
}
