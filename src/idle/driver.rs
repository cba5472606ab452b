use crate::idle::idle::{FocusChange, IdleTracker};
use crate::timer::{FiredTimers, TokioClock, TokioScheduler};
use std::future::Future;
use tokio::sync::mpsc;

/// Where focus transitions come from. `None` means the source is gone.
pub trait FocusSource {
    fn next_change(&mut self) -> impl Future<Output = Option<FocusChange>> + Send;
}

pub type FocusSender = mpsc::UnboundedSender<FocusChange>;
pub type FocusReceiver = mpsc::UnboundedReceiver<FocusChange>;

pub fn create_focus_channel() -> (FocusSender, FocusReceiver) {
    mpsc::unbounded_channel()
}

impl FocusSource for FocusReceiver {
    async fn next_change(&mut self) -> Option<FocusChange> {
        self.recv().await
    }
}

pub type RuntimeIdleTracker = IdleTracker<TokioScheduler, TokioClock>;

/// Owns the tracker for its whole life: applies focus changes and fired ticks
/// one at a time, and shuts the tracker down once `source` ends.
pub async fn run_idle_tracker<F: FocusSource>(
    mut tracker: RuntimeIdleTracker,
    mut fired: FiredTimers,
    mut source: F,
) {
    tracing::info!(event = "idle.tracker.started");
    loop {
        tokio::select! {
            change = source.next_change() => match change {
                Some(change) => {
                    tracing::debug!(event = "idle.focus.changed", ?change);
                    tracker.handle(change);
                }
                None => break,
            },
            Some(id) = fired.recv() => tracker.on_timer(id),
        }
    }
    tracker.shutdown();
    tracing::info!(event = "idle.tracker.stopped");
}
