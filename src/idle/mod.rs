pub mod driver;
pub mod idle;
pub mod overlay;

pub use driver::{
    FocusReceiver, FocusSender, FocusSource, RuntimeIdleTracker, create_focus_channel,
    run_idle_tracker,
};
pub use idle::{
    FocusChange, IdleSignals, IdleState, IdleSubscriptions, IdleTracker, SLEEP_STEP, TICK_INTERVAL,
};
pub use overlay::{NoOverlay, Overlay, OverlayState, SleepOverlay};
