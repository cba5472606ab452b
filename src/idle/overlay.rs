use serde::Serialize;
use tokio::sync::watch;

/// CSS class the front-end gives the dimming element.
pub const OVERLAY_CLASS: &str = "sleep-block";

/// The dimming layer placed over the wallet UI while it sleeps.
pub trait Overlay {
    fn attach(&mut self);
    fn detach(&mut self);
    fn set_opacity(&mut self, opacity: f64);
    fn is_attached(&self) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlayState {
    pub class: &'static str,
    pub visible: bool,
    pub opacity: f64,
}

impl Default for OverlayState {
    fn default() -> Self {
        Self {
            class: OVERLAY_CLASS,
            visible: false,
            opacity: 0.0,
        }
    }
}

/// Publishes overlay changes on a watch channel for whoever renders them.
#[derive(Debug)]
pub struct SleepOverlay {
    tx: watch::Sender<OverlayState>,
}

impl SleepOverlay {
    pub fn new() -> (Self, watch::Receiver<OverlayState>) {
        let (tx, rx) = watch::channel(OverlayState::default());
        (Self { tx }, rx)
    }
}

impl Overlay for SleepOverlay {
    fn attach(&mut self) {
        self.tx.send_if_modified(|state| {
            let changed = !state.visible;
            state.visible = true;
            changed
        });
    }

    fn detach(&mut self) {
        self.tx.send_if_modified(|state| {
            let changed = state.visible || state.opacity != 0.0;
            state.visible = false;
            state.opacity = 0.0;
            changed
        });
    }

    fn set_opacity(&mut self, opacity: f64) {
        self.tx.send_if_modified(|state| {
            let changed = state.opacity != opacity;
            state.opacity = opacity;
            changed
        });
    }

    fn is_attached(&self) -> bool {
        self.tx.borrow().visible
    }
}

/// Used when nothing renders the overlay.
#[derive(Debug, Default)]
pub struct NoOverlay {
    attached: bool,
}

impl Overlay for NoOverlay {
    fn attach(&mut self) {
        self.attached = true;
    }

    fn detach(&mut self) {
        self.attached = false;
    }

    fn set_opacity(&mut self, _opacity: f64) {}

    fn is_attached(&self) -> bool {
        self.attached
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sleep_overlay_publishes_changes() {
        let (mut overlay, rx) = SleepOverlay::new();
        assert!(!overlay.is_attached());

        overlay.attach();
        overlay.set_opacity(0.5);
        assert_eq!(
            *rx.borrow(),
            OverlayState {
                class: OVERLAY_CLASS,
                visible: true,
                opacity: 0.5
            }
        );

        overlay.detach();
        assert!(!overlay.is_attached());
        assert_eq!(rx.borrow().opacity, 0.0);
    }

    #[test]
    fn test_overlay_state_serializes_camel_case() {
        let json = serde_json::to_string(&OverlayState::default()).unwrap();
        assert_eq!(json, r#"{"class":"sleep-block","visible":false,"opacity":0.0}"#);
    }
}
