//! Wires the tracker and the mirror balance to whichever front-end transport
//! is running.

use crate::config::{Cli, Settings};
use crate::exchange::{
    BalanceSender, ExchangeConfig, MirrorBalance, MirrorView, Money, StaticAssets,
    create_balance_channel,
};
use crate::idle::{
    FocusChange, FocusSender, FocusSource, IdleSubscriptions, IdleTracker, OverlayState,
    SleepOverlay, create_focus_channel, run_idle_tracker,
};
use crate::timer::{TokioClock, TokioScheduler};
use crate::ws::{ClientMessage, InboundReceiver, InboundSender, ServerEvent, create_inbound_channel};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

const EVENT_CAPACITY: usize = 256;

pub struct IdleHandles {
    /// Taken before the tracker task starts, so no signal is missed.
    pub signals: IdleSubscriptions,
    pub overlay: watch::Receiver<OverlayState>,
    pub task: JoinHandle<()>,
}

/// Starts the idle tracker on its own task, fed by `source`.
pub fn spawn_idle_tracker<F>(source: F, max_sleep: u32) -> IdleHandles
where
    F: FocusSource + Send + 'static,
{
    let (scheduler, fired) = TokioScheduler::new();
    let (overlay, overlay_rx) = SleepOverlay::new();
    let mut tracker = IdleTracker::new(scheduler, TokioClock, Box::new(overlay));
    tracker.set_max_sleep(max_sleep);
    let signals = tracker.signals().subscribe();
    let task = tokio::spawn(run_idle_tracker(tracker, fired, source));
    IdleHandles {
        signals,
        overlay: overlay_rx,
        task,
    }
}

pub struct MirrorHandles {
    pub balance_tx: BalanceSender,
    pub view: watch::Receiver<MirrorView>,
    pub task: JoinHandle<()>,
}

pub fn spawn_mirror_balance(
    assets: StaticAssets,
    settings: Settings,
    config: ExchangeConfig,
) -> MirrorHandles {
    let (balance_tx, balance_rx) = create_balance_channel();
    let (component, view) = MirrorBalance::new(assets, settings, config, balance_rx);
    let task = tokio::spawn(async move {
        if let Err(e) = component.run().await {
            tracing::error!(event = "exchange.mirror.failed", error = %e);
        }
    });
    MirrorHandles {
        balance_tx,
        view,
        task,
    }
}

/// Applies inbound front-end messages to the tracker and the balance.
pub async fn route_inbound(
    mut inbound_rx: InboundReceiver,
    focus_tx: FocusSender,
    balance_tx: BalanceSender,
    assets: StaticAssets,
) {
    while let Some(message) = inbound_rx.recv().await {
        match message {
            ClientMessage::Focus => {
                let _ = focus_tx.send(FocusChange::Gained);
            }
            ClientMessage::Blur => {
                let _ = focus_tx.send(FocusChange::Lost);
            }
            ClientMessage::Balance {
                asset_id,
                tokens: None,
            } => {
                tracing::debug!(event = "app.balance.cleared", asset = %asset_id);
                balance_tx.send(None);
            }
            ClientMessage::Balance {
                asset_id,
                tokens: Some(tokens),
            } => match assets.lookup(&asset_id) {
                Ok(asset) => {
                    balance_tx.send(Some(Money::new(asset, tokens)));
                }
                Err(e) => {
                    tracing::warn!(event = "app.balance.rejected", asset = %asset_id, error = %e);
                }
            },
        }
    }
}

/// Republishes tracker signals, overlay changes and the mirror balance as
/// [`ServerEvent`]s. Ends once the tracker's signals are gone.
pub async fn forward_events(
    signals: IdleSubscriptions,
    mut overlay: watch::Receiver<OverlayState>,
    mut mirror: watch::Receiver<MirrorView>,
    events_tx: broadcast::Sender<ServerEvent>,
) {
    let IdleSubscriptions {
        window_blur: mut blur,
        window_focus: mut focus,
        mut sleep,
        mut wake_up,
    } = signals;

    loop {
        let event = tokio::select! {
            Some(()) = blur.recv() => ServerEvent::signal("window.blur", None),
            Some(()) = focus.recv() => ServerEvent::signal("window.focus", None),
            Some(step) = sleep.recv() => ServerEvent::signal("sleep", Some(step)),
            Some(()) = wake_up.recv() => ServerEvent::signal("wakeUp", None),
            Ok(()) = overlay.changed() => ServerEvent::Overlay(*overlay.borrow_and_update()),
            Ok(()) = mirror.changed() => ServerEvent::mirror_balance(&mirror.borrow_and_update()),
            else => break,
        };
        // No connected front-end is fine.
        let _ = events_tx.send(event);
    }
}

/// Logs tracker signals; used when nothing else consumes them.
pub async fn log_signals(signals: IdleSubscriptions) {
    let IdleSubscriptions {
        window_blur: mut blur,
        window_focus: mut focus,
        mut sleep,
        mut wake_up,
    } = signals;

    loop {
        tokio::select! {
            Some(()) = blur.recv() => tracing::info!(event = "app.window.blur"),
            Some(()) = focus.recv() => tracing::info!(event = "app.window.focus"),
            Some(step) = sleep.recv() => tracing::info!(event = "app.sleep", step),
            Some(()) = wake_up.recv() => tracing::info!(event = "app.wake_up"),
            else => break,
        }
    }
}

/// Everything a transport needs to talk to the running services.
pub struct Services {
    pub inbound_tx: InboundSender,
    pub events_tx: broadcast::Sender<ServerEvent>,
    tasks: Vec<JoinHandle<()>>,
}

impl Services {
    pub fn start(cli: &Cli, settings: Settings) -> Self {
        let assets = StaticAssets::new(&settings.assets, &settings.rates);
        let max_sleep = cli.max_sleep(&settings);

        let (focus_tx, focus_rx) = create_focus_channel();
        let idle = spawn_idle_tracker(focus_rx, max_sleep);
        let mirror = spawn_mirror_balance(assets.clone(), settings, cli.exchange_config());

        let (inbound_tx, inbound_rx) = create_inbound_channel();
        let (events_tx, _) = broadcast::channel(EVENT_CAPACITY);

        let router = tokio::spawn(route_inbound(
            inbound_rx,
            focus_tx,
            mirror.balance_tx,
            assets,
        ));
        let forwarder = tokio::spawn(forward_events(
            idle.signals,
            idle.overlay,
            mirror.view,
            events_tx.clone(),
        ));

        Self {
            inbound_tx,
            events_tx,
            tasks: vec![idle.task, mirror.task, router, forwarder],
        }
    }

    pub fn shutdown(self) {
        for task in self.tasks {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::{AssetDescriptor, RateEntry};
    use crate::idle::IdleSignals;
    use clap::Parser;
    use std::time::Duration;

    fn settings() -> Settings {
        Settings {
            base_asset_id: Some("USD".to_string()),
            assets: vec![
                AssetDescriptor {
                    id: "WAVES".to_string(),
                    name: "Waves".to_string(),
                    precision: 8,
                },
                AssetDescriptor {
                    id: "USD".to_string(),
                    name: "US Dollar".to_string(),
                    precision: 2,
                },
            ],
            rates: vec![RateEntry {
                from: "WAVES".to_string(),
                to: "USD".to_string(),
                rate: 2.0,
            }],
            ..Settings::default()
        }
    }

    async fn next_matching(
        events: &mut broadcast::Receiver<ServerEvent>,
        pred: impl Fn(&serde_json::Value) -> bool,
    ) -> serde_json::Value {
        loop {
            let event = events.recv().await.unwrap();
            let json = serde_json::to_value(&event).unwrap();
            if pred(&json) {
                return json;
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_services_turn_messages_into_events() {
        let cli = Cli::parse_from(["wallet_presence", "--daemon", "--max-sleep", "2"]);
        let services = Services::start(&cli, settings());
        let mut events = services.events_tx.subscribe();

        services
            .inbound_tx
            .send(ClientMessage::Balance {
                asset_id: "WAVES".to_string(),
                tokens: Some(3.0),
            })
            .unwrap();
        let balance = next_matching(&mut events, |e| {
            e["type"] == "mirrorBalance" && e["balance"] == 6.0
        })
        .await;
        assert_eq!(balance["display"], "6");

        services.inbound_tx.send(ClientMessage::Blur).unwrap();
        let blur = next_matching(&mut events, |e| e["type"] == "signal").await;
        assert_eq!(blur["name"], "window.blur");

        tokio::time::sleep(Duration::from_secs(301)).await;
        // Step signal and overlay update may arrive in either order.
        let (mut saw_step, mut saw_dim) = (false, false);
        while !(saw_step && saw_dim) {
            let event = next_matching(&mut events, |e| {
                e["name"] == "sleep" || (e["type"] == "overlay" && e["opacity"] == 0.5)
            })
            .await;
            if event["name"] == "sleep" {
                assert_eq!(event["step"], 1);
                saw_step = true;
            } else {
                assert_eq!(event["visible"], true);
                saw_dim = true;
            }
        }

        services.inbound_tx.send(ClientMessage::Focus).unwrap();
        let wake = next_matching(&mut events, |e| e["name"] == "wakeUp").await;
        assert_eq!(wake["type"], "signal");

        services.shutdown();
    }

    #[tokio::test]
    async fn test_unknown_balance_asset_is_ignored() {
        let (inbound_tx, inbound_rx) = create_inbound_channel();
        let (focus_tx, _focus_rx) = create_focus_channel();
        let (balance_tx, balance_rx) = create_balance_channel();
        let assets = StaticAssets::new(&settings().assets, &settings().rates);
        let router = tokio::spawn(route_inbound(inbound_rx, focus_tx, balance_tx, assets));

        inbound_tx
            .send(ClientMessage::Balance {
                asset_id: "DOGE".to_string(),
                tokens: Some(1.0),
            })
            .unwrap();
        drop(inbound_tx);
        router.await.unwrap();

        assert!(balance_rx.current().is_none());
    }

    #[tokio::test]
    async fn test_forwarder_delivers_signals_dispatched_before_it_runs() {
        let signals = IdleSignals::new();
        let subscriptions = signals.subscribe();
        let (overlay_tx, overlay_rx) = watch::channel(OverlayState::default());
        let (mirror_tx, mirror_rx) = watch::channel(MirrorView::default());
        let (events_tx, mut events) = broadcast::channel(EVENT_CAPACITY);

        // Dispatched before the forwarder task is even spawned.
        signals.window_blur.dispatch(());
        signals.sleep.dispatch(1);

        let forwarder = tokio::spawn(forward_events(subscriptions, overlay_rx, mirror_rx, events_tx));
        let mut names = Vec::new();
        for _ in 0..2 {
            let event = serde_json::to_value(events.recv().await.unwrap()).unwrap();
            if event["name"] == "sleep" {
                assert_eq!(event["step"], 1);
            }
            names.push(event["name"].as_str().unwrap().to_string());
        }
        names.sort();
        assert_eq!(names, ["sleep", "window.blur"]);

        drop(signals);
        drop(overlay_tx);
        drop(mirror_tx);
        forwarder.await.unwrap();
    }
}
