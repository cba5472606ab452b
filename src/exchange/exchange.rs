//! Mirror balance: a wallet balance shown converted into the user's base
//! currency (the "mirror" asset).

use crate::error::ExchangeError;
use crate::exchange::assets::{AssetDescriptor, AssetService, Money, SettingsSource};
use crate::exchange::format::format_amount;
use serde::Serialize;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, sleep_until};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(5000);
pub const BASE_ASSET_SETTING: &str = "baseAssetId";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateMode {
    /// Convert once per balance change, no timer.
    Once,
    /// Keep converting on this interval; balance changes restart the poll.
    Poll(Duration),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeConfig {
    pub target_asset_id: Option<String>,
    pub mode: UpdateMode,
}

impl ExchangeConfig {
    /// Builds the config from its textual bindings. The interval is in
    /// milliseconds; anything unparsable or zero means the default.
    pub fn from_bindings(
        interval: Option<&str>,
        no_update: bool,
        target_asset_id: Option<String>,
    ) -> Self {
        let mode = if no_update {
            UpdateMode::Once
        } else {
            UpdateMode::Poll(parse_interval(interval))
        };
        Self {
            target_asset_id,
            mode,
        }
    }
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self::from_bindings(None, false, None)
    }
}

pub fn parse_interval(raw: Option<&str>) -> Duration {
    raw.and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|ms| ms.is_finite() && *ms >= 1.0)
        .map(|ms| Duration::from_millis(ms as u64))
        .unwrap_or(DEFAULT_POLL_INTERVAL)
}

/// What the exchange display renders.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MirrorView {
    pub mirror: Option<AssetDescriptor>,
    pub balance: Option<f64>,
}

impl MirrorView {
    pub fn display(&self) -> Option<String> {
        let balance = self.balance?;
        let precision = self.mirror.as_ref().map_or(8, |m| m.precision);
        Some(format_amount(balance, precision))
    }
}

/// Feeds balance changes to [`MirrorBalance`]. Every `send` arrives as its
/// own change, in order; the latest value is kept for re-reads.
pub struct BalanceSender {
    latest: watch::Sender<Option<Money>>,
    changes: mpsc::UnboundedSender<Option<Money>>,
}

impl BalanceSender {
    pub fn send(&self, balance: Option<Money>) {
        self.latest.send_replace(balance.clone());
        // The component may already be gone; the latest value still updates.
        let _ = self.changes.send(balance);
    }
}

pub struct BalanceReceiver {
    latest: watch::Receiver<Option<Money>>,
    changes: mpsc::UnboundedReceiver<Option<Money>>,
}

impl BalanceReceiver {
    /// The most recently sent balance.
    pub fn current(&self) -> Option<Money> {
        self.latest.borrow().clone()
    }

    /// Next change in send order. `None` once the sender is dropped.
    pub async fn changed(&mut self) -> Option<Option<Money>> {
        self.changes.recv().await
    }

    /// Drops queued changes; [`Self::current`] already reflects them.
    fn discard_pending(&mut self) {
        while self.changes.try_recv().is_ok() {}
    }
}

pub fn create_balance_channel() -> (BalanceSender, BalanceReceiver) {
    let (latest, latest_rx) = watch::channel(None);
    let (changes, changes_rx) = mpsc::unbounded_channel();
    (
        BalanceSender { latest, changes },
        BalanceReceiver {
            latest: latest_rx,
            changes: changes_rx,
        },
    )
}

pub struct MirrorBalance<A: AssetService, S: SettingsSource> {
    assets: A,
    settings: S,
    config: ExchangeConfig,
    balance: BalanceReceiver,
    view: watch::Sender<MirrorView>,
}

impl<A: AssetService, S: SettingsSource> MirrorBalance<A, S> {
    pub fn new(
        assets: A,
        settings: S,
        config: ExchangeConfig,
        balance: BalanceReceiver,
    ) -> (Self, watch::Receiver<MirrorView>) {
        let (view, view_rx) = watch::channel(MirrorView::default());
        let component = Self {
            assets,
            settings,
            config,
            balance,
            view,
        };
        (component, view_rx)
    }

    /// Resolves the mirror asset, then tracks the balance until its sender
    /// is dropped. Dropping the future cancels any pending poll.
    pub async fn run(mut self) -> Result<(), ExchangeError> {
        let mirror = self.resolve_mirror().await?;
        tracing::info!(
            event = "exchange.mirror.resolved",
            mirror = %mirror.id,
            mode = ?self.config.mode
        );
        self.view.send_modify(|view| view.mirror = Some(mirror.clone()));

        match self.config.mode {
            UpdateMode::Once => self.run_once_per_change(&mirror).await,
            UpdateMode::Poll(interval) => self.run_polling(&mirror, interval).await,
        }

        tracing::info!(event = "exchange.mirror.detached", mirror = %mirror.id);
        Ok(())
    }

    async fn resolve_mirror(&self) -> Result<AssetDescriptor, ExchangeError> {
        let id = self
            .config
            .target_asset_id
            .clone()
            .or_else(|| self.settings.setting(BASE_ASSET_SETTING))
            .ok_or(ExchangeError::NoMirrorAsset)?;
        self.assets.asset_info(&id).await
    }

    async fn run_once_per_change(&mut self, mirror: &AssetDescriptor) {
        self.balance.discard_pending();
        let initial = self.balance.current();
        self.refresh(mirror, initial).await;

        while let Some(balance) = self.balance.changed().await {
            self.refresh(mirror, balance).await;
        }
    }

    async fn run_polling(&mut self, mirror: &AssetDescriptor, interval: Duration) {
        self.balance.discard_pending();
        let mut next_fetch = Instant::now();

        loop {
            tokio::select! {
                biased;
                change = self.balance.changed() => match change {
                    None => break,
                    Some(Some(_)) => {
                        tracing::debug!(event = "exchange.poll.restarted", mirror = %mirror.id);
                        next_fetch = Instant::now();
                    }
                    Some(None) => self.publish(None),
                },
                () = sleep_until(next_fetch) => {
                    let balance = self.balance.current();
                    self.refresh(mirror, balance).await;
                    next_fetch = Instant::now() + interval;
                }
            }
        }
    }

    /// One conversion of `balance`. A failed lookup keeps the last published
    /// value.
    async fn refresh(&self, mirror: &AssetDescriptor, balance: Option<Money>) {
        let Some(balance) = balance else {
            self.publish(None);
            return;
        };

        match self.assets.rate(&balance.asset.id, &mirror.id).await {
            Ok(rate) => {
                // The balance may have moved on while the lookup was in flight.
                let converted = self
                    .balance
                    .current()
                    .map_or(0.0, |current| rate.exchange(current.tokens()));
                self.publish(Some(converted));
            }
            Err(e) => {
                tracing::warn!(
                    event = "exchange.rate.lookup_failed",
                    from = %balance.asset.id,
                    to = %mirror.id,
                    error = %e
                );
            }
        }
    }

    fn publish(&self, balance: Option<f64>) {
        self.view.send_if_modified(|view| {
            let changed = view.balance != balance;
            view.balance = balance;
            changed
        });
    }
}
