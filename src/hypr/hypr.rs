use crate::error::HyprError;
use crate::idle::{FocusChange, FocusSource};
use regex::Regex;
use serde::Deserialize;
use std::time::Duration;
use tokio::process::Command;

pub const POLL_INTERVAL: Duration = Duration::from_millis(1000); // Check active window every second

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct HyprlandWindow {
    #[serde(default)]
    pub class: String,
    #[serde(default)]
    pub title: String,
}

/// Parses `hyprctl activewindow -j` output. Empty output or `{}` means no
/// window has focus.
pub fn parse_active_window(stdout: &str) -> Result<Option<HyprlandWindow>, HyprError> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    let window: HyprlandWindow = serde_json::from_str(trimmed)?;
    if window.class.is_empty() && window.title.is_empty() {
        return Ok(None);
    }
    Ok(Some(window))
}

pub fn is_wallet_window(pattern: &Regex, window: &HyprlandWindow) -> bool {
    pattern.is_match(&window.class) || pattern.is_match(&window.title)
}

pub async fn get_active_window() -> Result<Option<HyprlandWindow>, HyprError> {
    let output = Command::new("hyprctl")
        .args(["activewindow", "-j"])
        .output()
        .await?;

    if !output.status.success() {
        return Ok(None);
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    parse_active_window(&stdout)
}

/// Turns Hyprland's active window into focus transitions for the wallet
/// window matched by `pattern`.
pub struct HyprFocusSource {
    pattern: Regex,
    interval: Duration,
    focused: bool,
}

impl HyprFocusSource {
    pub fn new(pattern: Regex) -> Self {
        Self {
            pattern,
            interval: POLL_INTERVAL,
            // The tracker starts out focused.
            focused: true,
        }
    }

    /// Records an observation; returns the transition it causes, if any.
    pub fn observe(&mut self, window: Option<&HyprlandWindow>) -> Option<FocusChange> {
        let focused = window.is_some_and(|w| is_wallet_window(&self.pattern, w));
        if focused == self.focused {
            return None;
        }
        self.focused = focused;
        Some(if focused {
            FocusChange::Gained
        } else {
            FocusChange::Lost
        })
    }
}

impl FocusSource for HyprFocusSource {
    async fn next_change(&mut self) -> Option<FocusChange> {
        loop {
            match get_active_window().await {
                Ok(window) => {
                    tracing::trace!(event = "hypr.active_window", ?window);
                    if let Some(change) = self.observe(window.as_ref()) {
                        return Some(change);
                    }
                }
                Err(e) => {
                    tracing::warn!(event = "hypr.active_window.failed", error = %e);
                }
            }
            tokio::time::sleep(self.interval).await;
        }
    }
}
