use crate::exchange::MirrorView;
use crate::idle::OverlayState;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Messages the wallet front-end sends us.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientMessage {
    Focus,
    Blur,
    #[serde(rename_all = "camelCase")]
    Balance {
        asset_id: String,
        #[serde(default)]
        tokens: Option<f64>, // null clears the balance
    },
}

/// Reply to every inbound frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ack {
    pub success: bool,
    pub message: Option<String>,
}

/// Everything pushed to connected front-ends.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerEvent {
    Signal {
        name: &'static str,
        #[serde(skip_serializing_if = "Option::is_none")]
        step: Option<u32>,
        at: DateTime<Local>,
    },
    Overlay(OverlayState),
    #[serde(rename_all = "camelCase")]
    MirrorBalance {
        asset_id: Option<String>,
        balance: Option<f64>,
        display: Option<String>,
    },
}

impl ServerEvent {
    pub fn signal(name: &'static str, step: Option<u32>) -> Self {
        Self::Signal {
            name,
            step,
            at: Local::now(),
        }
    }

    pub fn mirror_balance(view: &MirrorView) -> Self {
        Self::MirrorBalance {
            asset_id: view.mirror.as_ref().map(|m| m.id.clone()),
            balance: view.balance,
            display: view.display(),
        }
    }
}

pub type InboundSender = mpsc::UnboundedSender<ClientMessage>;
pub type InboundReceiver = mpsc::UnboundedReceiver<ClientMessage>;

pub fn create_inbound_channel() -> (InboundSender, InboundReceiver) {
    mpsc::unbounded_channel()
}

/// Parses one inbound frame, forwards it and builds the reply.
pub fn dispatch_frame(frame: &[u8], inbound: &InboundSender) -> Ack {
    match serde_json::from_slice::<ClientMessage>(frame) {
        Ok(message) => {
            tracing::debug!(event = "ws.message.received", ?message);
            if let Err(e) = inbound.send(message) {
                tracing::error!(event = "ws.message.forward_failed", error = %e);
                return Ack {
                    success: false,
                    message: Some("Service unavailable".to_string()),
                };
            }
            Ack {
                success: true,
                message: Some("Message received".to_string()),
            }
        }
        Err(e) => {
            tracing::warn!(event = "ws.message.parse_failed", error = %e);
            Ack {
                success: false,
                message: Some(format!("Parse error: {}", e)),
            }
        }
    }
}
