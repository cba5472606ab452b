use crate::error::AppError;
use crate::ws::messages::{InboundSender, ServerEvent, dispatch_frame};
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio_tungstenite::tungstenite::protocol::Message;

pub async fn start_websocket_server(
    addr: SocketAddr,
    inbound_tx: InboundSender,
    events: broadcast::Sender<ServerEvent>,
) -> Result<(), AppError> {
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(event = "ws.server.listening", %addr);
    serve(listener, inbound_tx, events).await;
    Ok(())
}

/// Accepts connections until the listener fails.
pub async fn serve(
    listener: TcpListener,
    inbound_tx: InboundSender,
    events: broadcast::Sender<ServerEvent>,
) {
    while let Ok((stream, peer_addr)) = listener.accept().await {
        tracing::info!(event = "ws.connection.accepted", peer = %peer_addr);
        let tx = inbound_tx.clone();
        tokio::spawn(handle_connection(stream, peer_addr, tx, events.subscribe()));
    }
}

async fn handle_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    inbound_tx: InboundSender,
    mut events_rx: broadcast::Receiver<ServerEvent>,
) {
    let ws_stream = match tokio_tungstenite::accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            tracing::warn!(event = "ws.handshake.failed", peer = %peer_addr, error = %e);
            return;
        }
    };

    tracing::debug!(event = "ws.handshake.completed", peer = %peer_addr);

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    loop {
        tokio::select! {
            msg = ws_receiver.next() => {
                let Some(msg) = msg else { break };
                match msg {
                    Ok(Message::Text(text)) => {
                        let ack = dispatch_frame(text.as_bytes(), &inbound_tx);
                        let Ok(ack_json) = serde_json::to_string(&ack) else { continue };
                        if let Err(e) = ws_sender.send(Message::Text(ack_json)).await {
                            tracing::warn!(event = "ws.ack.send_failed", peer = %peer_addr, error = %e);
                            break;
                        }
                    }
                    Ok(Message::Close(_)) => {
                        tracing::info!(event = "ws.connection.closed_by_peer", peer = %peer_addr);
                        break;
                    }
                    Ok(Message::Ping(data)) => {
                        if let Err(e) = ws_sender.send(Message::Pong(data)).await {
                            tracing::warn!(event = "ws.pong.send_failed", peer = %peer_addr, error = %e);
                            break;
                        }
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::warn!(event = "ws.connection.error", peer = %peer_addr, error = %e);
                        break;
                    }
                }
            }
            event = events_rx.recv() => {
                match event {
                    Ok(event) => {
                        let Ok(json) = serde_json::to_string(&event) else { continue };
                        if let Err(e) = ws_sender.send(Message::Text(json)).await {
                            tracing::warn!(event = "ws.event.send_failed", peer = %peer_addr, error = %e);
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(event = "ws.event.lagged", peer = %peer_addr, skipped);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }
    }

    tracing::info!(event = "ws.connection.terminated", peer = %peer_addr);
}
