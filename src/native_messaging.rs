use crate::ws::{InboundSender, ServerEvent, dispatch_frame};
use serde::Serialize;
use std::io::{self, Read, Write};
use tokio::sync::{broadcast, mpsc, oneshot};

/// Read one frame using the Chrome native messaging protocol.
/// Frames are prefixed with a 4-byte length in native byte order.
pub fn read_frame<R: Read>(reader: &mut R) -> io::Result<Option<Vec<u8>>> {
    let mut length_bytes = [0u8; 4];

    match reader.read_exact(&mut length_bytes) {
        Ok(_) => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
            return Ok(None); // No more messages
        }
        Err(e) => return Err(e),
    }

    let length = u32::from_ne_bytes(length_bytes) as usize;

    let mut buffer = vec![0u8; length];
    reader.read_exact(&mut buffer)?;

    Ok(Some(buffer))
}

/// Write one JSON message using the Chrome native messaging protocol.
pub fn write_message<W: Write, T: Serialize>(writer: &mut W, message: &T) -> io::Result<()> {
    let json = serde_json::to_vec(message)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

    let length = u32::try_from(json.len())
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

    writer.write_all(&length.to_ne_bytes())?;
    writer.write_all(&json)?;
    writer.flush()?;

    Ok(())
}

/// Serves the extension over `input`/`output` (stdin/stdout in production)
/// until `input` reaches end of file.
///
/// Inbound frames are acknowledged and forwarded to `inbound_tx`; events from
/// `events_rx` are written out as they arrive. All writes go through a single
/// writer thread. Events already queued when input closes are still written
/// before the writer shuts down.
pub async fn run_native_host<R, W>(
    mut input: R,
    mut output: W,
    inbound_tx: InboundSender,
    mut events_rx: broadcast::Receiver<ServerEvent>,
) -> io::Result<()>
where
    R: Read + Send + 'static,
    W: Write + Send + 'static,
{
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<serde_json::Value>();

    let writer = tokio::task::spawn_blocking(move || -> io::Result<()> {
        while let Some(message) = out_rx.blocking_recv() {
            write_message(&mut output, &message)?;
        }
        Ok(())
    });

    let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
    let events_out = out_tx.clone();
    let forwarder = tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                event = events_rx.recv() => match event {
                    Ok(event) => {
                        if !forward_event(&events_out, &event) {
                            return;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(event = "native_host.event.lagged", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => return,
                },
                _ = &mut stop_rx => break,
            }
        }
        while let Ok(event) = events_rx.try_recv() {
            if !forward_event(&events_out, &event) {
                return;
            }
        }
    });

    let reader = tokio::task::spawn_blocking(move || -> io::Result<()> {
        while let Some(frame) = read_frame(&mut input)? {
            let ack = dispatch_frame(&frame, &inbound_tx);
            if let Ok(value) = serde_json::to_value(&ack) {
                let _ = out_tx.send(value);
            }
        }
        tracing::info!(event = "native_host.stdin.closed");
        Ok(())
    });

    let read_result = reader.await.map_err(io::Error::other)?;
    let _ = stop_tx.send(());
    forwarder.await.map_err(io::Error::other)?;
    writer.await.map_err(io::Error::other)??;
    read_result
}

/// Queues `event` for the writer. `false` once the writer is gone.
fn forward_event(out: &mpsc::UnboundedSender<serde_json::Value>, event: &ServerEvent) -> bool {
    match serde_json::to_value(event) {
        Ok(value) => out.send(value).is_ok(),
        Err(e) => {
            tracing::warn!(event = "native_host.event.unserializable", error = %e);
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ws::{Ack, ClientMessage, create_inbound_channel};
    use std::io::Cursor;
    use std::sync::{Arc, Mutex};

    /// Output handle the test can read back after the host has consumed it.
    #[derive(Clone, Default)]
    struct SharedOutput(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedOutput {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn frames(output: &SharedOutput) -> Vec<serde_json::Value> {
        let bytes = output.0.lock().unwrap().clone();
        let mut cursor = Cursor::new(bytes);
        let mut frames = Vec::new();
        while let Some(frame) = read_frame(&mut cursor).unwrap() {
            frames.push(serde_json::from_slice(&frame).unwrap());
        }
        frames
    }

    #[test]
    fn test_ack_serialization() {
        let ack = Ack {
            success: true,
            message: Some("Test message".to_string()),
        };
        let json = serde_json::to_string(&ack).unwrap();
        assert!(json.contains("\"success\":true"));
        assert!(json.contains("\"message\":\"Test message\""));
    }

    #[test]
    fn test_written_frame_reads_back() {
        let mut buffer = Vec::new();
        write_message(&mut buffer, &serde_json::json!({"type": "focus"})).unwrap();

        let mut cursor = Cursor::new(buffer);
        let frame = read_frame(&mut cursor).unwrap().unwrap();
        let (tx, mut rx) = create_inbound_channel();
        assert!(dispatch_frame(&frame, &tx).success);
        assert_eq!(rx.try_recv().unwrap(), ClientMessage::Focus);

        assert!(read_frame(&mut cursor).unwrap().is_none());
    }

    #[test]
    fn test_truncated_frame_is_an_error() {
        let mut bytes = 10u32.to_ne_bytes().to_vec();
        bytes.extend_from_slice(b"{}");
        let mut cursor = Cursor::new(bytes);
        assert!(read_frame(&mut cursor).is_err());
    }

    #[tokio::test]
    async fn test_native_host_acks_frames_and_forwards_events() {
        let mut input = Vec::new();
        write_message(&mut input, &serde_json::json!({"type": "blur"})).unwrap();
        write_message(&mut input, &serde_json::json!({"type": "nonsense"})).unwrap();
        write_message(&mut input, &serde_json::json!({"type": "focus"})).unwrap();

        let (inbound_tx, mut inbound_rx) = create_inbound_channel();
        let (events_tx, events_rx) = broadcast::channel(16);
        // Queued before the host starts; must still reach the output.
        events_tx
            .send(ServerEvent::signal("sleep", Some(2)))
            .unwrap();

        let output = SharedOutput::default();
        run_native_host(Cursor::new(input), output.clone(), inbound_tx, events_rx)
            .await
            .unwrap();

        assert_eq!(inbound_rx.recv().await, Some(ClientMessage::Blur));
        assert_eq!(inbound_rx.recv().await, Some(ClientMessage::Focus));
        // The host dropped its sender on shutdown.
        assert_eq!(inbound_rx.recv().await, None);

        let written = frames(&output);
        assert_eq!(written.len(), 4);
        let acks: Vec<bool> = written
            .iter()
            .filter_map(|frame| frame.get("success").and_then(|s| s.as_bool()))
            .collect();
        assert_eq!(acks, [true, false, true]);
        let events: Vec<&serde_json::Value> = written
            .iter()
            .filter(|frame| frame["type"] == "signal")
            .collect();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0]["name"], "sleep");
        assert_eq!(events[0]["step"], 2);
    }

    #[tokio::test]
    async fn test_native_host_reports_truncated_input() {
        let mut input = 10u32.to_ne_bytes().to_vec();
        input.extend_from_slice(b"{}");
        let (inbound_tx, _inbound_rx) = create_inbound_channel();
        let (_events_tx, events_rx) = broadcast::channel(16);

        let result =
            run_native_host(Cursor::new(input), SharedOutput::default(), inbound_tx, events_rx).await;
        assert!(result.is_err());
    }
}
