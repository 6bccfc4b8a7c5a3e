//! Event pump: the long-lived receive loop in front of the counter.

use super::interface::{decode_payload, MessageSource, TransportEvent};
use crate::activity::{ActivityLog, LogKind};
use crate::counter::CounterHandle;

/// Feed deliveries into the counter until the source closes or the counter
/// stops. Transport failures are logged and never end the loop.
pub async fn run_event_pump<S>(mut source: S, counter: CounterHandle, log: ActivityLog)
where
    S: MessageSource,
{
    let endpoint = source.describe();
    tracing::info!("[MQTT] Listening on {}", endpoint);

    while let Some(event) = source.next_event().await {
        match event {
            TransportEvent::Connected => {
                tracing::info!("[MQTT] Connected to {}", endpoint);
                log.push(LogKind::Transport, format!("Connected to {}", endpoint));
            }
            TransportEvent::Disconnected(reason) => {
                tracing::warn!("[MQTT] Connection error: {}", reason);
                log.push(LogKind::Transport, format!("MQTT connection error: {}", reason));
            }
            TransportEvent::Payload(bytes) => match decode_payload(&bytes) {
                Ok(text) => {
                    log.push(LogKind::Event, format!("Received: {}", text));
                    if let Err(e) = counter.on_event().await {
                        tracing::error!("[MQTT] Cannot count event: {}", e);
                        break;
                    }
                }
                Err(e) => {
                    tracing::warn!("[MQTT] Ignoring delivery: {}", e);
                    log.push(LogKind::Error, e.to_string());
                }
            },
        }
    }

    tracing::info!("[MQTT] Event pump finished");
}
