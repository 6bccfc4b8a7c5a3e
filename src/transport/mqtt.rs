//! MQTT message source (rumqttc).
//!
//! rumqttc reconnects on the next `poll()` after an error; this adapter only
//! pauses between attempts and re-subscribes on every ConnAck. A subscribe
//! that could not be queued is retried before each later poll.

use super::interface::{MessageSource, TransportEvent};
use async_trait::async_trait;
use rumqttc::{AsyncClient, ConnectReturnCode, Event, EventLoop, MqttOptions, Packet, QoS};
use std::time::Duration;

const KEEP_ALIVE: Duration = Duration::from_secs(60);
const REQUEST_CAPACITY: usize = 10;

pub struct MqttSource {
    client: AsyncClient,
    eventloop: EventLoop,
    host: String,
    port: u16,
    channel: String,
    reconnect_delay: Duration,
    backoff_pending: bool,
    subscribe_pending: bool,
}

impl MqttSource {
    pub fn new(host: &str, port: u16, channel: &str, reconnect_delay: Duration) -> Self {
        let client_id = format!("blister-monitor-{}", uuid::Uuid::new_v4().simple());
        let mut options = MqttOptions::new(client_id, host, port);
        options.set_keep_alive(KEEP_ALIVE);
        let (client, eventloop) = AsyncClient::new(options, REQUEST_CAPACITY);

        Self {
            client,
            eventloop,
            host: host.to_string(),
            port,
            channel: channel.to_string(),
            reconnect_delay,
            backoff_pending: false,
            subscribe_pending: false,
        }
    }

    /// Queue the subscription. `try_subscribe` because the request is served
    /// by this same event loop, so awaiting here could wait on ourselves.
    fn subscribe(&mut self) -> Result<(), String> {
        let result = self
            .client
            .try_subscribe(self.channel.as_str(), QoS::AtMostOnce)
            .map_err(|e| format!("subscribe to '{}' failed: {}", self.channel, e));
        self.subscribe_pending = result.is_err();
        result
    }
}

#[async_trait]
impl MessageSource for MqttSource {
    fn describe(&self) -> String {
        format!("{}:{} '{}'", self.host, self.port, self.channel)
    }

    async fn next_event(&mut self) -> Option<TransportEvent> {
        loop {
            if self.backoff_pending {
                self.backoff_pending = false;
                tokio::time::sleep(self.reconnect_delay).await;
            }
            if self.subscribe_pending {
                match self.subscribe() {
                    Ok(()) => tracing::info!("[MQTT] Subscribed to '{}' on retry", self.channel),
                    Err(e) => tracing::debug!("[MQTT] {}", e),
                }
            }

            match self.eventloop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                    if ack.code != ConnectReturnCode::Success {
                        self.backoff_pending = true;
                        return Some(TransportEvent::Disconnected(format!(
                            "connection refused ({:?})",
                            ack.code
                        )));
                    }
                    return Some(match self.subscribe() {
                        Ok(()) => TransportEvent::Connected,
                        Err(reason) => TransportEvent::Disconnected(reason),
                    });
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    return Some(TransportEvent::Payload(publish.payload.to_vec()));
                }
                Ok(_) => continue,
                Err(e) => {
                    self.backoff_pending = true;
                    return Some(TransportEvent::Disconnected(e.to_string()));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source() -> MqttSource {
        MqttSource::new("127.0.0.1", 1883, "medicalblister", Duration::from_millis(10))
    }

    #[tokio::test]
    async fn subscribe_succeeds_when_request_queue_has_room() {
        let mut source = source();
        assert!(source.subscribe().is_ok());
        assert!(!source.subscribe_pending);
    }

    #[tokio::test]
    async fn failed_subscribe_stays_pending_for_retry() {
        let mut source = source();
        while source.client.try_subscribe("filler", QoS::AtMostOnce).is_ok() {}

        let err = source.subscribe().unwrap_err();
        assert!(err.contains("'medicalblister'"));
        assert!(source.subscribe_pending);
    }
}
