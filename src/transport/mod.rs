//! Message source plumbing: MQTT subscription and the pump that turns
//! deliveries into counter events.

pub mod interface;
pub mod mqtt;
pub mod pump;

pub use interface::{decode_payload, MessageSource, TransportError, TransportEvent};
pub use mqtt::MqttSource;
pub use pump::run_event_pump;
