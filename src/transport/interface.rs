use async_trait::async_trait;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// (Re)connected and subscribed.
    Connected,
    /// One delivery on the subscribed channel.
    Payload(Vec<u8>),
    /// Connection lost or refused. The source keeps trying.
    Disconnected(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("Malformed event payload: {0}")]
    MalformedEvent(String),
}

/// Abstract subscription to one named channel.
#[async_trait]
pub trait MessageSource: Send {
    /// Human-readable endpoint, e.g. `broker:1883 'topic'`.
    fn describe(&self) -> String;

    /// Next transport event. `None` means the source is closed for good.
    async fn next_event(&mut self) -> Option<TransportEvent>;
}

/// Payloads are treated as text for the activity log only. Empty is fine;
/// non-UTF-8 is malformed.
pub fn decode_payload(bytes: &[u8]) -> Result<String, TransportError> {
    std::str::from_utf8(bytes)
        .map(|s| s.trim().to_string())
        .map_err(|e| TransportError::MalformedEvent(e.to_string()))
}
