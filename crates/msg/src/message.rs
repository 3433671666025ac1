use common::MessageId;
use serde::{Deserialize, Serialize};

use crate::headers::{MESSAGE_CHANNEL, MESSAGE_ID};
use crate::Headers;

/// A message exchanged between the orchestrator and saga participants.
///
/// The payload is the encoded command or reply; everything needed to route and
/// correlate it lives in the headers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Unique identifier for this message. Mirrored in the `ID` header.
    pub id: MessageId,

    /// Routing and correlation headers.
    pub headers: Headers,

    /// The encoded payload.
    pub payload: Vec<u8>,
}

impl Message {
    /// Creates a new message builder.
    pub fn builder() -> MessageBuilder {
        MessageBuilder::default()
    }

    /// Returns the destination channel, if one has been assigned.
    pub fn channel(&self) -> Option<&str> {
        self.headers.get(MESSAGE_CHANNEL)
    }
}

/// Builder for constructing messages.
#[derive(Debug, Default)]
pub struct MessageBuilder {
    id: Option<MessageId>,
    headers: Headers,
    payload: Vec<u8>,
}

impl MessageBuilder {
    /// Sets the message ID. If not set, a new ID will be generated.
    pub fn id(mut self, id: MessageId) -> Self {
        self.id = Some(id);
        self
    }

    /// Adds a single header.
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.set(key, value);
        self
    }

    /// Merges a set of headers, overwriting existing keys.
    pub fn headers(mut self, headers: Headers) -> Self {
        self.headers.extend(headers);
        self
    }

    /// Sets the channel the message is to be delivered to.
    pub fn destination_channel(mut self, channel: impl Into<String>) -> Self {
        self.headers.set(MESSAGE_CHANNEL, channel);
        self
    }

    /// Sets the raw payload.
    pub fn payload(mut self, payload: Vec<u8>) -> Self {
        self.payload = payload;
        self
    }

    /// Builds the message.
    pub fn build(self) -> Message {
        let id = self.id.unwrap_or_default();
        let mut headers = self.headers;
        headers.set(MESSAGE_ID, id.to_string());

        Message {
            id,
            headers,
            payload: self.payload,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_mirrors_id_into_headers() {
        let id = MessageId::new();
        let message = Message::builder()
            .id(id)
            .header("COMMAND_NAME", "test.Command")
            .destination_channel("orders")
            .payload(b"{}".to_vec())
            .build();

        assert_eq!(message.id, id);
        assert_eq!(message.headers.get(MESSAGE_ID), Some(id.to_string().as_str()));
        assert_eq!(message.channel(), Some("orders"));
        assert_eq!(message.payload, b"{}");
    }

    #[test]
    fn id_header_cannot_be_spoofed() {
        let message = Message::builder().header(MESSAGE_ID, "bogus").build();
        assert_eq!(
            message.headers.get(MESSAGE_ID),
            Some(message.id.to_string().as_str())
        );
    }
}
