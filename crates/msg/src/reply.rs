//! Replies with their outcome headers.

use crate::headers::{OUTCOME_FAILURE, OUTCOME_SUCCESS, REPLY_NAME, REPLY_OUTCOME};
use crate::{Failure, Headers, Reply, Success};

/// A decoded reply together with the headers it travelled with.
#[derive(Debug)]
pub struct ReplyMessage {
    reply: Box<dyn Reply>,
    headers: Headers,
}

impl ReplyMessage {
    pub fn new(reply: Box<dyn Reply>, headers: Headers) -> Self {
        Self { reply, headers }
    }

    pub fn reply(&self) -> &dyn Reply {
        self.reply.as_ref()
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Returns the `REPLY_OUTCOME` header value, if present.
    pub fn outcome(&self) -> Option<&str> {
        self.headers.get(REPLY_OUTCOME)
    }

    pub fn is_success(&self) -> bool {
        self.outcome() == Some(OUTCOME_SUCCESS)
    }

    pub fn into_parts(self) -> (Box<dyn Reply>, Headers) {
        (self.reply, self.headers)
    }
}

/// Starts a reply builder wrapping `reply`.
pub fn with_reply<R: Reply>(reply: R) -> ReplyBuilder {
    ReplyBuilder {
        reply: Some(Box::new(reply)),
        headers: Headers::new(),
    }
}

/// A generic [`Success`] reply.
pub fn with_success() -> ReplyMessage {
    ReplyBuilder::new().success()
}

/// A generic [`Failure`] reply.
pub fn with_failure() -> ReplyMessage {
    ReplyBuilder::new().failure()
}

/// Builds replies carrying custom headers.
#[derive(Debug, Default)]
pub struct ReplyBuilder {
    reply: Option<Box<dyn Reply>>,
    headers: Headers,
}

impl ReplyBuilder {
    /// Creates a builder with no reply; `success`/`failure` fall back to the
    /// generic replies.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the wrapped reply.
    pub fn reply<R: Reply>(mut self, reply: R) -> Self {
        self.reply = Some(Box::new(reply));
        self
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.set(key, value);
        self
    }

    pub fn headers(mut self, headers: Headers) -> Self {
        self.headers.extend(headers);
        self
    }

    /// Finishes as a successful reply.
    pub fn success(self) -> ReplyMessage {
        let Self { reply, headers } = self;
        finish(reply.unwrap_or_else(|| Box::new(Success) as Box<dyn Reply>), headers, OUTCOME_SUCCESS)
    }

    /// Finishes as a failed reply.
    pub fn failure(self) -> ReplyMessage {
        let Self { reply, headers } = self;
        finish(reply.unwrap_or_else(|| Box::new(Failure) as Box<dyn Reply>), headers, OUTCOME_FAILURE)
    }
}

fn finish(reply: Box<dyn Reply>, mut headers: Headers, outcome: &str) -> ReplyMessage {
    headers.set(REPLY_OUTCOME, outcome);
    headers.set(REPLY_NAME, reply.reply_name());
    ReplyMessage::new(reply, headers)
}
