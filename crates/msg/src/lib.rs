//! Messaging plumbing for saga orchestration.
//!
//! Commands and replies travel as [`Message`]s: a JSON payload plus a flat
//! string [`Headers`] map. Payload types are resolved by name through an
//! explicitly constructed [`TypeRegistry`] rather than any global state.

pub mod codec;
pub mod error;
pub mod headers;
pub mod memory;
pub mod message;
pub mod publisher;
pub mod receiver;
pub mod reply;
pub mod subscriber;

pub use codec::{CommandType, DomainCommand, Failure, Reply, ReplyType, Success, TypeRegistry};
pub use common::MessageId;
pub use error::{MsgError, Result};
pub use headers::Headers;
pub use memory::InMemoryBroker;
pub use message::{Message, MessageBuilder};
pub use publisher::{CommandPublisher, MessagePublisher, Producer, Publisher, ReplyPublisher};
pub use receiver::MessageReceiver;
pub use reply::{ReplyBuilder, ReplyMessage, with_failure, with_reply, with_success};
pub use subscriber::Subscriber;
