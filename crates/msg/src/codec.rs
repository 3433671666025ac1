//! Command and reply payload types and the explicit codec registry.
//!
//! Concrete payloads implement [`CommandType`] or [`ReplyType`]; the
//! object-safe [`DomainCommand`] and [`Reply`] traits are implemented for them
//! automatically so they can be carried around as trait objects and encoded
//! without knowing the concrete type.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::{MsgError, Result};

/// A serializable command addressed to a saga participant.
pub trait CommandType: Serialize + DeserializeOwned + fmt::Debug + Send + Sync + 'static {
    /// Stable wire name, carried in the `COMMAND_NAME` header.
    const COMMAND_NAME: &'static str;

    /// Channel the command is published to.
    const DESTINATION_CHANNEL: &'static str;
}

/// Type-erased view of a [`CommandType`].
pub trait DomainCommand: fmt::Debug + Send + Sync + 'static {
    fn command_name(&self) -> &'static str;

    fn destination(&self) -> &'static str;

    /// Encodes the command payload.
    fn encode(&self) -> std::result::Result<Vec<u8>, serde_json::Error>;

    fn as_any(&self) -> &dyn Any;

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send + Sync>;
}

impl<T: CommandType> DomainCommand for T {
    fn command_name(&self) -> &'static str {
        T::COMMAND_NAME
    }

    fn destination(&self) -> &'static str {
        T::DESTINATION_CHANNEL
    }

    fn encode(&self) -> std::result::Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send + Sync> {
        self
    }
}

impl dyn DomainCommand {
    /// Returns the concrete command if it is a `C`.
    pub fn downcast_ref<C: CommandType>(&self) -> Option<&C> {
        self.as_any().downcast_ref::<C>()
    }
}

/// A serializable reply to a command.
pub trait ReplyType: Serialize + DeserializeOwned + fmt::Debug + Send + Sync + 'static {
    /// Stable wire name, carried in the `REPLY_NAME` header.
    const REPLY_NAME: &'static str;
}

/// Type-erased view of a [`ReplyType`].
pub trait Reply: fmt::Debug + Send + Sync + 'static {
    fn reply_name(&self) -> &'static str;

    fn encode(&self) -> std::result::Result<Vec<u8>, serde_json::Error>;

    fn as_any(&self) -> &dyn Any;
}

impl<T: ReplyType> Reply for T {
    fn reply_name(&self) -> &'static str {
        T::REPLY_NAME
    }

    fn encode(&self) -> std::result::Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl dyn Reply {
    /// Returns the concrete reply if it is an `R`.
    pub fn downcast_ref<R: ReplyType>(&self) -> Option<&R> {
        self.as_any().downcast_ref::<R>()
    }
}

/// Generic successful reply.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Success;

impl ReplyType for Success {
    const REPLY_NAME: &'static str = "msg.Success";
}

/// Generic failure reply.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure;

impl ReplyType for Failure {
    const REPLY_NAME: &'static str = "msg.Failure";
}

type CommandDecoder = fn(&[u8]) -> std::result::Result<Box<dyn DomainCommand>, serde_json::Error>;
type ReplyDecoder = fn(&[u8]) -> std::result::Result<Box<dyn Reply>, serde_json::Error>;

fn decode_command_as<C: CommandType>(
    payload: &[u8],
) -> std::result::Result<Box<dyn DomainCommand>, serde_json::Error> {
    Ok(Box::new(serde_json::from_slice::<C>(payload)?))
}

fn decode_reply_as<R: ReplyType>(
    payload: &[u8],
) -> std::result::Result<Box<dyn Reply>, serde_json::Error> {
    Ok(Box::new(serde_json::from_slice::<R>(payload)?))
}

/// Name-keyed decoders for commands and replies.
///
/// Built once and handed to whatever needs to turn payloads back into typed
/// values. [`Success`] and [`Failure`] are always registered.
#[derive(Clone)]
pub struct TypeRegistry {
    commands: HashMap<&'static str, CommandDecoder>,
    replies: HashMap<&'static str, ReplyDecoder>,
}

impl TypeRegistry {
    /// Creates a registry knowing only the generic replies.
    pub fn new() -> Self {
        Self {
            commands: HashMap::new(),
            replies: HashMap::new(),
        }
        .register_reply::<Success>()
        .register_reply::<Failure>()
    }

    /// Registers a command type under its [`CommandType::COMMAND_NAME`].
    pub fn register_command<C: CommandType>(mut self) -> Self {
        self.commands
            .insert(C::COMMAND_NAME, decode_command_as::<C> as CommandDecoder);
        self
    }

    /// Registers a reply type under its [`ReplyType::REPLY_NAME`].
    pub fn register_reply<R: ReplyType>(mut self) -> Self {
        self.replies
            .insert(R::REPLY_NAME, decode_reply_as::<R> as ReplyDecoder);
        self
    }

    pub fn has_command(&self, name: &str) -> bool {
        self.commands.contains_key(name)
    }

    pub fn has_reply(&self, name: &str) -> bool {
        self.replies.contains_key(name)
    }

    /// Decodes a command payload by its registered name.
    pub fn decode_command(&self, name: &str, payload: &[u8]) -> Result<Box<dyn DomainCommand>> {
        let decode = self
            .commands
            .get(name)
            .ok_or_else(|| MsgError::UnregisteredType {
                kind: "command",
                name: name.to_string(),
            })?;
        Ok(decode(payload)?)
    }

    /// Decodes a reply payload by its registered name.
    pub fn decode_reply(&self, name: &str, payload: &[u8]) -> Result<Box<dyn Reply>> {
        let decode = self
            .replies
            .get(name)
            .ok_or_else(|| MsgError::UnregisteredType {
                kind: "reply",
                name: name.to_string(),
            })?;
        Ok(decode(payload)?)
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeRegistry")
            .field("commands", &self.commands.keys().collect::<Vec<_>>())
            .field("replies", &self.replies.keys().collect::<Vec<_>>())
            .finish()
    }
}
