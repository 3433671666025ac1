//! Saga correlation headers.
//!
//! Commands carry the `COMMAND_SAGA_*` keys; the dispatcher copies them onto
//! replies under the `REPLY_` prefix.

pub const COMMAND_SAGA_ID: &str = "COMMAND_SAGA_ID";
pub const COMMAND_SAGA_NAME: &str = "COMMAND_SAGA_NAME";

pub const REPLY_SAGA_ID: &str = "REPLY_SAGA_ID";
pub const REPLY_SAGA_NAME: &str = "REPLY_SAGA_NAME";
