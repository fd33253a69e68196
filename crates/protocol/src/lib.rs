//! Wire types for the Home Assistant WebSocket API.
//!
//! This crate contains the frame shapes exchanged with the server and the
//! codec that moves them to and from text messages. These types represent the
//! "protocol layer" - the shapes of data as they appear on the wire.
//!
//! # Design Philosophy
//!
//! Types in this crate are:
//! - **Pure data**: No I/O, no session state
//! - **Permissive on receive**: Malformed or unfamiliar input decodes to a
//!   catch-all frame instead of an error
//! - **Closed on dispatch**: Known frame types are variants of [`InboundFrame`],
//!   so the session can match them exhaustively
//!
//! Connection handling, correlation and subscriptions live in `hass-runtime`.

pub mod codec;
pub mod command;
pub mod frame;
pub mod url;

pub use codec::{Decoded, FEATURES_ID, decode, encode_auth, encode_command, encode_supported_features};
pub use command::Command;
pub use frame::{EventFrame, InboundFrame, ReplyKind, ResultFrame};
pub use url::websocket_url;
