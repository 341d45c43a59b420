//! Chat-facing plumbing for gradedesk.
//!
//! - `commands` parses slash commands (`/register`, `/admin`, `/addadmin <id>`, ...)
//! - `conversation` turns one inbound text into a reply, driving the dialogue
//!   engine and the store
//! - `replies` renders dialogue prompts into text plus option rows
//! - `runner` pumps a [`runner::ChatTransport`] with one ordered lane per identity
//!
//! ```text
//! ChatTransport → ChatRunner → per-identity lane → ConversationRuntime → Store
//!                                   ↓
//!                              Reply ← replies::render
//! ```

pub mod commands;
pub mod conversation;
pub mod replies;
pub mod runner;

pub use commands::{parse_command, ChatCommand, CommandParseError};
pub use conversation::ConversationRuntime;
pub use replies::Reply;
pub use runner::{
    ChatRunner, ChatTransport, EventContext, InboundMessage, MessageHandler, NoopChatTransport,
    OutboundReply, ReconnectPolicy, TransportError,
};
