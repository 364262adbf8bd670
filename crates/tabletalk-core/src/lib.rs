//! tabletalk-core — shared data model and configuration.

pub mod config;
pub mod conversation;
pub mod message;

pub use config::TabletalkConfig;
pub use conversation::ConversationLog;
pub use message::{Message, Role, ToolRecord};
