//! # Charlotte Telegram Bot
//!
//! A Telegram bot that answers chat messages with responses its users
//! configure privately: each user maps keywords to a text or image reply,
//! and the bot echoes that reply whenever a message in their private chat,
//! or in a group they added the bot to, contains the keyword.

pub mod bot;
pub mod config;
pub mod conversation;
pub mod errors;
pub mod keywords;
pub mod localization;
pub mod observability;
pub mod responder;
pub mod storage;

// Re-export types for easier access
pub use keywords::{KeywordEntry, KeywordResponse, UserConfig};
pub use storage::Storage;
