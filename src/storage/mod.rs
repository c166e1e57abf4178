//! Persistence for keyword tables and group bindings.
//!
//! Two backends implement [`Storage`]:
//! - `postgres`: `configs` and `group_configs` tables through `sqlx`
//! - `json_file`: `configs.json` and `group_configs.json` documents on disk
//!
//! Single-keyword mutations (`set_keyword`, `delete_keyword`) are atomic per
//! user in both backends, so concurrent edits by the same user do not lose
//! each other's updates.

pub mod json_file;
pub mod postgres;

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;

use crate::keywords::{ChatId, KeywordResponse, UserConfig, UserId};

pub use json_file::JsonFileStorage;
pub use postgres::PgStorage;

#[async_trait]
pub trait Storage: Send + Sync {
    /// Every user's keyword table
    async fn load_configs(&self) -> Result<HashMap<UserId, UserConfig>>;

    /// One user's keyword table; empty when the user has none
    async fn load_config(&self, user_id: UserId) -> Result<UserConfig>;

    /// Replace a user's whole table
    async fn save_config(&self, user_id: UserId, config: &UserConfig) -> Result<()>;

    /// Insert or overwrite one keyword in a user's table
    async fn set_keyword(
        &self,
        user_id: UserId,
        keyword: &str,
        response: &KeywordResponse,
    ) -> Result<()>;

    /// Remove one keyword; `Ok(false)` when it was not configured
    async fn delete_keyword(&self, user_id: UserId, keyword: &str) -> Result<bool>;

    /// Every group binding, chat -> owning user
    async fn load_group_bindings(&self) -> Result<HashMap<ChatId, UserId>>;

    /// Owner of a group chat, if the bot was added to it
    async fn group_owner(&self, chat_id: ChatId) -> Result<Option<UserId>>;

    /// Bind a group chat to the user whose table governs it
    async fn bind_group(&self, chat_id: ChatId, owner_id: UserId) -> Result<()>;
}
