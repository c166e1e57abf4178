//! File backend: `configs.json` and `group_configs.json` in a data directory.
//!
//! Both documents are loaded once and kept in memory. Every mutation is
//! applied in memory and the whole document is rewritten through a temp file
//! that is renamed over the original.

use anyhow::{Context, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::Storage;
use crate::keywords::{ChatId, KeywordResponse, UserConfig, UserId};

pub const CONFIG_FILE: &str = "configs.json";
pub const GROUP_CONFIG_FILE: &str = "group_configs.json";

/// [`Storage`] backed by two JSON documents
#[derive(Debug)]
pub struct JsonFileStorage {
    configs_path: PathBuf,
    groups_path: PathBuf,
    configs: RwLock<HashMap<UserId, UserConfig>>,
    groups: RwLock<HashMap<ChatId, UserId>>,
    // Serializes mutate-then-write so documents hit disk in mutation order
    write_lock: Mutex<()>,
}

impl JsonFileStorage {
    /// Load (or start empty) the documents stored in `data_dir`
    pub async fn open(data_dir: impl AsRef<Path>) -> Result<Self> {
        let data_dir = data_dir.as_ref();
        tokio::fs::create_dir_all(data_dir)
            .await
            .with_context(|| format!("Failed to create data directory {}", data_dir.display()))?;

        let configs_path = data_dir.join(CONFIG_FILE);
        let groups_path = data_dir.join(GROUP_CONFIG_FILE);

        let configs = match read_document(&configs_path).await? {
            Some(serde_json::Value::Object(map)) => map
                .into_iter()
                .filter_map(|(user, value)| match user.parse::<UserId>() {
                    Ok(user_id) => Some((user_id, UserConfig::from_json_lenient(user_id, value))),
                    Err(_) => {
                        warn!(key = %user, "Skipping config entry with non-numeric user id");
                        None
                    }
                })
                .collect(),
            Some(_) => {
                warn!(path = %configs_path.display(), "Config document is not an object, starting empty");
                HashMap::new()
            }
            None => HashMap::new(),
        };

        let groups = match read_document(&groups_path).await? {
            Some(value) => decode_groups(value).unwrap_or_else(|| {
                warn!(path = %groups_path.display(), "Malformed group document, starting empty");
                HashMap::new()
            }),
            None => HashMap::new(),
        };

        info!(
            users = configs.len(),
            groups = groups.len(),
            data_dir = %data_dir.display(),
            "JSON storage opened"
        );

        Ok(Self {
            configs_path,
            groups_path,
            configs: RwLock::new(configs),
            groups: RwLock::new(groups),
            write_lock: Mutex::new(()),
        })
    }

    async fn mutate_configs<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut HashMap<UserId, UserConfig>) -> R + Send,
        R: Send,
    {
        let _guard = self.write_lock.lock().await;
        let (result, document) = {
            let mut configs = self.configs.write();
            let result = f(&mut configs);
            let document: serde_json::Map<String, serde_json::Value> = configs
                .iter()
                .map(|(user, config)| (user.to_string(), config.to_json()))
                .collect();
            (result, serde_json::Value::Object(document))
        };
        write_document(&self.configs_path, &document).await?;
        Ok(result)
    }

    async fn mutate_groups<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(&mut HashMap<ChatId, UserId>) + Send,
    {
        let _guard = self.write_lock.lock().await;
        let document = {
            let mut groups = self.groups.write();
            f(&mut groups);
            let document: serde_json::Map<String, serde_json::Value> = groups
                .iter()
                .map(|(chat, owner)| (chat.to_string(), serde_json::Value::String(owner.to_string())))
                .collect();
            serde_json::Value::Object(document)
        };
        write_document(&self.groups_path, &document).await
    }
}

/// Owner ids are written as strings; numbers are accepted too
fn decode_groups(value: serde_json::Value) -> Option<HashMap<ChatId, UserId>> {
    let serde_json::Value::Object(map) = value else {
        return None;
    };
    let mut groups = HashMap::with_capacity(map.len());
    for (chat, owner) in map {
        let owner = match owner {
            serde_json::Value::String(s) => s.parse().ok(),
            serde_json::Value::Number(n) => n.as_i64(),
            _ => None,
        };
        match (chat.parse::<ChatId>().ok(), owner) {
            (Some(chat_id), Some(owner_id)) => {
                groups.insert(chat_id, owner_id);
            }
            _ => warn!(chat = %chat, "Skipping malformed group binding"),
        }
    }
    Some(groups)
}

async fn read_document(path: &Path) -> Result<Option<serde_json::Value>> {
    let raw = match tokio::fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "Document does not exist yet");
            return Ok(None);
        }
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to read {}", path.display()));
        }
    };

    match serde_json::from_str(&raw) {
        Ok(value) => Ok(Some(value)),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Unparseable document, starting empty");
            Ok(None)
        }
    }
}

async fn write_document(path: &Path, document: &serde_json::Value) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(document).context("Failed to encode document")?;
    let path = path.to_path_buf();
    let dir = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    tokio::task::spawn_blocking(move || -> Result<()> {
        let mut tmp = NamedTempFile::new_in(&dir)
            .with_context(|| format!("Failed to create temp file in {}", dir.display()))?;
        tmp.write_all(&bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path)
            .with_context(|| format!("Failed to replace {}", path.display()))?;
        Ok(())
    })
    .await
    .context("Document writer task panicked")??;

    Ok(())
}

#[async_trait]
impl Storage for JsonFileStorage {
    async fn load_configs(&self) -> Result<HashMap<UserId, UserConfig>> {
        Ok(self.configs.read().clone())
    }

    async fn load_config(&self, user_id: UserId) -> Result<UserConfig> {
        Ok(self.configs.read().get(&user_id).cloned().unwrap_or_default())
    }

    async fn save_config(&self, user_id: UserId, config: &UserConfig) -> Result<()> {
        let config = config.clone();
        self.mutate_configs(move |configs| {
            configs.insert(user_id, config);
        })
        .await
    }

    async fn set_keyword(
        &self,
        user_id: UserId,
        keyword: &str,
        response: &KeywordResponse,
    ) -> Result<()> {
        let response = response.clone();
        self.mutate_configs(move |configs| {
            configs.entry(user_id).or_default().set(keyword, response);
        })
        .await?;
        debug!(user_id = %user_id, keyword = %keyword, "Keyword stored");
        Ok(())
    }

    async fn delete_keyword(&self, user_id: UserId, keyword: &str) -> Result<bool> {
        // Skip the rewrite when there is nothing to remove
        let present = self
            .configs
            .read()
            .get(&user_id)
            .is_some_and(|config| config.contains(keyword));
        if !present {
            return Ok(false);
        }

        self.mutate_configs(|configs| {
            configs
                .get_mut(&user_id)
                .is_some_and(|config| config.remove(keyword))
        })
        .await
    }

    async fn load_group_bindings(&self) -> Result<HashMap<ChatId, UserId>> {
        Ok(self.groups.read().clone())
    }

    async fn group_owner(&self, chat_id: ChatId) -> Result<Option<UserId>> {
        Ok(self.groups.read().get(&chat_id).copied())
    }

    async fn bind_group(&self, chat_id: ChatId, owner_id: UserId) -> Result<()> {
        self.mutate_groups(|groups| {
            groups.insert(chat_id, owner_id);
        })
        .await?;
        info!(chat_id = %chat_id, owner_id = %owner_id, "Group bound to owner");
        Ok(())
    }
}
