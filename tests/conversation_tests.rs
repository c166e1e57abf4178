//! Configuration dialogue driven end to end against a file-backed store

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use charlotte_bot::conversation::{
    advance, advance_dialogue, ConversationDialogue, ConversationInput, ConversationState,
    TransitionOutcome,
};
use charlotte_bot::keywords::{KeywordResponse, UserConfig};
use charlotte_bot::storage::{JsonFileStorage, Storage};
use std::collections::HashMap;
use teloxide::dispatching::dialogue::InMemStorage;
use teloxide::types::ChatId;
use tempfile::TempDir;

const USER: i64 = 12345;

async fn setup() -> Result<(TempDir, JsonFileStorage)> {
    let dir = TempDir::new()?;
    let storage = JsonFileStorage::open(dir.path()).await?;
    Ok((dir, storage))
}

/// Storage whose every operation fails, as when the database is down
struct UnavailableStorage;

#[async_trait]
impl Storage for UnavailableStorage {
    async fn load_configs(&self) -> Result<HashMap<i64, UserConfig>> {
        Err(anyhow!("storage unavailable"))
    }

    async fn load_config(&self, _user_id: i64) -> Result<UserConfig> {
        Err(anyhow!("storage unavailable"))
    }

    async fn save_config(&self, _user_id: i64, _config: &UserConfig) -> Result<()> {
        Err(anyhow!("storage unavailable"))
    }

    async fn set_keyword(&self, _user_id: i64, _keyword: &str, _response: &KeywordResponse) -> Result<()> {
        Err(anyhow!("storage unavailable"))
    }

    async fn delete_keyword(&self, _user_id: i64, _keyword: &str) -> Result<bool> {
        Err(anyhow!("storage unavailable"))
    }

    async fn load_group_bindings(&self) -> Result<HashMap<i64, i64>> {
        Err(anyhow!("storage unavailable"))
    }

    async fn group_owner(&self, _chat_id: i64) -> Result<Option<i64>> {
        Err(anyhow!("storage unavailable"))
    }

    async fn bind_group(&self, _chat_id: i64, _owner_id: i64) -> Result<()> {
        Err(anyhow!("storage unavailable"))
    }
}

async fn dialogue_in(state: ConversationState) -> Result<ConversationDialogue> {
    let dialogue = ConversationDialogue::new(InMemStorage::new(), ChatId(USER));
    dialogue.update(state).await?;
    Ok(dialogue)
}

#[tokio::test]
async fn test_add_text_keyword_flow() -> Result<()> {
    let (_dir, storage) = setup().await?;

    let step = advance(
        &storage,
        USER,
        ConversationState::AwaitingKeyword,
        ConversationInput::Text("Hola"),
    )
    .await?;
    assert_eq!(
        step.outcome,
        TransitionOutcome::KeywordReceived {
            keyword: "hola".to_string()
        }
    );
    assert_eq!(
        step.next,
        ConversationState::AwaitingResponse {
            keyword: "hola".to_string()
        }
    );
    // Pending placeholder is written before the response arrives
    assert_eq!(
        storage.load_config(USER).await?.get("hola"),
        Some(&KeywordResponse::Pending)
    );

    let step = advance(&storage, USER, step.next, ConversationInput::Text("mundo")).await?;
    assert_eq!(step.next, ConversationState::Idle);
    assert_eq!(
        step.outcome,
        TransitionOutcome::ResponseConfigured {
            keyword: "hola".to_string(),
            kind: "text"
        }
    );
    assert_eq!(
        storage.load_config(USER).await?.get("hola"),
        Some(&KeywordResponse::Text("mundo".to_string()))
    );
    Ok(())
}

#[tokio::test]
async fn test_add_photo_keyword_flow() -> Result<()> {
    let (_dir, storage) = setup().await?;

    let state = ConversationState::AwaitingResponse {
        keyword: "gato".to_string(),
    };
    let step = advance(&storage, USER, state, ConversationInput::Photo("AgACAgQAAx")).await?;

    assert_eq!(step.next, ConversationState::Idle);
    assert!(matches!(
        step.outcome,
        TransitionOutcome::ResponseConfigured { kind: "photo", .. }
    ));
    assert_eq!(
        storage.load_config(USER).await?.get("gato"),
        Some(&KeywordResponse::Photo("AgACAgQAAx".to_string()))
    );
    Ok(())
}

#[tokio::test]
async fn test_blank_keyword_is_rejected() -> Result<()> {
    let (_dir, storage) = setup().await?;

    let step = advance(
        &storage,
        USER,
        ConversationState::AwaitingKeyword,
        ConversationInput::Text("   "),
    )
    .await?;

    assert_eq!(step.outcome, TransitionOutcome::KeywordRejected);
    assert_eq!(step.next, ConversationState::AwaitingKeyword);
    assert!(storage.load_config(USER).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_photo_where_text_expected() -> Result<()> {
    let (_dir, storage) = setup().await?;

    for state in [
        ConversationState::AwaitingKeyword,
        ConversationState::AwaitingKeywordToDelete,
    ] {
        let step = advance(&storage, USER, state.clone(), ConversationInput::Photo("AgAC")).await?;
        assert_eq!(step.outcome, TransitionOutcome::TextExpected);
        assert_eq!(step.next, state);
    }
    assert!(storage.load_config(USER).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_delete_existing_keyword() -> Result<()> {
    let (_dir, storage) = setup().await?;
    storage
        .set_keyword(USER, "hola", &KeywordResponse::Text("mundo".to_string()))
        .await?;
    storage
        .set_keyword(USER, "adiós", &KeywordResponse::Text("chao".to_string()))
        .await?;

    let step = advance(
        &storage,
        USER,
        ConversationState::AwaitingKeywordToDelete,
        ConversationInput::Text("HOLA"),
    )
    .await?;

    assert_eq!(
        step.outcome,
        TransitionOutcome::KeywordDeleted {
            keyword: "hola".to_string()
        }
    );
    assert_eq!(step.next, ConversationState::Idle);

    let config = storage.load_config(USER).await?;
    assert!(!config.contains("hola"));
    assert!(config.contains("adiós"));
    Ok(())
}

#[tokio::test]
async fn test_delete_missing_keyword_leaves_table_unchanged() -> Result<()> {
    let (_dir, storage) = setup().await?;
    storage
        .set_keyword(USER, "hola", &KeywordResponse::Text("mundo".to_string()))
        .await?;
    let before = storage.load_config(USER).await?;

    let step = advance(
        &storage,
        USER,
        ConversationState::AwaitingKeywordToDelete,
        ConversationInput::Text("perro"),
    )
    .await?;

    assert_eq!(
        step.outcome,
        TransitionOutcome::KeywordNotFound {
            keyword: "perro".to_string()
        }
    );
    assert_eq!(step.next, ConversationState::Idle);
    assert_eq!(storage.load_config(USER).await?, before);
    Ok(())
}

#[tokio::test]
async fn test_idle_input_is_ignored() -> Result<()> {
    let (_dir, storage) = setup().await?;

    let step = advance(
        &storage,
        USER,
        ConversationState::Idle,
        ConversationInput::Text("hola"),
    )
    .await?;

    assert_eq!(step.outcome, TransitionOutcome::Ignored);
    assert!(step.next.is_idle());
    assert!(storage.load_config(USER).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_users_do_not_share_tables() -> Result<()> {
    let (_dir, storage) = setup().await?;

    let step = advance(
        &storage,
        USER,
        ConversationState::AwaitingKeyword,
        ConversationInput::Text("hola"),
    )
    .await?;
    advance(&storage, USER, step.next, ConversationInput::Text("mundo")).await?;

    assert!(storage.load_config(USER + 1).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_storage_failure_propagates_from_advance() -> Result<()> {
    let state = ConversationState::AwaitingResponse {
        keyword: "hola".to_string(),
    };
    let result = advance(&UnavailableStorage, USER, state, ConversationInput::Text("mundo")).await;
    assert!(result.is_err());

    let result = advance(
        &UnavailableStorage,
        USER,
        ConversationState::AwaitingKeywordToDelete,
        ConversationInput::Text("hola"),
    )
    .await;
    assert!(result.is_err());
    Ok(())
}

#[tokio::test]
async fn test_storage_failure_resets_dialogue_to_idle() -> Result<()> {
    for state in [
        ConversationState::AwaitingKeyword,
        ConversationState::AwaitingResponse {
            keyword: "hola".to_string(),
        },
        ConversationState::AwaitingKeywordToDelete,
    ] {
        let dialogue = dialogue_in(state.clone()).await?;

        let result = advance_dialogue(
            &UnavailableStorage,
            &dialogue,
            USER,
            state,
            ConversationInput::Text("hola"),
        )
        .await;

        assert!(result.is_err());
        assert_eq!(dialogue.get().await?, None);
    }
    Ok(())
}

#[tokio::test]
async fn test_advance_dialogue_stores_next_state() -> Result<()> {
    let (_dir, storage) = setup().await?;
    let dialogue = dialogue_in(ConversationState::AwaitingKeyword).await?;

    let step = advance_dialogue(
        &storage,
        &dialogue,
        USER,
        ConversationState::AwaitingKeyword,
        ConversationInput::Text("hola"),
    )
    .await?;
    assert_eq!(dialogue.get().await?, Some(step.next.clone()));

    advance_dialogue(&storage, &dialogue, USER, step.next, ConversationInput::Text("mundo")).await?;
    // Back to idle means no stored state
    assert_eq!(dialogue.get().await?, None);
    Ok(())
}
