//! Callback Handler module for the `/config` menu buttons

use anyhow::Result;
use teloxide::prelude::*;
use teloxide::types::MaybeInaccessibleMessage;
use tracing::{debug, warn, Instrument};

use super::ui_builder::{format_keyword_list, ConfigAction};
use super::{report_handler_error, HandlerContext};
use crate::conversation::{store_state, ConversationDialogue, ConversationState};
use crate::localization::t_lang;

/// Handle callback queries from inline keyboards
pub async fn callback_handler(
    bot: Bot,
    q: CallbackQuery,
    dialogue: ConversationDialogue,
    ctx: HandlerContext,
) -> Result<()> {
    let span = crate::observability::telegram_span("callback_handler", Some(q.from.id.0 as i64));
    handle_callback(bot, q, dialogue, ctx).instrument(span).await
}

async fn handle_callback(
    bot: Bot,
    q: CallbackQuery,
    dialogue: ConversationDialogue,
    ctx: HandlerContext,
) -> Result<()> {
    // Clear the loading indicator whatever happens next
    if let Err(e) = bot.answer_callback_query(q.id.clone()).await {
        warn!(user_id = %q.from.id, error = %e, "Failed to answer callback query");
    }

    let chat = match &q.message {
        Some(MaybeInaccessibleMessage::Regular(msg)) => msg.chat.clone(),
        Some(MaybeInaccessibleMessage::Inaccessible(msg)) => msg.chat.clone(),
        None => {
            debug!(user_id = %q.from.id, "Callback without message, ignoring");
            return Ok(());
        }
    };

    if !chat.is_private() {
        debug!(chat_id = %chat.id, "Ignoring configuration callback outside private chat");
        return Ok(());
    }

    let Some(action) = q.data.as_deref().and_then(ConfigAction::from_callback_data) else {
        debug!(user_id = %q.from.id, data = ?q.data, "Unknown callback data");
        return Ok(());
    };

    let language_code = q.from.language_code.as_deref();
    let user_id = q.from.id.0 as i64;

    let result = match action {
        ConfigAction::AddKeyword => {
            handle_add_keyword(&bot, chat.id, &dialogue, &ctx, language_code).await
        }
        ConfigAction::ViewKeywords => {
            handle_view_keywords(&bot, chat.id, user_id, &ctx, language_code).await
        }
        ConfigAction::DeleteKeyword => {
            handle_delete_keyword(&bot, chat.id, user_id, &dialogue, &ctx, language_code).await
        }
    };

    if let Err(e) = result {
        report_handler_error(
            &bot,
            chat.id,
            Some(&dialogue),
            &ctx.localization,
            language_code,
            action.callback_data(),
            &e,
        )
        .await;
    }
    Ok(())
}

async fn handle_add_keyword(
    bot: &Bot,
    chat_id: ChatId,
    dialogue: &ConversationDialogue,
    ctx: &HandlerContext,
    language_code: Option<&str>,
) -> Result<()> {
    store_state(dialogue, ConversationState::AwaitingKeyword).await?;
    bot.send_message(
        chat_id,
        t_lang(&ctx.localization, "add-keyword-prompt", language_code),
    )
    .await?;
    Ok(())
}

async fn handle_view_keywords(
    bot: &Bot,
    chat_id: ChatId,
    user_id: i64,
    ctx: &HandlerContext,
    language_code: Option<&str>,
) -> Result<()> {
    let config = ctx.storage.load_config(user_id).await?;
    for part in format_keyword_list(&config, &ctx.localization, language_code) {
        bot.send_message(chat_id, part).await?;
    }
    Ok(())
}

async fn handle_delete_keyword(
    bot: &Bot,
    chat_id: ChatId,
    user_id: i64,
    dialogue: &ConversationDialogue,
    ctx: &HandlerContext,
    language_code: Option<&str>,
) -> Result<()> {
    let config = ctx.storage.load_config(user_id).await?;
    if config.is_empty() {
        bot.send_message(chat_id, t_lang(&ctx.localization, "delete-empty", language_code))
            .await?;
        return Ok(());
    }

    store_state(dialogue, ConversationState::AwaitingKeywordToDelete).await?;
    bot.send_message(chat_id, t_lang(&ctx.localization, "delete-prompt", language_code))
        .await?;
    Ok(())
}
