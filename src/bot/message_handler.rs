//! Message Handler module for processing incoming Telegram messages
//!
//! Private chats mid-dialogue feed the conversation state machine; every
//! other text message is scanned for keywords.

use anyhow::Result;
use teloxide::prelude::*;
use teloxide::types::{FileId, InputFile, ParseMode};
use tracing::{debug, info, Instrument};

use super::{message_language, report_handler_error, HandlerContext};
use crate::conversation::{
    advance_dialogue, ConversationDialogue, ConversationInput, ConversationState, TransitionOutcome,
};
use crate::errors::error_logging::log_telegram_error;
use crate::localization::{t_args_lang, t_lang};
use crate::observability;
use crate::responder::{display_name, resolve_replies, IncomingChat, Reply, ReplyContent, Sender};

pub async fn message_handler(
    bot: Bot,
    msg: Message,
    dialogue: ConversationDialogue,
    state: ConversationState,
    ctx: HandlerContext,
) -> Result<()> {
    let span = observability::telegram_span(
        "message_handler",
        msg.from.as_ref().map(|u| u.id.0 as i64),
    );
    handle_message(bot, msg, dialogue, state, ctx)
        .instrument(span)
        .await
}

async fn handle_message(
    bot: Bot,
    msg: Message,
    dialogue: ConversationDialogue,
    state: ConversationState,
    ctx: HandlerContext,
) -> Result<()> {
    let message_type = if msg.text().is_some() {
        "text"
    } else if msg.photo().is_some() {
        "photo"
    } else {
        "unsupported"
    };
    observability::record_telegram_message(message_type);

    let result = if msg.chat.is_private() && !state.is_idle() {
        handle_conversation_step(&bot, &msg, &dialogue, state, &ctx).await
    } else if msg.chat.is_private() {
        handle_keyword_message(&bot, &msg, IncomingChat::Private, &ctx).await
    } else if msg.chat.is_group() || msg.chat.is_supergroup() {
        let chat = IncomingChat::Group {
            chat_id: msg.chat.id.0,
        };
        handle_keyword_message(&bot, &msg, chat, &ctx).await
    } else {
        Ok(())
    };

    if let Err(e) = result {
        report_handler_error(
            &bot,
            msg.chat.id,
            msg.chat.is_private().then_some(&dialogue),
            &ctx.localization,
            message_language(&msg),
            "message",
            &e,
        )
        .await;
    }
    Ok(())
}

/// Feed a private message into the configuration dialogue
async fn handle_conversation_step(
    bot: &Bot,
    msg: &Message,
    dialogue: &ConversationDialogue,
    state: ConversationState,
    ctx: &HandlerContext,
) -> Result<()> {
    let Some(user) = msg.from.as_ref() else {
        return Ok(());
    };
    let user_id = user.id.0 as i64;
    let language_code = message_language(msg);

    let photo_id = msg
        .photo()
        .and_then(|sizes| sizes.last())
        .map(|largest| largest.file.id.0.clone());

    let input = match (msg.text(), photo_id.as_deref()) {
        (Some(text), _) => ConversationInput::Text(text),
        (None, Some(file_id)) => ConversationInput::Photo(file_id),
        (None, None) => {
            debug!(user_id = %user_id, "Ignoring non text/photo message during dialogue");
            return Ok(());
        }
    };

    let transition =
        advance_dialogue(ctx.storage.as_ref(), dialogue, user_id, state, input).await?;

    let localization = &ctx.localization;
    let reply = match &transition.outcome {
        TransitionOutcome::KeywordReceived { keyword } => {
            observability::record_configuration_step("keyword_received");
            t_args_lang(localization, "keyword-received", &[("keyword", keyword.as_str())], language_code)
        }
        TransitionOutcome::KeywordRejected => t_lang(localization, "keyword-invalid", language_code),
        TransitionOutcome::ResponseConfigured { keyword, kind } => {
            observability::record_configuration_step("response_configured");
            info!(user_id = %user_id, keyword = %keyword, kind = %kind, "Keyword configured");
            let key = if *kind == "photo" {
                "keyword-configured-photo"
            } else {
                "keyword-configured-text"
            };
            t_args_lang(localization, key, &[("keyword", keyword.as_str())], language_code)
        }
        TransitionOutcome::KeywordDeleted { keyword } => {
            observability::record_configuration_step("keyword_deleted");
            info!(user_id = %user_id, keyword = %keyword, "Keyword deleted");
            t_args_lang(localization, "keyword-deleted", &[("keyword", keyword.as_str())], language_code)
        }
        TransitionOutcome::KeywordNotFound { keyword } => {
            t_args_lang(localization, "keyword-not-found", &[("keyword", keyword.as_str())], language_code)
        }
        TransitionOutcome::TextExpected => t_lang(localization, "send-text-hint", language_code),
        TransitionOutcome::Ignored => return Ok(()),
    };

    bot.send_message(msg.chat.id, reply).await?;
    Ok(())
}

/// Scan a text message for keywords and send every matching reply
async fn handle_keyword_message(
    bot: &Bot,
    msg: &Message,
    chat: IncomingChat,
    ctx: &HandlerContext,
) -> Result<()> {
    let (Some(text), Some(user)) = (msg.text(), msg.from.as_ref()) else {
        return Ok(());
    };

    let fallback = t_lang(&ctx.localization, "default-user-name", message_language(msg));
    let sender = Sender {
        id: user.id.0 as i64,
        name: display_name(&user.first_name, user.username.as_deref(), &fallback),
    };

    let replies = resolve_replies(ctx.storage.as_ref(), chat, &sender, text).await?;
    for reply in &replies {
        info!(
            chat_id = %msg.chat.id,
            sender_id = %sender.id,
            keyword = %reply.keyword,
            "Keyword detected"
        );
        // One failed send must not stop the remaining replies
        if let Err(e) = send_reply(bot, msg.chat.id, reply).await {
            log_telegram_error(&e, "send_keyword_reply", Some(msg.chat.id.0));
            continue;
        }
        observability::record_keyword_reply(reply.kind(), chat.label());
    }
    Ok(())
}

async fn send_reply(bot: &Bot, chat_id: ChatId, reply: &Reply) -> Result<(), teloxide::RequestError> {
    match &reply.content {
        ReplyContent::Text(_) => {
            bot.send_message(chat_id, reply.body_html())
                .parse_mode(ParseMode::Html)
                .await?;
        }
        ReplyContent::Photo(file_id) => {
            bot.send_photo(chat_id, InputFile::file_id(FileId(file_id.clone())))
                .caption(reply.body_html())
                .parse_mode(ParseMode::Html)
                .await?;
        }
    }
    Ok(())
}
