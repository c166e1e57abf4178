//! Command Handlers module for processing bot commands

use anyhow::Result;
use teloxide::prelude::*;
use tracing::{debug, Instrument};

use super::ui_builder::create_config_menu_keyboard;
use super::{message_language, report_handler_error, Command, HandlerContext};
use crate::conversation::{reset_dialogue, ConversationDialogue, ConversationState};
use crate::localization::t_lang;

/// Entry point for every parsed command
pub async fn command_handler(
    bot: Bot,
    msg: Message,
    cmd: Command,
    dialogue: ConversationDialogue,
    state: ConversationState,
    ctx: HandlerContext,
) -> Result<()> {
    let span = crate::observability::telegram_span(
        "command_handler",
        msg.from.as_ref().map(|u| u.id.0 as i64),
    );
    dispatch_command(bot, msg, cmd, dialogue, state, ctx)
        .instrument(span)
        .await
}

async fn dispatch_command(
    bot: Bot,
    msg: Message,
    cmd: Command,
    dialogue: ConversationDialogue,
    state: ConversationState,
    ctx: HandlerContext,
) -> Result<()> {
    crate::observability::record_telegram_message("command");
    debug!(chat_id = %msg.chat.id, command = ?cmd, "Received command");

    let result = match cmd {
        Command::Start => handle_start_command(&bot, &msg, &ctx).await,
        Command::Config => handle_config_command(&bot, &msg, &ctx).await,
        Command::Cancel => handle_cancel_command(&bot, &msg, &dialogue, &state, &ctx).await,
    };

    if let Err(e) = result {
        report_handler_error(
            &bot,
            msg.chat.id,
            msg.chat.is_private().then_some(&dialogue),
            &ctx.localization,
            message_language(&msg),
            "command",
            &e,
        )
        .await;
    }
    Ok(())
}

/// Handle the /start command
pub async fn handle_start_command(bot: &Bot, msg: &Message, ctx: &HandlerContext) -> Result<()> {
    let key = if msg.chat.is_private() {
        "start-private"
    } else {
        "start-group"
    };
    bot.send_message(msg.chat.id, t_lang(&ctx.localization, key, message_language(msg)))
        .await?;
    Ok(())
}

/// Handle the /config command: private chats get the menu
pub async fn handle_config_command(bot: &Bot, msg: &Message, ctx: &HandlerContext) -> Result<()> {
    let language_code = message_language(msg);

    if !msg.chat.is_private() {
        bot.send_message(
            msg.chat.id,
            t_lang(&ctx.localization, "config-private-only", language_code),
        )
        .await?;
        return Ok(());
    }

    debug!(user_id = %msg.chat.id, "Showing configuration menu");
    bot.send_message(
        msg.chat.id,
        t_lang(&ctx.localization, "config-menu-title", language_code),
    )
    .reply_markup(create_config_menu_keyboard(&ctx.localization, language_code))
    .await?;
    Ok(())
}

/// Handle the /cancel command: drop any pending dialogue step
pub async fn handle_cancel_command(
    bot: &Bot,
    msg: &Message,
    dialogue: &ConversationDialogue,
    state: &ConversationState,
    ctx: &HandlerContext,
) -> Result<()> {
    let language_code = message_language(msg);

    if !msg.chat.is_private() {
        bot.send_message(
            msg.chat.id,
            t_lang(&ctx.localization, "config-private-only", language_code),
        )
        .await?;
        return Ok(());
    }

    let key = if state.is_idle() {
        "cancel-nothing"
    } else {
        debug!(user_id = %msg.chat.id, state = ?state, "Cancelling conversation");
        reset_dialogue(dialogue).await;
        "cancel-done"
    };
    bot.send_message(msg.chat.id, t_lang(&ctx.localization, key, language_code))
        .await?;
    Ok(())
}
