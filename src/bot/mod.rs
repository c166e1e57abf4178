//! Bot module for handling Telegram interactions
//!
//! - `command_handlers`: `/start`, `/config`, `/cancel`
//! - `callback_handler`: the `/config` menu buttons
//! - `message_handler`: conversation steps and keyword replies
//! - `membership`: group binding when the bot is added to a chat
//! - `ui_builder`: keyboards and message formatting

pub mod callback_handler;
pub mod command_handlers;
pub mod membership;
pub mod message_handler;
pub mod ui_builder;

use std::sync::Arc;
use teloxide::dispatching::dialogue::InMemStorage;
use teloxide::dispatching::{HandlerExt, UpdateFilterExt, UpdateHandler};
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;
use tracing::error;

use crate::conversation::{reset_dialogue, ConversationDialogue, ConversationState};
use crate::localization::{t_lang, LocalizationManager};

/// Commands understood by the bot
#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(rename_rule = "lowercase", description = "Comandos disponibles:")]
pub enum Command {
    #[command(description = "presentación del bot.")]
    Start,
    #[command(description = "configurar palabras clave (solo en privado).")]
    Config,
    #[command(description = "cancelar la configuración en curso.")]
    Cancel,
}

/// Dependencies shared by every handler
#[derive(Clone)]
pub struct HandlerContext {
    pub storage: Arc<dyn crate::storage::Storage>,
    pub localization: Arc<LocalizationManager>,
}

/// Build the update routing tree
pub fn schema() -> UpdateHandler<anyhow::Error> {
    let message_handler = Update::filter_message()
        .enter_dialogue::<Message, InMemStorage<ConversationState>, ConversationState>()
        .branch(
            dptree::entry()
                .filter_command::<Command>()
                .endpoint(command_handlers::command_handler),
        )
        .branch(
            dptree::filter(|msg: Message| msg.new_chat_members().is_some())
                .endpoint(membership::new_members_handler),
        )
        .branch(dptree::endpoint(message_handler::message_handler));

    let callback_handler = Update::filter_callback_query()
        .enter_dialogue::<CallbackQuery, InMemStorage<ConversationState>, ConversationState>()
        .endpoint(callback_handler::callback_handler);

    dptree::entry()
        .branch(message_handler)
        .branch(callback_handler)
}

/// Language code of the user behind a message, if Telegram sent one
pub fn message_language(msg: &Message) -> Option<&str> {
    msg.from
        .as_ref()
        .and_then(|user| user.language_code.as_deref())
}

/// Log a failed handler, reset the user's dialogue and tell them to retry.
///
/// Errors while reporting are only logged so the dispatcher keeps serving
/// other chats.
pub async fn report_handler_error(
    bot: &Bot,
    chat_id: ChatId,
    dialogue: Option<&ConversationDialogue>,
    localization: &LocalizationManager,
    language_code: Option<&str>,
    operation: &str,
    err: &anyhow::Error,
) {
    error!(chat_id = %chat_id, operation = %operation, error = %format!("{:#}", err), "Handler failed");

    if let Some(dialogue) = dialogue {
        reset_dialogue(dialogue).await;
    }

    if let Err(e) = bot
        .send_message(chat_id, t_lang(localization, "generic-error", language_code))
        .await
    {
        crate::errors::error_logging::log_telegram_error(&e, "send_generic_error", Some(chat_id.0));
    }
}
