//! Group binding: when someone adds the bot to a group, that group answers
//! with the inviter's keyword table.

use anyhow::Result;
use teloxide::prelude::*;
use teloxide::types::Me;
use tracing::{debug, info};

use super::{message_language, HandlerContext};
use crate::errors::error_logging::{log_storage_error, log_telegram_error};
use crate::localization::t_lang;

/// Handle `new_chat_members` service messages
pub async fn new_members_handler(bot: Bot, msg: Message, me: Me, ctx: HandlerContext) -> Result<()> {
    let Some(members) = msg.new_chat_members() else {
        return Ok(());
    };

    if !members.iter().any(|member| member.id == me.id) {
        debug!(chat_id = %msg.chat.id, "New members do not include the bot");
        return Ok(());
    }

    let Some(inviter) = msg.from.as_ref() else {
        debug!(chat_id = %msg.chat.id, "Bot added without a known inviter");
        return Ok(());
    };

    let chat_id = msg.chat.id.0;
    let owner_id = inviter.id.0 as i64;

    if let Err(e) = ctx.storage.bind_group(chat_id, owner_id).await {
        log_storage_error(&format!("{:#}", e), "bind_group", Some(owner_id));
        return Ok(());
    }

    info!(chat_id = %chat_id, owner_id = %owner_id, "Bot added to group");

    if let Err(e) = bot
        .send_message(
            msg.chat.id,
            t_lang(&ctx.localization, "group-joined", message_language(&msg)),
        )
        .await
    {
        log_telegram_error(&e, "send_group_greeting", Some(chat_id));
    }
    Ok(())
}
