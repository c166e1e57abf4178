//! Keyword replies for incoming chat messages.
//!
//! In a private chat the sender's own table applies; in a group the table of
//! the user who added the bot applies, while the mention still names the
//! person who wrote the message.

use anyhow::Result;
use teloxide::utils::html;
use tracing::debug;

use crate::keywords::{ChatId, KeywordResponse, UserId};
use crate::storage::Storage;

/// Chat an incoming message was posted in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncomingChat {
    Private,
    Group { chat_id: ChatId },
}

impl IncomingChat {
    pub fn label(&self) -> &'static str {
        match self {
            IncomingChat::Private => "private",
            IncomingChat::Group { .. } => "group",
        }
    }
}

/// Author of an incoming message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sender {
    pub id: UserId,
    pub name: String,
}

/// Name used in mentions: first name, then username, then `fallback`
pub fn display_name(first_name: &str, username: Option<&str>, fallback: &str) -> String {
    if !first_name.trim().is_empty() {
        return first_name.to_string();
    }
    match username {
        Some(username) if !username.trim().is_empty() => username.to_string(),
        _ => fallback.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyContent {
    Text(String),
    /// Telegram file id
    Photo(String),
}

/// One reply to send for one matched keyword
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub keyword: String,
    pub sender: Sender,
    pub content: ReplyContent,
}

impl Reply {
    /// HTML mention of the sender
    pub fn mention_html(&self) -> String {
        format!(
            "<a href=\"tg://user?id={}\">{}</a>",
            self.sender.id,
            html::escape(&self.sender.name)
        )
    }

    /// Message text (for text replies) or caption (for photos), HTML formatted
    pub fn body_html(&self) -> String {
        match &self.content {
            ReplyContent::Text(text) => format!("{}, {}", self.mention_html(), html::escape(text)),
            ReplyContent::Photo(_) => self.mention_html(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self.content {
            ReplyContent::Text(_) => "text",
            ReplyContent::Photo(_) => "photo",
        }
    }
}

/// User whose table governs `chat` for a message from `sender_id`
pub async fn effective_owner(
    storage: &dyn Storage,
    chat: IncomingChat,
    sender_id: UserId,
) -> Result<Option<UserId>> {
    match chat {
        IncomingChat::Private => Ok(Some(sender_id)),
        IncomingChat::Group { chat_id } => storage.group_owner(chat_id).await,
    }
}

/// Every reply `text` triggers, in table order.
///
/// Unbound groups and pending keywords produce nothing.
pub async fn resolve_replies(
    storage: &dyn Storage,
    chat: IncomingChat,
    sender: &Sender,
    text: &str,
) -> Result<Vec<Reply>> {
    let Some(owner_id) = effective_owner(storage, chat, sender.id).await? else {
        debug!(chat = ?chat, "No configuration bound to group");
        return Ok(Vec::new());
    };

    let config = storage.load_config(owner_id).await?;
    let replies: Vec<Reply> = config
        .matches(text)
        .into_iter()
        .filter_map(|(keyword, response)| {
            let content = match response {
                KeywordResponse::Text(text) => ReplyContent::Text(text.clone()),
                KeywordResponse::Photo(file_id) => ReplyContent::Photo(file_id.clone()),
                KeywordResponse::Pending => return None,
            };
            Some(Reply {
                keyword: keyword.to_string(),
                sender: sender.clone(),
                content,
            })
        })
        .collect();

    debug!(
        chat = chat.label(),
        owner_id = %owner_id,
        sender_id = %sender.id,
        matches = replies.len(),
        "Keyword scan finished"
    );
    Ok(replies)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reply(content: ReplyContent) -> Reply {
        Reply {
            keyword: "hola".to_string(),
            sender: Sender {
                id: 42,
                name: "Ana <3".to_string(),
            },
            content,
        }
    }

    #[test]
    fn test_display_name_fallbacks() {
        assert_eq!(display_name("Ana", Some("ana_bot"), "Usuario"), "Ana");
        assert_eq!(display_name("", Some("ana_bot"), "Usuario"), "ana_bot");
        assert_eq!(display_name(" ", None, "Usuario"), "Usuario");
    }

    #[test]
    fn test_text_reply_mentions_and_escapes() {
        let r = reply(ReplyContent::Text("mundo & más".to_string()));
        assert_eq!(r.mention_html(), "<a href=\"tg://user?id=42\">Ana &lt;3</a>");
        assert_eq!(
            r.body_html(),
            "<a href=\"tg://user?id=42\">Ana &lt;3</a>, mundo &amp; más"
        );
        assert_eq!(r.kind(), "text");
    }

    #[test]
    fn test_photo_reply_caption_is_mention() {
        let r = reply(ReplyContent::Photo("AgACAgQ".to_string()));
        assert_eq!(r.body_html(), r.mention_html());
        assert_eq!(r.kind(), "photo");
    }
}
