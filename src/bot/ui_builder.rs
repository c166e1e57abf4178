//! UI Builder module for creating keyboards and formatting messages

use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

use crate::keywords::{KeywordResponse, UserConfig};
use crate::localization::{t_lang, LocalizationManager};

/// Buttons of the `/config` menu
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigAction {
    AddKeyword,
    ViewKeywords,
    DeleteKeyword,
}

impl ConfigAction {
    pub const ALL: [ConfigAction; 3] = [
        ConfigAction::AddKeyword,
        ConfigAction::ViewKeywords,
        ConfigAction::DeleteKeyword,
    ];

    pub fn callback_data(&self) -> &'static str {
        match self {
            ConfigAction::AddKeyword => "add_keyword",
            ConfigAction::ViewKeywords => "view_keywords",
            ConfigAction::DeleteKeyword => "delete_keyword",
        }
    }

    pub fn from_callback_data(data: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|action| action.callback_data() == data)
    }

    fn label_key(&self) -> &'static str {
        match self {
            ConfigAction::AddKeyword => "config-add-button",
            ConfigAction::ViewKeywords => "config-view-button",
            ConfigAction::DeleteKeyword => "config-delete-button",
        }
    }
}

/// One button per row: add, view, delete
pub fn create_config_menu_keyboard(
    localization: &LocalizationManager,
    language_code: Option<&str>,
) -> InlineKeyboardMarkup {
    let rows: Vec<Vec<InlineKeyboardButton>> = ConfigAction::ALL
        .iter()
        .map(|action| {
            vec![InlineKeyboardButton::callback(
                t_lang(localization, action.label_key(), language_code),
                action.callback_data(),
            )]
        })
        .collect();

    InlineKeyboardMarkup::new(rows)
}

/// Telegram's message length limit, counted in UTF-16 code units
pub const MAX_MESSAGE_LEN: usize = 4096;

/// `keyword: content` lines under a header, or the empty-table message.
///
/// Long tables are split into several messages, each within
/// [`MAX_MESSAGE_LEN`]; a single oversized line is truncated.
pub fn format_keyword_list(
    config: &UserConfig,
    localization: &LocalizationManager,
    language_code: Option<&str>,
) -> Vec<String> {
    if config.is_empty() {
        return vec![t_lang(localization, "view-empty", language_code)];
    }

    let photo_label = t_lang(localization, "view-photo-label", language_code);
    let pending_label = t_lang(localization, "view-pending-label", language_code);

    let lines = config.entries().into_iter().map(|entry| {
        let shown = match &entry.response {
            KeywordResponse::Text(text) => text.as_str(),
            KeywordResponse::Photo(_) => photo_label.as_str(),
            KeywordResponse::Pending => pending_label.as_str(),
        };
        format!("{}: {}", entry.keyword, shown)
    });

    split_messages(t_lang(localization, "view-header", language_code), lines)
}

fn utf16_len(text: &str) -> usize {
    text.encode_utf16().count()
}

fn truncate_line(line: String) -> String {
    if utf16_len(&line) <= MAX_MESSAGE_LEN {
        return line;
    }

    let mut truncated = String::new();
    let mut used = 0;
    for ch in line.chars() {
        // Leave room for the ellipsis
        if used + ch.len_utf16() + 1 > MAX_MESSAGE_LEN {
            break;
        }
        used += ch.len_utf16();
        truncated.push(ch);
    }
    truncated.push('…');
    truncated
}

/// Join `lines` below `header`, starting a new message whenever the limit would be exceeded
fn split_messages(header: String, lines: impl Iterator<Item = String>) -> Vec<String> {
    let mut messages = Vec::new();
    let mut current = truncate_line(header);

    for line in lines.map(truncate_line) {
        if utf16_len(&current) + 1 + utf16_len(&line) > MAX_MESSAGE_LEN {
            messages.push(std::mem::replace(&mut current, line));
        } else {
            current.push('\n');
            current.push_str(&line);
        }
    }
    messages.push(current);
    messages
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::localization::LocalizationManager;

    #[test]
    fn test_callback_data_round_trip() {
        for action in ConfigAction::ALL {
            assert_eq!(ConfigAction::from_callback_data(action.callback_data()), Some(action));
        }
        assert_eq!(ConfigAction::from_callback_data("page:2"), None);
    }

    #[test]
    fn test_menu_has_three_rows() {
        let localization = LocalizationManager::new().expect("locales load");
        let keyboard = create_config_menu_keyboard(&localization, Some("es"));
        assert_eq!(keyboard.inline_keyboard.len(), 3);
        assert_eq!(keyboard.inline_keyboard[0][0].text, "Añadir palabra clave");
    }

    #[test]
    fn test_format_keyword_list() {
        let localization = LocalizationManager::new().expect("locales load");
        let mut config = UserConfig::new();
        assert_eq!(
            format_keyword_list(&config, &localization, None),
            vec!["No tienes palabras clave configuradas aún."]
        );

        config.set("hola", KeywordResponse::Text("mundo".to_string()));
        config.set("gato", KeywordResponse::Photo("AgACAgQ".to_string()));
        config.set("nuevo", KeywordResponse::Pending);
        assert_eq!(
            format_keyword_list(&config, &localization, None),
            vec!["Tus palabras clave:\ngato: [Imagen]\nhola: mundo\nnuevo: (pendiente)"]
        );
    }

    #[test]
    fn test_large_table_is_split_within_limit() {
        let localization = LocalizationManager::new().expect("locales load");
        let mut config = UserConfig::new();
        for i in 0..300 {
            config.set(format!("clave{:03}", i), KeywordResponse::Text("ñ".repeat(40)));
        }

        let messages = format_keyword_list(&config, &localization, Some("es"));
        assert!(messages.len() > 1);
        assert!(messages[0].starts_with("Tus palabras clave:\n"));
        for message in &messages {
            assert!(utf16_len(message) <= MAX_MESSAGE_LEN);
        }

        // Every keyword line survives the split, in order
        let lines: Vec<&str> = messages
            .iter()
            .flat_map(|m| m.lines())
            .filter(|l| l.starts_with("clave"))
            .collect();
        assert_eq!(lines.len(), 300);
        assert!(lines[0].starts_with("clave000: "));
        assert!(lines[299].starts_with("clave299: "));
    }

    #[test]
    fn test_oversized_response_is_truncated() {
        let localization = LocalizationManager::new().expect("locales load");
        let mut config = UserConfig::new();
        config.set("largo", KeywordResponse::Text("😀".repeat(3000)));

        let messages = format_keyword_list(&config, &localization, Some("es"));
        assert_eq!(messages.len(), 2);
        assert!(utf16_len(&messages[1]) <= MAX_MESSAGE_LEN);
        assert!(messages[1].starts_with("largo: "));
        assert!(messages[1].ends_with('…'));
    }
}
