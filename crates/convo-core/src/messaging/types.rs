use crate::domain::{ChatId, InlineMessageId, MessageId, MessageRef, UserId};

/// Cross-messenger incoming update model.
///
/// Only the update categories listeners can wait on are modelled; adapters
/// leave everything else to their own handler chains.
#[derive(Clone, Debug)]
pub enum IncomingUpdate {
    Message(TextMessage),
    Callback(CallbackQuery),
}

impl IncomingUpdate {
    pub fn chat_id(&self) -> Option<ChatId> {
        match self {
            IncomingUpdate::Message(m) => Some(m.chat_id),
            IncomingUpdate::Callback(q) => q.message.map(|m| m.chat_id),
        }
    }

    pub fn user_id(&self) -> Option<UserId> {
        match self {
            IncomingUpdate::Message(m) => m.user_id,
            IncomingUpdate::Callback(q) => Some(q.user_id),
        }
    }

    pub fn as_message(&self) -> Option<&TextMessage> {
        match self {
            IncomingUpdate::Message(m) => Some(m),
            IncomingUpdate::Callback(_) => None,
        }
    }

    pub fn as_callback(&self) -> Option<&CallbackQuery> {
        match self {
            IncomingUpdate::Callback(q) => Some(q),
            IncomingUpdate::Message(_) => None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct TextMessage {
    pub chat_id: ChatId,
    /// Absent for channel posts.
    pub user_id: Option<UserId>,
    pub username: Option<String>,
    pub message_id: MessageId,
    pub text: Option<String>,
}

impl TextMessage {
    pub fn message_ref(&self) -> MessageRef {
        MessageRef {
            chat_id: self.chat_id,
            message_id: self.message_id,
        }
    }
}

#[derive(Clone, Debug)]
pub struct CallbackQuery {
    pub callback_id: String,
    pub user_id: UserId,
    pub username: Option<String>,
    /// The message carrying the pressed button, unless it was sent inline.
    pub message: Option<MessageRef>,
    pub inline_message_id: Option<InlineMessageId>,
    pub data: Option<String>,
}

/// Inline keyboard (buttons) attached to a prompt.
#[derive(Clone, Debug)]
pub struct InlineKeyboard {
    pub buttons: Vec<InlineButton>,
}

#[derive(Clone, Debug)]
pub struct InlineButton {
    pub label: String,
    pub callback_data: String,
}

impl InlineKeyboard {
    pub fn new(buttons: Vec<InlineButton>) -> Self {
        Self { buttons }
    }

    /// One button per row, callback data `{prefix}:{index}`.
    pub fn one_per_row(prefix: &str, options: &[String], max_label_len: usize) -> Self {
        let mut buttons = Vec::new();
        for (idx, opt) in options.iter().enumerate() {
            let label = if opt.chars().count() > max_label_len {
                format!("{}...", opt.chars().take(max_label_len).collect::<String>())
            } else {
                opt.clone()
            };
            buttons.push(InlineButton {
                label,
                callback_data: format!("{prefix}:{idx}"),
            });
        }
        Self { buttons }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_per_row_truncates_labels_and_indexes_data() {
        let kb = InlineKeyboard::one_per_row(
            "pick",
            &["short".to_string(), "a rather long option".to_string()],
            8,
        );
        assert_eq!(kb.buttons[0].label, "short");
        assert_eq!(kb.buttons[0].callback_data, "pick:0");
        assert_eq!(kb.buttons[1].label, "a rather...");
        assert_eq!(kb.buttons[1].callback_data, "pick:1");
    }

    #[test]
    fn inline_callbacks_have_no_chat() {
        let q = IncomingUpdate::Callback(CallbackQuery {
            callback_id: "cb".into(),
            user_id: UserId(5),
            username: None,
            message: None,
            inline_message_id: Some(InlineMessageId("AAE".into())),
            data: None,
        });
        assert_eq!(q.chat_id(), None);
        assert_eq!(q.user_id(), Some(UserId(5)));
    }
}
