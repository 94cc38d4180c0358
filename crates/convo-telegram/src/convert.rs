//! teloxide update types -> `convo-core` update model.

use teloxide::types::{Message, Update, UpdateKind};

use convo_core::{
    domain::{ChatId, InlineMessageId, MessageId, MessageRef, UserId},
    messaging::types::{CallbackQuery, IncomingUpdate, TextMessage},
};

/// `None` for update kinds listeners never wait on.
pub fn incoming_update(update: &Update) -> Option<IncomingUpdate> {
    match &update.kind {
        UpdateKind::Message(msg) => Some(IncomingUpdate::Message(text_message(msg))),
        UpdateKind::CallbackQuery(q) => Some(IncomingUpdate::Callback(callback_query(q))),
        _ => None,
    }
}

pub fn text_message(msg: &Message) -> TextMessage {
    let from = msg.from();
    TextMessage {
        chat_id: ChatId(msg.chat.id.0),
        user_id: from.map(|u| UserId(u.id.0 as i64)),
        username: from.and_then(|u| u.username.clone()),
        message_id: MessageId(msg.id.0),
        text: msg.text().map(str::to_string),
    }
}

pub fn callback_query(q: &teloxide::types::CallbackQuery) -> CallbackQuery {
    CallbackQuery {
        callback_id: q.id.clone(),
        user_id: UserId(q.from.id.0 as i64),
        username: q.from.username.clone(),
        message: q.message.as_ref().map(|m| MessageRef {
            chat_id: ChatId(m.chat.id.0),
            message_id: MessageId(m.id.0),
        }),
        inline_message_id: q.inline_message_id.clone().map(InlineMessageId),
        data: q.data.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const USER: &str = r#"{"id": 5, "is_bot": false, "first_name": "Ada", "username": "ada"}"#;

    fn message_json(id: i32, text: &str) -> String {
        format!(
            r#"{{"message_id": {id}, "date": 1700000000,
                "chat": {{"id": 10, "type": "private", "first_name": "Ada"}},
                "from": {USER}, "text": "{text}"}}"#
        )
    }

    #[test]
    fn converts_text_messages() {
        let raw = format!(r#"{{"update_id": 1, "message": {}}}"#, message_json(7, "hi"));
        let update: Update = serde_json::from_str(&raw).unwrap();

        let Some(IncomingUpdate::Message(m)) = incoming_update(&update) else {
            panic!("expected a message");
        };
        assert_eq!(m.chat_id, ChatId(10));
        assert_eq!(m.user_id, Some(UserId(5)));
        assert_eq!(m.username.as_deref(), Some("ada"));
        assert_eq!(m.message_id, MessageId(7));
        assert_eq!(m.text.as_deref(), Some("hi"));
    }

    #[test]
    fn converts_callback_queries() {
        let raw = format!(
            r#"{{"update_id": 2, "callback_query": {{
                "id": "cb-1", "from": {USER}, "chat_instance": "ci",
                "data": "pick:1", "message": {}}}}}"#,
            message_json(42, "Type or tap")
        );
        let update: Update = serde_json::from_str(&raw).unwrap();

        let Some(IncomingUpdate::Callback(q)) = incoming_update(&update) else {
            panic!("expected a callback query");
        };
        assert_eq!(q.callback_id, "cb-1");
        assert_eq!(q.user_id, UserId(5));
        assert_eq!(q.data.as_deref(), Some("pick:1"));
        assert_eq!(
            q.message,
            Some(MessageRef {
                chat_id: ChatId(10),
                message_id: MessageId(42),
            })
        );
        assert_eq!(q.inline_message_id, None);
    }
}
