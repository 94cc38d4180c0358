//! Fixtures shared by the unit tests.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::{
    domain::{ChatId, MessageId, MessageRef, UserId},
    errors::Error,
    listen::ListenerRegistry,
    messaging::{
        port::MessagingPort,
        types::{CallbackQuery, IncomingUpdate, InlineKeyboard, TextMessage},
    },
    Result,
};

pub fn text_message(chat: i64, user: i64, text: &str) -> IncomingUpdate {
    IncomingUpdate::Message(TextMessage {
        chat_id: ChatId(chat),
        user_id: Some(UserId(user)),
        username: None,
        message_id: MessageId(1000),
        text: Some(text.to_string()),
    })
}

pub fn callback(id: &str, user: i64, message: Option<MessageRef>) -> IncomingUpdate {
    IncomingUpdate::Callback(CallbackQuery {
        callback_id: id.to_string(),
        user_id: UserId(user),
        username: None,
        message,
        inline_message_id: None,
        data: Some("data".to_string()),
    })
}

/// Yield until the registry holds at least `n` pending listeners.
pub async fn wait_for_pending(registry: &ListenerRegistry, n: usize) {
    while registry.pending_count() < n {
        tokio::task::yield_now().await;
    }
}

#[derive(Default)]
pub struct FakeMessenger {
    next_id: Mutex<i32>,
    pub fail_sends: bool,
    pub sends: Mutex<Vec<(ChatId, String, Option<MessageId>)>>,
    pub keyboards: Mutex<Vec<(ChatId, String, usize)>>,
    pub edits: Mutex<Vec<(MessageRef, String)>>,
    pub answers: Mutex<Vec<(String, Option<String>, bool)>>,
}

impl FakeMessenger {
    pub fn new() -> Self {
        Self {
            next_id: Mutex::new(1),
            ..Default::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail_sends: true,
            ..Self::new()
        }
    }

    fn alloc(&self, chat_id: ChatId) -> MessageRef {
        let mut guard = self.next_id.lock().unwrap();
        let id = *guard;
        *guard += 1;
        MessageRef {
            chat_id,
            message_id: MessageId(id),
        }
    }

    fn check(&self) -> Result<()> {
        if self.fail_sends {
            return Err(Error::External("telegram error: network down".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl MessagingPort for FakeMessenger {
    async fn send_text(
        &self,
        chat_id: ChatId,
        text: &str,
        reply_to: Option<MessageId>,
    ) -> Result<MessageRef> {
        self.check()?;
        self.sends
            .lock()
            .unwrap()
            .push((chat_id, text.to_string(), reply_to));
        Ok(self.alloc(chat_id))
    }

    async fn send_inline_keyboard(
        &self,
        chat_id: ChatId,
        text: &str,
        keyboard: InlineKeyboard,
    ) -> Result<MessageRef> {
        self.check()?;
        self.keyboards
            .lock()
            .unwrap()
            .push((chat_id, text.to_string(), keyboard.buttons.len()));
        Ok(self.alloc(chat_id))
    }

    async fn edit_text(&self, msg: MessageRef, text: &str) -> Result<MessageRef> {
        self.check()?;
        self.edits.lock().unwrap().push((msg, text.to_string()));
        Ok(msg)
    }

    async fn answer_callback_query(
        &self,
        callback_id: &str,
        text: Option<&str>,
        show_alert: bool,
    ) -> Result<()> {
        self.answers.lock().unwrap().push((
            callback_id.to_string(),
            text.map(|t| t.to_string()),
            show_alert,
        ));
        self.check()
    }
}
