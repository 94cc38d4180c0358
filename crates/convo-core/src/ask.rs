//! Conversation helpers: send (or edit) a prompt, then wait for the answer.
//!
//! Send and wait are independent: a failed send is reported in
//! [`Asked::sent`] and the wait still runs, since the caller may be waiting
//! on a message that already exists.

use std::time::Duration;

use tracing::warn;

use crate::{
    domain::{ChatId, InlineMessageId, MessageId, MessageRef, UserId},
    listen::{
        Listener, ListenerKind, Predicate, Scope, UnallowedClick, WaitCoordinator, WaitOutcome,
    },
    messaging::{
        port::MessagingPort,
        types::{CallbackQuery, IncomingUpdate, InlineKeyboard, TextMessage},
    },
    Result,
};

/// Outcome of an ask: the prompt we sent and the answer, if any arrived.
#[derive(Debug)]
pub struct Asked<T = IncomingUpdate> {
    /// `Ok(None)` when the prompt text was blank and nothing was sent.
    pub sent: Result<Option<MessageRef>>,
    /// `None` on timeout or cancellation.
    pub response: Option<T>,
}

#[derive(Clone, Default)]
pub struct AskOptions {
    /// Defaults to a text message.
    pub kind: Option<ListenerKind>,
    pub timeout: Option<Duration>,
    pub filter: Option<Predicate>,
    pub user_ids: Vec<UserId>,
    pub message_ids: Vec<MessageId>,
    pub inline_message_ids: Vec<InlineMessageId>,
    pub unallowed: UnallowedClick,
    /// Send the prompt as a reply to the message that triggered it.
    pub quote: bool,
}

impl AskOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_user(mut self, user_id: UserId) -> Self {
        self.user_ids.push(user_id);
        self
    }

    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn kind(mut self, kind: ListenerKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn filter(mut self, f: impl Fn(&IncomingUpdate) -> bool + Send + Sync + 'static) -> Self {
        self.filter = Some(std::sync::Arc::new(f));
        self
    }

    pub fn quote(mut self) -> Self {
        self.quote = true;
        self
    }

    fn scope(&self, chat_id: ChatId) -> Scope {
        let mut scope = Scope::chat(chat_id)
            .users(self.user_ids.iter().copied())
            .messages(self.message_ids.iter().copied());
        scope
            .inline_message_ids
            .extend(self.inline_message_ids.iter().cloned());
        scope
    }

    fn listener(&self, chat_id: ChatId) -> Listener {
        Listener::new(self.kind.unwrap_or(ListenerKind::Message), self.scope(chat_id))
            .with_predicate(self.filter.clone())
            .on_unallowed(self.unallowed.clone())
    }
}

/// Reply to `prompt` with `text` and wait for the next matching update in that chat.
pub async fn ask(
    coordinator: &WaitCoordinator,
    messenger: &dyn MessagingPort,
    prompt: &TextMessage,
    text: &str,
    opts: AskOptions,
) -> Result<Asked> {
    let pending = coordinator.begin(vec![opts.listener(prompt.chat_id)], opts.timeout)?;

    let sent = if text.trim().is_empty() {
        Ok(None)
    } else {
        let reply_to = opts.quote.then_some(prompt.message_id);
        messenger
            .send_text(prompt.chat_id, text, reply_to)
            .await
            .map(Some)
    };
    if let Err(e) = &sent {
        warn!(chat = prompt.chat_id.0, "ask: prompt not sent: {e}");
    }

    let response = pending.wait().await?.resolved().map(|r| r.update);
    Ok(Asked { sent, response })
}

/// Replace the text of `target` and wait for the next matching update in its chat.
pub async fn ask_edit(
    coordinator: &WaitCoordinator,
    messenger: &dyn MessagingPort,
    target: MessageRef,
    text: &str,
    opts: AskOptions,
) -> Result<Asked> {
    let pending = coordinator.begin(vec![opts.listener(target.chat_id)], opts.timeout)?;

    let sent = if text.trim().is_empty() {
        Ok(None)
    } else {
        messenger.edit_text(target, text).await.map(Some)
    };
    if let Err(e) = &sent {
        warn!(chat = target.chat_id.0, "ask_edit: prompt not edited: {e}");
    }

    let response = pending.wait().await?.resolved().map(|r| r.update);
    Ok(Asked { sent, response })
}

#[derive(Clone, Default)]
pub struct ClickOptions {
    /// Users allowed to press; empty means anyone.
    pub from_users: Vec<UserId>,
    pub timeout: Option<Duration>,
    pub filter: Option<Predicate>,
    pub unallowed: UnallowedClick,
}

/// Wait for a button press on `message`.
pub async fn wait_for_click(
    coordinator: &WaitCoordinator,
    message: MessageRef,
    opts: ClickOptions,
) -> Result<Option<CallbackQuery>> {
    let scope = Scope::chat(message.chat_id)
        .message(message.message_id)
        .users(opts.from_users);
    let listener = Listener::callback_query(scope)
        .with_predicate(opts.filter)
        .on_unallowed(opts.unallowed);

    let outcome = coordinator.wait_for(listener, opts.timeout).await?;
    Ok(outcome
        .resolved()
        .and_then(|u| u.as_callback().cloned()))
}

/// What answered an [`ask_reply_or_click`].
#[derive(Clone, Debug)]
pub enum Reply {
    Text(TextMessage),
    Click(CallbackQuery),
}

/// Send `text` with a keyboard, then take whichever comes first: a text reply
/// in the chat or a press on one of the buttons.
pub async fn ask_reply_or_click(
    coordinator: &WaitCoordinator,
    messenger: &dyn MessagingPort,
    chat_id: ChatId,
    text: &str,
    keyboard: InlineKeyboard,
    opts: AskOptions,
) -> Result<Asked<Reply>> {
    let sent = messenger
        .send_inline_keyboard(chat_id, text, keyboard)
        .await
        .map(Some);

    let reply_scope = opts.scope(chat_id);
    let click_scope = match &sent {
        Ok(Some(m)) => reply_scope.clone().message(m.message_id),
        _ => {
            warn!(chat = chat_id.0, "ask_reply_or_click: keyboard not sent");
            reply_scope.clone()
        }
    };
    let listeners = vec![
        Listener::message(reply_scope).with_predicate(opts.filter.clone()),
        Listener::callback_query(click_scope)
            .with_predicate(opts.filter.clone())
            .on_unallowed(opts.unallowed.clone()),
    ];

    let response = match coordinator.race_first(listeners, opts.timeout).await? {
        WaitOutcome::Resolved(raced) => match raced.update {
            IncomingUpdate::Message(m) => Some(Reply::Text(m)),
            IncomingUpdate::Callback(q) => Some(Reply::Click(q)),
        },
        WaitOutcome::Timeout | WaitOutcome::Cancelled => None,
    };
    Ok(Asked { sent, response })
}
