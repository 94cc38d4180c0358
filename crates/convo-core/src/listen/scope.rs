use crate::{
    domain::{ChatId, InlineMessageId, MessageId, UserId},
    messaging::types::IncomingUpdate,
};

/// Identifiers carried by one incoming update.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EventKey {
    pub chat_id: Option<ChatId>,
    pub user_id: Option<UserId>,
    pub message_id: Option<MessageId>,
    pub inline_message_id: Option<InlineMessageId>,
}

impl EventKey {
    pub fn of(update: &IncomingUpdate) -> Self {
        match update {
            IncomingUpdate::Message(m) => Self {
                chat_id: Some(m.chat_id),
                user_id: m.user_id,
                message_id: Some(m.message_id),
                inline_message_id: None,
            },
            IncomingUpdate::Callback(q) => Self {
                chat_id: q.message.map(|m| m.chat_id),
                user_id: Some(q.user_id),
                message_id: q.message.map(|m| m.message_id),
                inline_message_id: q.inline_message_id.clone(),
            },
        }
    }
}

/// What a listener requires of an update's identifiers.
///
/// An unset chat or an empty set is a wildcard. A set field never matches an
/// update that lacks that identifier.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Scope {
    pub chat_id: Option<ChatId>,
    pub user_ids: Vec<UserId>,
    pub message_ids: Vec<MessageId>,
    pub inline_message_ids: Vec<InlineMessageId>,
}

impl Scope {
    /// Matches everything.
    pub fn any() -> Self {
        Self::default()
    }

    pub fn chat(chat_id: ChatId) -> Self {
        Self {
            chat_id: Some(chat_id),
            ..Self::default()
        }
    }

    pub fn user(mut self, user_id: UserId) -> Self {
        self.user_ids.push(user_id);
        self
    }

    pub fn users(mut self, user_ids: impl IntoIterator<Item = UserId>) -> Self {
        self.user_ids.extend(user_ids);
        self
    }

    pub fn message(mut self, message_id: MessageId) -> Self {
        self.message_ids.push(message_id);
        self
    }

    pub fn messages(mut self, message_ids: impl IntoIterator<Item = MessageId>) -> Self {
        self.message_ids.extend(message_ids);
        self
    }

    pub fn inline_message(mut self, inline_message_id: InlineMessageId) -> Self {
        self.inline_message_ids.push(inline_message_id);
        self
    }

    pub fn is_wildcard(&self) -> bool {
        self.chat_id.is_none()
            && self.user_ids.is_empty()
            && self.message_ids.is_empty()
            && self.inline_message_ids.is_empty()
    }

    pub fn matches(&self, key: &EventKey) -> bool {
        self.matches_location(key) && self.accepts_user(key.user_id)
    }

    /// Every field except the user set.
    pub fn matches_location(&self, key: &EventKey) -> bool {
        if let Some(chat) = self.chat_id {
            if key.chat_id != Some(chat) {
                return false;
            }
        }
        field_matches(&self.message_ids, key.message_id.as_ref())
            && field_matches(&self.inline_message_ids, key.inline_message_id.as_ref())
    }

    pub fn accepts_user(&self, user_id: Option<UserId>) -> bool {
        field_matches(&self.user_ids, user_id.as_ref())
    }

    /// True when every constraint set on `self` is satisfied by `other`.
    ///
    /// Used to select listeners for bulk cancellation: `Scope::chat(c)` covers
    /// every listener in chat `c`, whatever its user or message constraints.
    pub fn covers(&self, other: &Scope) -> bool {
        if let Some(chat) = self.chat_id {
            if other.chat_id != Some(chat) {
                return false;
            }
        }
        sets_overlap(&self.user_ids, &other.user_ids)
            && sets_overlap(&self.message_ids, &other.message_ids)
            && sets_overlap(&self.inline_message_ids, &other.inline_message_ids)
    }
}

fn field_matches<T: PartialEq>(pattern: &[T], value: Option<&T>) -> bool {
    if pattern.is_empty() {
        return true;
    }
    match value {
        Some(v) => pattern.contains(v),
        None => false,
    }
}

fn sets_overlap<T: PartialEq>(pattern: &[T], other: &[T]) -> bool {
    pattern.is_empty() || other.iter().any(|v| pattern.contains(v))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(chat: i64, user: i64, msg: i32) -> EventKey {
        EventKey {
            chat_id: Some(ChatId(chat)),
            user_id: Some(UserId(user)),
            message_id: Some(MessageId(msg)),
            inline_message_id: None,
        }
    }

    #[test]
    fn wildcard_matches_anything() {
        assert!(Scope::any().is_wildcard());
        assert!(Scope::any().matches(&key(1, 2, 3)));
        assert!(Scope::any().matches(&EventKey::default()));
    }

    #[test]
    fn chat_and_user_constraints() {
        let s = Scope::chat(ChatId(10)).user(UserId(5));
        assert!(s.matches(&key(10, 5, 1)));
        assert!(!s.matches(&key(10, 9, 1)));
        assert!(!s.matches(&key(11, 5, 1)));
        assert!(s.matches_location(&key(10, 9, 1)));
    }

    #[test]
    fn user_set_accepts_any_member() {
        let s = Scope::chat(ChatId(10)).users([UserId(5), UserId(6)]);
        assert!(s.matches(&key(10, 6, 1)));
        assert!(!s.matches(&key(10, 7, 1)));
    }

    #[test]
    fn set_field_rejects_missing_identifier() {
        let s = Scope::any().inline_message(InlineMessageId("abc".into()));
        assert!(!s.matches(&key(10, 5, 1)));

        let s = Scope::chat(ChatId(10));
        let no_chat = EventKey {
            user_id: Some(UserId(5)),
            ..EventKey::default()
        };
        assert!(!s.matches(&no_chat));
    }

    #[test]
    fn covers_requires_overlap_on_set_fields() {
        let listener = Scope::chat(ChatId(10)).user(UserId(5)).message(MessageId(42));
        assert!(Scope::chat(ChatId(10)).covers(&listener));
        assert!(Scope::chat(ChatId(10)).user(UserId(5)).covers(&listener));
        assert!(!Scope::chat(ChatId(10)).user(UserId(9)).covers(&listener));
        assert!(!Scope::chat(ChatId(11)).covers(&listener));
        assert!(Scope::any().covers(&listener));
        // A wildcard listener has no user set to intersect with.
        assert!(!Scope::any().user(UserId(5)).covers(&Scope::chat(ChatId(10))));
    }
}
