use std::{fmt, sync::Arc};

use crate::{listen::scope::Scope, messaging::types::IncomingUpdate};

/// Category of update a listener waits for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ListenerKind {
    Message,
    CallbackQuery,
}

impl ListenerKind {
    pub fn of(update: &IncomingUpdate) -> Self {
        match update {
            IncomingUpdate::Message(_) => ListenerKind::Message,
            IncomingUpdate::Callback(_) => ListenerKind::CallbackQuery,
        }
    }
}

/// Caller-supplied filter, evaluated while the registry is locked.
///
/// Predicates must be cheap and must not call back into the registry.
pub type Predicate = Arc<dyn Fn(&IncomingUpdate) -> bool + Send + Sync>;

/// What to do with a button press from a user outside the listener's scope.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UnallowedClick {
    Ignore,
    /// Answer the press. `text: None` uses the configured default text.
    Alert {
        text: Option<String>,
        show_alert: bool,
    },
}

impl Default for UnallowedClick {
    fn default() -> Self {
        UnallowedClick::Alert {
            text: None,
            show_alert: true,
        }
    }
}

impl From<bool> for UnallowedClick {
    fn from(alert: bool) -> Self {
        if alert {
            UnallowedClick::default()
        } else {
            UnallowedClick::Ignore
        }
    }
}

impl From<&str> for UnallowedClick {
    fn from(text: &str) -> Self {
        UnallowedClick::Alert {
            text: Some(text.to_string()),
            show_alert: true,
        }
    }
}

/// Lifecycle of a registered listener. Everything but `Pending` is terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ListenerState {
    Pending,
    Resolved,
    Cancelled,
    Expired,
}

/// A request to be handed the next update matching `kind`, `scope` and `predicate`.
#[derive(Clone)]
pub struct Listener {
    pub kind: ListenerKind,
    pub scope: Scope,
    pub predicate: Option<Predicate>,
    pub unallowed: UnallowedClick,
    /// Reject registration when `scope` is all wildcards.
    pub require_scope: bool,
}

impl Listener {
    pub fn new(kind: ListenerKind, scope: Scope) -> Self {
        Self {
            kind,
            scope,
            predicate: None,
            unallowed: UnallowedClick::default(),
            require_scope: false,
        }
    }

    pub fn message(scope: Scope) -> Self {
        Self::new(ListenerKind::Message, scope)
    }

    pub fn callback_query(scope: Scope) -> Self {
        Self::new(ListenerKind::CallbackQuery, scope)
    }

    pub fn filter(mut self, f: impl Fn(&IncomingUpdate) -> bool + Send + Sync + 'static) -> Self {
        self.predicate = Some(Arc::new(f));
        self
    }

    pub fn with_predicate(mut self, predicate: Option<Predicate>) -> Self {
        self.predicate = predicate;
        self
    }

    pub fn on_unallowed(mut self, policy: impl Into<UnallowedClick>) -> Self {
        self.unallowed = policy.into();
        self
    }

    pub fn require_scope(mut self) -> Self {
        self.require_scope = true;
        self
    }

    pub fn accepts(&self, update: &IncomingUpdate) -> bool {
        self.predicate.as_ref().map(|p| p(update)).unwrap_or(true)
    }
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener")
            .field("kind", &self.kind)
            .field("scope", &self.scope)
            .field("predicate", &self.predicate.is_some())
            .field("unallowed", &self.unallowed)
            .field("require_scope", &self.require_scope)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ChatId, MessageId, UserId};
    use crate::messaging::types::TextMessage;

    fn text(s: &str) -> IncomingUpdate {
        IncomingUpdate::Message(TextMessage {
            chat_id: ChatId(1),
            user_id: Some(UserId(2)),
            username: None,
            message_id: MessageId(3),
            text: Some(s.to_string()),
        })
    }

    #[test]
    fn predicate_defaults_to_accept() {
        let l = Listener::message(Scope::any());
        assert!(l.accepts(&text("anything")));

        let l = l.filter(|u| u.as_message().and_then(|m| m.text.as_deref()) == Some("yes"));
        assert!(l.accepts(&text("yes")));
        assert!(!l.accepts(&text("no")));
    }

    #[test]
    fn unallowed_policy_conversions() {
        assert_eq!(UnallowedClick::from(false), UnallowedClick::Ignore);
        assert_eq!(UnallowedClick::from(true), UnallowedClick::default());
        assert_eq!(
            UnallowedClick::from("not yours"),
            UnallowedClick::Alert {
                text: Some("not yours".into()),
                show_alert: true
            }
        );
    }
}
