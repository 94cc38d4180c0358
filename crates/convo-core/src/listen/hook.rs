use std::sync::Arc;

use tracing::{debug, warn};

use crate::{
    config::DEFAULT_UNALLOWED_CLICK_TEXT,
    listen::registry::{DispatchResult, ListenerHandle, ListenerRegistry, UnallowedClickNotice},
    messaging::{port::MessagingPort, types::IncomingUpdate},
};

/// Result of running one update through the listeners.
#[derive(Debug)]
pub enum HookOutcome {
    /// A listener took the update.
    Resolved(ListenerHandle),
    /// An unallowed button press was acknowledged; nothing else should answer it.
    Acknowledged(ListenerHandle),
    /// No listener wanted it; continue with ordinary handling.
    Unhandled(IncomingUpdate),
}

impl HookOutcome {
    pub fn is_consumed(&self) -> bool {
        !matches!(self, HookOutcome::Unhandled(_))
    }
}

/// Entry point the transport calls for every inbound update.
pub struct DispatchHook {
    registry: Arc<ListenerRegistry>,
    messenger: Arc<dyn MessagingPort>,
    unallowed_text: String,
}

impl DispatchHook {
    pub fn new(registry: Arc<ListenerRegistry>, messenger: Arc<dyn MessagingPort>) -> Self {
        Self {
            registry,
            messenger,
            unallowed_text: DEFAULT_UNALLOWED_CLICK_TEXT.to_string(),
        }
    }

    /// Text used for unallowed-click alerts that do not carry their own.
    pub fn with_unallowed_text(mut self, text: impl Into<String>) -> Self {
        self.unallowed_text = text.into();
        self
    }

    pub async fn handle(&self, update: IncomingUpdate) -> HookOutcome {
        match self.registry.dispatch(&update) {
            DispatchResult::Matched(handle) => HookOutcome::Resolved(handle),
            DispatchResult::Unallowed(notice) => {
                self.acknowledge(&notice).await;
                HookOutcome::Acknowledged(notice.handle)
            }
            DispatchResult::NoMatch => HookOutcome::Unhandled(update),
        }
    }

    async fn acknowledge(&self, notice: &UnallowedClickNotice) {
        let text = notice.text.as_deref().unwrap_or(&self.unallowed_text);
        debug!(
            listener = notice.handle.id(),
            user = notice.user_id.0,
            "unallowed click"
        );
        if let Err(e) = self
            .messenger
            .answer_callback_query(&notice.callback_id, Some(text), notice.show_alert)
            .await
        {
            warn!("failed to answer unallowed click: {e}");
        }
    }
}
