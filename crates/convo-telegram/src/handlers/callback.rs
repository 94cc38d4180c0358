use std::sync::Arc;

use teloxide::prelude::*;
use tracing::warn;

use crate::router::AppState;

/// A press nobody is waiting for: the prompt timed out or was cancelled.
pub async fn handle_callback(
    bot: Bot,
    q: CallbackQuery,
    _state: Arc<AppState>,
) -> ResponseResult<()> {
    // Always answer, or the client keeps showing a spinner.
    if let Err(e) = bot
        .answer_callback_query(q.id.clone())
        .text("This button is no longer active.".to_string())
        .await
    {
        warn!(callback = %q.id, "failed to answer stale button press: {e}");
    }
    Ok(())
}
