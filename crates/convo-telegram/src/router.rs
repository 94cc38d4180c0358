use std::sync::Arc;

use teloxide::{dispatching::Dispatcher, dptree, prelude::*};
use tokio_util::sync::CancellationToken;
use tracing::info;

use convo_core::{
    config::Config,
    listen::{DispatchHook, ListenerRegistry, UnallowedClick, WaitCoordinator},
    messaging::port::MessagingPort,
};

use crate::{convert, handlers, TelegramMessenger};

#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<Config>,
    pub coordinator: WaitCoordinator,
    pub messenger: Arc<dyn MessagingPort>,
}

impl AppState {
    /// Unallowed-click policy for prompts sent by the bot's own handlers.
    pub fn unallowed_click(&self) -> UnallowedClick {
        UnallowedClick::Alert {
            text: None,
            show_alert: self.cfg.unallowed_click_show_alert,
        }
    }
}

pub async fn run_polling(cfg: Arc<Config>) -> anyhow::Result<()> {
    let bot = Bot::new(cfg.telegram_bot_token.clone());

    if let Ok(me) = bot.get_me().await {
        info!("convo started: @{}", me.username());
    }

    let messenger: Arc<dyn MessagingPort> = Arc::new(TelegramMessenger::new(bot.clone()));
    let registry = Arc::new(ListenerRegistry::new());

    let shutdown = CancellationToken::new();
    let sweeper = registry.spawn_sweeper(cfg.sweep_interval, shutdown.clone());

    let hook = Arc::new(
        DispatchHook::new(registry.clone(), messenger.clone())
            .with_unallowed_text(cfg.unallowed_click_text.clone()),
    );
    let state = Arc::new(AppState {
        cfg: cfg.clone(),
        coordinator: WaitCoordinator::new(registry),
        messenger,
    });

    // Listeners get the first look at every update; whatever they leave
    // falls through to the ordinary handlers unchanged.
    let handler = dptree::entry()
        .filter_async(unclaimed_by_listeners)
        .branch(Update::filter_callback_query().endpoint(handlers::handle_callback))
        .branch(Update::filter_message().endpoint(handlers::handle_message));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state, hook])
        .build()
        .dispatch()
        .await;

    shutdown.cancel();
    let _ = sweeper.await;

    Ok(())
}

async fn unclaimed_by_listeners(update: Update, hook: Arc<DispatchHook>) -> bool {
    let Some(incoming) = convert::incoming_update(&update) else {
        return true;
    };
    !hook.handle(incoming).await.is_consumed()
}
