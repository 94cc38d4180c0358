use std::sync::Arc;

use teloxide::prelude::*;
use tracing::warn;

use convo_core::{
    ask::{ask, ask_reply_or_click, AskOptions, Reply},
    domain::{ChatId, MessageRef},
    listen::Scope,
    messaging::types::{InlineKeyboard, TextMessage},
};

use crate::{convert, router::AppState};

const PICK_PREFIX: &str = "pick";
const PICK_OPTIONS: [&str; 3] = ["Tea", "Coffee", "Water"];

fn parse_command(text: &str) -> (String, String) {
    // Telegram may send `/cmd@botname arg1 ...`
    let mut parts = text.trim().splitn(2, char::is_whitespace);
    let first = parts.next().unwrap_or("").trim();
    let rest = parts.next().unwrap_or("").trim().to_string();

    let cmd = first
        .trim_start_matches('/')
        .split('@')
        .next()
        .unwrap_or("")
        .to_lowercase();

    (cmd, rest)
}

/// Index encoded in `pick:{idx}` callback data.
fn parse_pick(data: &str) -> Option<usize> {
    let (prefix, idx) = data.split_once(':')?;
    if prefix != PICK_PREFIX {
        return None;
    }
    idx.parse::<usize>().ok().filter(|i| *i < PICK_OPTIONS.len())
}

pub async fn handle_command(bot: Bot, msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let prompt = convert::text_message(&msg);
    let (cmd, _args) = parse_command(msg.text().unwrap_or(""));

    match cmd.as_str() {
        "ask" => {
            tokio::spawn(ask_name(state, prompt));
            Ok(())
        }
        "pick" => {
            tokio::spawn(pick_drink(state, prompt));
            Ok(())
        }
        "cancel" => {
            let n = state.coordinator.cancel_all(&Scope::chat(prompt.chat_id));
            bot.send_message(msg.chat.id, format!("Cancelled {n} pending question(s)."))
                .await?;
            Ok(())
        }
        "start" | "help" => {
            bot.send_message(
                msg.chat.id,
                "/ask - I ask your name\n/pick - type or tap an answer\n/cancel - drop pending questions",
            )
            .await?;
            Ok(())
        }
        _ => {
            bot.send_message(msg.chat.id, format!("Unknown command: /{cmd}"))
                .await?;
            Ok(())
        }
    }
}

fn options_for(state: &AppState, prompt: &TextMessage) -> AskOptions {
    let mut opts = AskOptions::new().timeout(state.cfg.listen_timeout);
    opts.unallowed = state.unallowed_click();
    match prompt.user_id {
        Some(user) => opts.from_user(user),
        None => opts,
    }
}

async fn say(state: &AppState, chat_id: ChatId, text: &str) {
    if let Err(e) = state.messenger.send_text(chat_id, text, None).await {
        warn!(chat = chat_id.0, "send failed: {e}");
    }
}

async fn ask_name(state: Arc<AppState>, prompt: TextMessage) {
    let opts = options_for(&state, &prompt).quote();
    let asked = match ask(
        &state.coordinator,
        state.messenger.as_ref(),
        &prompt,
        "What's your name?",
        opts,
    )
    .await
    {
        Ok(a) => a,
        Err(e) => {
            warn!(chat = prompt.chat_id.0, "ask failed: {e}");
            return;
        }
    };

    let name = asked
        .response
        .as_ref()
        .and_then(|u| u.as_message())
        .and_then(|m| m.text.clone());
    let reply = match name {
        Some(name) => format!("Nice to meet you, {name}!"),
        None => "No answer, never mind.".to_string(),
    };
    say(&state, prompt.chat_id, &reply).await;
}

async fn pick_drink(state: Arc<AppState>, prompt: TextMessage) {
    let options: Vec<String> = PICK_OPTIONS.iter().map(|s| s.to_string()).collect();
    let keyboard = InlineKeyboard::one_per_row(PICK_PREFIX, &options, 30);
    let opts = options_for(&state, &prompt);

    let asked = match ask_reply_or_click(
        &state.coordinator,
        state.messenger.as_ref(),
        prompt.chat_id,
        "What would you like? Tap a button or type something else.",
        keyboard,
        opts,
    )
    .await
    {
        Ok(a) => a,
        Err(e) => {
            warn!(chat = prompt.chat_id.0, "pick failed: {e}");
            return;
        }
    };

    match asked.response {
        Some(Reply::Click(q)) => {
            let choice = q
                .data
                .as_deref()
                .and_then(parse_pick)
                .map(|i| PICK_OPTIONS[i])
                .unwrap_or("something");
            if let Err(e) = state
                .messenger
                .answer_callback_query(&q.callback_id, Some(&format!("Selected: {choice}")), false)
                .await
            {
                warn!(callback = %q.callback_id, "failed to answer button press: {e}");
            }
            if let Ok(Some(sent)) = &asked.sent {
                edit_or_say(&state, *sent, &format!("✓ {choice}")).await;
            }
        }
        Some(Reply::Text(m)) => {
            let typed = m.text.unwrap_or_default();
            say(&state, prompt.chat_id, &format!("You typed: {typed}")).await;
        }
        None => say(&state, prompt.chat_id, "Too slow, maybe next time.").await,
    }
}

async fn edit_or_say(state: &AppState, msg: MessageRef, text: &str) {
    if state.messenger.edit_text(msg, text).await.is_err() {
        say(state, msg.chat_id, text).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_commands_with_bot_suffix() {
        assert_eq!(
            parse_command("/Ask@convo_bot  now"),
            ("ask".to_string(), "now".to_string())
        );
        assert_eq!(parse_command("/pick"), ("pick".to_string(), String::new()));
    }

    #[test]
    fn pick_data_is_bounded() {
        assert_eq!(parse_pick("pick:1"), Some(1));
        assert_eq!(parse_pick("pick:3"), None);
        assert_eq!(parse_pick("other:0"), None);
        assert_eq!(parse_pick("pick"), None);
    }
}
