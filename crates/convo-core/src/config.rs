use std::{env, fs, path::Path, time::Duration};

use crate::{errors::Error, Result};

pub const DEFAULT_UNALLOWED_CLICK_TEXT: &str = "You're not expected to click this button.";

/// Typed configuration, read from the environment (and `.env` if present).
#[derive(Clone, Debug)]
pub struct Config {
    pub telegram_bot_token: String,

    // Listeners
    /// Default wait used by the conversation wrappers. `None` waits forever.
    pub listen_timeout: Option<Duration>,
    pub sweep_interval: Duration,

    // Unallowed clicks
    pub unallowed_click_text: String,
    pub unallowed_click_show_alert: bool,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));

        let telegram_bot_token = env_str("TELEGRAM_BOT_TOKEN").unwrap_or_default();
        if telegram_bot_token.trim().is_empty() {
            return Err(Error::Config(
                "TELEGRAM_BOT_TOKEN environment variable is required".to_string(),
            ));
        }

        let listen_timeout = parse_timeout_secs(env_str("LISTEN_TIMEOUT_SECS"))?;
        let sweep_interval =
            Duration::from_millis(env_u64("LISTENER_SWEEP_INTERVAL_MS").unwrap_or(1000).max(10));

        let unallowed_click_text = env_str("UNALLOWED_CLICK_ALERT_TEXT")
            .and_then(non_empty)
            .unwrap_or_else(|| DEFAULT_UNALLOWED_CLICK_TEXT.to_string());
        let unallowed_click_show_alert = env_bool("UNALLOWED_CLICK_SHOW_ALERT").unwrap_or(true);

        Ok(Self {
            telegram_bot_token,
            listen_timeout,
            sweep_interval,
            unallowed_click_text,
            unallowed_click_show_alert,
        })
    }
}

/// `None`/unset -> 300s, `0` or `none` -> wait forever.
fn parse_timeout_secs(raw: Option<String>) -> Result<Option<Duration>> {
    let Some(raw) = raw else {
        return Ok(Some(Duration::from_secs(300)));
    };
    let v = raw.trim().to_lowercase();
    if v.is_empty() {
        return Ok(Some(Duration::from_secs(300)));
    }
    if v == "none" || v == "0" {
        return Ok(None);
    }
    v.parse::<u64>()
        .map(|secs| Some(Duration::from_secs(secs)))
        .map_err(|_| Error::Config(format!("LISTEN_TIMEOUT_SECS is not a number: {raw}")))
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for (key, val) in parse_dotenv(&contents) {
        if env::var_os(&key).is_some() {
            continue; // do not override existing env
        }
        env::set_var(key, val);
    }
}

fn parse_dotenv(contents: &str) -> Vec<(String, String)> {
    let mut out = Vec::new();
    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        out.push((key.to_string(), val));
    }
    out
}

fn env_bool(key: &str) -> Option<bool> {
    env_str(key).map(|s| {
        matches!(
            s.trim().to_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        )
    })
}

fn env_u64(key: &str) -> Option<u64> {
    env_str(key).and_then(|s| s.trim().parse::<u64>().ok())
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_defaults_and_disabling() {
        assert_eq!(
            parse_timeout_secs(None).unwrap(),
            Some(Duration::from_secs(300))
        );
        assert_eq!(
            parse_timeout_secs(Some("45".into())).unwrap(),
            Some(Duration::from_secs(45))
        );
        assert_eq!(parse_timeout_secs(Some("0".into())).unwrap(), None);
        assert_eq!(parse_timeout_secs(Some(" None ".into())).unwrap(), None);
        assert!(parse_timeout_secs(Some("soon".into())).is_err());
    }

    #[test]
    fn dotenv_strips_quotes_and_skips_comments() {
        let parsed = parse_dotenv(
            "# comment\nTELEGRAM_BOT_TOKEN=\"abc:123\"\n\nNOEQUALS\nUNALLOWED_CLICK_ALERT_TEXT='hands off'\n",
        );
        assert_eq!(
            parsed,
            vec![
                ("TELEGRAM_BOT_TOKEN".to_string(), "abc:123".to_string()),
                (
                    "UNALLOWED_CLICK_ALERT_TEXT".to_string(),
                    "hands off".to_string()
                ),
            ]
        );
    }
}
