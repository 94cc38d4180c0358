use std::sync::Arc;

use convo_core::config::Config;

#[tokio::main]
async fn main() -> Result<(), convo_core::Error> {
    convo_core::logging::init("convo")?;

    let cfg = Arc::new(Config::load()?);

    convo_telegram::router::run_polling(cfg)
        .await
        .map_err(|e| convo_core::Error::External(format!("telegram bot failed: {e}")))?;

    Ok(())
}
