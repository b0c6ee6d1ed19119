use std::sync::Arc;

use teloxide::{dispatching::Dispatcher, dptree, prelude::*};

use ttb_core::{
    config::Config,
    ports::{FileStorage, SearchIndex, TorrentDaemon},
    staging::Intake,
};

use crate::handlers;

#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<Config>,
    pub daemon: Arc<dyn TorrentDaemon>,
    pub storage: Arc<dyn FileStorage>,
    /// `None` when no tracker is configured; /search explains instead of failing.
    pub index: Option<Arc<dyn SearchIndex>>,
    pub http: reqwest::Client,
    pub intake: Intake,
}

pub async fn run_polling(state: Arc<AppState>) -> anyhow::Result<()> {
    let bot = Bot::new(state.cfg.telegram_bot_token.clone());

    if let Ok(me) = bot.get_me().await {
        tracing::info!("ttb started: @{}", me.username());
    }
    tracing::info!(
        "allowed users: {}",
        state.cfg.telegram_allowed_users.len()
    );
    tracing::info!("watch dir: {}", state.cfg.watch_dir.display());

    let handler = dptree::entry()
        .branch(Update::filter_callback_query().endpoint(handlers::handle_callback))
        .branch(Update::filter_message().endpoint(handlers::handle_message));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .build()
        .dispatch()
        .await;

    Ok(())
}
