use std::sync::Arc;

use ttb_core::{
    config::Config,
    ports::{FileStorage, SearchIndex, TorrentDaemon},
    staging::Intake,
};
use ttb_qbit::QbitClient;
use ttb_seafile::SeafileClient;
use ttb_telegram::router::{run_polling, AppState};
use ttb_tracker::TrackerClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    ttb_core::logging::init("ttb")?;

    let cfg = Arc::new(Config::load()?);
    let http = cfg.http_client()?;

    let daemon: Arc<dyn TorrentDaemon> = Arc::new(QbitClient::new(
        http.clone(),
        &cfg.qbit_url,
        cfg.qbit_credentials.clone(),
    ));
    let storage: Arc<dyn FileStorage> = Arc::new(SeafileClient::new(
        http.clone(),
        &cfg.seafile_url,
        cfg.seafile_login.clone(),
        cfg.seafile_password.clone(),
        cfg.seafile_repo.clone(),
    ));

    let index: Option<Arc<dyn SearchIndex>> = cfg.tracker.as_ref().map(|t| {
        Arc::new(TrackerClient::new(
            http.clone(),
            &t.url,
            t.login.clone(),
            t.password.clone(),
        )) as Arc<dyn SearchIndex>
    });
    if let Some(index) = &index {
        // A failed login here only means /search will fail per request
        // until the next restart; the bot still starts.
        if let Err(e) = index.login().await {
            tracing::warn!("search backend login failed: {e}");
        }
    }

    let intake = Intake::new(cfg.staging_dir.clone(), cfg.watch_dir.clone());

    let state = Arc::new(AppState {
        cfg,
        daemon,
        storage,
        index,
        http,
        intake,
    });

    run_polling(state).await
}
