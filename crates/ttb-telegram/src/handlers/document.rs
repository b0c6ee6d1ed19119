//! Inbound file handlers: torrent submission, steganography extraction and
//! storage upload. Each downloads the attachment into the staging area and
//! hands the staged file to the matching action body.

use std::path::PathBuf;

use teloxide::{net::Download, prelude::*, types::Document};

use ttb_core::{
    actions::{self, Reply},
    Error, Result,
};

use crate::router::AppState;

fn req_err(e: teloxide::RequestError) -> Error {
    Error::External(format!("telegram error: {e}"))
}

fn dl_err(e: teloxide::DownloadError) -> Error {
    Error::External(format!("telegram download error: {e}"))
}

fn doc_of(msg: &Message) -> Result<(&Document, String)> {
    let doc = msg
        .document()
        .ok_or_else(|| Error::Validation("expected a document".to_string()))?;
    let name = doc.file_name.clone().unwrap_or_else(|| "file".to_string());
    Ok((doc, name))
}

async fn download_to_staging(
    bot: &Bot,
    state: &AppState,
    doc: &Document,
    name: &str,
) -> Result<PathBuf> {
    let file = bot.get_file(doc.file.id.clone()).await.map_err(req_err)?;
    let path = state.intake.staging_path(name, false).await?;
    let mut dst = tokio::fs::File::create(&path).await?;
    bot.download_file(&file.path, &mut dst).await.map_err(dl_err)?;
    Ok(path)
}

pub async fn torrent_file(bot: &Bot, msg: &Message, state: &AppState) -> Result<Reply> {
    let (doc, name) = doc_of(msg)?;

    // Cheap dedup before pulling the file from Telegram; the promote step
    // re-checks atomically.
    if state.intake.already_watched(&name) {
        return Ok(Reply::Text("⚠ This torrent is already queued".to_string()));
    }

    let staged = download_to_staging(bot, state, doc, &name).await?;
    actions::add_torrent_file(&state.intake, &name, &staged)
        .await
        .map(Reply::Text)
}

pub async fn steg_image(bot: &Bot, msg: &Message, state: &AppState) -> Result<Reply> {
    let (doc, name) = doc_of(msg)?;
    let staged = download_to_staging(bot, state, doc, &name).await?;
    actions::extract_hidden(&state.cfg.jsteg_path, state.cfg.subprocess_timeout, &staged)
        .await
        .map(Reply::Text)
}

pub async fn storable_doc(bot: &Bot, msg: &Message, state: &AppState) -> Result<Reply> {
    let (doc, name) = doc_of(msg)?;
    let size = doc.file.size as u64;

    // Reject before anything crosses the network.
    actions::check_upload_size(size, state.cfg.upload_limit_bytes)?;

    let target = actions::storage_name(msg.caption(), &name);
    let staged = download_to_staging(bot, state, doc, &target).await?;
    actions::upload_to_storage(
        state.storage.as_ref(),
        state.cfg.upload_limit_bytes,
        size,
        &staged,
        &target,
    )
    .await
    .map(Reply::Text)
}
