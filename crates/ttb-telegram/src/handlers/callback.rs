//! Inline-button activations. The payload carries the backend identifier
//! embedded at render time, so resolution needs no server-side session.

use std::sync::Arc;

use teloxide::prelude::*;

use ttb_core::{
    actions::{self, Reply},
    callback::DOWNLOAD_PREFIX,
    domain::UserId,
    security::is_authorized,
};

use crate::router::AppState;

use super::{respond, REFUSAL};

pub async fn handle_callback(
    bot: Bot,
    q: CallbackQuery,
    state: Arc<AppState>,
) -> ResponseResult<()> {
    let cb_id = q.id.clone();
    let chat_id = q.message.as_ref().map(|m| m.chat.id);
    let data = q.data.clone().unwrap_or_default();

    // Always answer the callback query so the button stops spinning.
    let Some(chat_id) = chat_id else {
        let _ = bot.answer_callback_query(cb_id).await;
        return Ok(());
    };
    if !data.starts_with(DOWNLOAD_PREFIX) {
        let _ = bot.answer_callback_query(cb_id).await;
        return Ok(());
    }

    let user_id = UserId(q.from.id.0 as i64);
    if !is_authorized(Some(user_id), &state.cfg.telegram_allowed_users) {
        let _ = bot
            .answer_callback_query(cb_id)
            .text(REFUSAL.to_string())
            .await;
        return Ok(());
    }

    let _ = bot.answer_callback_query(cb_id).await;

    let outcome = match &state.index {
        Some(index) => actions::resolve_search_result(index.as_ref(), &state.intake, &data)
            .await
            .map(Reply::Text),
        None => Ok(Reply::Text(
            "🔍 Search backend is not configured".to_string(),
        )),
    };
    respond(&bot, chat_id, outcome).await;

    Ok(())
}
