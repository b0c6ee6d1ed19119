//! Dispatch table, identity gate and fault containment.
//!
//! An inbound update is classified into exactly one `Route`, the gate runs
//! once (before containment, so a denial never reads as an error), and the
//! handler body executes inside `respond`, which turns any failure into the
//! single `❌`-prefixed reply for that request.

use std::sync::Arc;

use teloxide::{
    prelude::*,
    types::{InlineKeyboardButton, InlineKeyboardMarkup, Message},
};

use ttb_core::{actions, actions::Reply, domain::UserId, security::is_authorized};

use crate::router::AppState;

mod callback;
mod document;

pub use callback::handle_callback;

pub(crate) const REFUSAL: &str = "I only listen to my owner ;P";

/// Which handler a request routes to. Classification is pure so the table
/// can be tested without a transport.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Route {
    Start,
    Magnet(String),
    Link(String),
    Stat,
    Search(String),
    Exec(String),
    Ip,
    UnknownCommand(String),
    TorrentFile,
    StegImage,
    StorableDoc,
    UnsupportedFile(String),
    Unsupported,
}

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

pub fn classify_command(text: &str) -> Route {
    let (cmd, rest) = parse_command(text);
    match cmd.as_str() {
        "start" | "help" => Route::Start,
        "magnet" => Route::Magnet(rest),
        "link" => Route::Link(rest),
        "stat" => Route::Stat,
        "search" => Route::Search(rest),
        "exec" => Route::Exec(rest),
        "ip" => Route::Ip,
        _ => Route::UnknownCommand(cmd),
    }
}

pub fn classify_extension(file_name: &str, storable: &[String]) -> Route {
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, e)| e.to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "torrent" => Route::TorrentFile,
        "jpg" | "jpeg" => Route::StegImage,
        _ if storable.iter().any(|s| s == &ext) => Route::StorableDoc,
        _ => Route::UnsupportedFile(ext),
    }
}

fn route_of(msg: &Message, storable: &[String]) -> Route {
    if let Some(text) = msg.text() {
        if text.starts_with('/') {
            return classify_command(text);
        }
    }
    if let Some(doc) = msg.document() {
        let name = doc.file_name.clone().unwrap_or_default();
        return classify_extension(&name, storable);
    }
    Route::Unsupported
}

/// Only the start/help action is open to strangers.
fn requires_auth(route: &Route) -> bool {
    !matches!(route, Route::Start)
}

pub async fn handle_message(bot: Bot, msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let route = route_of(&msg, &state.cfg.storable_extensions);
    let user_id = msg.from().map(|u| UserId(u.id.0 as i64));

    if requires_auth(&route) && !is_authorized(user_id, &state.cfg.telegram_allowed_users) {
        let _ = bot.send_message(msg.chat.id, REFUSAL).await;
        return Ok(());
    }

    let outcome = run_route(&bot, &msg, &state, route).await;
    respond(&bot, msg.chat.id, outcome).await;
    Ok(())
}

async fn run_route(
    bot: &Bot,
    msg: &Message,
    state: &AppState,
    route: Route,
) -> ttb_core::Result<Reply> {
    match route {
        Route::Start => Ok(Reply::Text(actions::start_text(
            &state.cfg.storable_extensions,
        ))),
        Route::Magnet(arg) => actions::add_magnet(state.daemon.as_ref(), &arg)
            .await
            .map(Reply::Text),
        Route::Link(arg) => actions::add_by_link(&state.http, &state.intake, &arg)
            .await
            .map(Reply::Text),
        Route::Stat => actions::status_report(state.daemon.as_ref())
            .await
            .map(Reply::Text),
        Route::Search(arg) => match &state.index {
            Some(index) => actions::search(index.as_ref(), &arg).await,
            None => Ok(Reply::Text(
                "🔍 Search backend is not configured".to_string(),
            )),
        },
        Route::Exec(arg) => {
            actions::exec_command(state.cfg.exec_enabled, state.cfg.subprocess_timeout, &arg)
                .await
                .map(Reply::Text)
        }
        Route::Ip => actions::external_ip(&state.http, &state.cfg.ip_echo_url)
            .await
            .map(Reply::Text),
        Route::UnknownCommand(cmd) => Ok(Reply::Text(format!(
            "🤷 Unknown command /{cmd}, see /start"
        ))),
        Route::TorrentFile => document::torrent_file(bot, msg, state).await,
        Route::StegImage => document::steg_image(bot, msg, state).await,
        Route::StorableDoc => document::storable_doc(bot, msg, state).await,
        Route::UnsupportedFile(ext) => Ok(Reply::Text(format!(
            "🤷 I don't know what to do with .{ext} files, see /start"
        ))),
        Route::Unsupported => Ok(Reply::Text(
            "🤷 Send me a command or a document, see /start".to_string(),
        )),
    }
}

/// Fault containment: one reply per request, success or failure. Failures
/// are logged in full and reported with a distinct prefix; the dispatch
/// loop itself never sees them.
pub(crate) async fn respond(
    bot: &Bot,
    chat_id: teloxide::types::ChatId,
    outcome: ttb_core::Result<Reply>,
) {
    let reply = match outcome {
        Ok(reply) => reply,
        Err(e) => {
            tracing::error!("handler failed: {e}");
            Reply::Text(format!("❌ Something went wrong: {e}"))
        }
    };

    let sent = match reply {
        Reply::Text(text) => bot.send_message(chat_id, text).await.map(|_| ()),
        Reply::Keyboard { text, rows } => {
            let rows: Vec<Vec<InlineKeyboardButton>> = rows
                .into_iter()
                .map(|row| {
                    row.into_iter()
                        .map(|(label, payload)| InlineKeyboardButton::callback(label, payload))
                        .collect()
                })
                .collect();
            bot.send_message(chat_id, text)
                .reply_markup(InlineKeyboardMarkup::new(rows))
                .await
                .map(|_| ())
        }
    };
    if let Err(e) = sent {
        tracing::error!("failed to send reply: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storable() -> Vec<String> {
        vec!["pdf".to_string(), "epub".to_string()]
    }

    #[test]
    fn commands_route_by_keyword() {
        assert_eq!(classify_command("/start"), Route::Start);
        assert_eq!(classify_command("/help@ttb_bot"), Route::Start);
        assert_eq!(
            classify_command("/magnet magnet:?xt=urn:btih:abc"),
            Route::Magnet("magnet:?xt=urn:btih:abc".to_string())
        );
        assert_eq!(
            classify_command("/link https://example.org/x.torrent"),
            Route::Link("https://example.org/x.torrent".to_string())
        );
        assert_eq!(classify_command("/stat"), Route::Stat);
        assert_eq!(
            classify_command("/search ubuntu 24.04"),
            Route::Search("ubuntu 24.04".to_string())
        );
        assert_eq!(classify_command("/ip"), Route::Ip);
        assert_eq!(
            classify_command("/frobnicate"),
            Route::UnknownCommand("frobnicate".to_string())
        );
    }

    #[test]
    fn extensions_route_files() {
        assert_eq!(
            classify_extension("show.s01.torrent", &storable()),
            Route::TorrentFile
        );
        assert_eq!(classify_extension("IMG_2031.JPG", &storable()), Route::StegImage);
        assert_eq!(classify_extension("photo.jpeg", &storable()), Route::StegImage);
        assert_eq!(classify_extension("taxes.pdf", &storable()), Route::StorableDoc);
        assert_eq!(
            classify_extension("setup.exe", &storable()),
            Route::UnsupportedFile("exe".to_string())
        );
        assert_eq!(
            classify_extension("noext", &storable()),
            Route::UnsupportedFile(String::new())
        );
    }

    #[test]
    fn only_start_is_open_to_strangers() {
        assert!(!requires_auth(&Route::Start));
        assert!(requires_auth(&Route::Stat));
        assert!(requires_auth(&Route::Exec("id".to_string())));
        assert!(requires_auth(&Route::UnknownCommand("x".to_string())));
        assert!(requires_auth(&Route::TorrentFile));
    }
}
