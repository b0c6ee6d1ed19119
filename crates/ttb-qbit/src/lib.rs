//! qBittorrent Web API v2 adapter.
//!
//! Implements the `ttb-core` TorrentDaemon port. Auth is optional: a daemon
//! on localhost with auth bypass needs no credentials, otherwise the SID
//! cookie from `/api/v2/auth/login` is captured and replayed.

use async_trait::async_trait;

use serde::Deserialize;
use tokio::sync::Mutex;

use ttb_core::{domain::TorrentJob, ports::TorrentDaemon, Error, Result};

pub struct QbitClient {
    http: reqwest::Client,
    base: String,
    credentials: Option<(String, String)>,
    session: Mutex<Option<String>>,
}

#[derive(Debug, Deserialize)]
struct TorrentInfo {
    name: String,
    progress: f64,
    eta: i64,
}

impl QbitClient {
    pub fn new(http: reqwest::Client, base: &str, credentials: Option<(String, String)>) -> Self {
        Self {
            http,
            base: base.trim_end_matches('/').to_string(),
            credentials,
            session: Mutex::new(None),
        }
    }

    /// SID cookie for the daemon session, logging in on first use.
    async fn sid(&self) -> Result<Option<String>> {
        let Some((login, password)) = &self.credentials else {
            return Ok(None);
        };

        let mut session = self.session.lock().await;
        if let Some(sid) = session.as_ref() {
            return Ok(Some(sid.clone()));
        }

        let resp = self
            .http
            .post(format!("{}/api/v2/auth/login", self.base))
            .form(&[("username", login.as_str()), ("password", password.as_str())])
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(Error::Upstream(format!(
                "qBittorrent login returned HTTP {}",
                resp.status().as_u16()
            )));
        }

        let sid = resp
            .headers()
            .get_all(reqwest::header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find_map(extract_sid)
            .ok_or_else(|| Error::Upstream("qBittorrent login returned no SID cookie".to_string()))?;

        *session = Some(sid.clone());
        Ok(Some(sid))
    }

    fn with_cookie(&self, req: reqwest::RequestBuilder, sid: Option<String>) -> reqwest::RequestBuilder {
        match sid {
            Some(sid) => req.header(reqwest::header::COOKIE, format!("SID={sid}")),
            None => req,
        }
    }
}

fn extract_sid(set_cookie: &str) -> Option<String> {
    set_cookie
        .split(';')
        .map(str::trim)
        .find_map(|kv| kv.strip_prefix("SID="))
        .map(|s| s.to_string())
}

fn to_jobs(infos: Vec<TorrentInfo>) -> Vec<TorrentJob> {
    infos
        .into_iter()
        .map(|t| TorrentJob {
            name: t.name,
            progress: t.progress,
            eta_secs: t.eta,
        })
        .collect()
}

#[async_trait]
impl TorrentDaemon for QbitClient {
    async fn add_by_link(&self, uri: &str) -> Result<()> {
        let sid = self.sid().await?;
        let resp = self
            .with_cookie(
                self.http
                    .post(format!("{}/api/v2/torrents/add", self.base))
                    .form(&[("urls", uri)]),
                sid,
            )
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(Error::Upstream(format!(
                "qBittorrent add returned HTTP {}",
                resp.status().as_u16()
            )));
        }
        Ok(())
    }

    async fn active_jobs(&self) -> Result<Vec<TorrentJob>> {
        let sid = self.sid().await?;
        let resp = self
            .with_cookie(
                self.http
                    .get(format!("{}/api/v2/torrents/info", self.base))
                    .query(&[("filter", "downloading")]),
                sid,
            )
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(Error::Upstream(format!(
                "qBittorrent info returned HTTP {}",
                resp.status().as_u16()
            )));
        }
        let infos: Vec<TorrentInfo> = resp.json().await?;
        Ok(to_jobs(infos))
    }
}
