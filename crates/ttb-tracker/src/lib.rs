//! Search backend adapter.
//!
//! Implements the `ttb-core` SearchIndex port against the tracker's JSON
//! API: a form login, a query endpoint returning ordered result rows, and a
//! download endpoint returning raw torrent bytes for one result id.

use async_trait::async_trait;
use serde::Deserialize;

use ttb_core::{domain::SearchHit, ports::SearchIndex, Error, Result};

pub struct TrackerClient {
    http: reqwest::Client,
    base: String,
    login: String,
    password: String,
}

#[derive(Debug, Deserialize)]
struct HitRow {
    id: String,
    title: String,
    #[serde(default)]
    category: String,
    #[serde(default)]
    size: u64,
}

impl TrackerClient {
    pub fn new(http: reqwest::Client, base: &str, login: String, password: String) -> Self {
        Self {
            http,
            base: base.trim_end_matches('/').to_string(),
            login,
            password,
        }
    }
}

fn to_hits(rows: Vec<HitRow>) -> Vec<SearchHit> {
    rows.into_iter()
        .map(|r| SearchHit {
            id: r.id,
            title: r.title,
            category: r.category,
            size_bytes: r.size,
        })
        .collect()
}

#[async_trait]
impl SearchIndex for TrackerClient {
    async fn login(&self) -> Result<()> {
        let resp = self
            .http
            .post(format!("{}/login", self.base))
            .form(&[
                ("username", self.login.as_str()),
                ("password", self.password.as_str()),
            ])
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(Error::Upstream(format!(
                "tracker login returned HTTP {}",
                resp.status().as_u16()
            )));
        }
        Ok(())
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchHit>> {
        let resp = self
            .http
            .get(format!("{}/search", self.base))
            .query(&[("query", query)])
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(Error::Upstream(format!(
                "tracker search returned HTTP {}",
                resp.status().as_u16()
            )));
        }
        let rows: Vec<HitRow> = resp.json().await?;
        Ok(to_hits(rows))
    }

    async fn download(&self, id: &str) -> Result<Vec<u8>> {
        let resp = self
            .http
            .get(format!("{}/download/{id}", self.base))
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(Error::Upstream(format!(
                "tracker download returned HTTP {}",
                resp.status().as_u16()
            )));
        }
        Ok(resp.bytes().await?.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn result_rows_parse_with_missing_optionals() {
        let raw = r#"[
            {"id": "t-4899231", "title": "Some Movie (2019)", "category": "Movies", "size": 734003200},
            {"id": "t-11", "title": "Bare row"}
        ]"#;
        let rows: Vec<HitRow> = serde_json::from_str(raw).unwrap();
        let hits = to_hits(rows);
        assert_eq!(hits[0].id, "t-4899231");
        assert_eq!(hits[0].size_bytes, 734003200);
        assert_eq!(hits[1].category, "");
        assert_eq!(hits[1].size_bytes, 0);
    }
}
