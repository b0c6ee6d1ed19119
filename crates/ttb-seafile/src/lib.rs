//! Seafile adapter.
//!
//! Implements the `ttb-core` FileStorage port over the Seafile Web API:
//! credential exchange for a token, a one-time upload link for the repo,
//! then a multipart POST of the staged file to that link.

use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;

use ttb_core::{ports::FileStorage, Error, Result};

pub struct SeafileClient {
    http: reqwest::Client,
    base: String,
    login: String,
    password: String,
    repo: String,
}

#[derive(Debug, Deserialize)]
struct AuthToken {
    token: String,
}

impl SeafileClient {
    pub fn new(
        http: reqwest::Client,
        base: &str,
        login: String,
        password: String,
        repo: String,
    ) -> Self {
        Self {
            http,
            base: base.trim_end_matches('/').to_string(),
            login,
            password,
            repo,
        }
    }

    async fn auth_token(&self) -> Result<String> {
        let resp = self
            .http
            .post(format!("{}/api2/auth-token/", self.base))
            .form(&[
                ("username", self.login.as_str()),
                ("password", self.password.as_str()),
            ])
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(Error::Upstream(format!(
                "Seafile auth returned HTTP {}",
                resp.status().as_u16()
            )));
        }
        Ok(resp.json::<AuthToken>().await?.token)
    }

    /// One-time upload endpoint for the configured repo.
    async fn upload_link(&self, token: &str) -> Result<String> {
        let resp = self
            .http
            .get(format!("{}/api2/repos/{}/upload-link/", self.base, self.repo))
            .header(reqwest::header::AUTHORIZATION, format!("Token {token}"))
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(Error::Upstream(format!(
                "Seafile upload-link returned HTTP {}",
                resp.status().as_u16()
            )));
        }
        // The endpoint returns a bare JSON string.
        Ok(resp.json::<String>().await?)
    }
}

#[async_trait]
impl FileStorage for SeafileClient {
    async fn upload(&self, staged: &Path, name: &str) -> Result<()> {
        let token = self.auth_token().await?;
        let link = self.upload_link(&token).await?;

        let bytes = tokio::fs::read(staged).await?;
        let part = reqwest::multipart::Part::bytes(bytes).file_name(name.to_string());
        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("parent_dir", "/")
            .text("replace", "0");

        let resp = self
            .http
            .post(link)
            .header(reqwest::header::AUTHORIZATION, format!("Token {token}"))
            .multipart(form)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Upstream(format!(
                "Seafile upload returned HTTP {}: {}",
                status.as_u16(),
                snippet(&body)
            )));
        }
        Ok(())
    }
}

fn snippet(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.len() <= 100 {
        return trimmed.to_string();
    }
    let cut: String = trimmed.chars().take(100).collect();
    format!("{cut}...")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_token_json_parses() {
        let raw = r#"{"token": "24fd3c026886e3121b2ca630805ed425c272cb96"}"#;
        let token: AuthToken = serde_json::from_str(raw).unwrap();
        assert_eq!(token.token, "24fd3c026886e3121b2ca630805ed425c272cb96");
    }

    #[test]
    fn long_upstream_bodies_are_truncated() {
        let body = "x".repeat(500);
        let s = snippet(&body);
        assert_eq!(s.len(), 103);
        assert!(s.ends_with("..."));
        assert_eq!(snippet("  short  "), "short");
    }
}
