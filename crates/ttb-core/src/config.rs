use std::{env, fs, path::Path, path::PathBuf, time::Duration};

use crate::{errors::Error, Result};

/// Typed configuration, loaded once at startup from the environment
/// (a `.env` file is read first without overriding existing variables).
#[derive(Clone, Debug)]
pub struct Config {
    // Core
    pub telegram_bot_token: String,
    pub telegram_allowed_users: Vec<i64>,

    // Torrent daemon
    pub qbit_url: String,
    pub qbit_credentials: Option<(String, String)>,
    /// Directory the daemon polls; placing a file here submits a job.
    pub watch_dir: PathBuf,
    /// Scratch location for files mid-transit.
    pub staging_dir: PathBuf,

    // File storage (Seafile)
    pub seafile_url: String,
    pub seafile_login: String,
    pub seafile_password: String,
    pub seafile_repo: String,
    pub storable_extensions: Vec<String>,
    pub upload_limit_bytes: u64,

    // Search backend (optional)
    pub tracker: Option<TrackerConfig>,

    // Steganography extraction
    pub jsteg_path: PathBuf,

    // Admin escape hatches
    pub exec_enabled: bool,
    pub ip_echo_url: String,

    // Outbound call bounds
    pub http_timeout: Duration,
    pub subprocess_timeout: Duration,
    pub proxy_url: Option<String>,
}

#[derive(Clone, Debug)]
pub struct TrackerConfig {
    pub url: String,
    pub login: String,
    pub password: String,
}

const MEGABYTE: u64 = 1024 * 1024;

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));

        let telegram_bot_token = required("TELEGRAM_BOT_TOKEN")?;
        let telegram_allowed_users = parse_csv_i64(env_str("TELEGRAM_ALLOWED_USERS"));
        if telegram_allowed_users.is_empty() {
            return Err(Error::Config(
                "TELEGRAM_ALLOWED_USERS environment variable is required".to_string(),
            ));
        }

        let qbit_url = required("QBIT_URL")?;
        let qbit_credentials = match (env_str("QBIT_LOGIN"), env_str("QBIT_PASSWORD")) {
            (Some(l), Some(p)) => Some((l, p)),
            _ => None,
        };
        let watch_dir = env_path("WATCH_DIR").ok_or_else(|| {
            Error::Config("WATCH_DIR environment variable is required".to_string())
        })?;
        let staging_dir = env_path("STAGING_DIR").unwrap_or_else(|| PathBuf::from("/tmp/ttb"));

        let seafile_url = required("SEAFILE_URL")?;
        let seafile_login = required("SEAFILE_LOGIN")?;
        let seafile_password = required("SEAFILE_PASSWORD")?;
        let seafile_repo = required("SEAFILE_REPO")?;
        let storable_extensions = parse_csv_lower(
            env_str("STORABLE_EXTENSIONS").or_else(|| Some("pdf,doc,docx,txt,epub,fb2".to_string())),
        );
        let upload_limit_bytes = env_u64("UPLOAD_LIMIT_MB").unwrap_or(20) * MEGABYTE;

        let tracker = env_str("TRACKER_URL").map(|url| TrackerConfig {
            url,
            login: env_str("TRACKER_LOGIN").unwrap_or_default(),
            password: env_str("TRACKER_PASSWORD").unwrap_or_default(),
        });

        let jsteg_path = env_path("JSTEG_PATH").unwrap_or_else(|| PathBuf::from("jsteg"));

        let exec_enabled = env_bool("EXEC_ENABLED").unwrap_or(false);
        let ip_echo_url =
            env_str("IP_ECHO_URL").unwrap_or_else(|| "https://api.ipify.org".to_string());

        let http_timeout = Duration::from_secs(env_u64("HTTP_TIMEOUT_SECS").unwrap_or(30));
        let subprocess_timeout =
            Duration::from_secs(env_u64("SUBPROCESS_TIMEOUT_SECS").unwrap_or(30));
        let proxy_url = env_str("PROXY_URL").and_then(non_empty);

        // Staging dir must exist before the first intake.
        fs::create_dir_all(&staging_dir)?;

        Ok(Self {
            telegram_bot_token,
            telegram_allowed_users,
            qbit_url,
            qbit_credentials,
            watch_dir,
            staging_dir,
            seafile_url,
            seafile_login,
            seafile_password,
            seafile_repo,
            storable_extensions,
            upload_limit_bytes,
            tracker,
            jsteg_path,
            exec_enabled,
            ip_echo_url,
            http_timeout,
            subprocess_timeout,
            proxy_url,
        })
    }

    /// One HTTP client for every outbound REST call, with the configured
    /// timeout and optional proxy applied uniformly.
    pub fn http_client(&self) -> Result<reqwest::Client> {
        let mut builder = reqwest::Client::builder().timeout(self.http_timeout);
        if let Some(proxy) = &self.proxy_url {
            builder = builder.proxy(
                reqwest::Proxy::all(proxy.as_str())
                    .map_err(|e| Error::Config(format!("invalid PROXY_URL: {e}")))?,
            );
        }
        Ok(builder.build()?)
    }
}

fn required(key: &str) -> Result<String> {
    env_str(key)
        .and_then(non_empty)
        .ok_or_else(|| Error::Config(format!("{key} environment variable is required")))
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

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
        if env::var_os(key).is_some() {
            continue; // do not override existing env
        }

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        env::set_var(key, val);
    }
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

fn env_path(key: &str) -> Option<PathBuf> {
    env::var_os(key).map(PathBuf::from)
}

fn parse_csv_i64(v: Option<String>) -> Vec<i64> {
    v.unwrap_or_default()
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse::<i64>().ok())
        .collect()
}

fn parse_csv_lower(v: Option<String>) -> Vec<String> {
    v.unwrap_or_default()
        .split(',')
        .map(|s| s.trim().trim_start_matches('.').to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
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
    fn csv_user_ids_skip_junk() {
        assert_eq!(
            parse_csv_i64(Some(" 1, 2,x, 3 ,".to_string())),
            vec![1, 2, 3]
        );
        assert!(parse_csv_i64(None).is_empty());
    }

    #[test]
    fn csv_extensions_are_normalized() {
        assert_eq!(
            parse_csv_lower(Some("PDF, .Docx ,epub".to_string())),
            vec!["pdf", "docx", "epub"]
        );
    }
}
