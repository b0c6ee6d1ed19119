use std::path::Path;

use async_trait::async_trait;

use crate::{
    domain::{SearchHit, TorrentJob},
    Result,
};

/// Port for the torrent-download daemon.
#[async_trait]
pub trait TorrentDaemon: Send + Sync {
    /// Submit a job by magnet URI or direct link. The URI is forwarded
    /// verbatim; malformed input surfaces as whatever the daemon returns.
    async fn add_by_link(&self, uri: &str) -> Result<()>;

    /// Jobs currently downloading.
    async fn active_jobs(&self) -> Result<Vec<TorrentJob>>;
}

/// Port for the remote file-storage service.
///
/// The adapter owns the whole credential-exchange / upload-endpoint / POST
/// sequence; callers hand it a staged file and a target name and get back
/// success or an upstream error.
#[async_trait]
pub trait FileStorage: Send + Sync {
    async fn upload(&self, staged: &Path, name: &str) -> Result<()>;
}

/// Port for the search backend.
#[async_trait]
pub trait SearchIndex: Send + Sync {
    /// Called once at startup. Failure is logged by the caller, not fatal.
    async fn login(&self) -> Result<()>;

    /// Ordered results for a free-text query, first page only.
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>>;

    /// Raw torrent bytes for one backend identifier.
    async fn download(&self, id: &str) -> Result<Vec<u8>>;
}
