//! File intake: the staging directory for files mid-transit and the watch
//! directory the torrent daemon polls.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::Result;

#[derive(Clone, Debug)]
pub struct Intake {
    staging_dir: PathBuf,
    watch_dir: PathBuf,
}

impl Intake {
    pub fn new(staging_dir: PathBuf, watch_dir: PathBuf) -> Self {
        Self {
            staging_dir,
            watch_dir,
        }
    }

    /// Deterministic, collision-resistant name derived from a seed string
    /// (a URL or an original filename). Same seed, same name.
    pub fn hashed_name(seed: &str) -> String {
        Sha256::digest(seed.as_bytes())
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect()
    }

    /// Path a file with this name would be staged at. Creates the staging
    /// directory if absent. With `randomize` the name is replaced by a hash
    /// of itself, so the original name never leaks into the temp layout.
    pub async fn staging_path(&self, name: &str, randomize: bool) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.staging_dir).await?;
        let file_name = if randomize {
            Self::hashed_name(name)
        } else {
            sanitize_filename(name)
        };
        Ok(self.staging_dir.join(file_name))
    }

    /// Write `bytes` to the staging area, overwriting any previous file at
    /// the computed path.
    pub async fn stage(&self, name: &str, bytes: &[u8], randomize: bool) -> Result<PathBuf> {
        let path = self.staging_path(name, randomize).await?;
        tokio::fs::write(&path, bytes).await?;
        Ok(path)
    }

    /// Dedup check for torrent-file submission: is a file with this basename
    /// already queued in the daemon watch directory?
    pub fn already_watched(&self, name: &str) -> bool {
        self.watch_path(name).exists()
    }

    pub fn watch_path(&self, name: &str) -> PathBuf {
        self.watch_dir.join(sanitize_filename(name))
    }

    /// Write a job file for the daemon. Placing a file in the watch dir is
    /// equivalent to submitting a download; the file is the daemon's input
    /// from then on and is never cleaned up here.
    pub async fn place_in_watch_dir(&self, name: &str, bytes: &[u8]) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.watch_dir).await?;
        let path = self.watch_path(name);
        tokio::fs::write(&path, bytes).await?;
        Ok(path)
    }

    /// Open (create/truncate) a job file in the watch dir for streaming
    /// writes. Repeated submissions of the same name overwrite.
    pub async fn open_watch_file(&self, name: &str) -> Result<(PathBuf, tokio::fs::File)> {
        tokio::fs::create_dir_all(&self.watch_dir).await?;
        let path = self.watch_path(name);
        let file = tokio::fs::File::create(&path).await?;
        Ok((path, file))
    }

    /// Move a staged file into the watch dir, claiming `name` atomically.
    /// Returns `false` when a file of that name is already queued; the
    /// `create_new` claim means two near-simultaneous submissions of the
    /// same name cannot both win.
    pub async fn promote_to_watch_dir(&self, staged: &Path, name: &str) -> Result<bool> {
        tokio::fs::create_dir_all(&self.watch_dir).await?;
        let target = self.watch_path(name);
        match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&target)
            .await
        {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => return Ok(false),
            Err(e) => return Err(e.into()),
        }
        // Rename over the claim; staging and watch may live on different
        // filesystems, in which case fall back to copy + remove.
        if tokio::fs::rename(staged, &target).await.is_err() {
            tokio::fs::copy(staged, &target).await?;
            let _ = tokio::fs::remove_file(staged).await;
        }
        Ok(true)
    }

    /// Best-effort removal of a staged file (post-extraction cleanup).
    pub async fn discard(&self, path: &Path) {
        let _ = tokio::fs::remove_file(path).await;
    }
}

fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let mut out = String::with_capacity(base.len());
    for ch in base.chars() {
        if ch.is_ascii_alphanumeric() || matches!(ch, '.' | '_' | '-') {
            out.push(ch);
        } else {
            out.push('_');
        }
    }
    if out.is_empty() || out.chars().all(|c| c == '.') {
        "file".to_string()
    } else {
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch(tag: &str) -> Intake {
        let root = PathBuf::from(format!("/tmp/ttb-staging-{tag}-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&root);
        Intake::new(root.join("staging"), root.join("watch"))
    }

    #[test]
    fn hashed_name_is_deterministic_hex() {
        let a = Intake::hashed_name("https://example.org/x.torrent");
        let b = Intake::hashed_name("https://example.org/x.torrent");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, Intake::hashed_name("https://example.org/y.torrent"));
    }

    #[test]
    fn filenames_are_sanitized() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("a b?.pdf"), "a_b_.pdf");
        assert_eq!(sanitize_filename(""), "file");
    }

    #[tokio::test]
    async fn stage_verbatim_keeps_the_name() {
        let intake = scratch("verbatim");
        let path = intake.stage("movie.torrent", b"abc", false).await.unwrap();
        assert_eq!(path.file_name().unwrap(), "movie.torrent");
        assert_eq!(std::fs::read(&path).unwrap(), b"abc");
    }

    #[tokio::test]
    async fn stage_randomized_hides_the_name_and_overwrites() {
        let intake = scratch("random");
        let first = intake.stage("report.pdf", b"v1", true).await.unwrap();
        let second = intake.stage("report.pdf", b"v2", true).await.unwrap();
        assert_eq!(first, second);
        assert!(!first.to_string_lossy().contains("report"));
        assert_eq!(std::fs::read(&second).unwrap(), b"v2");
    }

    #[tokio::test]
    async fn watch_dir_dedup_sees_placed_files() {
        let intake = scratch("dedup");
        assert!(!intake.already_watched("show.torrent"));
        intake
            .place_in_watch_dir("show.torrent", b"meta")
            .await
            .unwrap();
        assert!(intake.already_watched("show.torrent"));
    }

    #[tokio::test]
    async fn promote_claims_name_exactly_once() {
        let intake = scratch("promote");
        let first = intake.stage("album.torrent", b"one", false).await.unwrap();
        assert!(intake
            .promote_to_watch_dir(&first, "album.torrent")
            .await
            .unwrap());
        assert!(!first.exists());
        assert!(intake.already_watched("album.torrent"));

        let second = intake.stage("album.torrent", b"two", false).await.unwrap();
        assert!(!intake
            .promote_to_watch_dir(&second, "album.torrent")
            .await
            .unwrap());
        // The queued job still holds the first submission's content.
        assert_eq!(
            std::fs::read(intake.watch_path("album.torrent")).unwrap(),
            b"one"
        );
    }

    #[tokio::test]
    async fn discard_removes_staged_file() {
        let intake = scratch("discard");
        let path = intake.stage("pic.jpg", b"jpeg", false).await.unwrap();
        assert!(path.exists());
        intake.discard(&path).await;
        assert!(!path.exists());
        // Discarding twice is fine.
        intake.discard(&path).await;
    }
}
