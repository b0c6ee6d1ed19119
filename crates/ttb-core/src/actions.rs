//! Action bodies for every user-visible capability.
//!
//! Each function returns the single success reply for its request (or an
//! error the dispatch layer turns into the single failure reply). External
//! collaborators come in through the ports, so every body is testable with
//! fakes.

use std::{fmt::Write as _, path::Path, time::Duration};

use tokio::io::AsyncWriteExt;

use crate::{
    callback,
    domain::TorrentJob,
    ports::{FileStorage, SearchIndex, TorrentDaemon},
    staging::Intake,
    Error, Result,
};

/// How many results of the first page are shown.
pub const SEARCH_RESULT_LIMIT: usize = 10;
/// Buttons per keyboard row.
pub const KEYBOARD_ROW_WIDTH: usize = 5;

/// (label, payload) button rows.
pub type KeyboardRows = Vec<Vec<(String, String)>>;

/// What a handler sends back to the originating chat.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Reply {
    Text(String),
    Keyboard { text: String, rows: KeyboardRows },
}

pub fn start_text(storable_extensions: &[String]) -> String {
    format!(
        "Halo, hooman! 🦈\n\
         Send me torrent files and I'll queue them for download\n\
         Or /magnet <uri>\n\
         Or /link <url of a torrent file>\n\
         Active downloads: /stat\n\
         Search the tracker: /search <query>\n\
         Documents with these extensions are saved to file storage \
         (override the name via caption): {}",
        storable_extensions.join(", ")
    )
}

/// Forward a magnet URI verbatim to the daemon. No local validation of the
/// URI; malformed input surfaces as whatever the daemon returns.
pub async fn add_magnet(daemon: &dyn TorrentDaemon, arg: &str) -> Result<String> {
    let uri = arg.trim();
    if uri.is_empty() {
        return Err(Error::Validation("usage: /magnet <uri>".to_string()));
    }
    daemon.add_by_link(uri).await?;
    Ok("🤖 Got it".to_string())
}

/// Move an already-staged torrent file into the daemon watch dir, unless a
/// file of that name is already queued.
pub async fn add_torrent_file(intake: &Intake, name: &str, staged: &Path) -> Result<String> {
    if intake.promote_to_watch_dir(staged, name).await? {
        Ok("✅ Download will start shortly".to_string())
    } else {
        Ok("⚠ This torrent is already queued".to_string())
    }
}

/// Fetch a torrent file from a URL and stream it into the watch dir under a
/// name derived from the URL hash, so resubmitting the same link overwrites
/// instead of duplicating.
pub async fn add_by_link(
    http: &reqwest::Client,
    intake: &Intake,
    arg: &str,
) -> Result<String> {
    let url = arg.trim();
    if url.is_empty() {
        return Err(Error::Validation("usage: /link <url>".to_string()));
    }

    let mut resp = http.get(url).send().await?;
    if !resp.status().is_success() {
        return Err(Error::Upstream(format!(
            "GET {url} returned HTTP {}",
            resp.status().as_u16()
        )));
    }

    let name = format!("{}.torrent", Intake::hashed_name(url));
    let (_path, mut out) = intake.open_watch_file(&name).await?;
    while let Some(chunk) = resp.chunk().await? {
        out.write_all(&chunk).await?;
    }
    out.flush().await?;

    Ok("✅ Download will start shortly".to_string())
}

pub fn render_status(jobs: &[TorrentJob]) -> String {
    if jobs.is_empty() {
        return "💤 Nothing downloading right now".to_string();
    }
    let mut report = String::new();
    for job in jobs {
        let _ = writeln!(
            report,
            "⭕ {} — {:.2}% done, ~⏳ {} min",
            job.name,
            job.progress * 100.0,
            job.eta_secs / 60
        );
    }
    report.trim_end().to_string()
}

pub async fn status_report(daemon: &dyn TorrentDaemon) -> Result<String> {
    Ok(render_status(&daemon.active_jobs().await?))
}

/// Target filename for a storage upload: the caption (plus the original
/// extension) wins over the transport-provided name.
pub fn storage_name(caption: Option<&str>, file_name: &str) -> String {
    let caption = caption.map(str::trim).filter(|c| !c.is_empty());
    let Some(caption) = caption else {
        return file_name.to_string();
    };
    match file_name.rsplit_once('.') {
        Some((_, ext)) if !ext.is_empty() => format!("{caption}.{ext}"),
        _ => caption.to_string(),
    }
}

/// Size ceiling, enforced before anything is downloaded or any storage call
/// is made.
pub fn check_upload_size(size: u64, limit: u64) -> Result<()> {
    if size > limit {
        return Err(Error::Validation(format!(
            "File too large, the limit is {} MB",
            limit / (1024 * 1024)
        )));
    }
    Ok(())
}

pub async fn upload_to_storage(
    storage: &dyn FileStorage,
    limit: u64,
    size: u64,
    staged: &Path,
    name: &str,
) -> Result<String> {
    check_upload_size(size, limit)?;
    storage.upload(staged, name).await?;
    Ok("✅ File saved".to_string())
}

/// Run the steganography extractor over a staged file and report its stdout.
/// The staged file is removed afterwards, success or failure.
pub async fn extract_hidden(jsteg: &Path, timeout: Duration, staged: &Path) -> Result<String> {
    let result = tokio::time::timeout(
        timeout,
        tokio::process::Command::new(jsteg)
            .arg("reveal")
            .arg(staged)
            .output(),
    )
    .await;

    let _ = tokio::fs::remove_file(staged).await;

    let output = match result {
        Ok(out) => out?,
        Err(_) => return Err(Error::External("extraction timed out".to_string())),
    };

    let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if text.is_empty() {
        Ok("🔍 Nothing found".to_string())
    } else {
        Ok(text)
    }
}

pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

/// First page of results, rendered with 1-based indexes and one button per
/// result. The backend id rides inside each button payload, so no
/// server-side session table is needed.
pub async fn search(index: &dyn SearchIndex, query: &str) -> Result<Reply> {
    let query = query.trim();
    if query.is_empty() {
        return Err(Error::Validation("usage: /search <query>".to_string()));
    }

    let hits = index.search(query).await?;
    if hits.is_empty() {
        return Ok(Reply::Text(format!("🔍 Nothing found for \"{query}\"")));
    }

    let shown = &hits[..hits.len().min(SEARCH_RESULT_LIMIT)];
    let mut text = String::new();
    let mut buttons = Vec::with_capacity(shown.len());
    for (i, hit) in shown.iter().enumerate() {
        let _ = writeln!(
            text,
            "{}. [{}] {} — {}",
            i + 1,
            hit.category,
            format_size(hit.size_bytes),
            hit.title
        );
        buttons.push(((i + 1).to_string(), callback::encode_download(&hit.id)));
    }
    let rows = buttons
        .chunks(KEYBOARD_ROW_WIDTH)
        .map(|chunk| chunk.to_vec())
        .collect();

    Ok(Reply::Keyboard {
        text: text.trim_end().to_string(),
        rows,
    })
}

/// Resolve a button press back to its search result and queue the download.
/// The timestamp in the job name keeps repeated resolutions of the same id
/// from colliding.
pub async fn resolve_search_result(
    index: &dyn SearchIndex,
    intake: &Intake,
    payload: &str,
) -> Result<String> {
    let id = callback::decode_download(payload)
        .ok_or_else(|| Error::Validation("unknown button payload".to_string()))?;

    let bytes = index.download(id).await?;
    let name = format!("{id}_{}.torrent", chrono::Utc::now().timestamp());
    intake.place_in_watch_dir(&name, &bytes).await?;

    Ok("🤖 Got it, download will start shortly".to_string())
}

/// Administrative escape hatch: run an arbitrary shell command. Disabled by
/// default; the gate here is the config flag, authorization happened at
/// dispatch.
pub async fn exec_command(enabled: bool, timeout: Duration, arg: &str) -> Result<String> {
    if !enabled {
        return Ok(
            "🔒 Remote exec is disabled on this bot (set EXEC_ENABLED=true to allow it)"
                .to_string(),
        );
    }

    let cmd = arg.trim();
    if cmd.is_empty() {
        return Err(Error::Validation("usage: /exec <shell command>".to_string()));
    }

    let result = tokio::time::timeout(
        timeout,
        tokio::process::Command::new("sh").arg("-c").arg(cmd).output(),
    )
    .await;
    let output = match result {
        Ok(out) => out?,
        Err(_) => return Err(Error::External("command timed out".to_string())),
    };

    let code = output.status.code().unwrap_or(-1);
    let mut text = format!("exit {code}");
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    for stream in [stdout.trim(), stderr.trim()] {
        if !stream.is_empty() {
            text.push('\n');
            text.push_str(stream);
        }
    }
    Ok(text)
}

/// Externally-visible IP of this process, via a public echo service.
pub async fn external_ip(http: &reqwest::Client, url: &str) -> Result<String> {
    let resp = http.get(url).send().await?;
    if !resp.status().is_success() {
        return Err(Error::Upstream(format!(
            "IP echo returned HTTP {}",
            resp.status().as_u16()
        )));
    }
    let ip = resp.text().await?;
    Ok(format!("🌐 {}", ip.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SearchHit;
    use async_trait::async_trait;
    use std::{
        path::PathBuf,
        sync::{
            atomic::{AtomicUsize, Ordering},
            Mutex,
        },
    };

    struct FakeDaemon {
        jobs: Vec<TorrentJob>,
        added: Mutex<Vec<String>>,
    }

    impl FakeDaemon {
        fn new(jobs: Vec<TorrentJob>) -> Self {
            Self {
                jobs,
                added: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl TorrentDaemon for FakeDaemon {
        async fn add_by_link(&self, uri: &str) -> Result<()> {
            self.added.lock().unwrap().push(uri.to_string());
            Ok(())
        }

        async fn active_jobs(&self) -> Result<Vec<TorrentJob>> {
            Ok(self.jobs.clone())
        }
    }

    #[derive(Default)]
    struct FakeStorage {
        uploads: AtomicUsize,
    }

    #[async_trait]
    impl FileStorage for FakeStorage {
        async fn upload(&self, _staged: &Path, _name: &str) -> Result<()> {
            self.uploads.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct FakeIndex {
        hits: Vec<SearchHit>,
    }

    #[async_trait]
    impl SearchIndex for FakeIndex {
        async fn login(&self) -> Result<()> {
            Ok(())
        }

        async fn search(&self, _query: &str) -> Result<Vec<SearchHit>> {
            Ok(self.hits.clone())
        }

        async fn download(&self, id: &str) -> Result<Vec<u8>> {
            Ok(format!("torrent-for-{id}").into_bytes())
        }
    }

    fn hit(n: usize) -> SearchHit {
        SearchHit {
            id: format!("id-{n}"),
            title: format!("Title {n}"),
            category: "Movies".to_string(),
            size_bytes: 700 * 1024 * 1024,
        }
    }

    fn scratch(tag: &str) -> Intake {
        let root = PathBuf::from(format!("/tmp/ttb-actions-{tag}-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&root);
        Intake::new(root.join("staging"), root.join("watch"))
    }

    #[test]
    fn status_rendering_rounds_and_floors() {
        let jobs = vec![TorrentJob {
            name: "ubuntu.iso".to_string(),
            progress: 0.33333,
            eta_secs: 125,
        }];
        let report = render_status(&jobs);
        assert_eq!(report, "⭕ ubuntu.iso — 33.33% done, ~⏳ 2 min");
    }

    #[test]
    fn status_with_no_jobs_says_so() {
        assert_eq!(render_status(&[]), "💤 Nothing downloading right now");
    }

    #[tokio::test]
    async fn magnet_is_forwarded_verbatim() {
        let daemon = FakeDaemon::new(vec![]);
        let reply = add_magnet(&daemon, " magnet:?xt=urn:btih:abc ").await.unwrap();
        assert_eq!(reply, "🤖 Got it");
        assert_eq!(
            daemon.added.lock().unwrap().as_slice(),
            ["magnet:?xt=urn:btih:abc"]
        );
    }

    #[tokio::test]
    async fn empty_magnet_fails_before_the_daemon_is_called() {
        let daemon = FakeDaemon::new(vec![]);
        let err = add_magnet(&daemon, "  ").await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(daemon.added.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn duplicate_torrent_file_reports_already_queued() {
        let intake = scratch("dup");
        let staged = intake.stage("show.torrent", b"meta", false).await.unwrap();
        let first = add_torrent_file(&intake, "show.torrent", &staged)
            .await
            .unwrap();
        assert_eq!(first, "✅ Download will start shortly");

        let staged = intake.stage("show.torrent", b"meta", false).await.unwrap();
        let second = add_torrent_file(&intake, "show.torrent", &staged)
            .await
            .unwrap();
        assert_eq!(second, "⚠ This torrent is already queued");
    }

    #[test]
    fn caption_overrides_name_but_keeps_extension() {
        assert_eq!(storage_name(Some("taxes 2026"), "scan_001.pdf"), "taxes 2026.pdf");
        assert_eq!(storage_name(Some(" "), "scan_001.pdf"), "scan_001.pdf");
        assert_eq!(storage_name(None, "scan_001.pdf"), "scan_001.pdf");
        assert_eq!(storage_name(Some("notes"), "README"), "notes");
    }

    #[tokio::test]
    async fn oversized_upload_never_reaches_storage() {
        let storage = FakeStorage::default();
        let err = upload_to_storage(
            &storage,
            20 * 1024 * 1024,
            21 * 1024 * 1024,
            Path::new("/tmp/whatever"),
            "big.pdf",
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(storage.uploads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn upload_within_limit_is_saved() {
        let storage = FakeStorage::default();
        let intake = scratch("upload");
        let staged = intake.stage("doc.pdf", b"pdf", false).await.unwrap();
        let reply = upload_to_storage(&storage, 1024, 3, &staged, "doc.pdf")
            .await
            .unwrap();
        assert_eq!(reply, "✅ File saved");
        assert_eq!(storage.uploads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn extraction_with_no_payload_reports_nothing_and_cleans_up() {
        let intake = scratch("steg-empty");
        let staged = intake.stage("pic.jpg", b"jpeg", false).await.unwrap();
        // `true` exits 0 with empty stdout, standing in for a clean image.
        let reply = extract_hidden(Path::new("true"), Duration::from_secs(5), &staged)
            .await
            .unwrap();
        assert_eq!(reply, "🔍 Nothing found");
        assert!(!staged.exists());
    }

    #[tokio::test]
    async fn extraction_output_is_the_reply_and_file_is_gone() {
        let intake = scratch("steg-found");
        let staged = intake.stage("pic.jpg", b"jpeg", false).await.unwrap();
        // `echo reveal <path>` stands in for an extractor that found text.
        let reply = extract_hidden(Path::new("echo"), Duration::from_secs(5), &staged)
            .await
            .unwrap();
        assert!(reply.contains("reveal"));
        assert!(!staged.exists());
    }

    #[tokio::test]
    async fn extraction_cleans_up_even_when_the_tool_is_missing() {
        let intake = scratch("steg-missing");
        let staged = intake.stage("pic.jpg", b"jpeg", false).await.unwrap();
        let result = extract_hidden(
            Path::new("/nonexistent/jsteg"),
            Duration::from_secs(5),
            &staged,
        )
        .await;
        assert!(result.is_err());
        assert!(!staged.exists());
    }

    #[tokio::test]
    async fn search_caps_results_and_builds_prefixed_button_rows() {
        let index = FakeIndex {
            hits: (1..=12).map(hit).collect(),
        };
        let Reply::Keyboard { text, rows } = search(&index, "ubuntu").await.unwrap() else {
            panic!("expected a keyboard reply");
        };

        assert_eq!(text.lines().count(), SEARCH_RESULT_LIMIT);
        assert!(text.starts_with("1. [Movies] 700.0 MiB — Title 1"));

        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|row| row.len() == KEYBOARD_ROW_WIDTH));
        assert_eq!(rows[0][0], ("1".to_string(), "dl:id-1".to_string()));
        assert_eq!(rows[1][4], ("10".to_string(), "dl:id-10".to_string()));
    }

    #[tokio::test]
    async fn search_with_no_hits_is_a_plain_reply() {
        let index = FakeIndex { hits: vec![] };
        let reply = search(&index, "nothing here").await.unwrap();
        assert_eq!(
            reply,
            Reply::Text("🔍 Nothing found for \"nothing here\"".to_string())
        );
    }

    #[tokio::test]
    async fn empty_search_query_is_rejected() {
        let index = FakeIndex { hits: vec![] };
        assert!(matches!(
            search(&index, "   ").await.unwrap_err(),
            Error::Validation(_)
        ));
    }

    #[tokio::test]
    async fn resolving_a_button_queues_the_exact_result() {
        let index = FakeIndex { hits: vec![] };
        let intake = scratch("resolve");
        let reply = resolve_search_result(&index, &intake, "dl:id-7")
            .await
            .unwrap();
        assert_eq!(reply, "🤖 Got it, download will start shortly");

        let watch = std::fs::read_dir(format!(
            "/tmp/ttb-actions-resolve-{}/watch",
            std::process::id()
        ))
        .unwrap()
        .flatten()
        .collect::<Vec<_>>();
        assert_eq!(watch.len(), 1);
        let name = watch[0].file_name().to_string_lossy().to_string();
        assert!(name.starts_with("id-7_"));
        assert!(name.ends_with(".torrent"));
        assert_eq!(std::fs::read(watch[0].path()).unwrap(), b"torrent-for-id-7");
    }

    #[tokio::test]
    async fn foreign_callback_payload_is_a_validation_error() {
        let index = FakeIndex { hits: vec![] };
        let intake = scratch("resolve-bad");
        assert!(matches!(
            resolve_search_result(&index, &intake, "askuser:1:2")
                .await
                .unwrap_err(),
            Error::Validation(_)
        ));
    }

    #[tokio::test]
    async fn exec_is_refused_when_disabled() {
        let reply = exec_command(false, Duration::from_secs(5), "id").await.unwrap();
        assert!(reply.contains("disabled"));
    }

    #[tokio::test]
    async fn exec_reports_exit_code_and_output() {
        let reply = exec_command(true, Duration::from_secs(5), "echo hi")
            .await
            .unwrap();
        assert!(reply.starts_with("exit 0"));
        assert!(reply.contains("hi"));
    }

    #[test]
    fn sizes_are_human_readable() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(1536), "1.5 KiB");
        assert_eq!(format_size(700 * 1024 * 1024), "700.0 MiB");
    }
}
