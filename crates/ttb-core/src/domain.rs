/// Telegram user id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct UserId(pub i64);

/// Telegram chat id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChatId(pub i64);

/// One actively-downloading job as reported by the torrent daemon.
#[derive(Clone, Debug, PartialEq)]
pub struct TorrentJob {
    pub name: String,
    /// Fractional progress in `0.0..=1.0`.
    pub progress: f64,
    pub eta_secs: i64,
}

/// One result row from the search backend.
///
/// `id` is the backend's opaque identifier; it is what a later button press
/// must hand back to request the download.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchHit {
    pub id: String,
    pub title: String,
    pub category: String,
    pub size_bytes: u64,
}
