//! Inline-button payload codec.
//!
//! The whole "search session" lives inside the button payload: the payload
//! is the marker prefix plus the backend's own result identifier, so a press
//! can be resolved with no server-side table and survives restarts.

pub const DOWNLOAD_PREFIX: &str = "dl:";

pub fn encode_download(id: &str) -> String {
    format!("{DOWNLOAD_PREFIX}{id}")
}

/// Recover the backend identifier from a button payload, or `None` if the
/// payload is not ours.
pub fn decode_download(payload: &str) -> Option<&str> {
    payload.strip_prefix(DOWNLOAD_PREFIX).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_recovers_exact_id() {
        let payload = encode_download("t-4899231");
        assert_eq!(decode_download(&payload), Some("t-4899231"));
    }

    #[test]
    fn foreign_payloads_are_rejected() {
        assert_eq!(decode_download("askuser:1:2"), None);
        assert_eq!(decode_download("dl:"), None);
        assert_eq!(decode_download(""), None);
    }
}
