use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};

/// Envelope behind a list page token: a pure numeric offset into the
/// filtered+sorted result set, base64-wrapped so callers treat it as opaque.
#[derive(Debug, Serialize, Deserialize)]
struct PageCursor {
    skip: usize,
}

/// Encode a list-page offset as an opaque token.
pub fn encode_page_token(skip: usize) -> String {
    let envelope = serde_json::to_vec(&PageCursor { skip }).unwrap_or_default();
    STANDARD.encode(envelope)
}

/// Decode a list-page token back to an offset. Malformed tokens fall back
/// to offset 0 rather than erroring.
pub fn decode_page_token(token: &str) -> usize {
    STANDARD
        .decode(token)
        .ok()
        .and_then(|bytes| serde_json::from_slice::<PageCursor>(&bytes).ok())
        .map(|cursor| cursor.skip)
        .unwrap_or(0)
}

/// Token for a position in the change log: the 1-based index of the next
/// change to deliver, as a numeric string.
pub fn encode_change_token(log_len: usize) -> String {
    (log_len + 1).to_string()
}

/// Decode a change token to a 0-based log index. Unparseable tokens default
/// to the beginning of the log.
pub fn decode_change_token(token: &str) -> usize {
    token
        .trim()
        .parse::<usize>()
        .map(|position| position.saturating_sub(1))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_token_round_trip() {
        let token = encode_page_token(42);
        assert_eq!(decode_page_token(&token), 42);
    }

    #[test]
    fn test_malformed_page_token_falls_back_to_zero() {
        assert_eq!(decode_page_token("not-base64!!"), 0);
        assert_eq!(decode_page_token(&STANDARD.encode(b"{\"other\":1}")), 0);
        assert_eq!(decode_page_token(""), 0);
    }

    #[test]
    fn test_change_token_points_past_current_log() {
        assert_eq!(encode_change_token(0), "1");
        assert_eq!(encode_change_token(7), "8");
        assert_eq!(decode_change_token("8"), 7);
    }

    #[test]
    fn test_malformed_change_token_defaults_to_log_start() {
        assert_eq!(decode_change_token("garbage"), 0);
        assert_eq!(decode_change_token(""), 0);
        assert_eq!(decode_change_token("0"), 0);
    }
}
