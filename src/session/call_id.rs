// src/session/call_id.rs — Realtime call id generation
//
// Format: session_<unix millis>_<16 hex chars>. The millisecond prefix keeps
// ids roughly sortable; the 64 random bits make collisions between sessions
// created in the same millisecond negligible.

use chrono::Utc;

const PREFIX: &str = "session";
const RANDOM_BYTES: usize = 8;

/// Generate a fresh call id. Fails only if the OS random source does.
pub fn generate_call_id() -> anyhow::Result<String> {
    let mut bytes = [0u8; RANDOM_BYTES];
    getrandom::getrandom(&mut bytes)
        .map_err(|e| anyhow::anyhow!("random source unavailable: {e}"))?;
    let millis = Utc::now().timestamp_millis();
    Ok(format!("{PREFIX}_{millis}_{}", hex::encode(bytes)))
}

/// Whether `id` only uses characters the realtime providers accept in ids.
pub fn is_valid_call_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 64
        && id
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_format() {
        let id = generate_call_id().unwrap();
        let parts: Vec<&str> = id.split('_').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "session");
        assert!(parts[1].parse::<i64>().is_ok());
        assert_eq!(parts[2].len(), RANDOM_BYTES * 2);
        assert!(is_valid_call_id(&id));
    }

    #[test]
    fn test_ids_unique_within_same_millisecond() {
        let ids: HashSet<String> = (0..5_000).map(|_| generate_call_id().unwrap()).collect();
        assert_eq!(ids.len(), 5_000);
    }

    #[test]
    fn test_rejects_provider_unsafe_ids() {
        assert!(!is_valid_call_id(""));
        assert!(!is_valid_call_id("Session 1"));
        assert!(!is_valid_call_id(&"a".repeat(65)));
    }
}
