//! Key layout for the prompt state namespace.
//!
//! - Primary records: `!promptStates!<taskID>`
//! - Due index: `!dueTimestampMillis!<encoded due>!<taskID>`
//! - Applied action logs: `!appliedActionLogs!<actionLogID>`
//! - Sync cursor: `!syncCursor!latestLogTimestampMillis`
//!
//! The encoded due timestamp is the big-endian bytes of the `i64` with its sign
//! bit flipped, hex-encoded to 16 lowercase characters. Fixed width plus the
//! sign flip make byte order equal numeric order over the whole `i64` range.

use crate::domain::{ActionLogId, PromptTaskId};

pub const PROMPT_STATES_PREFIX: &str = "!promptStates!";
pub const DUE_INDEX_PREFIX: &str = "!dueTimestampMillis!";
pub const APPLIED_LOGS_PREFIX: &str = "!appliedActionLogs!";
pub const SYNC_CURSOR_KEY: &str = "!syncCursor!latestLogTimestampMillis";
pub const INDEX_SEPARATOR: char = '!';

/// The byte right after the separator: bounds every key sharing an encoded timestamp.
const INDEX_UPPER_SENTINEL: char = '"';

const SIGN_BIT: u64 = 1 << 63;

/// Order-preserving encoding of a timestamp.
pub fn encode_timestamp(millis: i64) -> String {
    hex::encode(((millis as u64) ^ SIGN_BIT).to_be_bytes())
}

/// Inverse of [`encode_timestamp`].
pub fn decode_timestamp(encoded: &str) -> Option<i64> {
    let bytes: [u8; 8] = hex::decode(encoded).ok()?.try_into().ok()?;
    Some((u64::from_be_bytes(bytes) ^ SIGN_BIT) as i64)
}

pub fn state_key(task_id: &PromptTaskId) -> Vec<u8> {
    format!("{PROMPT_STATES_PREFIX}{task_id}").into_bytes()
}

pub fn applied_log_key(id: &ActionLogId) -> Vec<u8> {
    format!("{APPLIED_LOGS_PREFIX}{id}").into_bytes()
}

pub fn sync_cursor_key() -> Vec<u8> {
    SYNC_CURSOR_KEY.as_bytes().to_vec()
}

pub fn index_key(due_timestamp_millis: i64, task_id: &PromptTaskId) -> Vec<u8> {
    format!(
        "{DUE_INDEX_PREFIX}{}{INDEX_SEPARATOR}{task_id}",
        encode_timestamp(due_timestamp_millis)
    )
    .into_bytes()
}

/// Inclusive lower bound of the due index.
pub fn index_start() -> Vec<u8> {
    DUE_INDEX_PREFIX.as_bytes().to_vec()
}

/// Exclusive upper bound covering every index key with due `<= threshold`.
pub fn index_end_inclusive_of(threshold_millis: i64) -> Vec<u8> {
    format!(
        "{DUE_INDEX_PREFIX}{}{INDEX_UPPER_SENTINEL}",
        encode_timestamp(threshold_millis)
    )
    .into_bytes()
}

/// Split an index key back into its due timestamp and task ID.
pub fn parse_index_key(key: &[u8]) -> Option<(i64, PromptTaskId)> {
    let key = std::str::from_utf8(key).ok()?;
    let rest = key.strip_prefix(DUE_INDEX_PREFIX)?;
    let (encoded, task_id) = rest.split_once(INDEX_SEPARATOR)?;
    Some((decode_timestamp(encoded)?, PromptTaskId::new(task_id)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoding_preserves_order() {
        let values = [i64::MIN, -1_000_000, -1, 0, 1, 432_001_000, i64::MAX];
        let encoded: Vec<String> = values.iter().map(|v| encode_timestamp(*v)).collect();
        let mut sorted = encoded.clone();
        sorted.sort();
        assert_eq!(encoded, sorted);
        assert!(encoded.iter().all(|e| e.len() == 16));
    }

    #[test]
    fn test_decode_inverts_encode() {
        for v in [i64::MIN, -7, 0, 7, i64::MAX] {
            assert_eq!(decode_timestamp(&encode_timestamp(v)), Some(v));
        }
        assert_eq!(decode_timestamp("zz"), None);
        assert_eq!(decode_timestamp("00"), None);
    }

    #[test]
    fn test_index_keys_sort_by_due_then_task() {
        let a = index_key(5, &PromptTaskId::from("basicPrompt/b"));
        let b = index_key(5, &PromptTaskId::from("basicPrompt/c"));
        let c = index_key(6, &PromptTaskId::from("basicPrompt/a"));
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn test_upper_bound_is_inclusive_of_threshold() {
        let end = index_end_inclusive_of(100);
        assert!(index_key(100, &PromptTaskId::from("basicPrompt/zzz")) < end);
        assert!(index_key(101, &PromptTaskId::from("basicPrompt/a")) > end);
        assert!(index_start() < index_key(i64::MIN, &PromptTaskId::from("basicPrompt/a")));
    }

    #[test]
    fn test_parse_index_key() {
        let task = PromptTaskId::from("clozePrompt/c/2");
        let (due, parsed) = parse_index_key(&index_key(-42, &task)).unwrap();
        assert_eq!(due, -42);
        assert_eq!(parsed, task);
        assert!(parse_index_key(&state_key(&task)).is_none());
    }

    #[test]
    fn test_namespaces_stay_outside_the_index_range() {
        let start = index_start();
        let end = index_end_inclusive_of(i64::MAX);
        let others = [
            state_key(&PromptTaskId::from("basicPrompt/a")),
            applied_log_key(&ActionLogId::new("f00d")),
            sync_cursor_key(),
        ];
        for key in others {
            assert!(key < start || key >= end, "{}", String::from_utf8_lossy(&key));
        }
    }
}
