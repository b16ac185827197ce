//! Request id generation.

use chrono::Utc;
use uuid::Uuid;

const SUFFIX_LEN: usize = 9;

/// Generate a request id: millisecond timestamp, underscore, random suffix.
///
/// Unique with overwhelming probability; also sortable by admission time,
/// which keeps log lines easy to follow.
pub fn generate_request_id() -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!(
        "{}_{}",
        Utc::now().timestamp_millis(),
        &suffix[..SUFFIX_LEN]
    )
}
