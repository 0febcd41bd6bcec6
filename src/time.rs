use std::time::{SystemTime, UNIX_EPOCH};

/// Current unix timestamp in seconds.
///
/// Announce entries, block headers and registration frames are all
/// second-granular.
pub fn create_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs()
}
