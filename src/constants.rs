use std::time::Duration;

/// Upper bound on the age of an accepted peer announcement, seconds
pub const ANNOUNCE_EXPIRY: u64 = 60 * 60;

/// Minimum interval between accepted updates for the same peer key, seconds
pub const ANNOUNCE_REBROADCAST: u64 = 30 * 60;

/// Lookback window when requesting historical payment transactions, seconds
pub const RESERVOIR_TIMEOUT: u64 = 45 * 60;

/// Interval between latest-block sweeps of the payment handlers
pub const BLOCKCHAIN_CHECK_INTERVAL: Duration = Duration::from_secs(60);

/// Timestamp regression tolerated for version 1 block headers, seconds
pub const VERSION_1_TIMESTAMP_TOLERANCE: u64 = 240 * 60;

/// Timestamp regression tolerated for version 2 block headers, seconds
pub const VERSION_2_TIMESTAMP_TOLERANCE: u64 = 10 * 60;
