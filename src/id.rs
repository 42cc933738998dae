//! ID generation for items, contributions and activity records.

use chrono::{DateTime, Utc};
use rand::Rng;
use sha2::{Digest, Sha256};

/// Prefix for item ids.
pub const ITEM_PREFIX: &str = "it";

/// Prefix for embedded contribution ids.
pub const CONTRIBUTION_PREFIX: &str = "ct";

/// Prefix for activity ledger ids.
pub const ACTIVITY_PREFIX: &str = "ac";

/// Generate a unique ID from content + entropy.
/// Format: prefix + "-" + 10 hex chars of SHA256(seed + timestamp + random)
pub fn generate_id(prefix: &str, seed: &str, created_at: DateTime<Utc>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(seed.as_bytes());
    hasher.update(created_at.timestamp_nanos_opt().unwrap_or(0).to_le_bytes());
    // Add 8 bytes of randomness to prevent collisions
    hasher.update(rand::rng().random::<[u8; 8]>());
    let hash = hasher.finalize();
    // 10 hex chars = 40 bits = ~1 trillion values
    format!(
        "{}-{:010x}",
        prefix,
        u64::from_be_bytes([hash[0], hash[1], hash[2], hash[3], hash[4], 0, 0, 0]) >> 24
    )
}
