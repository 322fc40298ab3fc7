//! General utilities.

use std::time::{SystemTime, UNIX_EPOCH};

/// Current Unix timestamp in seconds, respecting `SOURCE_DATE_EPOCH`.
///
/// Cache expiry is computed from this value so tests can pin the clock by
/// setting `SOURCE_DATE_EPOCH` on the spawned binary.
pub fn get_now() -> u64 {
    std::env::var("SOURCE_DATE_EPOCH")
        .ok()
        .and_then(|val| val.parse::<u64>().ok())
        .unwrap_or_else(|| {
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0)
        })
}

/// Lowercase hex SHA-256 digest of `data`.
pub fn sha256_hex(data: impl AsRef<[u8]>) -> String {
    use sha2::{Digest, Sha256};
    use std::fmt::Write;

    let digest = Sha256::digest(data.as_ref());
    digest.iter().fold(String::with_capacity(64), |mut out, b| {
        let _ = write!(out, "{b:02x}");
        out
    })
}
