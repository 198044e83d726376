use sha2::{Digest, Sha256};

/// Deterministic smoothing offset for an over-dense effective-date send.
///
/// Hashes the ASCII text `<contact_id>_<email_type>_<event_year>` with
/// SHA-256, takes the first 16 bytes as a big-endian integer, and maps it
/// into `[-2, window_days - 3]` (so the default 5-day window yields
/// `[-2, +2]`). Stable across runs and platforms.
#[must_use]
pub fn smoothing_offset_days(
    contact_id: i64,
    email_type: &str,
    event_year: i32,
    window_days: i64,
) -> i64 {
    let Ok(window) = u128::try_from(window_days) else {
        return 0;
    };
    if window == 0 {
        return 0;
    }

    let digest = Sha256::digest(format!("{contact_id}_{email_type}_{event_year}").as_bytes());
    let mut prefix = [0u8; 16];
    prefix.copy_from_slice(&digest[..16]);
    let value = u128::from_be_bytes(prefix);

    i64::try_from(value % window).unwrap_or(0) - 2
}
