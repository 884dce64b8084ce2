use rand::{rngs::OsRng, RngCore};
use time::{Duration, OffsetDateTime};

/// Single-use password-reset token: 20 bytes (160 bits) from the OS RNG,
/// hex-encoded so it survives a URL path segment unescaped.
pub fn generate_reset_token() -> String {
    let mut bytes = [0u8; 20];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Expiry for a token issued now. A token is accepted strictly before this
/// instant, never at or after it.
pub fn token_expiry(ttl_minutes: i64) -> OffsetDateTime {
    OffsetDateTime::now_utc() + Duration::minutes(ttl_minutes)
}
