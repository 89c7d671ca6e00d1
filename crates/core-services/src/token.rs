//! Opaque token and family-id generation shared by refresh, reset, and invitation tokens.
use rand::{rngs::OsRng, RngCore};

const OPAQUE_TOKEN_BYTES: usize = 32;

/// Generates a cryptographically secure opaque token, hex-encoded.
pub fn generate_opaque_token() -> String {
    let mut bytes = [0u8; OPAQUE_TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Generates a fresh, application-assigned family id for a new refresh-token lineage.
///
/// Family ids are random rather than sequential: many rows across a family's generations
/// share one, so it cannot double as a primary key.
pub fn generate_family_id() -> i64 {
    let mut bytes = [0u8; 8];
    OsRng.fill_bytes(&mut bytes);
    // Clear the sign bit so this is always a positive i64 regardless of column type.
    i64::from_le_bytes(bytes) & i64::MAX
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opaque_tokens_are_unique_and_hex() {
        let a = generate_opaque_token();
        let b = generate_opaque_token();
        assert_ne!(a, b);
        assert_eq!(a.len(), OPAQUE_TOKEN_BYTES * 2);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn family_ids_are_non_negative_and_vary() {
        let a = generate_family_id();
        let b = generate_family_id();
        assert!(a >= 0);
        assert!(b >= 0);
        assert_ne!(a, b);
    }
}
