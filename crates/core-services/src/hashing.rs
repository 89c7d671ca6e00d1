//! Password hashing and strength validation (C1).
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};

/// Argon2id parameters per OWASP 2024 password storage recommendations.
const ARGON2_M_COST: u32 = 65536; // 64 MiB
const ARGON2_T_COST: u32 = 3;
const ARGON2_P_COST: u32 = 4;

/// Hashes `password` with Argon2id, embedding the parameters in the PHC string so a future
/// parameter change doesn't break verification of existing hashes.
///
/// Blocking (~200-300ms); call through `tokio::task::spawn_blocking` from async contexts.
pub fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);

    let params = Params::new(ARGON2_M_COST, ARGON2_T_COST, ARGON2_P_COST, None)
        .map_err(|e| anyhow::anyhow!("failed to configure argon2 params: {e}"))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("failed to hash password: {e}"))?;

    Ok(password_hash.to_string())
}

/// Constant-time verification against a PHC-formatted hash.
pub fn verify_password(password: &str, hash: &str) -> anyhow::Result<bool> {
    let parsed_hash =
        PasswordHash::new(hash).map_err(|e| anyhow::anyhow!("invalid hash format: {e}"))?;
    let argon2 = Argon2::default();
    Ok(argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// Enforces the explicit character-class rule: at least 8 characters, with at least one
/// lowercase letter, one uppercase letter, one digit, and one punctuation-or-space character.
pub fn validate_password_strength(password: &str) -> Result<(), String> {
    if password.chars().count() < 8 {
        return Err("password must be at least 8 characters".to_string());
    }
    let has_lower = password.chars().any(|c| c.is_ascii_lowercase());
    let has_upper = password.chars().any(|c| c.is_ascii_uppercase());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    let has_punct_or_space = password
        .chars()
        .any(|c| c.is_ascii_punctuation() || c == ' ');

    if !(has_lower && has_upper && has_digit && has_punct_or_space) {
        return Err(
            "password must contain a lowercase letter, an uppercase letter, a digit, and punctuation or a space"
                .to_string(),
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_argon2id_hash_format() {
        let hash = hash_password("TestPassword123!").expect("hash failed");
        assert!(hash.starts_with("$argon2id$v=19$"));
        assert!(hash.contains(&format!("m={}", ARGON2_M_COST)));
        assert!(hash.contains(&format!("t={}", ARGON2_T_COST)));
        assert!(hash.contains(&format!("p={}", ARGON2_P_COST)));
    }

    #[test]
    fn test_password_verification_roundtrip() {
        let hash = hash_password("Correct_P@ssw0rd_123").expect("hash failed");
        assert!(verify_password("Correct_P@ssw0rd_123", &hash).unwrap());
        assert!(!verify_password("Wrong_P@ssw0rd_456", &hash).unwrap());
    }

    #[test]
    fn test_hash_uniqueness() {
        let hash1 = hash_password("SamePassword123!").unwrap();
        let hash2 = hash_password("SamePassword123!").unwrap();
        assert_ne!(hash1, hash2);
    }

    #[test]
    fn test_invalid_hash_format() {
        assert!(verify_password("password", "invalid_hash_format").is_err());
    }

    #[test]
    fn test_password_strength_validation() {
        assert!(validate_password_strength("abc123").is_err());
        assert!(validate_password_strength("alllowercase1!").is_err());
        assert!(validate_password_strength("ALLUPPERCASE1!").is_err());
        assert!(validate_password_strength("NoDigitsHere!").is_err());
        assert!(validate_password_strength("NoPunctOrSpace1").is_err());

        assert!(validate_password_strength("Str0ng!Pass").is_ok());
        assert!(validate_password_strength("N3wPa$$word").is_ok());
        assert!(validate_password_strength("Has Space1A").is_ok());
    }
}
