//! Token signer (C2): HS256 signing/verification of access and refresh credentials.
use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use domain::models::{AccessClaims, RefreshClaims};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};

#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtService {
    /// `signing_key` must be at least 32 bytes; the caller validates this at config load time.
    pub fn new(signing_key: &[u8]) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(signing_key),
            decoding_key: DecodingKey::from_secret(signing_key),
        }
    }

    pub fn generate_access_token(
        &self,
        mut claims: AccessClaims,
        lifetime: Duration,
    ) -> Result<String> {
        let now = Utc::now();
        claims.iat = now.timestamp();
        claims.exp = (now + lifetime).timestamp();

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .context("failed to sign access token")
    }

    pub fn verify_access_token(&self, token: &str) -> Result<AccessClaims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 5;

        decode::<AccessClaims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .context("access token invalid or expired")
    }

    pub fn generate_refresh_token(
        &self,
        refresh_id: i64,
        refresh_token_string: &str,
        lifetime: Duration,
    ) -> Result<String> {
        let now = Utc::now();
        let claims = RefreshClaims {
            refresh_id,
            refresh_token_string: refresh_token_string.to_string(),
            iat: now.timestamp(),
            exp: (now + lifetime).timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .context("failed to sign refresh token")
    }

    pub fn verify_refresh_token(&self, token: &str) -> Result<RefreshClaims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 5;

        decode::<RefreshClaims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .context("refresh token invalid or expired")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> JwtService {
        JwtService::new(b"0123456789abcdef0123456789abcdef")
    }

    fn sample_access_claims() -> AccessClaims {
        AccessClaims {
            account_id: 1,
            sub: "alice@example.com".to_string(),
            username: Some("alice".to_string()),
            first_name: "Alice".to_string(),
            last_name: "Doe".to_string(),
            roles: vec!["teacher".to_string()],
            permissions: vec!["sites:read".to_string()],
            is_admin: false,
            is_teacher: true,
            iat: 0,
            exp: 0,
        }
    }

    #[test]
    fn round_trips_access_claims() {
        let svc = service();
        let token = svc
            .generate_access_token(sample_access_claims(), Duration::minutes(15))
            .unwrap();
        let claims = svc.verify_access_token(&token).unwrap();
        assert_eq!(claims.account_id, 1);
        assert_eq!(claims.sub, "alice@example.com");
    }

    #[test]
    fn rejects_tampered_token() {
        let svc = service();
        let token = svc
            .generate_access_token(sample_access_claims(), Duration::minutes(15))
            .unwrap();
        let mut tampered = token.clone();
        tampered.push('x');
        assert!(svc.verify_access_token(&tampered).is_err());
    }

    #[test]
    fn rejects_token_signed_with_different_key() {
        let svc_a = service();
        let svc_b = JwtService::new(b"ffffffffffffffffffffffffffffffff");
        let token = svc_a
            .generate_access_token(sample_access_claims(), Duration::minutes(15))
            .unwrap();
        assert!(svc_b.verify_access_token(&token).is_err());
    }

    #[test]
    fn rejects_expired_token() {
        let svc = service();
        let token = svc
            .generate_access_token(sample_access_claims(), Duration::seconds(-60))
            .unwrap();
        assert!(svc.verify_access_token(&token).is_err());
    }

    #[test]
    fn round_trips_refresh_claims() {
        let svc = service();
        let token = svc
            .generate_refresh_token(42, "opaque-refresh-string", Duration::hours(24))
            .unwrap();
        let claims = svc.verify_refresh_token(&token).unwrap();
        assert_eq!(claims.refresh_id, 42);
        assert_eq!(claims.refresh_token_string, "opaque-refresh-string");
    }
}
