use crate::error::AppError;
use jsonwebtoken::{decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// Represents the claims encoded within a bearer token.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject of the token: the user's unique identifier.
    pub sub: i32,
    /// Expiration timestamp (seconds since epoch) for the token.
    pub exp: usize,
}

/// Why a token was rejected. Verification distinguishes a structurally or
/// cryptographically bad token from one that was valid but has expired;
/// both surface to clients as the same 401.
#[derive(Debug, PartialEq, Eq)]
pub enum TokenError {
    /// Signature mismatch or malformed input.
    Invalid,
    /// Valid signature, expiry in the past.
    Expired,
}

impl From<TokenError> for AppError {
    fn from(error: TokenError) -> AppError {
        match error {
            TokenError::Invalid => AppError::Unauthorized("invalid token".into()),
            TokenError::Expired => AppError::Unauthorized("expired token".into()),
        }
    }
}

/// Issues and verifies signed, time-bounded identity assertions.
///
/// Constructed once at startup from the configured signing secret and token
/// TTL, then injected into the server (no environment reads on request
/// paths). Issued tokens are never revoked early; they remain valid until
/// their embedded expiry regardless of subsequent account changes.
#[derive(Clone)]
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl_minutes: i64,
}

impl TokenIssuer {
    pub fn new(secret: &str, ttl_minutes: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            ttl_minutes,
        }
    }

    /// Generates a token for a given user ID, expiring after the
    /// configured TTL.
    pub fn issue(&self, user_id: i32) -> Result<String, AppError> {
        self.issue_with_ttl(user_id, self.ttl_minutes)
    }

    /// Generates a token with an explicit TTL in minutes. A TTL of zero
    /// produces a token that is already at its expiry instant.
    pub fn issue_with_ttl(&self, user_id: i32, ttl_minutes: i64) -> Result<String, AppError> {
        let expiration = chrono::Utc::now()
            .checked_add_signed(chrono::Duration::minutes(ttl_minutes))
            .expect("valid timestamp")
            .timestamp() as usize;

        let claims = Claims {
            sub: user_id,
            exp: expiration,
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| AppError::InternalServerError(format!("Failed to generate token: {}", e)))
    }

    /// Verifies a token string and decodes its claims.
    ///
    /// Signature comparison is performed by the underlying library on the
    /// recomputed MAC, so malformed and forged inputs are rejected without
    /// offering a byte-by-byte oracle. Expiry is validated with zero
    /// leeway: a token whose expiry second has passed fails `Expired`.
    ///
    /// # Returns
    /// The decoded `Claims` if the token is valid.
    /// `TokenError::Expired` for a well-formed, correctly signed token past
    /// its expiry; `TokenError::Invalid` for everything else.
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let mut validation = Validation::default();
        validation.leeway = 0;

        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    fn issuer() -> TokenIssuer {
        TokenIssuer::new("test_secret_for_gen_verify", 30)
    }

    #[test]
    fn test_token_generation_and_verification() {
        let user_id = 1;
        let token = issuer().issue(user_id).unwrap();
        let claims = issuer().verify(&token).unwrap();
        assert_eq!(claims.sub, user_id);
    }

    #[test]
    fn test_expired_token_fails_expired_not_invalid() {
        let token = issuer().issue_with_ttl(2, -120).unwrap();

        match issuer().verify(&token) {
            Err(TokenError::Expired) => {}
            Ok(_) => panic!("Token should have been rejected due to expiration"),
            Err(e) => panic!("Unexpected error kind for expired token: {:?}", e),
        }
    }

    #[test]
    fn test_zero_ttl_token_expires_immediately() {
        // exp == now at issue time; one second later the token must be
        // past its expiry. Zero leeway makes this deterministic.
        let token = issuer().issue_with_ttl(3, 0).unwrap();
        thread::sleep(Duration::from_millis(1100));

        assert_eq!(issuer().verify(&token).unwrap_err(), TokenError::Expired);
    }

    #[test]
    fn test_invalid_token_signature() {
        let other = TokenIssuer::new("a_completely_different_secret", 30);
        let token = issuer().issue(4).unwrap();

        assert_eq!(other.verify(&token).unwrap_err(), TokenError::Invalid);
    }

    #[test]
    fn test_malformed_token_fails_invalid() {
        assert_eq!(issuer().verify("not-a-token").unwrap_err(), TokenError::Invalid);
        assert_eq!(issuer().verify("").unwrap_err(), TokenError::Invalid);
    }
}
