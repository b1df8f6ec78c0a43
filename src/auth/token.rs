use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::{Duration, OffsetDateTime};

use crate::config::AuthConfig;
use crate::db::UserRole;

use super::session::Session;

/// Claims carried by an access token. They hold everything the
/// authorization policy needs, so requests are authorized without a
/// database round trip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Username.
    pub sub: String,
    pub user_id: i64,
    pub role: UserRole,
    pub company_id: Option<i64>,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token could not be signed: {0}")]
    Signing(#[source] jsonwebtoken::errors::Error),
    #[error("token rejected: {0}")]
    Invalid(#[source] jsonwebtoken::errors::Error),
}

#[derive(Debug, Clone, Serialize)]
pub struct SignedToken {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
}

/// Issues and verifies HS256 access tokens.
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    lifetime: Duration,
}

impl TokenService {
    pub fn new(secret: &[u8], lifetime: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            lifetime,
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(
            config.secret_key.expose_secret().as_bytes(),
            Duration::minutes(config.access_token_expire_minutes),
        )
    }

    pub fn issue(&self, session: &Session) -> Result<SignedToken, TokenError> {
        let claims = Claims {
            sub: session.username.clone(),
            user_id: session.user_id,
            role: session.role,
            company_id: session.company_id,
            iat: 0,
            exp: 0,
        };
        self.sign(claims)
    }

    /// Re-issue the same identity claims with a fresh expiry window.
    pub fn refresh(&self, claims: &Claims) -> Result<SignedToken, TokenError> {
        self.sign(claims.clone())
    }

    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(TokenError::Invalid)
    }

    fn sign(&self, mut claims: Claims) -> Result<SignedToken, TokenError> {
        let now = OffsetDateTime::now_utc();
        claims.iat = now.unix_timestamp();
        claims.exp = (now + self.lifetime).unix_timestamp();

        let access_token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(TokenError::Signing)?;

        Ok(SignedToken {
            access_token,
            token_type: "bearer",
            expires_in: self.lifetime.whole_seconds(),
        })
    }
}
