//! Token issuer: signed access and challenge tokens, opaque refresh tokens.
//!
//! Access and challenge tokens are HS256 JWTs signed with a symmetric key
//! known only to this service; issuer, audience and expiry are all enforced
//! on validation with zero clock leeway. Refresh tokens carry no claims at
//! all - they are 64 bytes of OS randomness acting as a lookup key into the
//! session ledger.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::JwtConfig;
use crate::models::Account;
use crate::services::error::ServiceError;

const CHALLENGE_PURPOSE: &str = "2fa";

/// Claims for access tokens (short-lived).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Subject (account ID)
    pub sub: String,
    pub email: String,
    pub username: String,
    pub account_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<String>,
    /// One entry per assigned role.
    #[serde(default)]
    pub roles: Vec<String>,
    pub iss: String,
    pub aud: String,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// JWT ID
    pub jti: String,
}

impl AccessClaims {
    pub fn account_id(&self) -> Result<Uuid, ServiceError> {
        Uuid::parse_str(&self.sub)
            .map_err(|_| ServiceError::Internal(anyhow::anyhow!("malformed subject claim")))
    }
}

/// Claims for two-factor challenge tokens (10 minutes).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChallengeClaims {
    pub sub: String,
    pub purpose: String,
    pub iss: String,
    pub aud: String,
    pub exp: i64,
    pub iat: i64,
}

#[derive(Clone)]
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    audience: String,
    access_token_expiry_minutes: i64,
    challenge_token_expiry_minutes: i64,
}

impl TokenIssuer {
    pub fn new(config: &JwtConfig) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            issuer: config.issuer.clone(),
            audience: config.audience.clone(),
            access_token_expiry_minutes: config.access_token_expiry_minutes,
            challenge_token_expiry_minutes: config.challenge_token_expiry_minutes,
        }
    }

    /// Generate an access token embedding identity and role claims.
    /// Returns the token together with its expiry instant.
    pub fn issue_access_token(
        &self,
        account: &Account,
        roles: &[String],
    ) -> Result<(String, DateTime<Utc>), ServiceError> {
        let now = Utc::now();
        let expires_at = now + Duration::minutes(self.access_token_expiry_minutes);

        let claims = AccessClaims {
            sub: account.account_id.to_string(),
            email: account.email.clone(),
            username: account.username.clone(),
            account_type: account.account_type_code.clone(),
            organization_id: account.organization_id.map(|id| id.to_string()),
            roles: roles.to_vec(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            exp: expires_at.timestamp(),
            iat: now.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| ServiceError::Internal(anyhow::anyhow!("token encoding: {e}")))?;

        Ok((token, expires_at))
    }

    /// Generate an opaque refresh token: 64 bytes of CSPRNG output, base64.
    pub fn issue_refresh_token(&self) -> String {
        let mut bytes = [0u8; 64];
        OsRng.fill_bytes(&mut bytes);
        BASE64.encode(bytes)
    }

    /// Generate a challenge token proving the first factor succeeded.
    pub fn issue_challenge_token(&self, account_id: Uuid) -> Result<String, ServiceError> {
        let now = Utc::now();
        let claims = ChallengeClaims {
            sub: account_id.to_string(),
            purpose: CHALLENGE_PURPOSE.to_string(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            exp: (now + Duration::minutes(self.challenge_token_expiry_minutes)).timestamp(),
            iat: now.timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| ServiceError::Internal(anyhow::anyhow!("token encoding: {e}")))
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.audience]);
        validation.leeway = 0;
        validation
    }

    /// Validate and decode an access token. Any failure - signature, issuer,
    /// audience, expiry, shape - comes back as an error value.
    pub fn validate_access(&self, token: &str) -> Result<AccessClaims, jsonwebtoken::errors::Error> {
        let data = decode::<AccessClaims>(token, &self.decoding_key, &self.validation())?;
        Ok(data.claims)
    }

    /// Validate and decode a challenge token, including its purpose claim.
    pub fn validate_challenge(&self, token: &str) -> Result<ChallengeClaims, ServiceError> {
        let data = decode::<ChallengeClaims>(token, &self.decoding_key, &self.validation())
            .map_err(|_| ServiceError::InvalidChallenge)?;

        if data.claims.purpose != CHALLENGE_PURPOSE {
            return Err(ServiceError::InvalidChallenge);
        }

        Ok(data.claims)
    }

    pub fn access_token_expiry_minutes(&self) -> i64 {
        self.access_token_expiry_minutes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_issuer() -> TokenIssuer {
        TokenIssuer::new(&JwtConfig {
            secret: "unit-test-signing-key-0123456789abcdef".to_string(),
            issuer: "identity-service".to_string(),
            audience: "identity-clients".to_string(),
            access_token_expiry_minutes: 60,
            challenge_token_expiry_minutes: 10,
            refresh_token_expiry_days: 7,
        })
    }

    fn test_account() -> Account {
        Account::new(
            "test@example.com".to_string(),
            "test".to_string(),
            Some("hash".to_string()),
        )
    }

    #[test]
    fn access_token_roundtrip() {
        let issuer = test_issuer();
        let account = test_account();

        let (token, expires_at) = issuer
            .issue_access_token(&account, &["Admin".to_string()])
            .expect("issue");
        assert!(expires_at > Utc::now());

        let claims = issuer.validate_access(&token).expect("validate");
        assert_eq!(claims.sub, account.account_id.to_string());
        assert_eq!(claims.email, "test@example.com");
        assert_eq!(claims.account_type, "individual");
        assert_eq!(claims.roles, vec!["Admin".to_string()]);
        assert_eq!(claims.account_id().unwrap(), account.account_id);
    }

    #[test]
    fn refresh_tokens_are_opaque_and_unique() {
        let issuer = test_issuer();
        let a = issuer.issue_refresh_token();
        let b = issuer.issue_refresh_token();
        assert_ne!(a, b);
        // 64 bytes of randomness, not a JWT.
        assert!(!a.contains('.'));
        assert_eq!(BASE64.decode(&a).unwrap().len(), 64);
    }

    #[test]
    fn challenge_token_roundtrip() {
        let issuer = test_issuer();
        let account_id = Uuid::new_v4();

        let token = issuer.issue_challenge_token(account_id).expect("issue");
        let claims = issuer.validate_challenge(&token).expect("validate");
        assert_eq!(claims.sub, account_id.to_string());
        assert_eq!(claims.purpose, "2fa");
    }

    #[test]
    fn access_token_is_not_a_valid_challenge() {
        let issuer = test_issuer();
        let (token, _) = issuer.issue_access_token(&test_account(), &[]).unwrap();

        assert!(matches!(
            issuer.validate_challenge(&token),
            Err(ServiceError::InvalidChallenge)
        ));
    }

    #[test]
    fn challenge_token_is_not_a_valid_access_token() {
        let issuer = test_issuer();
        let token = issuer.issue_challenge_token(Uuid::new_v4()).unwrap();

        assert!(issuer.validate_access(&token).is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        let issuer = test_issuer();
        let now = Utc::now();
        let claims = ChallengeClaims {
            sub: Uuid::new_v4().to_string(),
            purpose: "2fa".to_string(),
            iss: "identity-service".to_string(),
            aud: "identity-clients".to_string(),
            exp: (now - Duration::minutes(1)).timestamp(),
            iat: (now - Duration::minutes(11)).timestamp(),
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret("unit-test-signing-key-0123456789abcdef".as_bytes()),
        )
        .unwrap();

        assert!(matches!(
            issuer.validate_challenge(&token),
            Err(ServiceError::InvalidChallenge)
        ));
    }

    #[test]
    fn foreign_issuer_is_rejected() {
        let issuer = test_issuer();
        let other = TokenIssuer::new(&JwtConfig {
            secret: "unit-test-signing-key-0123456789abcdef".to_string(),
            issuer: "someone-else".to_string(),
            audience: "identity-clients".to_string(),
            access_token_expiry_minutes: 60,
            challenge_token_expiry_minutes: 10,
            refresh_token_expiry_days: 7,
        });

        let token = other.issue_challenge_token(Uuid::new_v4()).unwrap();
        assert!(issuer.validate_challenge(&token).is_err());
    }

    #[test]
    fn tampered_signature_is_rejected() {
        let issuer = test_issuer();
        let other = TokenIssuer::new(&JwtConfig {
            secret: "a-completely-different-signing-key!!".to_string(),
            issuer: "identity-service".to_string(),
            audience: "identity-clients".to_string(),
            access_token_expiry_minutes: 60,
            challenge_token_expiry_minutes: 10,
            refresh_token_expiry_days: 7,
        });

        let token = other.issue_challenge_token(Uuid::new_v4()).unwrap();
        assert!(issuer.validate_challenge(&token).is_err());
    }
}
