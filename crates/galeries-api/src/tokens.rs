use anyhow::{Result, bail};
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use uuid::Uuid;

use galeries_db::models::UserRow;
use galeries_types::api::{Claims, NotificationClaims, RefreshClaims, TokenKind};

/// Lifetime of a bearer token.
pub const ACCESS_TOKEN_MINUTES: i64 = 15;
/// Lifetime of the refresh cookie.
pub const REFRESH_TOKEN_DAYS: i64 = 7;

const NOTIFICATION_ISSUER: &str = "galeries";

/// Signing material for every token the server issues.
///
/// Production uses an RS256 key pair; HS256 with a shared secret exists for
/// local development and tests.
pub struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    algorithm: Algorithm,
}

impl TokenKeys {
    pub fn from_rsa_pem(private_pem: &[u8], public_pem: &[u8]) -> Result<Self> {
        Ok(Self {
            encoding: EncodingKey::from_rsa_pem(private_pem)?,
            decoding: DecodingKey::from_rsa_pem(public_pem)?,
            algorithm: Algorithm::RS256,
        })
    }

    pub fn from_secret(secret: &[u8]) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            algorithm: Algorithm::HS256,
        }
    }

    pub fn issue_access(&self, user: &UserRow) -> Result<String> {
        let claims = Claims {
            sub: user.id.parse::<Uuid>()?,
            user_name: user.user_name.clone(),
            typ: TokenKind::Access,
            exp: (Utc::now() + Duration::minutes(ACCESS_TOKEN_MINUTES)).timestamp() as usize,
        };
        Ok(encode(&Header::new(self.algorithm), &claims, &self.encoding)?)
    }

    pub fn issue_refresh(&self, user: &UserRow) -> Result<String> {
        let claims = RefreshClaims {
            sub: user.id.parse::<Uuid>()?,
            ver: user.auth_token_version,
            typ: TokenKind::Refresh,
            exp: (Utc::now() + Duration::days(REFRESH_TOKEN_DAYS)).timestamp() as usize,
        };
        Ok(encode(&Header::new(self.algorithm), &claims, &self.encoding)?)
    }

    /// Token for trusted services posting to `POST /notifications`.
    pub fn issue_notification(&self) -> Result<String> {
        let claims = NotificationClaims {
            iss: NOTIFICATION_ISSUER.to_string(),
            typ: TokenKind::Notification,
        };
        Ok(encode(&Header::new(self.algorithm), &claims, &self.encoding)?)
    }

    pub fn verify_access(&self, token: &str) -> Result<Claims> {
        let claims = decode::<Claims>(token, &self.decoding, &Validation::new(self.algorithm))?.claims;
        if claims.typ != TokenKind::Access {
            bail!("not an access token");
        }
        Ok(claims)
    }

    pub fn verify_refresh(&self, token: &str) -> Result<RefreshClaims> {
        let claims = decode::<RefreshClaims>(token, &self.decoding, &Validation::new(self.algorithm))?.claims;
        if claims.typ != TokenKind::Refresh {
            bail!("not a refresh token");
        }
        Ok(claims)
    }

    pub fn verify_notification(&self, token: &str) -> Result<NotificationClaims> {
        let mut validation = Validation::new(self.algorithm);
        validation.validate_exp = false;
        validation.required_spec_claims.clear();
        validation.set_issuer(&[NOTIFICATION_ISSUER]);

        let claims = decode::<NotificationClaims>(token, &self.decoding, &validation)?.claims;
        if claims.typ != TokenKind::Notification {
            bail!("not a notification token");
        }
        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use galeries_types::models::Role;

    fn row() -> UserRow {
        UserRow {
            id: Uuid::new_v4().to_string(),
            user_name: "alice".to_string(),
            pseudonym: "Alice".to_string(),
            email: "alice@galeries.test".to_string(),
            password: "hash".to_string(),
            role: Role::User,
            is_black_listed: false,
            has_new_notifications: false,
            auth_token_version: 3,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn access_token_roundtrip() {
        let keys = TokenKeys::from_secret(b"test-secret");
        let user = row();

        let token = keys.issue_access(&user).unwrap();
        let claims = keys.verify_access(&token).unwrap();
        assert_eq!(claims.sub.to_string(), user.id);
        assert_eq!(claims.user_name, "alice");
    }

    #[test]
    fn token_kinds_do_not_mix() {
        let keys = TokenKeys::from_secret(b"test-secret");
        let user = row();

        let refresh = keys.issue_refresh(&user).unwrap();
        assert!(keys.verify_access(&refresh).is_err());
        assert_eq!(keys.verify_refresh(&refresh).unwrap().ver, 3);

        let notification = keys.issue_notification().unwrap();
        assert!(keys.verify_access(&notification).is_err());
        assert!(keys.verify_notification(&notification).is_ok());
    }

    #[test]
    fn foreign_key_is_rejected() {
        let ours = TokenKeys::from_secret(b"ours");
        let theirs = TokenKeys::from_secret(b"theirs");

        let token = theirs.issue_notification().unwrap();
        assert!(ours.verify_notification(&token).is_err());
    }
}
