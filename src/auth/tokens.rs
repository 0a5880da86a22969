use base64::prelude::{Engine, BASE64_STANDARD};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use tracing::debug;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::config::{AppConfig, TokenConfig};
use crate::users::model::User;

/// Registered claims carried by both access and refresh tokens.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub iss: String,
    pub sub: String,
    pub aud: String,
    pub iat: i64,
    pub nbf: i64,
    pub exp: i64,
}

/// RS256 key pair for one token kind, built from base64-encoded PEM config.
pub struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    pub max_age_minutes: i64,
}

impl TokenKeys {
    pub fn from_config(cfg: &TokenConfig) -> anyhow::Result<Self> {
        let private_pem = BASE64_STANDARD
            .decode(&cfg.private_key)
            .map_err(|e| anyhow::anyhow!("could not decode private key: {e}"))?;
        let public_pem = BASE64_STANDARD
            .decode(&cfg.public_key)
            .map_err(|e| anyhow::anyhow!("could not decode public key: {e}"))?;
        Ok(Self {
            encoding: EncodingKey::from_rsa_pem(&private_pem)?,
            decoding: DecodingKey::from_rsa_pem(&public_pem)?,
            max_age_minutes: cfg.max_age_minutes,
        })
    }

    /// Issue instant is a parameter so expiry behaviour stays testable
    /// and paired tokens share one clock reading.
    fn sign_at(
        &self,
        at: OffsetDateTime,
        issuer: &str,
        user_id: Uuid,
        email: &str,
    ) -> anyhow::Result<String> {
        let exp = at + Duration::minutes(self.max_age_minutes);
        let claims = Claims {
            iss: issuer.to_string(),
            sub: user_id.to_string(),
            aud: email.to_string(),
            iat: at.unix_timestamp(),
            nbf: at.unix_timestamp(),
            exp: exp.unix_timestamp(),
        };
        let token = encode(&Header::new(Algorithm::RS256), &claims, &self.encoding)?;
        debug!(user_id = %user_id, "token signed");
        Ok(token)
    }

    /// Verifies signature, issuer and expiry; returns the subject user id.
    /// Audience is per-user and not pinned here.
    pub fn verify(&self, issuer: &str, token: &str) -> anyhow::Result<Uuid> {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(std::slice::from_ref(&issuer));
        validation.validate_aud = false;
        let data = decode::<Claims>(token, &self.decoding, &validation)?;
        let user_id = Uuid::parse_str(&data.claims.sub)
            .map_err(|_| anyhow::anyhow!("cannot get user id from token"))?;
        debug!(user_id = %user_id, "token verified");
        Ok(user_id)
    }
}

/// Access and refresh key pairs, built once at startup.
pub struct AuthKeys {
    pub access: TokenKeys,
    pub refresh: TokenKeys,
}

impl AuthKeys {
    pub fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        Ok(Self {
            access: TokenKeys::from_config(&config.access_token)?,
            refresh: TokenKeys::from_config(&config.refresh_token)?,
        })
    }
}

/// Token pair returned to the client, never persisted.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TokenPair {
    pub access_token: String,
    pub expires_in: i64,
    pub expires_at: i64,
    pub token_type: String,
    pub refresh_token: String,
    pub refresh_expires_in: i64,
    pub refresh_expires_at: i64,
}

pub fn issue_pair(keys: &AuthKeys, issuer: &str, user: &User) -> anyhow::Result<TokenPair> {
    // One issue instant for both tokens and the reported expiry fields,
    // so `expires_at` always equals the `exp` claim inside the token.
    let now = OffsetDateTime::now_utc();

    let access_token = keys.access.sign_at(now, issuer, user.id, &user.email)?;
    let expires_in = keys.access.max_age_minutes * 60;
    let expires_at = (now + Duration::minutes(keys.access.max_age_minutes)).unix_timestamp();

    let refresh_token = keys.refresh.sign_at(now, issuer, user.id, &user.email)?;
    let refresh_expires_in = keys.refresh.max_age_minutes * 60;
    let refresh_expires_at =
        (now + Duration::minutes(keys.refresh.max_age_minutes)).unix_timestamp();

    Ok(TokenPair {
        access_token,
        expires_in,
        expires_at,
        token_type: "Bearer".to_string(),
        refresh_token,
        refresh_expires_in,
        refresh_expires_at,
    })
}

/// Random one-time token for email verification and password reset links.
pub fn generate_one_time_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;
    use time::Duration;

    fn make_keys() -> AuthKeys {
        AuthKeys::from_config(&testing::test_config()).expect("fixture keys parse")
    }

    #[test]
    fn sign_and_verify_roundtrip() {
        let keys = make_keys();
        let user_id = Uuid::new_v4();
        let token = keys
            .access
            .sign_at(
                OffsetDateTime::now_utc(),
                "gatekit-test",
                user_id,
                "user@example.com",
            )
            .expect("sign");
        let subject = keys.access.verify("gatekit-test", &token).expect("verify");
        assert_eq!(subject, user_id);
    }

    #[test]
    fn verify_rejects_expired_token() {
        let keys = make_keys();
        let issued = OffsetDateTime::now_utc() - Duration::hours(2);
        let token = keys
            .access
            .sign_at(issued, "gatekit-test", Uuid::new_v4(), "user@example.com")
            .expect("sign in the past");
        assert!(keys.access.verify("gatekit-test", &token).is_err());
    }

    #[test]
    fn verify_rejects_wrong_key() {
        let keys = make_keys();
        let token = keys
            .access
            .sign_at(
                OffsetDateTime::now_utc(),
                "gatekit-test",
                Uuid::new_v4(),
                "user@example.com",
            )
            .expect("sign");
        // Refresh pair uses a different RSA key, so access tokens must not verify.
        assert!(keys.refresh.verify("gatekit-test", &token).is_err());
    }

    #[test]
    fn verify_rejects_wrong_issuer() {
        let keys = make_keys();
        let token = keys
            .access
            .sign_at(
                OffsetDateTime::now_utc(),
                "someone-else",
                Uuid::new_v4(),
                "user@example.com",
            )
            .expect("sign");
        assert!(keys.access.verify("gatekit-test", &token).is_err());
    }

    #[test]
    fn verify_rejects_garbage() {
        let keys = make_keys();
        assert!(keys.access.verify("gatekit-test", "not.a.jwt").is_err());
    }

    #[test]
    fn issue_pair_fills_bearer_fields() {
        let keys = make_keys();
        let user = testing::test_user();
        let pair = issue_pair(&keys, "gatekit-test", &user).expect("issue pair");
        assert_eq!(pair.token_type, "Bearer");
        assert_eq!(pair.expires_in, keys.access.max_age_minutes * 60);
        assert_eq!(pair.refresh_expires_in, keys.refresh.max_age_minutes * 60);
        assert!(pair.expires_at < pair.refresh_expires_at);
        assert_ne!(pair.access_token, pair.refresh_token);
    }

    fn decode_claims(token: &str) -> Claims {
        let payload = token.split('.').nth(1).expect("jwt payload segment");
        let bytes = base64::prelude::BASE64_URL_SAFE_NO_PAD
            .decode(payload)
            .expect("payload base64");
        serde_json::from_slice(&bytes).expect("claims json")
    }

    #[test]
    fn pair_expiry_fields_match_the_token_claims() {
        let keys = make_keys();
        let user = testing::test_user();
        let pair = issue_pair(&keys, "gatekit-test", &user).expect("issue pair");

        let access = decode_claims(&pair.access_token);
        let refresh = decode_claims(&pair.refresh_token);
        assert_eq!(access.exp, pair.expires_at);
        assert_eq!(refresh.exp, pair.refresh_expires_at);
        // Both tokens share the same issue instant.
        assert_eq!(access.iat, refresh.iat);
    }

    #[test]
    fn one_time_tokens_are_hex_and_unique() {
        let a = generate_one_time_token();
        let b = generate_one_time_token();
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn malformed_key_material_fails_construction() {
        let cfg = TokenConfig {
            private_key: "%%%not-base64%%%".into(),
            public_key: "%%%not-base64%%%".into(),
            max_age_minutes: 15,
        };
        assert!(TokenKeys::from_config(&cfg).is_err());
    }
}
