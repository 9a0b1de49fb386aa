//! JWT token verification against the platform's auth service.
//!
//! Tokens are minted by the auth collaborator (HS256, shared secret) and
//! carry the user and tenant ids the gateway needs for admission. The
//! gateway only verifies; it never issues.

use async_trait::async_trait;
use jsonwebtoken::{decode, errors::ErrorKind, Algorithm, DecodingKey, Validation};
use serde::Deserialize;

use crate::domain::{CompanyId, UserId};
use crate::ports::{AuthClaims, TokenError, TokenVerifier};

#[derive(Debug, Deserialize)]
struct Claims {
    user_id: i64,
    company_id: i64,
    #[allow(dead_code)]
    exp: usize,
}

pub struct JwtVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn new(secret: &str, issuer: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[issuer]);
        validation.set_required_spec_claims(&["exp", "iss"]);
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }
}

#[async_trait]
impl TokenVerifier for JwtVerifier {
    async fn verify(&self, token: &str) -> Result<AuthClaims, TokenError> {
        let data = decode::<Claims>(token, &self.key, &self.validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid,
            }
        })?;

        Ok(AuthClaims {
            user_id: UserId::new(data.claims.user_id),
            company_id: CompanyId::new(data.claims.company_id),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde::Serialize;

    const SECRET: &str = "test-secret";
    const ISSUER: &str = "crewdeck-auth";

    #[derive(Serialize)]
    struct TestClaims {
        user_id: i64,
        company_id: i64,
        exp: usize,
        iss: String,
    }

    fn mint(user_id: i64, company_id: i64, exp_offset_secs: i64, issuer: &str) -> String {
        let exp = (chrono::Utc::now().timestamp() + exp_offset_secs) as usize;
        encode(
            &Header::default(),
            &TestClaims {
                user_id,
                company_id,
                exp,
                iss: issuer.to_string(),
            },
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn valid_token_yields_claims() {
        let verifier = JwtVerifier::new(SECRET, ISSUER);
        let claims = verifier.verify(&mint(7, 3, 3600, ISSUER)).await.unwrap();
        assert_eq!(claims.user_id, UserId::new(7));
        assert_eq!(claims.company_id, CompanyId::new(3));
    }

    #[tokio::test]
    async fn expired_token_is_distinguished_from_invalid() {
        let verifier = JwtVerifier::new(SECRET, ISSUER);
        let err = verifier.verify(&mint(7, 3, -3600, ISSUER)).await.unwrap_err();
        assert!(matches!(err, TokenError::Expired));
    }

    #[tokio::test]
    async fn wrong_issuer_is_rejected() {
        let verifier = JwtVerifier::new(SECRET, ISSUER);
        let err = verifier
            .verify(&mint(7, 3, 3600, "someone-else"))
            .await
            .unwrap_err();
        assert!(matches!(err, TokenError::Invalid));
    }

    #[tokio::test]
    async fn garbage_is_rejected() {
        let verifier = JwtVerifier::new(SECRET, ISSUER);
        let err = verifier.verify("not-a-jwt").await.unwrap_err();
        assert!(matches!(err, TokenError::Invalid));
    }
}
