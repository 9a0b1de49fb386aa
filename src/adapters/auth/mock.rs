//! Token verifier double for tests and local development.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::ports::{AuthClaims, TokenError, TokenVerifier};

/// Accepts only tokens registered through [`MockTokenVerifier::allow`].
#[derive(Default)]
pub struct MockTokenVerifier {
    accepted: Mutex<HashMap<String, AuthClaims>>,
}

impl MockTokenVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allow(&self, token: impl Into<String>, claims: AuthClaims) {
        self.accepted.lock().unwrap().insert(token.into(), claims);
    }
}

#[async_trait]
impl TokenVerifier for MockTokenVerifier {
    async fn verify(&self, token: &str) -> Result<AuthClaims, TokenError> {
        self.accepted
            .lock()
            .unwrap()
            .get(token)
            .copied()
            .ok_or(TokenError::Invalid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CompanyId, UserId};

    #[tokio::test]
    async fn only_registered_tokens_pass() {
        let verifier = MockTokenVerifier::new();
        verifier.allow(
            "good",
            AuthClaims {
                user_id: UserId::new(1),
                company_id: CompanyId::new(1),
            },
        );

        assert!(verifier.verify("good").await.is_ok());
        assert!(matches!(
            verifier.verify("bad").await.unwrap_err(),
            TokenError::Invalid
        ));
    }
}
