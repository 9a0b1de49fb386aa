use serde::Deserialize;

use super::ConfigError;

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// HS256 secret shared with the auth service.
    #[serde(default = "default_secret")]
    pub jwt_secret: String,
    #[serde(default = "default_issuer")]
    pub jwt_issuer: String,
}

impl AuthConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.jwt_secret.is_empty() {
            return Err(ConfigError::Invalid("auth.jwt_secret must not be empty".into()));
        }
        Ok(())
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: default_secret(),
            jwt_issuer: default_issuer(),
        }
    }
}

fn default_secret() -> String {
    // Local development only; deployments set CREWDECK__AUTH__JWT_SECRET.
    "dev-secret-change-me".to_string()
}

fn default_issuer() -> String {
    "crewdeck-auth".to_string()
}
