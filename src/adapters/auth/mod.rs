mod jwt;
mod mock;

pub use jwt::JwtVerifier;
pub use mock::MockTokenVerifier;
