mod claims;
mod jwt;

use async_trait::async_trait;

use crate::error::AppError;

pub use claims::Claims;
pub use jwt::JwtValidator;

/// Resolves a caller credential (the bearer token) to a user id.
///
/// The HTTP layer only depends on this trait, so an identity provider that
/// needs a network round trip can be swapped in for the local JWT check.
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn resolve(&self, credential: &str) -> Result<String, AppError>;
}

#[async_trait]
impl IdentityResolver for JwtValidator {
    async fn resolve(&self, credential: &str) -> Result<String, AppError> {
        let claims = self.validate(credential).map_err(|e| {
            tracing::debug!(error = %e, "Rejected bearer credential");
            AppError::Auth("Unauthorized".to_string())
        })?;
        if claims.user_id().is_empty() {
            return Err(AppError::Auth("Unauthorized".to_string()));
        }
        Ok(claims.sub)
    }
}
