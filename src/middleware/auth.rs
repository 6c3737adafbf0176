use axum::{extract::FromRequestParts, http::request::Parts};

use crate::{error::AppError, models::UserId};

/// Header set by the upstream authentication layer once a session is verified
pub const USER_ID_HEADER: &str = "x-user-id";

/// The authenticated reader making the request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser(pub UserId);

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(USER_ID_HEADER)
            .ok_or_else(|| AppError::Unauthorized("Authentication required".to_string()))?;

        raw.to_str()
            .ok()
            .and_then(|s| s.trim().parse::<UserId>().ok())
            .map(AuthUser)
            .ok_or_else(|| AppError::Unauthorized("Invalid user identity".to_string()))
    }
}
