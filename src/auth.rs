// src/auth.rs
use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, header, request::Parts},
};

use crate::{
    errors::{HaulwayError, HaulwayResult},
    models::user::{User, UserRole},
    services::user_service::UserOperations,
    state::SharedState,
};

/// The caller behind a valid `Authorization: Bearer <token>` header.
pub struct AuthUser {
    pub user: User,
    pub token: String,
}

/// Same as [`AuthUser`] but rejects anyone who is not an admin.
pub struct AdminUser(pub User);

pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

pub fn require_role(user: &User, roles: &[UserRole]) -> HaulwayResult<()> {
    if roles.contains(&user.role) {
        Ok(())
    } else {
        Err(HaulwayError::InsufficientPermissions)
    }
}

#[async_trait]
impl FromRequestParts<SharedState> for AuthUser {
    type Rejection = HaulwayError;

    async fn from_request_parts(parts: &mut Parts, state: &SharedState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)
            .ok_or_else(|| HaulwayError::unauthorized("Missing bearer token"))?
            .to_string();
        let user = state.user_service.resolve_token(&token).await?;
        Ok(AuthUser { user, token })
    }
}

#[async_trait]
impl FromRequestParts<SharedState> for AdminUser {
    type Rejection = HaulwayError;

    async fn from_request_parts(parts: &mut Parts, state: &SharedState) -> Result<Self, Self::Rejection> {
        let AuthUser { user, .. } = AuthUser::from_request_parts(parts, state).await?;
        require_role(&user, &[UserRole::Admin])?;
        Ok(AdminUser(user))
    }
}
