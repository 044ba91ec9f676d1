use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};

use crate::{
    auth::{self, AuthUser},
    error::AppError,
    state::AppState,
};

/// Extractor for endpoints that require a logged-in user.
///
/// Accepts `Authorization: Token <key>` as well as `Bearer <key>`.
pub struct CurrentUser(pub AuthUser);

/// Extractor for endpoints readable anonymously whose output depends on the
/// caller (e.g. `is_favorited`). An invalid token is treated as anonymous.
pub struct MaybeUser(pub Option<AuthUser>);

impl MaybeUser {
    pub fn id(&self) -> Option<i64> {
        self.0.as_ref().map(|u| u.id)
    }
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let key = extract_token(parts)
            .ok_or_else(|| AppError::Unauthorized("Authentication credentials were not provided".into()))?;
        let user = auth::resolve_token(&state.db, key)
            .await?
            .ok_or_else(|| AppError::Unauthorized("Invalid token".into()))?;
        Ok(CurrentUser(user))
    }
}

impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        match extract_token(parts) {
            Some(key) => Ok(MaybeUser(auth::resolve_token(&state.db, key).await?)),
            None => Ok(MaybeUser(None)),
        }
    }
}

fn extract_token(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, key) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("token") && !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let key = key.trim();
    if key.is_empty() {
        None
    } else {
        Some(key)
    }
}
