use axum::{extract::State, http::StatusCode, Json};

use crate::{
    auth,
    error::AppResult,
    middleware::CurrentUser,
    routes::ApiJson,
    state::AppState,
    types::{LoginRequest, TokenResponse},
};

pub async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> AppResult<Json<TokenResponse>> {
    let user_id = auth::authenticate(&state.db, &req.email, &req.password).await?;
    let auth_token = auth::get_or_create_token(&state.db, user_id).await?;
    state.metrics.inc_logins();
    tracing::info!(user_id, "User logged in");
    Ok(Json(TokenResponse { auth_token }))
}

pub async fn logout(State(state): State<AppState>, CurrentUser(user): CurrentUser) -> AppResult<StatusCode> {
    auth::revoke_token(&state.db, user.id).await?;
    tracing::info!(user_id = user.id, "User logged out");
    Ok(StatusCode::NO_CONTENT)
}
