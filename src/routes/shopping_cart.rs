use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Response},
};
use serde::Deserialize;

use crate::{
    error::AppResult,
    middleware::CurrentUser,
    routes::ApiQuery,
    shopping_list::{ListFormat, ShoppingList},
    state::AppState,
};

#[derive(Debug, Default, Deserialize)]
pub struct DownloadQuery {
    pub format: Option<String>,
}

pub async fn download_shopping_cart(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiQuery(q): ApiQuery<DownloadQuery>,
) -> AppResult<Response> {
    let format = ListFormat::parse(q.format.as_deref())?;
    let list = ShoppingList::for_user(&state.db, user.id, &user.username).await?;
    let body = list.render(format)?;

    state.metrics.inc_shopping_lists_downloaded();
    tracing::debug!(user_id = user.id, items = list.items.len(), "Shopping list downloaded");

    let disposition = format!("attachment; filename=\"{}\"", format.file_name());
    Ok((
        [(header::CONTENT_TYPE, format.content_type().to_string()), (header::CONTENT_DISPOSITION, disposition)],
        body,
    )
        .into_response())
}
