use axum::{
    extract::State,
    http::StatusCode,
    Json,
};

use crate::{
    db::unique_violation_column,
    error::{AppError, AppResult, OptionExt},
    middleware::{
        validation::{validate_hex_color, validate_slug, validate_text},
        CurrentUser,
    },
    routes::{ApiJson, ApiPath},
    state::AppState,
    types::{CreateTagRequest, TagDto},
};

pub async fn list_tags(State(state): State<AppState>) -> AppResult<Json<Vec<TagDto>>> {
    let tags = sqlx::query_as::<_, TagDto>("SELECT id, name, color, slug FROM tags ORDER BY name")
        .fetch_all(&state.db)
        .await?;
    Ok(Json(tags))
}

pub async fn get_tag(State(state): State<AppState>, ApiPath(id): ApiPath<i64>) -> AppResult<Json<TagDto>> {
    let tag = sqlx::query_as::<_, TagDto>("SELECT id, name, color, slug FROM tags WHERE id = ?1")
        .bind(id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_not_found("Tag")?;
    Ok(Json(tag))
}

/// Rejects a value already used by another tag in `column`.
async fn ensure_tag_unique(db: &sqlx::SqlitePool, column: &str, value: &str) -> AppResult<()> {
    // column is one of our own identifiers, never user input
    let sql = format!("SELECT EXISTS(SELECT 1 FROM tags WHERE {} = ?1)", column);
    let taken: i64 = sqlx::query_scalar(&sql).bind(value).fetch_one(db).await?;
    if taken != 0 {
        return Err(AppError::field(column, format!("A tag with this {} already exists", column)));
    }
    Ok(())
}

pub async fn create_tag(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiJson(req): ApiJson<CreateTagRequest>,
) -> AppResult<(StatusCode, Json<TagDto>)> {
    if !user.is_staff {
        return Err(AppError::Forbidden("Only staff can create tags".into()));
    }
    let name = validate_text("name", &req.name, 150)?;
    let color = validate_hex_color(&req.color)?;
    let slug = validate_slug(&req.slug)?;
    for (column, value) in [("name", &name), ("color", &color), ("slug", &slug)] {
        ensure_tag_unique(&state.db, column, value).await?;
    }

    let id = sqlx::query("INSERT INTO tags (name, color, slug) VALUES (?1, ?2, ?3)")
        .bind(&name)
        .bind(&color)
        .bind(&slug)
        .execute(&state.db)
        .await
        // a concurrent insert can still win the race
        .map_err(|e| match unique_violation_column(&e) {
            Some(column) => AppError::field(&column, format!("A tag with this {} already exists", column)),
            None => e.into(),
        })?
        .last_insert_rowid();

    tracing::info!(tag_id = id, %slug, "Tag created");
    Ok((StatusCode::CREATED, Json(TagDto { id, name, color, slug })))
}
