use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use serde::Deserialize;

use crate::{
    db::unique_violation_column,
    error::{AppError, AppResult, OptionExt},
    middleware::{validation::validate_text, CurrentUser},
    routes::{ApiJson, ApiPath, ApiQuery},
    state::AppState,
    types::{CreateIngredientRequest, IngredientDto},
};

#[derive(Debug, Default, Deserialize)]
pub struct IngredientQuery {
    pub name: Option<String>,
}

/// Case-insensitive prefix match. SQLite's `LIKE` only folds ASCII, so the
/// comparison runs here to cover every script.
pub fn matches_prefix(name: &str, prefix: &str) -> bool {
    name.to_lowercase().starts_with(&prefix.to_lowercase())
}

pub async fn list_ingredients(
    State(state): State<AppState>,
    ApiQuery(q): ApiQuery<IngredientQuery>,
) -> AppResult<Json<Vec<IngredientDto>>> {
    let all = sqlx::query_as::<_, IngredientDto>("SELECT id, name, measurement_unit FROM ingredients ORDER BY id")
        .fetch_all(&state.db)
        .await?;

    let prefix = q.name.as_deref().map(str::trim).unwrap_or("");
    if prefix.is_empty() {
        return Ok(Json(all));
    }
    Ok(Json(all.into_iter().filter(|i| matches_prefix(&i.name, prefix)).collect()))
}

pub async fn get_ingredient(State(state): State<AppState>, ApiPath(id): ApiPath<i64>) -> AppResult<Json<IngredientDto>> {
    let ingredient =
        sqlx::query_as::<_, IngredientDto>("SELECT id, name, measurement_unit FROM ingredients WHERE id = ?1")
            .bind(id)
            .fetch_optional(&state.db)
            .await?
            .ok_or_not_found("Ingredient")?;
    Ok(Json(ingredient))
}

pub async fn create_ingredient(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiJson(req): ApiJson<CreateIngredientRequest>,
) -> AppResult<(StatusCode, Json<IngredientDto>)> {
    if !user.is_staff {
        return Err(AppError::Forbidden("Only staff can create ingredients".into()));
    }
    let name = validate_text("name", &req.name, 150)?;
    let measurement_unit = validate_text("measurement_unit", &req.measurement_unit, 15)?;

    let id = sqlx::query("INSERT INTO ingredients (name, measurement_unit) VALUES (?1, ?2)")
        .bind(&name)
        .bind(&measurement_unit)
        .execute(&state.db)
        .await
        .map_err(|e| match unique_violation_column(&e) {
            Some(_) => AppError::field("name", "This ingredient already exists with that measurement unit"),
            None => e.into(),
        })?
        .last_insert_rowid();

    Ok((StatusCode::CREATED, Json(IngredientDto { id, name, measurement_unit })))
}
