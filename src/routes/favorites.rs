//! Favorite and shopping-cart toggles.
//!
//! Both relations share one contract: POST adds the recipe and answers with
//! its short form, DELETE removes it. Adding twice or removing something that
//! is not there is a 400; an unknown recipe is a 404.

use axum::{
    extract::State,
    http::StatusCode,
    Json,
};

use crate::{
    error::{AppError, AppResult},
    middleware::CurrentUser,
    routes::{recipes, ApiPath},
    state::AppState,
    types::RecipeShortDto,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    Favorite,
    ShoppingCart,
}

impl Relation {
    fn table(self) -> &'static str {
        match self {
            Relation::Favorite => "favorites",
            Relation::ShoppingCart => "shopping_cart",
        }
    }

    fn label(self) -> &'static str {
        match self {
            Relation::Favorite => "favorites",
            Relation::ShoppingCart => "the shopping cart",
        }
    }
}

/// Creates the `(user, recipe)` link; `Ok(false)` when it already existed.
pub async fn link(db: &sqlx::SqlitePool, relation: Relation, user_id: i64, recipe_id: i64) -> AppResult<bool> {
    let sql = format!("INSERT OR IGNORE INTO {} (user_id, recipe_id) VALUES (?1, ?2)", relation.table());
    let inserted = sqlx::query(&sql).bind(user_id).bind(recipe_id).execute(db).await?.rows_affected();
    Ok(inserted > 0)
}

/// Removes the `(user, recipe)` link; `Ok(false)` when there was none.
pub async fn unlink(db: &sqlx::SqlitePool, relation: Relation, user_id: i64, recipe_id: i64) -> AppResult<bool> {
    let sql = format!("DELETE FROM {} WHERE user_id = ?1 AND recipe_id = ?2", relation.table());
    let deleted = sqlx::query(&sql).bind(user_id).bind(recipe_id).execute(db).await?.rows_affected();
    Ok(deleted > 0)
}

async fn add(
    state: &AppState,
    relation: Relation,
    user_id: i64,
    recipe_id: i64,
) -> AppResult<(StatusCode, Json<RecipeShortDto>)> {
    let recipe = recipes::load_recipe_short(state, recipe_id).await?;
    if !link(&state.db, relation, user_id, recipe_id).await? {
        return Err(AppError::BadRequest(format!("Recipe is already in {}", relation.label())));
    }
    match relation {
        Relation::Favorite => state.metrics.inc_favorites_added(),
        Relation::ShoppingCart => state.metrics.inc_cart_items_added(),
    }
    tracing::debug!(user_id, recipe_id, table = relation.table(), "Recipe linked");
    Ok((StatusCode::CREATED, Json(recipe)))
}

async fn remove(state: &AppState, relation: Relation, user_id: i64, recipe_id: i64) -> AppResult<StatusCode> {
    recipes::load_recipe_short(state, recipe_id).await?;
    if !unlink(&state.db, relation, user_id, recipe_id).await? {
        return Err(AppError::BadRequest(format!("Recipe is not in {}", relation.label())));
    }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn add_favorite(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(id): ApiPath<i64>,
) -> AppResult<(StatusCode, Json<RecipeShortDto>)> {
    add(&state, Relation::Favorite, user.id, id).await
}

pub async fn remove_favorite(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(id): ApiPath<i64>,
) -> AppResult<StatusCode> {
    remove(&state, Relation::Favorite, user.id, id).await
}

pub async fn add_to_cart(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(id): ApiPath<i64>,
) -> AppResult<(StatusCode, Json<RecipeShortDto>)> {
    add(&state, Relation::ShoppingCart, user.id, id).await
}

pub async fn remove_from_cart(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(id): ApiPath<i64>,
) -> AppResult<StatusCode> {
    remove(&state, Relation::ShoppingCart, user.id, id).await
}
