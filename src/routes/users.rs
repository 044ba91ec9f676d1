use axum::{
    extract::{OriginalUri, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};

use crate::{
    auth,
    db::unique_violation_column,
    error::{AppError, AppResult, OptionExt},
    middleware::{
        validation::{validate_email, validate_password, validate_text, validate_username},
        CurrentUser, MaybeUser,
    },
    pagination::{ensure_page_in_range, Page, PageQuery},
    routes::{recipes, ApiJson, ApiPath, ApiQuery},
    state::AppState,
    types::{
        AuthorWithRecipesDto, CreateUserRequest, CreatedUserDto, SetPasswordRequest, UpdateUserRequest, UserDto,
    },
};

const USER_COLUMNS: &str = r#"u.id, u.email, u.username, u.first_name, u.last_name,
    EXISTS(SELECT 1 FROM subscriptions s WHERE s.user_id = ?1 AND s.author_id = u.id) AS is_subscribed"#;

fn user_from_row(row: &SqliteRow) -> UserDto {
    UserDto {
        id: row.get("id"),
        email: row.get("email"),
        username: row.get("username"),
        first_name: row.get("first_name"),
        last_name: row.get("last_name"),
        is_subscribed: row.get::<i64, _>("is_subscribed") != 0,
    }
}

/// Loads a user as seen by `viewer` (drives `is_subscribed`).
pub(crate) async fn load_user(db: &SqlitePool, user_id: i64, viewer: Option<i64>) -> AppResult<UserDto> {
    let sql = format!("SELECT {} FROM users u WHERE u.id = ?2", USER_COLUMNS);
    let row = sqlx::query(&sql).bind(viewer).bind(user_id).fetch_optional(db).await?;
    row.as_ref().map(user_from_row).ok_or_not_found("User")
}

/// A followed author with their latest recipes, as returned by the
/// subscription endpoints.
pub(crate) async fn load_author_with_recipes(
    state: &AppState,
    author_id: i64,
    viewer: Option<i64>,
    recipes_limit: i64,
) -> AppResult<AuthorWithRecipesDto> {
    let user = load_user(&state.db, author_id, viewer).await?;
    let recipes = recipes::latest_short_by_author(state, author_id, recipes_limit).await?;
    let recipes_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM recipes WHERE author_id = ?1")
        .bind(author_id)
        .fetch_one(&state.db)
        .await?;
    Ok(AuthorWithRecipesDto { user, recipes, recipes_count })
}

fn map_unique_violation(err: sqlx::Error) -> AppError {
    match unique_violation_column(&err) {
        Some(column) => AppError::field(&column, format!("A user with that {} already exists", column)),
        None => err.into(),
    }
}

async fn ensure_unique(db: &SqlitePool, column: &str, value: &str, except: Option<i64>) -> AppResult<()> {
    // column is one of our own identifiers, never user input
    let sql = format!("SELECT EXISTS(SELECT 1 FROM users WHERE {} = ?1 AND id IS NOT ?2)", column);
    let taken: i64 = sqlx::query_scalar(&sql).bind(value).bind(except).fetch_one(db).await?;
    if taken != 0 {
        return Err(AppError::field(column, format!("A user with that {} already exists", column)));
    }
    Ok(())
}

pub async fn register(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<CreateUserRequest>,
) -> AppResult<(StatusCode, Json<CreatedUserDto>)> {
    let email = validate_email(&req.email)?;
    let username = validate_username(&req.username)?;
    let first_name = validate_text("first_name", &req.first_name, 150)?;
    let last_name = validate_text("last_name", &req.last_name, 150)?;
    validate_password("password", &req.password)?;

    ensure_unique(&state.db, "email", &email, None).await?;
    ensure_unique(&state.db, "username", &username, None).await?;

    let password_hash = auth::hash_password(&req.password)?;
    let id = sqlx::query(
        r#"INSERT INTO users (email, username, first_name, last_name, password_hash)
           VALUES (?1, ?2, ?3, ?4, ?5)"#,
    )
    .bind(&email)
    .bind(&username)
    .bind(&first_name)
    .bind(&last_name)
    .bind(&password_hash)
    .execute(&state.db)
    .await
    .map_err(map_unique_violation)?
    .last_insert_rowid();

    state.metrics.inc_users_registered();
    tracing::info!(user_id = id, %username, "User registered");

    Ok((StatusCode::CREATED, Json(CreatedUserDto { id, email, username, first_name, last_name })))
}

pub async fn list_users(
    State(state): State<AppState>,
    viewer: MaybeUser,
    ApiQuery(q): ApiQuery<PageQuery>,
    OriginalUri(uri): OriginalUri,
) -> AppResult<Json<Page<UserDto>>> {
    let window = q.window(&state.config.pagination)?;
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users").fetch_one(&state.db).await?;
    ensure_page_in_range(window, count)?;

    let sql = format!("SELECT {} FROM users u ORDER BY u.id LIMIT ?2 OFFSET ?3", USER_COLUMNS);
    let rows = sqlx::query(&sql)
        .bind(viewer.id())
        .bind(window.limit)
        .bind(window.offset())
        .fetch_all(&state.db)
        .await?;
    let results = rows.iter().map(user_from_row).collect();
    Ok(Json(Page::new(results, count, window, uri.path(), uri.query())))
}

pub async fn get_user(
    State(state): State<AppState>,
    viewer: MaybeUser,
    ApiPath(id): ApiPath<i64>,
) -> AppResult<Json<UserDto>> {
    Ok(Json(load_user(&state.db, id, viewer.id()).await?))
}

pub async fn me(State(state): State<AppState>, CurrentUser(user): CurrentUser) -> AppResult<Json<UserDto>> {
    Ok(Json(load_user(&state.db, user.id, Some(user.id)).await?))
}

pub async fn update_me(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiJson(req): ApiJson<UpdateUserRequest>,
) -> AppResult<Json<UserDto>> {
    let email = req.email.as_deref().map(validate_email).transpose()?;
    let username = req.username.as_deref().map(validate_username).transpose()?;
    let first_name = req.first_name.as_deref().map(|v| validate_text("first_name", v, 150)).transpose()?;
    let last_name = req.last_name.as_deref().map(|v| validate_text("last_name", v, 150)).transpose()?;

    if let Some(email) = &email {
        ensure_unique(&state.db, "email", email, Some(user.id)).await?;
    }
    if let Some(username) = &username {
        ensure_unique(&state.db, "username", username, Some(user.id)).await?;
    }

    sqlx::query(
        r#"UPDATE users SET
               email = COALESCE(?1, email),
               username = COALESCE(?2, username),
               first_name = COALESCE(?3, first_name),
               last_name = COALESCE(?4, last_name)
           WHERE id = ?5"#,
    )
    .bind(email)
    .bind(username)
    .bind(first_name)
    .bind(last_name)
    .bind(user.id)
    .execute(&state.db)
    .await
    .map_err(map_unique_violation)?;

    Ok(Json(load_user(&state.db, user.id, Some(user.id)).await?))
}

pub async fn set_password(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiJson(req): ApiJson<SetPasswordRequest>,
) -> AppResult<StatusCode> {
    validate_password("new_password", &req.new_password)?;

    let hash: String = sqlx::query_scalar("SELECT password_hash FROM users WHERE id = ?1")
        .bind(user.id)
        .fetch_one(&state.db)
        .await?;
    if !auth::verify_password(&req.current_password, &hash)? {
        return Err(AppError::field("current_password", "Invalid password"));
    }

    let new_hash = auth::hash_password(&req.new_password)?;
    sqlx::query("UPDATE users SET password_hash = ?1 WHERE id = ?2")
        .bind(new_hash)
        .bind(user.id)
        .execute(&state.db)
        .await?;
    tracing::info!(user_id = user.id, "Password changed");
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Default, Deserialize)]
pub struct SubscriptionsQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub recipes_limit: Option<i64>,
}

impl SubscriptionsQuery {
    fn recipes_limit(&self, state: &AppState) -> AppResult<i64> {
        match self.recipes_limit {
            Some(n) if n < 0 => Err(AppError::field("recipes_limit", "Must be a non-negative integer")),
            Some(n) => Ok(n),
            None => Ok(state.config.pagination.recipes_limit),
        }
    }
}

pub async fn subscriptions(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiQuery(q): ApiQuery<SubscriptionsQuery>,
    OriginalUri(uri): OriginalUri,
) -> AppResult<Json<Page<AuthorWithRecipesDto>>> {
    let window = PageQuery { page: q.page, limit: q.limit }.window(&state.config.pagination)?;
    let recipes_limit = q.recipes_limit(&state)?;

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM subscriptions WHERE user_id = ?1")
        .bind(user.id)
        .fetch_one(&state.db)
        .await?;
    ensure_page_in_range(window, count)?;

    let author_ids: Vec<i64> = sqlx::query_scalar(
        "SELECT author_id FROM subscriptions WHERE user_id = ?1 ORDER BY id LIMIT ?2 OFFSET ?3",
    )
    .bind(user.id)
    .bind(window.limit)
    .bind(window.offset())
    .fetch_all(&state.db)
    .await?;

    let mut results = Vec::with_capacity(author_ids.len());
    for author_id in author_ids {
        results.push(load_author_with_recipes(&state, author_id, Some(user.id), recipes_limit).await?);
    }
    Ok(Json(Page::new(results, count, window, uri.path(), uri.query())))
}

pub async fn subscribe(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(author_id): ApiPath<i64>,
    ApiQuery(q): ApiQuery<SubscriptionsQuery>,
) -> AppResult<(StatusCode, Json<AuthorWithRecipesDto>)> {
    let recipes_limit = q.recipes_limit(&state)?;
    // 404 before any relation checks
    load_user(&state.db, author_id, None).await?;

    if author_id == user.id {
        return Err(AppError::BadRequest("You cannot subscribe to yourself".into()));
    }
    let inserted = sqlx::query("INSERT OR IGNORE INTO subscriptions (user_id, author_id) VALUES (?1, ?2)")
        .bind(user.id)
        .bind(author_id)
        .execute(&state.db)
        .await?
        .rows_affected();
    if inserted == 0 {
        return Err(AppError::BadRequest("You are already subscribed to this author".into()));
    }

    state.metrics.inc_subscriptions_created();
    tracing::debug!(user_id = user.id, author_id, "Subscribed");
    let author = load_author_with_recipes(&state, author_id, Some(user.id), recipes_limit).await?;
    Ok((StatusCode::CREATED, Json(author)))
}

pub async fn unsubscribe(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(author_id): ApiPath<i64>,
) -> AppResult<StatusCode> {
    load_user(&state.db, author_id, None).await?;

    let deleted = sqlx::query("DELETE FROM subscriptions WHERE user_id = ?1 AND author_id = ?2")
        .bind(user.id)
        .bind(author_id)
        .execute(&state.db)
        .await?
        .rows_affected();
    if deleted == 0 {
        return Err(AppError::BadRequest("You are not subscribed to this author".into()));
    }
    Ok(StatusCode::NO_CONTENT)
}
