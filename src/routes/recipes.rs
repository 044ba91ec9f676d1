use std::collections::HashSet;

use axum::{
    extract::{OriginalUri, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use sqlx::{sqlite::SqliteRow, QueryBuilder, Row, Sqlite, SqlitePool};

use crate::{
    db::unique_violation_column,
    error::{AppError, AppResult, OptionExt},
    media::{self, public_url},
    middleware::{validation::validate_text, CurrentUser, MaybeUser},
    pagination::{ensure_page_in_range, Page, PageQuery},
    routes::{users, ApiJson, ApiPath, ApiQuery},
    state::AppState,
    types::{
        CreateRecipeRequest, IngredientAmountInput, RecipeDto, RecipeIngredientDto, RecipeShortDto, TagDto,
        UpdateRecipeRequest,
    },
};

const NAME_MAX: usize = 200;

// Loading

fn short_from_row(row: &SqliteRow, url_prefix: &str) -> RecipeShortDto {
    RecipeShortDto {
        id: row.get("id"),
        name: row.get("name"),
        image: row.get::<Option<String>, _>("image").map(|p| public_url(url_prefix, &p)),
        cooking_time: row.get("cooking_time"),
    }
}

pub(crate) async fn load_recipe_short(state: &AppState, recipe_id: i64) -> AppResult<RecipeShortDto> {
    let row = sqlx::query("SELECT id, name, image, cooking_time FROM recipes WHERE id = ?1")
        .bind(recipe_id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_not_found("Recipe")?;
    Ok(short_from_row(&row, &state.config.media.url_prefix))
}

/// Newest recipes of an author, at most `limit` of them.
pub(crate) async fn latest_short_by_author(
    state: &AppState,
    author_id: i64,
    limit: i64,
) -> AppResult<Vec<RecipeShortDto>> {
    let rows = sqlx::query(
        r#"SELECT id, name, image, cooking_time FROM recipes
           WHERE author_id = ?1 ORDER BY pub_date DESC, id DESC LIMIT ?2"#,
    )
    .bind(author_id)
    .bind(limit)
    .fetch_all(&state.db)
    .await?;
    let prefix = &state.config.media.url_prefix;
    Ok(rows.iter().map(|r| short_from_row(r, prefix)).collect())
}

/// Full representation of a recipe as seen by `viewer`.
pub(crate) async fn load_recipe(state: &AppState, recipe_id: i64, viewer: Option<i64>) -> AppResult<RecipeDto> {
    let db = &state.db;
    let row = sqlx::query(
        r#"SELECT r.id, r.author_id, r.name, r.text, r.image, r.cooking_time, r.pub_date,
               EXISTS(SELECT 1 FROM favorites f WHERE f.recipe_id = r.id AND f.user_id = ?2) AS is_favorited,
               EXISTS(SELECT 1 FROM shopping_cart c WHERE c.recipe_id = r.id AND c.user_id = ?2) AS is_in_shopping_cart
           FROM recipes r WHERE r.id = ?1"#,
    )
    .bind(recipe_id)
    .bind(viewer)
    .fetch_optional(db)
    .await?
    .ok_or_not_found("Recipe")?;

    let tags = sqlx::query_as::<_, TagDto>(
        r#"SELECT t.id, t.name, t.color, t.slug FROM tags t
           JOIN recipe_tags rt ON rt.tag_id = t.id
           WHERE rt.recipe_id = ?1 ORDER BY t.name"#,
    )
    .bind(recipe_id)
    .fetch_all(db)
    .await?;

    let ingredients = sqlx::query(
        r#"SELECT i.id, i.name, i.measurement_unit, ri.amount FROM recipe_ingredients ri
           JOIN ingredients i ON i.id = ri.ingredient_id
           WHERE ri.recipe_id = ?1 ORDER BY ri.id"#,
    )
    .bind(recipe_id)
    .fetch_all(db)
    .await?
    .iter()
    .map(|r| RecipeIngredientDto {
        id: r.get("id"),
        name: r.get("name"),
        measurement_unit: r.get("measurement_unit"),
        amount: r.get("amount"),
    })
    .collect();

    let author = match row.get::<Option<i64>, _>("author_id") {
        Some(author_id) => Some(users::load_user(db, author_id, viewer).await?),
        None => None,
    };

    Ok(RecipeDto {
        id: row.get("id"),
        tags,
        author,
        ingredients,
        is_favorited: row.get::<i64, _>("is_favorited") != 0,
        is_in_shopping_cart: row.get::<i64, _>("is_in_shopping_cart") != 0,
        name: row.get("name"),
        image: row.get::<Option<String>, _>("image").map(|p| public_url(&state.config.media.url_prefix, &p)),
        text: row.get("text"),
        cooking_time: row.get("cooking_time"),
        pub_date: row.get("pub_date"),
    })
}

// Listing

#[derive(Debug, Default, Deserialize)]
pub struct RecipeQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub author: Option<i64>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub is_favorited: Option<String>,
    pub is_in_shopping_cart: Option<String>,
}

/// Parses `1/0/true/false` query flags.
pub fn parse_flag(field: &str, value: Option<&str>) -> AppResult<Option<bool>> {
    match value.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
        None | Some("") => Ok(None),
        Some("1") | Some("true") => Ok(Some(true)),
        Some("0") | Some("false") => Ok(Some(false)),
        Some(_) => Err(AppError::field(field, "Expected 1 or 0")),
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RecipeFilter {
    pub author: Option<i64>,
    pub tags: Vec<String>,
    /// `(user, wanted)`; only set for authenticated requests.
    pub favorited_by: Option<(i64, bool)>,
    pub in_cart_of: Option<(i64, bool)>,
}

impl RecipeFilter {
    pub fn from_query(q: &RecipeQuery, viewer: Option<i64>) -> AppResult<Self> {
        let is_favorited = parse_flag("is_favorited", q.is_favorited.as_deref())?;
        let in_cart = parse_flag("is_in_shopping_cart", q.is_in_shopping_cart.as_deref())?;
        let tags = q.tags.iter().map(|t| t.trim().to_string()).filter(|t| !t.is_empty()).collect();
        Ok(Self {
            author: q.author,
            tags,
            favorited_by: viewer.zip(is_favorited),
            in_cart_of: viewer.zip(in_cart),
        })
    }

    /// `head` selects from `recipes r`; the filters are appended as a WHERE clause.
    fn query(&self, head: &str) -> QueryBuilder<'static, Sqlite> {
        let mut qb = QueryBuilder::new(head);
        qb.push(" WHERE 1 = 1");
        if let Some(author) = self.author {
            qb.push(" AND r.author_id = ").push_bind(author);
        }
        if !self.tags.is_empty() {
            qb.push(
                " AND EXISTS (SELECT 1 FROM recipe_tags rt JOIN tags t ON t.id = rt.tag_id \
                 WHERE rt.recipe_id = r.id AND t.slug IN (",
            );
            let mut slugs = qb.separated(", ");
            for slug in &self.tags {
                slugs.push_bind(slug.clone());
            }
            slugs.push_unseparated("))");
        }
        for (relation, table) in [(self.favorited_by, "favorites"), (self.in_cart_of, "shopping_cart")] {
            if let Some((user_id, wanted)) = relation {
                qb.push(if wanted { " AND EXISTS" } else { " AND NOT EXISTS" });
                qb.push(format!(" (SELECT 1 FROM {} x WHERE x.recipe_id = r.id AND x.user_id = ", table));
                qb.push_bind(user_id);
                qb.push(")");
            }
        }
        qb
    }

    pub async fn count(&self, db: &SqlitePool) -> AppResult<i64> {
        let count = self.query("SELECT COUNT(*) FROM recipes r").build_query_scalar::<i64>().fetch_one(db).await?;
        Ok(count)
    }

    /// Ids of one page, newest first.
    pub async fn page_ids(&self, db: &SqlitePool, limit: i64, offset: i64) -> AppResult<Vec<i64>> {
        let mut qb = self.query("SELECT r.id FROM recipes r");
        qb.push(" ORDER BY r.pub_date DESC, r.id DESC LIMIT ").push_bind(limit);
        qb.push(" OFFSET ").push_bind(offset);
        Ok(qb.build_query_scalar::<i64>().fetch_all(db).await?)
    }
}

pub async fn list_recipes(
    State(state): State<AppState>,
    viewer: MaybeUser,
    ApiQuery(q): ApiQuery<RecipeQuery>,
    OriginalUri(uri): OriginalUri,
) -> AppResult<Json<Page<RecipeDto>>> {
    let window = PageQuery { page: q.page, limit: q.limit }.window(&state.config.pagination)?;
    let filter = RecipeFilter::from_query(&q, viewer.id())?;

    let count = filter.count(&state.db).await?;
    ensure_page_in_range(window, count)?;
    let ids = filter.page_ids(&state.db, window.limit, window.offset()).await?;

    let mut results = Vec::with_capacity(ids.len());
    for id in ids {
        results.push(load_recipe(&state, id, viewer.id()).await?);
    }
    Ok(Json(Page::new(results, count, window, uri.path(), uri.query())))
}

pub async fn get_recipe(
    State(state): State<AppState>,
    viewer: MaybeUser,
    ApiPath(id): ApiPath<i64>,
) -> AppResult<Json<RecipeDto>> {
    Ok(Json(load_recipe(&state, id, viewer.id()).await?))
}

// Writing

/// Checks ingredient lines and returns `(ingredient_id, amount)` pairs.
pub async fn validate_ingredients(db: &SqlitePool, items: &[IngredientAmountInput]) -> AppResult<Vec<(i64, i64)>> {
    if items.is_empty() {
        return Err(AppError::field("ingredients", "A recipe needs at least one ingredient"));
    }
    let mut seen = HashSet::new();
    let mut lines = Vec::with_capacity(items.len());
    for item in items {
        if !seen.insert(item.id) {
            return Err(AppError::field("ingredients", format!("Ingredient {} is listed twice", item.id)));
        }
        lines.push((item.id, item.amount.value()?));
    }
    let ids: Vec<i64> = lines.iter().map(|(id, _)| *id).collect();
    if let Some(missing) = first_missing_id(db, "ingredients", &ids).await? {
        return Err(AppError::field("ingredients", format!("Ingredient {} does not exist", missing)));
    }
    Ok(lines)
}

pub async fn validate_tags(db: &SqlitePool, tags: &[i64]) -> AppResult<Vec<i64>> {
    if tags.is_empty() {
        return Err(AppError::field("tags", "A recipe needs at least one tag"));
    }
    let mut seen = HashSet::new();
    for id in tags {
        if !seen.insert(*id) {
            return Err(AppError::field("tags", format!("Tag {} is listed twice", id)));
        }
    }
    if let Some(missing) = first_missing_id(db, "tags", tags).await? {
        return Err(AppError::field("tags", format!("Tag {} does not exist", missing)));
    }
    Ok(tags.to_vec())
}

async fn first_missing_id(db: &SqlitePool, table: &str, ids: &[i64]) -> AppResult<Option<i64>> {
    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!("SELECT id FROM {} WHERE id IN (", table));
    let mut sep = qb.separated(", ");
    for id in ids {
        sep.push_bind(*id);
    }
    sep.push_unseparated(")");
    let found: HashSet<i64> = qb.build_query_scalar::<i64>().fetch_all(db).await?.into_iter().collect();
    Ok(ids.iter().copied().find(|id| !found.contains(id)))
}

fn validate_cooking_time(value: i64) -> AppResult<i64> {
    if value < 1 {
        return Err(AppError::field("cooking_time", "Cooking time must be at least 1 minute"));
    }
    Ok(value)
}

fn validate_recipe_text(value: &str) -> AppResult<String> {
    if value.trim().is_empty() {
        return Err(AppError::field("text", "This field may not be blank"));
    }
    Ok(value.to_string())
}

async fn ensure_name_free(db: &SqlitePool, name: &str, except: Option<i64>) -> AppResult<()> {
    let taken: i64 = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM recipes WHERE name = ?1 AND id IS NOT ?2)")
        .bind(name)
        .bind(except)
        .fetch_one(db)
        .await?;
    if taken != 0 {
        return Err(AppError::field("name", "A recipe with this name already exists"));
    }
    Ok(())
}

fn map_recipe_write_error(err: sqlx::Error) -> AppError {
    match unique_violation_column(&err).as_deref() {
        Some("name") => AppError::field("name", "A recipe with this name already exists"),
        _ => err.into(),
    }
}

async fn replace_tags(conn: &mut sqlx::SqliteConnection, recipe_id: i64, tags: &[i64]) -> AppResult<()> {
    sqlx::query("DELETE FROM recipe_tags WHERE recipe_id = ?1").bind(recipe_id).execute(&mut *conn).await?;
    for tag_id in tags {
        sqlx::query("INSERT INTO recipe_tags (recipe_id, tag_id) VALUES (?1, ?2)")
            .bind(recipe_id)
            .bind(tag_id)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

async fn replace_ingredients(
    conn: &mut sqlx::SqliteConnection,
    recipe_id: i64,
    lines: &[(i64, i64)],
) -> AppResult<()> {
    sqlx::query("DELETE FROM recipe_ingredients WHERE recipe_id = ?1").bind(recipe_id).execute(&mut *conn).await?;
    for (ingredient_id, amount) in lines {
        sqlx::query("INSERT INTO recipe_ingredients (recipe_id, ingredient_id, amount) VALUES (?1, ?2, ?3)")
            .bind(recipe_id)
            .bind(ingredient_id)
            .bind(amount)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

/// Decodes and stores an uploaded image, returning its media-relative path.
async fn store_image(state: &AppState, data_url: &str) -> AppResult<String> {
    let upload = media::decode_data_url(data_url, state.config.media.max_image_bytes)?;
    state.images.save(upload).await
}

async fn discard_image(state: &AppState, relative_path: &str) {
    if let Err(e) = state.images.delete(relative_path).await {
        tracing::warn!(path = %relative_path, "Failed to remove recipe image: {}", e);
    }
}

pub async fn create_recipe(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiJson(req): ApiJson<CreateRecipeRequest>,
) -> AppResult<(StatusCode, Json<RecipeDto>)> {
    let name = validate_text("name", &req.name, NAME_MAX)?;
    let text = validate_recipe_text(&req.text)?;
    let cooking_time = validate_cooking_time(req.cooking_time)?;
    let ingredients = validate_ingredients(&state.db, &req.ingredients).await?;
    let tags = validate_tags(&state.db, &req.tags).await?;
    ensure_name_free(&state.db, &name, None).await?;

    let image = match req.image.as_deref() {
        Some(data_url) => Some(store_image(&state, data_url).await?),
        None => None,
    };

    let result = async {
        let mut tx = state.db.begin().await?;
        let id = sqlx::query(
            r#"INSERT INTO recipes (author_id, name, text, image, cooking_time)
               VALUES (?1, ?2, ?3, ?4, ?5)"#,
        )
        .bind(user.id)
        .bind(&name)
        .bind(&text)
        .bind(&image)
        .bind(cooking_time)
        .execute(&mut *tx)
        .await
        .map_err(map_recipe_write_error)?
        .last_insert_rowid();
        replace_tags(&mut tx, id, &tags).await?;
        replace_ingredients(&mut tx, id, &ingredients).await?;
        tx.commit().await?;
        Ok::<i64, AppError>(id)
    }
    .await;

    let id = match result {
        Ok(id) => id,
        Err(e) => {
            if let Some(path) = &image {
                discard_image(&state, path).await;
            }
            return Err(e);
        }
    };

    state.metrics.inc_recipes_created();
    tracing::info!(recipe_id = id, author_id = user.id, "Recipe created");
    Ok((StatusCode::CREATED, Json(load_recipe(&state, id, Some(user.id)).await?)))
}

/// Author id and stored image of a recipe; 404 when it does not exist.
async fn recipe_owner(db: &SqlitePool, recipe_id: i64) -> AppResult<(Option<i64>, Option<String>)> {
    let row = sqlx::query("SELECT author_id, image FROM recipes WHERE id = ?1")
        .bind(recipe_id)
        .fetch_optional(db)
        .await?
        .ok_or_not_found("Recipe")?;
    Ok((row.get("author_id"), row.get("image")))
}

fn ensure_author(author_id: Option<i64>, user_id: i64) -> AppResult<()> {
    if author_id != Some(user_id) {
        return Err(AppError::Forbidden("Only the author can change this recipe".into()));
    }
    Ok(())
}

pub async fn update_recipe(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(req): ApiJson<UpdateRecipeRequest>,
) -> AppResult<Json<RecipeDto>> {
    let (author_id, old_image) = recipe_owner(&state.db, id).await?;
    ensure_author(author_id, user.id)?;

    let name = req.name.as_deref().map(|v| validate_text("name", v, NAME_MAX)).transpose()?;
    let text = req.text.as_deref().map(validate_recipe_text).transpose()?;
    let cooking_time = req.cooking_time.map(validate_cooking_time).transpose()?;
    let ingredients = match &req.ingredients {
        Some(items) => Some(validate_ingredients(&state.db, items).await?),
        None => None,
    };
    let tags = match &req.tags {
        Some(tags) => Some(validate_tags(&state.db, tags).await?),
        None => None,
    };
    if let Some(name) = &name {
        ensure_name_free(&state.db, name, Some(id)).await?;
    }

    let new_image = match req.image.as_deref() {
        Some(data_url) => Some(store_image(&state, data_url).await?),
        None => None,
    };

    let result = async {
        let mut tx = state.db.begin().await?;
        sqlx::query(
            r#"UPDATE recipes SET
                   name = COALESCE(?1, name),
                   text = COALESCE(?2, text),
                   cooking_time = COALESCE(?3, cooking_time),
                   image = COALESCE(?4, image)
               WHERE id = ?5"#,
        )
        .bind(&name)
        .bind(&text)
        .bind(cooking_time)
        .bind(&new_image)
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(map_recipe_write_error)?;
        if let Some(tags) = &tags {
            replace_tags(&mut tx, id, tags).await?;
        }
        if let Some(lines) = &ingredients {
            replace_ingredients(&mut tx, id, lines).await?;
        }
        tx.commit().await?;
        Ok::<(), AppError>(())
    }
    .await;

    match (result, &new_image) {
        (Err(e), Some(path)) => {
            discard_image(&state, path).await;
            return Err(e);
        }
        (Err(e), None) => return Err(e),
        (Ok(()), Some(_)) => {
            if let Some(old) = &old_image {
                discard_image(&state, old).await;
            }
        }
        (Ok(()), None) => {}
    }

    tracing::info!(recipe_id = id, "Recipe updated");
    Ok(Json(load_recipe(&state, id, Some(user.id)).await?))
}

pub async fn delete_recipe(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(id): ApiPath<i64>,
) -> AppResult<StatusCode> {
    let (author_id, image) = recipe_owner(&state.db, id).await?;
    ensure_author(author_id, user.id)?;

    sqlx::query("DELETE FROM recipes WHERE id = ?1").bind(id).execute(&state.db).await?;
    if let Some(path) = &image {
        discard_image(&state, path).await;
    }

    state.metrics.inc_recipes_deleted();
    tracing::info!(recipe_id = id, "Recipe deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flag() {
        assert_eq!(parse_flag("f", None).unwrap(), None);
        assert_eq!(parse_flag("f", Some("1")).unwrap(), Some(true));
        assert_eq!(parse_flag("f", Some("false")).unwrap(), Some(false));
        assert!(parse_flag("f", Some("yes")).is_err());
    }

    #[test]
    fn test_flags_ignored_for_anonymous() {
        let q = RecipeQuery {
            is_favorited: Some("1".into()),
            is_in_shopping_cart: Some("0".into()),
            tags: vec!["lunch".into(), " ".into()],
            ..Default::default()
        };
        let anonymous = RecipeFilter::from_query(&q, None).unwrap();
        assert_eq!(anonymous.favorited_by, None);
        assert_eq!(anonymous.in_cart_of, None);
        assert_eq!(anonymous.tags, vec!["lunch".to_string()]);

        let signed_in = RecipeFilter::from_query(&q, Some(4)).unwrap();
        assert_eq!(signed_in.favorited_by, Some((4, true)));
        assert_eq!(signed_in.in_cart_of, Some((4, false)));
    }

    #[test]
    fn test_filter_sql_shape() {
        let filter = RecipeFilter {
            author: Some(1),
            tags: vec!["a".into(), "b".into()],
            favorited_by: Some((2, true)),
            in_cart_of: Some((2, false)),
        };
        let qb = filter.query("SELECT r.id FROM recipes r");
        let sql = qb.sql();
        assert!(sql.contains("r.author_id = ?"));
        assert!(sql.contains("t.slug IN (?, ?))"));
        assert!(sql.contains("AND EXISTS (SELECT 1 FROM favorites x"));
        assert!(sql.contains("AND NOT EXISTS (SELECT 1 FROM shopping_cart x"));
    }
}
