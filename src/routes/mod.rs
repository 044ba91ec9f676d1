//! HTTP route handlers for the Foodgram API.
//!
//! - `auth`: token login and logout
//! - `users`: registration, profiles, passwords and subscriptions
//! - `tags`, `ingredients`: reference data
//! - `recipes`: recipe CRUD and filtering
//! - `favorites`: favorite and shopping-cart toggles
//! - `shopping_cart`: the aggregated shopping-list download
//! - `health`: health checks, metrics and build info

use axum::{
    extract::{FromRequest, FromRequestParts},
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use tower_http::services::ServeDir;

use crate::error::AppError;
use crate::middleware;
use crate::state::AppState;

pub mod auth;
pub mod favorites;
pub mod health;
pub mod ingredients;
pub mod recipes;
pub mod shopping_cart;
pub mod tags;
pub mod users;

/// `Json` whose rejections render as the usual JSON error body.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

/// `Path` with JSON error bodies (e.g. `/api/recipes/abc/`).
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct ApiPath<T>(pub T);

/// Query string extractor with JSON error bodies. Repeated keys
/// (`?tags=a&tags=b`) collect into a `Vec`.
#[derive(FromRequestParts)]
#[from_request(via(axum_extra::extract::Query), rejection(AppError))]
pub struct ApiQuery<T>(pub T);

/// Builds the complete application router, including the middleware that
/// depends on the state (per-endpoint limits, security headers).
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/auth/token/login/", post(auth::login))
        .route("/auth/token/logout/", post(auth::logout))
        .route("/users/", get(users::list_users).post(users::register))
        .route("/users/me/", get(users::me).patch(users::update_me))
        .route("/users/set_password/", post(users::set_password))
        .route("/users/subscriptions/", get(users::subscriptions))
        .route("/users/{id}/", get(users::get_user))
        .route("/users/{id}/subscribe/", post(users::subscribe).delete(users::unsubscribe))
        .route("/tags/", get(tags::list_tags).post(tags::create_tag))
        .route("/tags/{id}/", get(tags::get_tag))
        .route("/ingredients/", get(ingredients::list_ingredients).post(ingredients::create_ingredient))
        .route("/ingredients/{id}/", get(ingredients::get_ingredient))
        .route("/recipes/", get(recipes::list_recipes).post(recipes::create_recipe))
        .route("/recipes/download_shopping_cart/", get(shopping_cart::download_shopping_cart))
        .route(
            "/recipes/{id}/",
            get(recipes::get_recipe).patch(recipes::update_recipe).delete(recipes::delete_recipe),
        )
        .route("/recipes/{id}/favorite/", post(favorites::add_favorite).delete(favorites::remove_favorite))
        .route(
            "/recipes/{id}/shopping_cart/",
            post(favorites::add_to_cart).delete(favorites::remove_from_cart),
        );

    let media_mount = state.config.media.url_prefix.trim_end_matches('/').to_string();
    let media = ServeDir::new(&state.config.media.root);

    Router::new()
        .route("/healthz", get(health::healthz))
        .route("/readyz", get(health::readyz))
        .route("/metrics", get(health::metrics))
        .route("/metrics/prometheus", get(health::metrics_prometheus))
        .route("/version", get(health::version))
        .nest("/api", api)
        .nest_service(&media_mount, media)
        .with_state(state.clone())
        .layer(from_fn_with_state(state.rate_limiter.clone(), middleware::rate_limit::endpoint_rate_limit_middleware))
        .layer(from_fn(middleware::validation::validate_request_middleware))
        .layer(from_fn_with_state(state.config.clone(), middleware::security_headers::security_headers_middleware))
}
