use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    response::Response,
    Router,
};
use http_body_util::BodyExt; // for .collect()
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use crate::{config::AppConfig, routes, state::AppState};

/// 1x1 transparent PNG.
pub const PIXEL_PNG: &str = "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNk+M9QDwADhgGAWjR9awAAAABJRU5ErkJggg==";

pub const PASSWORD: &str = "s3cret-Pass";

pub struct TestApp {
    pub app: Router,
    pub state: AppState,
    pub dir: TempDir,
}

pub async fn setup_test_app() -> TestApp {
    let dir = TempDir::new().unwrap();
    let db_url = format!("sqlite://{}", dir.path().join("test.db").display());

    let mut config = AppConfig::default();
    config.database.url = db_url.clone();
    config.media.root = dir.path().join("media").display().to_string();

    let pool = crate::db::connect(&db_url, 4).await.unwrap();
    crate::db::init_db(&pool).await.unwrap();

    let state = AppState::new(pool, config);
    let app = routes::router(state.clone());
    TestApp { app, state, dir }
}

impl TestApp {
    pub async fn raw(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Token {}", token));
        }
        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        self.app.clone().oneshot(builder.body(body).unwrap()).await.unwrap()
    }

    /// Sends a request and decodes the JSON body (`Value::Null` when empty).
    pub async fn call(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let response = self.raw(method, uri, token, body).await;
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
        (status, value)
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.call(Method::GET, uri, token, None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.call(Method::POST, uri, token, Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.call(Method::DELETE, uri, token, None).await
    }

    pub async fn text(&self, uri: &str, token: Option<&str>) -> (StatusCode, String) {
        let response = self.raw(Method::GET, uri, token, None).await;
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    /// Registers `username` (email `<username>@example.com`) and returns `(id, token)`.
    pub async fn signup(&self, username: &str) -> (i64, String) {
        let (status, user) = self
            .post(
                "/api/users/",
                None,
                json!({
                    "email": format!("{}@example.com", username),
                    "username": username,
                    "first_name": "Test",
                    "last_name": "Cook",
                    "password": PASSWORD,
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "signup failed: {}", user);
        let token = self.login(&format!("{}@example.com", username), PASSWORD).await;
        (user["id"].as_i64().unwrap(), token)
    }

    pub async fn login(&self, email: &str, password: &str) -> String {
        let (status, body) =
            self.post("/api/auth/token/login/", None, json!({ "email": email, "password": password })).await;
        assert_eq!(status, StatusCode::OK, "login failed: {}", body);
        body["auth_token"].as_str().unwrap().to_string()
    }

    pub async fn make_staff(&self, user_id: i64) {
        sqlx::query("UPDATE users SET is_staff = 1 WHERE id = ?1")
            .bind(user_id)
            .execute(&self.state.db)
            .await
            .unwrap();
    }

    pub async fn tag(&self, slug: &str, color: &str) -> i64 {
        sqlx::query("INSERT INTO tags (name, color, slug) VALUES (?1, ?2, ?3)")
            .bind(format!("Tag {}", slug))
            .bind(color)
            .bind(slug)
            .execute(&self.state.db)
            .await
            .unwrap()
            .last_insert_rowid()
    }

    pub async fn ingredient(&self, name: &str, unit: &str) -> i64 {
        sqlx::query("INSERT INTO ingredients (name, measurement_unit) VALUES (?1, ?2)")
            .bind(name)
            .bind(unit)
            .execute(&self.state.db)
            .await
            .unwrap()
            .last_insert_rowid()
    }

    /// Creates a recipe through the API and returns its id.
    pub async fn recipe(&self, token: &str, name: &str, tags: &[i64], ingredients: &[(i64, i64)]) -> i64 {
        let ingredients: Vec<Value> = ingredients.iter().map(|(id, amount)| json!({"id": id, "amount": amount})).collect();
        let (status, body) = self
            .post(
                "/api/recipes/",
                Some(token),
                json!({
                    "ingredients": ingredients,
                    "tags": tags,
                    "name": name,
                    "text": "Mix everything.",
                    "cooking_time": 15,
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "recipe creation failed: {}", body);
        body["id"].as_i64().unwrap()
    }
}
