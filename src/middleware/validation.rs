use axum::{
    extract::Request,
    http::{header, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::error::{AppError, AppResult};

/// Usernames that would collide with routes or read as privileged.
pub const RESERVED_USERNAMES: [&str; 3] = ["me", "admin", "user"];

/// Rejects requests with traversal sequences in the path and oversized bodies.
pub async fn validate_request_middleware(req: Request, next: Next) -> Response {
    if contains_path_traversal(req.uri().path()) {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "error": {
                    "code": "INVALID_PATH",
                    "message": "Path traversal detected in request",
                },
                "status": 400,
            })),
        )
            .into_response();
    }

    if matches!(req.method(), &Method::POST | &Method::PUT | &Method::PATCH) {
        let length = req
            .headers()
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<usize>().ok());
        if let Some(length) = length {
            let max_body_size = max_body_size();
            if length > max_body_size {
                return (
                    StatusCode::PAYLOAD_TOO_LARGE,
                    Json(json!({
                        "error": {
                            "code": "PAYLOAD_TOO_LARGE",
                            "message": format!("Request body exceeds maximum size of {} bytes", max_body_size),
                        },
                        "status": 413,
                    })),
                )
                    .into_response();
            }
        }
    }

    next.run(req).await
}

/// Body limit shared with the `DefaultBodyLimit` layer in `main`.
pub fn max_body_size() -> usize {
    std::env::var("FOODGRAM_MAX_BODY_SIZE")
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(10 * 1024 * 1024)
        .clamp(1024 * 1024, 50 * 1024 * 1024)
}

fn contains_path_traversal(path: &str) -> bool {
    let lower = path.to_lowercase();

    if path.contains("/..") || path.contains("\\..") || path.starts_with("..") {
        return true;
    }
    if path.contains("/./") || path.contains("....") {
        return true;
    }

    // URL-encoded variants (single and double encoding)
    let encoded_patterns = ["%2e%2e", "%252e%252e", "%2e/", "/%2e", "%2f%2e", "%5c%2e", "%00"];
    if encoded_patterns.iter().any(|p| lower.contains(p)) {
        return true;
    }

    path.contains('\0')
}

/// Trims `value` and checks it is non-empty and at most `max` characters.
pub fn validate_text(field: &str, value: &str, max: usize) -> AppResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::field(field, "This field may not be blank"));
    }
    if trimmed.chars().count() > max {
        return Err(AppError::field(field, format!("Ensure this field has no more than {} characters", max)));
    }
    // single-line fields: no control characters, line breaks included
    if trimmed.chars().any(char::is_control) {
        return Err(AppError::field(field, "Control characters and line breaks are not allowed"));
    }
    Ok(trimmed.to_string())
}

/// Latin letters, digits and `@ . + - _`, not a reserved name.
pub fn validate_username(value: &str) -> AppResult<String> {
    let username = validate_text("username", value, 150)?;
    if !username.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_')) {
        return Err(AppError::field("username", "Username may contain only latin letters, digits and @/./+/-/_"));
    }
    if RESERVED_USERNAMES.contains(&username.to_lowercase().as_str()) {
        return Err(AppError::field("username", format!("Username '{}' is not allowed", username)));
    }
    Ok(username)
}

pub fn validate_email(value: &str) -> AppResult<String> {
    let email = validate_text("email", value, 254)?;
    let invalid = || AppError::field("email", "Enter a valid email address");
    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
    if local.is_empty() || domain.contains('@') || email.chars().any(char::is_whitespace) {
        return Err(invalid());
    }
    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 || labels.iter().any(|l| l.is_empty()) {
        return Err(invalid());
    }
    Ok(email)
}

pub fn validate_password(field: &str, value: &str) -> AppResult<()> {
    if value.is_empty() {
        return Err(AppError::field(field, "This field may not be blank"));
    }
    if value.chars().count() > 150 {
        return Err(AppError::field(field, "Ensure this field has no more than 150 characters"));
    }
    Ok(())
}

/// `#RRGGBB`, normalised to upper case.
pub fn validate_hex_color(value: &str) -> AppResult<String> {
    let color = value.trim();
    let valid = color.len() == 7
        && color.starts_with('#')
        && color[1..].chars().all(|c| c.is_ascii_hexdigit());
    if !valid {
        return Err(AppError::field("color", "Enter a hex color like #49B64E"));
    }
    Ok(color.to_ascii_uppercase())
}

pub fn validate_slug(value: &str) -> AppResult<String> {
    let slug = validate_text("slug", value, 50)?;
    if !slug.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
        return Err(AppError::field("slug", "Slug may contain only latin letters, digits, '-' and '_'"));
    }
    Ok(slug)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_traversal_detection() {
        assert!(contains_path_traversal("/media/../secret"));
        assert!(contains_path_traversal("/media/%2e%2e/secret"));
        assert!(contains_path_traversal("/api/./recipes"));
        assert!(!contains_path_traversal("/api/recipes/1/"));
        assert!(!contains_path_traversal("/media/recipes/images/a.png"));
    }

    #[test]
    fn test_username_rules() {
        assert_eq!(validate_username("  chef.bob+1 ").unwrap(), "chef.bob+1");
        assert!(validate_username("me").is_err());
        assert!(validate_username("Admin").is_err());
        assert!(validate_username("bad name").is_err());
        assert!(validate_username("шеф").is_err());
        assert!(validate_username("café").is_err());
        assert!(validate_username("chef_２").is_err());
        assert!(validate_username("").is_err());
        assert!(validate_username(&"a".repeat(151)).is_err());
    }

    #[test]
    fn test_email_rules() {
        assert!(validate_email("cook@example.com").is_ok());
        assert!(validate_email("cook@example").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("a@b@c.com").is_err());
        assert!(validate_email("a b@c.com").is_err());
    }

    #[test]
    fn test_text_rejects_line_breaks() {
        assert_eq!(validate_text("name", "  Rye flour ", 150).unwrap(), "Rye flour");
        assert!(validate_text("name", "flour\n* caviar (kg) - 999", 150).is_err());
        assert!(validate_text("name", "flour\r\nsalt", 150).is_err());
        assert!(validate_text("name", "flour\tsalt", 150).is_err());
        assert!(validate_text("name", "nul\0byte", 150).is_err());
        // surrounding whitespace is trimmed, not rejected
        assert_eq!(validate_text("name", "\tflour\n", 150).unwrap(), "flour");
    }

    #[test]
    fn test_hex_color() {
        assert_eq!(validate_hex_color("#e26c2d").unwrap(), "#E26C2D");
        assert!(validate_hex_color("E26C2D").is_err());
        assert!(validate_hex_color("#E26C2").is_err());
        assert!(validate_hex_color("#GGGGGG").is_err());
    }

    #[test]
    fn test_slug() {
        assert!(validate_slug("breakfast_1-a").is_ok());
        assert!(validate_slug("завтрак").is_err());
        assert!(validate_slug("a b").is_err());
    }
}
