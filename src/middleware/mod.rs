//! Middleware components for HTTP request processing.
//!
//! Cross-cutting concerns layered onto the router: token authentication
//! extractors, client identification, rate limiting, request validation and
//! security headers.

pub mod auth;
pub mod ip;
pub mod rate_limit;
pub mod security_headers;
pub mod validation;

pub use auth::{CurrentUser, MaybeUser};
pub use rate_limit::EndpointRateLimiter;
