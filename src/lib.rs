//! # Foodgram Backend Library
//!
//! Core library of Foodgram, a recipe-sharing service. Users publish recipes
//! built from a shared ingredient catalogue, tag them, bookmark favorites,
//! follow other authors and collect recipes in a shopping cart whose
//! ingredients can be downloaded as one aggregated shopping list.
//!
//! ## Architecture
//!
//! - **Axum**: HTTP server and routing
//! - **SQLx**: asynchronous SQLite access
//! - **Tokio**: async runtime
//! - **Serde**: JSON request and response bodies
//!
//! ## Core Components
//!
//! - [`auth`]: password hashing and token bookkeeping
//! - [`config`]: layered application configuration
//! - [`db`]: connection pool and schema initialization
//! - [`error`]: centralized error handling and HTTP error responses
//! - [`media`]: recipe image decoding and storage
//! - [`metrics`]: usage counters
//! - [`middleware`]: authentication extractors, rate limiting, validation, security headers
//! - [`pagination`]: page-number pagination for list endpoints
//! - [`routes`]: HTTP API endpoint handlers
//! - [`seed`]: reference-data loading (default tags, ingredient CSV, staff rights)
//! - [`shopping_list`]: shopping-list aggregation and rendering
//! - [`state`]: shared application state
//! - [`types`]: data transfer objects

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod media;
pub mod metrics;
pub mod middleware;
pub mod pagination;
pub mod routes;
pub mod seed;
pub mod shopping_list;
pub mod state;
pub mod types;

#[cfg(test)]
mod tests;
