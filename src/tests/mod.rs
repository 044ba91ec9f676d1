//! Integration and unit tests for the Foodgram backend.
//!
//! ## Test Modules
//!
//! - **common**: shared fixture (temporary database + media dir) and request helpers
//! - **health_api_tests**: health checks, metrics and security headers
//! - **users_api_tests**: registration, tokens, profiles and passwords
//! - **recipes_api_tests**: recipe CRUD, validation, filters and pagination
//! - **relations_api_tests**: favorites, shopping cart and subscriptions
//! - **shopping_list_api_tests**: the aggregated shopping-list download
//! - **error_tests**: error mapping and response bodies
//! - **config_tests**: configuration loading and validation
//! - **db_tests**: schema and constraint behavior
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test
//! cargo test recipes_api_tests
//! ```

pub mod common;
pub mod health_api_tests;
pub mod relations_api_tests;
pub mod shopping_list_api_tests;
