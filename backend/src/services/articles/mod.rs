//! # Article Service Module
//!
//! This module maps the `/api/articles` HTTP surface onto the operations of
//! `crate::store::ArticleStore`. Each handler decodes its request, runs the
//! store operation on actix's blocking pool (the store does synchronous file
//! I/O) and turns the outcome into a response.
//!
//! Errors are rendered by `StoreError`'s `ResponseError` impl, so every
//! failure carries a `{"error": "..."}` body.
//!
//! ## Sub-modules:
//! - `list`, `get`: read-only endpoints.
//! - `create`, `update`, `delete`: mutating endpoints.
//! - `payload`: JSON / multipart body decoding shared by `create` and `update`.

mod create;
mod delete;
mod get;
mod list;
mod payload;
mod update;

use crate::error::{Result, StoreError};
use crate::store::ArticleStore;
use actix_web::web::{self, delete, get, patch, post, put, scope};
use actix_web::Scope;

/// The base path for all article API endpoints.
const API_PATH: &str = "/api/articles";

/// Configures and returns the Actix `Scope` for all article routes.
///
/// # Registered Routes:
///
/// *   **`GET /`**: every article, in stored order (`200`).
/// *   **`POST /`**: create from JSON or multipart form (`201`).
/// *   **`GET /{article_id}`**: one article (`200`, `404`).
/// *   **`PUT /{article_id}`** and **`PATCH /{article_id}`**: partial update,
///     optionally replacing the image (`200`, `404`).
/// *   **`DELETE /{article_id}`**: remove the article and its image (`204`, `404`).
pub fn configure_routes() -> Scope {
    scope(API_PATH)
        .route("", get().to(list::process))
        .route("", post().to(create::process))
        .route("/{article_id}", get().to(get::process))
        .route("/{article_id}", put().to(update::process))
        .route("/{article_id}", patch().to(update::process))
        .route("/{article_id}", delete().to(delete::process))
}

/// Runs a store operation on the blocking thread pool.
async fn run_blocking<T, F>(store: &web::Data<ArticleStore>, op: F) -> Result<T>
where
    F: FnOnce(&ArticleStore) -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    let store = store.clone();
    web::block(move || op(store.get_ref())).await.map_err(|e| {
        StoreError::storage("running store operation", std::io::Error::other(e.to_string()))
    })?
}
