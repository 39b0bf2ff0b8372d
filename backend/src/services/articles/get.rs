use super::run_blocking;
use crate::store::ArticleStore;
use actix_web::{web, HttpResponse, ResponseError};

/// Actix web handler for `GET /api/articles/{article_id}`.
///
/// # Returns
/// - `200 OK` with the article as JSON.
/// - `404 Not Found` with `{"error": "Article not found"}`.
pub async fn process(
    article_id: web::Path<String>,
    store: web::Data<ArticleStore>,
) -> HttpResponse {
    let id = article_id.into_inner();
    match run_blocking(&store, move |store| store.get(&id)).await {
        Ok(article) => HttpResponse::Ok().json(article),
        Err(e) => e.error_response(),
    }
}
