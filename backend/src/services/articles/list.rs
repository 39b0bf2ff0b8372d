use super::run_blocking;
use crate::store::ArticleStore;
use actix_web::{web, HttpResponse, ResponseError};

/// Actix web handler for `GET /api/articles`.
///
/// # Returns
/// - `200 OK` with the JSON array of all articles.
/// - `500 Internal Server Error` if the data file cannot be read.
pub async fn process(store: web::Data<ArticleStore>) -> HttpResponse {
    match run_blocking(&store, |store| store.list_all()).await {
        Ok(articles) => HttpResponse::Ok().json(articles),
        Err(e) => e.error_response(),
    }
}
