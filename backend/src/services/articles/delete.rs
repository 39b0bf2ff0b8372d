use super::run_blocking;
use crate::store::ArticleStore;
use actix_web::{web, HttpResponse, ResponseError};

/// Actix web handler for `DELETE /api/articles/{article_id}`.
///
/// # Returns
/// - `204 No Content` once the article (and its image) are gone.
/// - `404 Not Found` if the id does not exist.
pub async fn process(
    article_id: web::Path<String>,
    store: web::Data<ArticleStore>,
) -> HttpResponse {
    let id = article_id.into_inner();
    match run_blocking(&store, move |store| store.delete(&id)).await {
        Ok(()) => HttpResponse::NoContent().finish(),
        Err(e) => e.error_response(),
    }
}
