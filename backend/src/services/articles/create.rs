use super::payload::read_new_article;
use super::run_blocking;
use crate::store::ArticleStore;
use actix_web::{web, HttpRequest, HttpResponse, ResponseError};

/// Actix web handler for `POST /api/articles`.
///
/// Accepts a JSON object `{title, content}` or a multipart form with the
/// same text fields plus an optional `image` file.
///
/// # Returns
/// - `201 Created` with the new article, including its generated `id`.
/// - `400 Bad Request` if the body is malformed or the image is rejected.
pub async fn process(
    req: HttpRequest,
    payload: web::Payload,
    store: web::Data<ArticleStore>,
) -> HttpResponse {
    let (fields, upload) = match read_new_article(&req, payload, store.assets()).await {
        Ok(decoded) => decoded,
        Err(e) => return e.error_response(),
    };

    match run_blocking(&store, move |store| store.create(fields, upload)).await {
        Ok(article) => HttpResponse::Created().json(article),
        Err(e) => e.error_response(),
    }
}
