use super::payload::read_patch;
use super::run_blocking;
use crate::store::ArticleStore;
use actix_web::{web, HttpRequest, HttpResponse, ResponseError};

/// Actix web handler for `PUT` and `PATCH /api/articles/{article_id}`.
///
/// Only the fields present in the body are changed. An `image` file part
/// replaces the current image; `"image": null` in a JSON body removes it.
///
/// # Returns
/// - `200 OK` with the updated article.
/// - `404 Not Found` if the id does not exist.
/// - `400 Bad Request` if the body is malformed or the image is rejected.
pub async fn process(
    req: HttpRequest,
    article_id: web::Path<String>,
    payload: web::Payload,
    store: web::Data<ArticleStore>,
) -> HttpResponse {
    let (patch, upload) = match read_patch(&req, payload, store.assets()).await {
        Ok(decoded) => decoded,
        Err(e) => return e.error_response(),
    };

    let id = article_id.into_inner();
    match run_blocking(&store, move |store| store.update(&id, patch, upload)).await {
        Ok(article) => HttpResponse::Ok().json(article),
        Err(e) => e.error_response(),
    }
}
