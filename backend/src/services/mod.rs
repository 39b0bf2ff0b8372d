pub mod articles;
pub mod uploads;

use crate::store::ArticleStore;
use actix_web::web;

/// Registers the article API and the uploads file server on an app.
pub fn configure_app(cfg: &mut web::ServiceConfig, store: &web::Data<ArticleStore>) {
    cfg.app_data(store.clone())
        .service(articles::configure_routes())
        .service(uploads::configure_files(store.assets()));
}
