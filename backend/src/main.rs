use actix_web::{web, App, HttpServer};
use clap::Parser;
use cms_backend::config::Config;
use cms_backend::maintenance::sweeper;
use cms_backend::services;
use cms_backend::store::{ArticleStore, JsonFileBackend};
use env_logger::Env;
use log::{error, info};
use std::fs;
use std::sync::Arc;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init_from_env(Env::default().default_filter_or("info"));
    let config = Config::parse();

    // Ensure the uploads directory and the data file's directory exist
    let assets = config.asset_dir();
    if let Err(e) = assets.ensure_exists() {
        error!("{}", e);
        return Err(std::io::Error::other(e.to_string()));
    }
    if let Some(parent) = config.data_file.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let backend = Arc::new(JsonFileBackend::new(&config.data_file));
    let store = web::Data::new(ArticleStore::new(backend, assets));

    if let Some(period) = config.sweep_interval() {
        let sweeper_store = store.get_ref().clone();
        info!("Sweeping orphaned uploads every {}s", period.as_secs());
        tokio::spawn(async move {
            sweeper::start_sweeper(sweeper_store, period).await;
        });
    }

    info!(
        "Server running at {} (data: {}, uploads: {})",
        config.url(),
        config.data_file.display(),
        config.uploads_dir.display()
    );

    HttpServer::new(move || App::new().configure(|cfg| services::configure_app(cfg, &store)))
        .bind(config.bind_addr())?
        .run()
        .await
}
