// src/main.rs
mod config;
mod handlers;
mod models;
mod status;
mod storage;
mod utils;

use actix_web::{web, App, HttpServer};
use env_logger::Env;
use log::info;
use std::sync::Arc;

use crate::config::Config;
use handlers::map_proxy::MapProxy;
use status::players::SupplementalPlayerFetcher;
use status::protocol::ServerListPing;
use status::querier::StatusQuerier;
use status::resolver::{AddressResolver, HickoryLookup};
use status::StatusService;
use storage::cache::StatusCache;
use storage::memory::ServerRegistry;

fn io_error(context: &str, e: impl std::fmt::Display) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::Other, format!("{}: {}", context, e))
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(Env::default().default_filter_or("info"));

    let config = Config::from_env();

    let registry = web::Data::new(ServerRegistry::load(&config.registry_path)?);

    // The cache lives for the whole process and is shared by every worker.
    let cache = Arc::new(StatusCache::from_config(&config));

    let http_client = reqwest::Client::builder()
        .build()
        .map_err(|e| io_error("Failed to build HTTP client", e))?;
    let status = web::Data::new(StatusService::new(
        Arc::clone(&cache),
        AddressResolver::new(Arc::new(HickoryLookup::from_system())),
        StatusQuerier::new(Arc::new(ServerListPing), config.query_timeout()),
        SupplementalPlayerFetcher::new(http_client, config.supplemental_timeout()),
    ));

    let proxy = web::Data::new(
        MapProxy::new(config.proxy_connect_timeout())
            .map_err(|e| io_error("Failed to build proxy client", e))?,
    );

    let bind = config.bind();
    info!("Serving {} servers, starting server on {}", registry.len(), bind);
    HttpServer::new(move || {
        App::new()
            .app_data(registry.clone())
            .app_data(status.clone())
            .app_data(proxy.clone())
            .configure(handlers::configure)
    })
    .bind(&bind)?
    .run()
    .await
}
