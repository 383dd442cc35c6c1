pub mod index;
pub mod map_proxy;
pub mod servers;

use actix_web::web;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(index::health))
        .route("/api/servers", web::get().to(servers::get_servers))
        .route(
            "/api/servers/{server_name}/status",
            web::get().to(servers::get_server_status),
        )
        .route("/{server_name}/map", web::route().to(map_proxy::proxy_map))
        .route(
            "/{server_name}/map/{tail:.*}",
            web::route().to(map_proxy::proxy_map),
        );
}
