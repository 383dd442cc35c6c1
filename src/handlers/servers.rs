// src/handlers/servers.rs
use actix_web::{web, HttpResponse};
use log::debug;

use crate::status::StatusService;
use crate::storage::memory::ServerRegistry;
use crate::utils::RequestError;

pub async fn get_servers(registry: web::Data<ServerRegistry>) -> HttpResponse {
    let servers = registry.list();
    debug!("Listing {} servers", servers.len());
    HttpResponse::Ok().json(servers)
}

pub async fn get_server_status(
    path: web::Path<String>,
    registry: web::Data<ServerRegistry>,
    status: web::Data<StatusService>,
) -> Result<HttpResponse, RequestError> {
    let server_name = path.into_inner();

    // A fresh snapshot is served without touching the registry.
    if let Some(snapshot) = status.cached(&server_name) {
        return Ok(HttpResponse::Ok().json(&*snapshot));
    }

    let server = registry
        .get(&server_name)
        .ok_or_else(|| RequestError::UnknownServer(server_name.clone()))?;
    let snapshot = status.status(&server).await;
    Ok(HttpResponse::Ok().json(&*snapshot))
}

#[cfg(test)]
mod tests {
    use crate::handlers::tests::{test_app_data, Fixture};
    use actix_web::http::StatusCode;
    use actix_web::{test, App};
    use serde_json::Value;

    #[actix_web::test]
    async fn lists_servers_by_name() {
        let fixture = Fixture::online().with_map("Survival", "http://maps.local");
        let app = test::init_service(App::new().configure(test_app_data(&fixture))).await;

        let req = test::TestRequest::get().uri("/api/servers").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;

        let names: Vec<&str> = body
            .as_array()
            .expect("array")
            .iter()
            .filter_map(|s| s["name"].as_str())
            .collect();
        assert_eq!(names, vec!["Legacy", "Survival"]);
        assert_eq!(body[1]["mapUrl"], "http://maps.local");
    }

    #[actix_web::test]
    async fn status_of_online_server() {
        let fixture = Fixture::online();
        let app = test::init_service(App::new().configure(test_app_data(&fixture))).await;

        let req = test::TestRequest::get()
            .uri("/api/servers/Survival/status")
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body["online"], true);
        assert_eq!(body["players"], 1);
        assert_eq!(body["maxPlayers"], 20);
        assert_eq!(body["samplePlayers"][0]["name"], "Alex");
        assert!(body.get("error").is_none());
    }

    #[actix_web::test]
    async fn failed_status_is_served_from_cache() {
        let fixture = Fixture::failing();
        let app = test::init_service(App::new().configure(test_app_data(&fixture))).await;

        for _ in 0..3 {
            let req = test::TestRequest::get()
                .uri("/api/servers/Survival/status")
                .to_request();
            let body: Value = test::call_and_read_body_json(&app, req).await;
            assert_eq!(body["online"], false);
            assert_eq!(body["error"], "protocol error: connection refused");
        }
        assert_eq!(fixture.protocol.calls(), 1);
    }

    #[actix_web::test]
    async fn disabled_server_reports_offline() {
        let fixture = Fixture::online();
        let app = test::init_service(App::new().configure(test_app_data(&fixture))).await;

        let req = test::TestRequest::get()
            .uri("/api/servers/Legacy/status")
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["online"], false);
        assert_eq!(body["error"], "Server is currently disabled.");
        assert_eq!(fixture.protocol.calls(), 0);
    }

    #[actix_web::test]
    async fn unknown_server_is_not_found() {
        let fixture = Fixture::online();
        let app = test::init_service(App::new().configure(test_app_data(&fixture))).await;

        let req = test::TestRequest::get()
            .uri("/api/servers/Nowhere/status")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
