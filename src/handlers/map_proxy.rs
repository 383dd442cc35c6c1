// src/handlers/map_proxy.rs
use actix_web::http::header::{self, HeaderName, HeaderValue};
use actix_web::http::StatusCode;
use actix_web::{web, HttpRequest, HttpResponse};
use log::{debug, error};
use reqwest::Url;
use std::io;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;

use crate::storage::memory::ServerRegistry;
use crate::utils::{is_hop_by_hop, log_all_headers, RequestError};

/// Removes the `/<server_name>/map` prefix from a raw request path. The
/// prefix may arrive literally or with the server name percent-encoded; an
/// empty remainder becomes `/`.
pub fn strip_map_prefix(raw_path: &str, server_name: &str) -> String {
    let literal = format!("/{}/map", server_name);
    let rest = raw_path.strip_prefix(literal.as_str()).or_else(|| {
        // Encoded form: skip the first segment whatever its spelling.
        let (_, tail) = raw_path.strip_prefix('/')?.split_once('/')?;
        tail.strip_prefix("map")
            .filter(|rest| rest.is_empty() || rest.starts_with('/'))
    });

    match rest {
        Some("") | None => "/".to_string(),
        Some(rest) => rest.to_string(),
    }
}

/// Points `path` and `query` at the backend's scheme and authority. The
/// backend base URL's own path is not kept.
pub fn backend_url(base: &Url, path: &str, query: &str) -> Url {
    let mut url = base.clone();
    url.set_path(path);
    url.set_query(if query.is_empty() { None } else { Some(query) });
    url.set_fragment(None);
    url
}

fn parse_backend(server_name: &str, raw: &str) -> Result<Url, RequestError> {
    let url = Url::parse(raw).map_err(|e| {
        error!("Invalid map URL for server {}: {}", server_name, e);
        RequestError::InvalidBackendUrl(raw.to_string())
    })?;
    match url.scheme() {
        "http" | "https" if url.host_str().is_some() => Ok(url),
        _ => {
            error!("Unsupported map URL for server {}: {}", server_name, raw);
            Err(RequestError::InvalidBackendUrl(raw.to_string()))
        }
    }
}

/// Relays the caller's body chunk by chunk. `Payload` is tied to the worker
/// thread, so a local task feeds it into a channel the client can send from.
fn stream_request_body(mut payload: web::Payload) -> reqwest::Body {
    let (tx, rx) = mpsc::channel::<Result<web::Bytes, io::Error>>(16);
    actix_web::rt::spawn(async move {
        while let Some(chunk) = payload.next().await {
            let chunk = chunk.map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()));
            let failed = chunk.is_err();
            if tx.send(chunk).await.is_err() || failed {
                break;
            }
        }
    });
    reqwest::Body::wrap_stream(ReceiverStream::new(rx))
}

/// Whether the caller announced a body. Bodiless requests go out without one
/// rather than as an empty chunked stream.
fn has_body(req: &HttpRequest) -> bool {
    let headers = req.headers();
    headers.contains_key(header::TRANSFER_ENCODING)
        || headers
            .get(header::CONTENT_LENGTH)
            .and_then(|len| len.to_str().ok())
            .map_or(false, |len| len.trim() != "0")
}

/// Reverse proxy from `/<server>/map/...` to the server's map backend.
pub struct MapProxy {
    client: reqwest::Client,
}

impl MapProxy {
    pub fn new(connect_timeout: Duration) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .connect_timeout(connect_timeout)
            .build()?;
        Ok(Self { client })
    }

    async fn forward(
        &self,
        req: &HttpRequest,
        payload: web::Payload,
        target: Url,
    ) -> Result<HttpResponse, RequestError> {
        let method = reqwest::Method::from_bytes(req.method().as_str().as_bytes())
            .map_err(|e| RequestError::InvalidRequest(e.to_string()))?;

        let mut headers = reqwest::header::HeaderMap::new();
        for (name, value) in req.headers() {
            let name = name.as_str();
            if name == "host" || name == "content-length" || is_hop_by_hop(name) {
                continue;
            }
            if let (Ok(name), Ok(value)) = (
                reqwest::header::HeaderName::from_bytes(name.as_bytes()),
                reqwest::header::HeaderValue::from_bytes(value.as_bytes()),
            ) {
                headers.append(name, value);
            }
        }

        debug!("Proxying {} {} -> {}", req.method(), req.uri(), target);
        let mut request = self.client.request(method, target.clone()).headers(headers);
        if has_body(req) {
            request = request.body(stream_request_body(payload));
        }
        let response = request
            .send()
            .await
            .map_err(|e| {
                error!("Map backend {} failed: {}", target, e);
                RequestError::BackendUnreachable(e.to_string())
            })?;

        let status = StatusCode::from_u16(response.status().as_u16())
            .map_err(|e| RequestError::BackendUnreachable(e.to_string()))?;
        let mut builder = HttpResponse::build(status);
        for (name, value) in response.headers() {
            if name.as_str() == "content-length" || is_hop_by_hop(name.as_str()) {
                continue;
            }
            if let (Ok(name), Ok(value)) = (
                HeaderName::from_bytes(name.as_str().as_bytes()),
                HeaderValue::from_bytes(value.as_bytes()),
            ) {
                builder.append_header((name, value));
            }
        }
        if let Some(len) = response.content_length() {
            builder.no_chunking(len);
        }

        // Dropping the body stream (caller gone) drops the backend request.
        Ok(builder.streaming(response.bytes_stream()))
    }
}

pub async fn proxy_map(
    req: HttpRequest,
    payload: web::Payload,
    registry: web::Data<ServerRegistry>,
    proxy: web::Data<MapProxy>,
) -> Result<HttpResponse, RequestError> {
    log_all_headers(&req);

    let server_name = req
        .match_info()
        .get("server_name")
        .unwrap_or_default()
        .to_string();

    let server = registry
        .get(&server_name)
        .ok_or_else(|| RequestError::UnknownServer(server_name.clone()))?;
    let base = match server.map_backend() {
        Some(base) => parse_backend(&server_name, base)?,
        None => return Err(RequestError::MapNotConfigured(server_name)),
    };

    let path = strip_map_prefix(req.uri().path(), &server_name);
    let target = backend_url(&base, &path, req.query_string());
    proxy.forward(&req, payload, target).await
}
