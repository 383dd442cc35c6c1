// src/utils.rs
use actix_web::{HttpRequest, HttpResponse, ResponseError};
use log::debug;
use std::fmt;

#[derive(Debug)]
pub enum RequestError {
    UnknownServer(String),
    MapNotConfigured(String),
    InvalidBackendUrl(String),
    InvalidRequest(String),
    BackendUnreachable(String),
}

impl fmt::Display for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownServer(_) => write!(f, "Server not found"),
            Self::MapNotConfigured(_) => write!(f, "Map URL not configured for this server"),
            Self::InvalidBackendUrl(_) => write!(f, "Internal Server Error"),
            Self::InvalidRequest(reason) => write!(f, "Invalid request: {}", reason),
            Self::BackendUnreachable(_) => write!(f, "Map backend unavailable"),
        }
    }
}

impl ResponseError for RequestError {
    fn error_response(&self) -> HttpResponse {
        match self {
            Self::UnknownServer(_) | Self::MapNotConfigured(_) => {
                HttpResponse::NotFound().body(self.to_string())
            }
            Self::InvalidBackendUrl(_) => {
                HttpResponse::InternalServerError().body(self.to_string())
            }
            Self::InvalidRequest(_) => HttpResponse::BadRequest().body(self.to_string()),
            Self::BackendUnreachable(_) => HttpResponse::BadGateway().body(self.to_string()),
        }
    }
}

/// Dumps every request header at debug level.
pub fn log_all_headers(req: &HttpRequest) {
    debug!("All request headers for {} {}:", req.method(), req.uri());
    for (name, value) in req.headers() {
        debug!("{}: {:?}", name, value);
    }
}

/// Headers that describe a single connection and must not be relayed by a
/// proxy in either direction.
pub fn is_hop_by_hop(name: &str) -> bool {
    matches!(
        name.to_ascii_lowercase().as_str(),
        "connection"
            | "keep-alive"
            | "proxy-authenticate"
            | "proxy-authorization"
            | "proxy-connection"
            | "te"
            | "trailer"
            | "transfer-encoding"
            | "upgrade"
    )
}
