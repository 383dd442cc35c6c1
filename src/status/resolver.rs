// src/status/resolver.rs
use async_trait::async_trait;
use hickory_resolver::{
    config::{ResolverConfig, ResolverOpts},
    TokioAsyncResolver,
};
use log::{debug, warn};
use std::fmt;
use std::sync::Arc;

pub const DEFAULT_PORT: u16 = 25565;
pub const SRV_SERVICE: &str = "minecraft";
pub const SRV_PROTOCOL: &str = "tcp";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionSource {
    ExplicitPort,
    ServiceDiscovery,
    Default,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedEndpoint {
    pub host: String,
    pub port: u16,
    pub source: ResolutionSource,
}

impl fmt::Display for ResolvedEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SrvRecord {
    pub priority: u16,
    pub weight: u16,
    pub port: u16,
    pub target: String,
}

#[derive(Debug)]
pub struct LookupError(pub String);

impl fmt::Display for LookupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SRV lookup failed: {}", self.0)
    }
}

impl std::error::Error for LookupError {}

/// Service-discovery backend. `name` is the full query name, e.g.
/// `_minecraft._tcp.example.com`.
#[async_trait]
pub trait SrvLookup: Send + Sync {
    async fn lookup_srv(&self, name: &str) -> Result<Vec<SrvRecord>, LookupError>;
}

pub struct HickoryLookup {
    resolver: TokioAsyncResolver,
}

impl HickoryLookup {
    /// Uses the system resolver configuration, falling back to the library
    /// defaults when it cannot be read.
    pub fn from_system() -> Self {
        let resolver = match TokioAsyncResolver::tokio_from_system_conf() {
            Ok(resolver) => resolver,
            Err(e) => {
                warn!("Could not read system DNS configuration, using defaults: {}", e);
                TokioAsyncResolver::tokio(ResolverConfig::default(), ResolverOpts::default())
            }
        };
        Self { resolver }
    }
}

#[async_trait]
impl SrvLookup for HickoryLookup {
    async fn lookup_srv(&self, name: &str) -> Result<Vec<SrvRecord>, LookupError> {
        let lookup = self
            .resolver
            .srv_lookup(name)
            .await
            .map_err(|e| LookupError(e.to_string()))?;

        Ok(lookup
            .iter()
            .map(|srv| SrvRecord {
                priority: srv.priority(),
                weight: srv.weight(),
                port: srv.port(),
                target: srv.target().to_utf8(),
            })
            .collect())
    }
}

/// Splits `host:port` style input. Returns the host and the port if one was
/// given and parsed; `None` for the outer option means no port was written at
/// all, so discovery applies.
fn split_explicit_port(address: &str) -> Option<(String, Option<u16>)> {
    if let Some(rest) = address.strip_prefix('[') {
        let (host, tail) = rest.split_once(']')?;
        return match tail.strip_prefix(':') {
            Some(port) => Some((host.to_string(), port.parse().ok())),
            None if tail.is_empty() => None,
            None => Some((address.to_string(), None)),
        };
    }

    match address.matches(':').count() {
        0 => None,
        1 => {
            let (host, port) = address.split_once(':')?;
            Some((host.to_string(), port.parse().ok()))
        }
        // Unbracketed IPv6 literal.
        _ => Some((address.to_string(), None)),
    }
}

fn bare_host(address: &str) -> &str {
    address
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .unwrap_or(address)
}

pub struct AddressResolver {
    lookup: Arc<dyn SrvLookup>,
}

impl AddressResolver {
    pub fn new(lookup: Arc<dyn SrvLookup>) -> Self {
        Self { lookup }
    }

    /// Always yields an endpoint: an explicit port wins, then the
    /// highest-priority SRV record, then the default port.
    pub async fn resolve(&self, address: &str) -> ResolvedEndpoint {
        let address = address.trim();

        if let Some((host, port)) = split_explicit_port(address) {
            return match port {
                Some(port) => ResolvedEndpoint {
                    host,
                    port,
                    source: ResolutionSource::ExplicitPort,
                },
                None => {
                    debug!("Ignoring malformed port in address {:?}", address);
                    ResolvedEndpoint {
                        host,
                        port: DEFAULT_PORT,
                        source: ResolutionSource::Default,
                    }
                }
            };
        }

        let host = bare_host(address);
        let query = format!("_{}._{}.{}", SRV_SERVICE, SRV_PROTOCOL, host);
        match self.lookup.lookup_srv(&query).await {
            Ok(records) => {
                if let Some(record) = records.iter().min_by_key(|r| r.priority) {
                    let target = record.target.strip_suffix('.').unwrap_or(&record.target);
                    debug!(
                        "SRV {} -> {}:{} (priority {}, weight {})",
                        query, target, record.port, record.priority, record.weight
                    );
                    return ResolvedEndpoint {
                        host: target.to_string(),
                        port: record.port,
                        source: ResolutionSource::ServiceDiscovery,
                    };
                }
                debug!("No SRV records for {}", query);
            }
            Err(e) => debug!("{} ({})", e, query),
        }

        ResolvedEndpoint {
            host: host.to_string(),
            port: DEFAULT_PORT,
            source: ResolutionSource::Default,
        }
    }
}
