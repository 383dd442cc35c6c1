use std::env;
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct Config {
    // Listener
    pub bind_address: String,
    pub port: u16,

    // Registry
    pub registry_path: String,

    // Network budgets
    pub query_timeout_secs: u64,
    pub supplemental_timeout_secs: u64,
    pub proxy_connect_timeout_secs: u64,

    // Cache freshness windows
    pub online_cache_ttl_secs: u64,
    pub offline_cache_ttl_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 8080,
            registry_path: "servers.json".to_string(),
            query_timeout_secs: 5,
            supplemental_timeout_secs: 2,
            proxy_connect_timeout_secs: 10,
            online_cache_ttl_secs: 60,
            offline_cache_ttl_secs: 10,
        }
    }
}

fn env_or<T: std::str::FromStr>(key: &str, fallback: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(fallback)
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            bind_address: env::var("BIND_ADDRESS").unwrap_or(defaults.bind_address),
            port: env_or("PORT", defaults.port),
            registry_path: env::var("REGISTRY_PATH").unwrap_or(defaults.registry_path),
            query_timeout_secs: env_or("QUERY_TIMEOUT_SECS", defaults.query_timeout_secs),
            supplemental_timeout_secs: env_or(
                "SUPPLEMENTAL_TIMEOUT_SECS",
                defaults.supplemental_timeout_secs,
            ),
            proxy_connect_timeout_secs: env_or(
                "PROXY_CONNECT_TIMEOUT_SECS",
                defaults.proxy_connect_timeout_secs,
            ),
            online_cache_ttl_secs: env_or("ONLINE_CACHE_TTL_SECS", defaults.online_cache_ttl_secs),
            offline_cache_ttl_secs: env_or(
                "OFFLINE_CACHE_TTL_SECS",
                defaults.offline_cache_ttl_secs,
            ),
        }
    }

    pub fn bind(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs)
    }

    pub fn supplemental_timeout(&self) -> Duration {
        Duration::from_secs(self.supplemental_timeout_secs)
    }

    pub fn proxy_connect_timeout(&self) -> Duration {
        Duration::from_secs(self.proxy_connect_timeout_secs)
    }

    pub fn online_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.online_cache_ttl_secs)
    }

    pub fn offline_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.offline_cache_ttl_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_budgets() {
        let config = Config::default();
        assert_eq!(config.query_timeout(), Duration::from_secs(5));
        assert_eq!(config.supplemental_timeout(), Duration::from_secs(2));
        assert_eq!(config.online_cache_ttl(), Duration::from_secs(60));
        assert_eq!(config.offline_cache_ttl(), Duration::from_secs(10));
        assert_eq!(config.bind(), "0.0.0.0:8080");
    }

    #[test]
    fn unparsable_env_value_falls_back() {
        env::set_var("MCOW_TEST_UNPARSABLE", "sixty");
        assert_eq!(env_or("MCOW_TEST_UNPARSABLE", 60u64), 60);
        env::set_var("MCOW_TEST_UNPARSABLE", "75");
        assert_eq!(env_or("MCOW_TEST_UNPARSABLE", 60u64), 75);
        env::remove_var("MCOW_TEST_UNPARSABLE");
    }
}
