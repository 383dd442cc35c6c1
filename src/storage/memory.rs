// src/storage/memory.rs
use dashmap::DashMap;
use log::{info, warn};
use std::io;
use std::path::Path;

use crate::models::server::ServerRecord;

/// Read-only view of the configured servers, keyed by name.
pub struct ServerRegistry {
    servers: DashMap<String, ServerRecord>,
}

impl ServerRegistry {
    pub fn new(records: Vec<ServerRecord>) -> Self {
        let servers = DashMap::new();
        for record in records {
            if servers.contains_key(&record.name) {
                warn!("Duplicate server name {:?} in registry, keeping the last entry", record.name);
            }
            servers.insert(record.name.clone(), record);
        }
        Self { servers }
    }

    /// Loads a JSON array of server records. A missing file yields an empty
    /// registry; a malformed one is an error.
    pub fn load(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                warn!("Registry file {} not found, starting with no servers", path.display());
                return Ok(Self::new(Vec::new()));
            }
            Err(e) => return Err(e),
        };

        let records: Vec<ServerRecord> = serde_json::from_str(&content)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        info!("Loaded {} servers from {}", records.len(), path.display());
        Ok(Self::new(records))
    }

    pub fn get(&self, name: &str) -> Option<ServerRecord> {
        self.servers.get(name).map(|r| r.value().clone())
    }

    pub fn list(&self) -> Vec<ServerRecord> {
        let mut servers: Vec<ServerRecord> =
            self.servers.iter().map(|r| r.value().clone()).collect();
        servers.sort_by(|a, b| a.name.cmp(&b.name));
        servers
    }

    pub fn len(&self) -> usize {
        self.servers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, address: &str) -> ServerRecord {
        ServerRecord {
            name: name.to_string(),
            address: address.to_string(),
            description: None,
            map_url: None,
            enabled: true,
        }
    }

    #[test]
    fn get_and_list_are_keyed_by_name() {
        let registry = ServerRegistry::new(vec![
            record("Survival", "mc.example.com"),
            record("Creative", "mc.example.com:25566"),
        ]);

        assert_eq!(registry.len(), 2);
        assert_eq!(
            registry.get("Creative").map(|r| r.address),
            Some("mc.example.com:25566".to_string())
        );
        assert!(registry.get("creative").is_none());

        let names: Vec<String> = registry.list().into_iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["Creative", "Survival"]);
    }

    #[test]
    fn load_parses_records_with_defaults() {
        let path = std::env::temp_dir().join(format!("mcow-registry-{}.json", std::process::id()));
        std::fs::write(
            &path,
            r#"[
                {"name": "Survival", "address": "mc.example.com", "mapUrl": "http://maps.local/surv"},
                {"name": "Legacy", "address": "old.example.com", "blueMapUrl": "http://old.local", "enabled": false}
            ]"#,
        )
        .expect("write registry");

        let registry = ServerRegistry::load(&path).expect("load registry");
        std::fs::remove_file(&path).ok();

        let survival = registry.get("Survival").expect("survival present");
        assert!(survival.enabled);
        assert_eq!(survival.map_backend(), Some("http://maps.local/surv"));

        let legacy = registry.get("Legacy").expect("legacy present");
        assert!(!legacy.enabled);
        assert_eq!(legacy.map_backend(), Some("http://old.local"));
    }

    #[test]
    fn missing_file_yields_empty_registry() {
        let registry = ServerRegistry::load("/nonexistent/mcow/servers.json").expect("load");
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn blank_map_url_counts_as_unset() {
        let mut server = record("Survival", "mc.example.com");
        server.map_url = Some("  ".to_string());
        assert_eq!(server.map_backend(), None);
    }
}
