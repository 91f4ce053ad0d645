//! Parses, mutates, and serializes the docker-compose document for one deployment.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde_yaml_ng::{Mapping, Value};

use crate::error::{OrchestratorError, Result};

/// Ordered `(host_port, container_port)` pairs per service, in compose order.
pub type ServicePortTable = HashMap<String, Vec<(String, String)>>;

pub struct ComposeRewriter {
    path: PathBuf,
    doc: Option<Value>,
}

impl ComposeRewriter {
    /// Loads the compose document at `path`. A Delete flow may skip loading
    /// entirely if the clone directory (and thus the file) is already gone.
    pub async fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| OrchestratorError::ComposeParseError {
                message: format!("cannot read compose file {}: {e}", path.display()),
            })?;
        let doc: Value =
            serde_yaml_ng::from_str(&content).map_err(|e| OrchestratorError::ComposeParseError {
                message: e.to_string(),
            })?;
        Ok(Self {
            path,
            doc: Some(doc),
        })
    }

    fn services_mapping(&self) -> Result<&Mapping> {
        self.doc
            .as_ref()
            .and_then(|d| d.as_mapping())
            .and_then(|m| m.get("services"))
            .and_then(|s| s.as_mapping())
            .ok_or_else(|| OrchestratorError::ComposeParseError {
                message: "compose file has no top-level `services` mapping".to_string(),
            })
    }

    /// Extracts the host/container port pairs declared on each service's
    /// `ports` list, splitting each entry on `:` and taking the last two
    /// fields (this tolerates a leading host-IP segment).
    pub fn extract_service_ports(&self) -> Result<ServicePortTable> {
        let services = self.services_mapping()?;
        let mut table = ServicePortTable::new();

        for (name, spec) in services {
            let Some(name) = name.as_str() else { continue };
            let mut ports = Vec::new();

            if let Some(ports_list) = spec.as_mapping().and_then(|m| m.get("ports")).and_then(|p| p.as_sequence()) {
                for entry in ports_list {
                    if let Some(s) = entry.as_str() {
                        if let Some(pair) = split_host_container_port(s) {
                            ports.push(pair);
                        }
                    }
                }
            }

            table.insert(name.to_string(), ports);
        }

        Ok(table)
    }

    /// Mutates the document in place and writes it back to the same path:
    /// strips `ports`/`container_name`, sets `restart: always` on every
    /// existing service, and adds an inner nginx service with a single port
    /// mapping and a bind-mount of `inner_conf_path`.
    pub async fn rewrite(
        &mut self,
        inner_nginx_port: u16,
        inner_conf_path: &Path,
        namespace: &str,
    ) -> Result<()> {
        let networks = self.top_level_networks()?;

        let doc = self
            .doc
            .as_mut()
            .ok_or_else(|| OrchestratorError::ComposeParseError {
                message: "no compose document loaded".to_string(),
            })?;

        let root = doc
            .as_mapping_mut()
            .ok_or_else(|| OrchestratorError::ComposeParseError {
                message: "compose document is not a mapping".to_string(),
            })?;

        let services = root
            .get_mut("services")
            .and_then(|s| s.as_mapping_mut())
            .ok_or_else(|| OrchestratorError::ComposeParseError {
                message: "compose file has no top-level `services` mapping".to_string(),
            })?;

        for (_name, spec) in services.iter_mut() {
            if let Some(service) = spec.as_mapping_mut() {
                service.remove("ports");
                service.remove("container_name");
                service.insert(
                    Value::String("restart".to_string()),
                    Value::String("always".to_string()),
                );
            }
        }

        let mut nginx_networks = Mapping::new();
        nginx_networks.insert(Value::String("default".to_string()), Value::Null);
        for network in &networks {
            nginx_networks.insert(Value::String(network.clone()), Value::Null);
        }

        let mut nginx_service = Mapping::new();
        nginx_service.insert(Value::String("image".to_string()), Value::String("nginx".to_string()));
        nginx_service.insert(
            Value::String("restart".to_string()),
            Value::String("always".to_string()),
        );
        nginx_service.insert(
            Value::String("ports".to_string()),
            Value::Sequence(vec![Value::String(format!("{inner_nginx_port}:80"))]),
        );
        nginx_service.insert(
            Value::String("volumes".to_string()),
            Value::Sequence(vec![Value::String(format!(
                "{}:/etc/nginx/conf.d/default.conf",
                inner_conf_path.display()
            ))]),
        );
        nginx_service.insert(
            Value::String("networks".to_string()),
            Value::Mapping(nginx_networks),
        );

        services.insert(
            Value::String(format!("nginx_{namespace}")),
            Value::Mapping(nginx_service),
        );

        let serialized =
            serde_yaml_ng::to_string(doc).map_err(|e| OrchestratorError::ComposeParseError {
                message: e.to_string(),
            })?;
        tokio::fs::write(&self.path, serialized)
            .await
            .map_err(OrchestratorError::Io)?;

        Ok(())
    }

    fn top_level_networks(&self) -> Result<Vec<String>> {
        let Some(doc) = self.doc.as_ref() else {
            return Ok(Vec::new());
        };
        let Some(root) = doc.as_mapping() else {
            return Ok(Vec::new());
        };
        let Some(networks) = root.get("networks").and_then(|n| n.as_mapping()) else {
            return Ok(Vec::new());
        };
        Ok(networks
            .keys()
            .filter_map(|k| k.as_str().map(str::to_string))
            .collect())
    }
}

/// Splits a compose port entry on `:`, taking the last two fields as
/// `(host_port, container_port)`. Tolerates a leading host-IP segment in the
/// extended `host_ip:host_port:container_port` syntax.
fn split_host_container_port(entry: &str) -> Option<(String, String)> {
    let fields: Vec<&str> = entry.split(':').collect();
    match fields.len() {
        0 => None,
        1 => Some((fields[0].to_string(), fields[0].to_string())),
        n => Some((fields[n - 2].to_string(), fields[n - 1].to_string())),
    }
}
