use anyhow::{Context, Result};
use config::{Config as ConfigBuilder, Environment};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    /// Clone root; every namespace gets its own subdirectory here.
    pub deployments_mount_dir: String,

    #[serde(default = "default_lock_file_base_path")]
    pub lock_file_base_path: String,

    #[serde(default = "default_nginx_proxy_conf_location")]
    pub nginx_proxy_conf_location: String,

    #[serde(default = "default_deployment_host")]
    pub deployment_host: String,

    #[serde(default = "default_deployment_port_start")]
    pub deployment_port_start: u16,

    #[serde(default = "default_deployment_port_end")]
    pub deployment_port_end: u16,

    #[serde(default = "default_domain_name")]
    pub domain_name: String,

    pub vault_base_url: String,
    pub vault_token: String,

    /// HS256 bearer JWT signing secret used by the HTTP auth middleware.
    pub secret_text: String,

    #[serde(default)]
    pub env: String,
}

fn default_lock_file_base_path() -> String {
    std::env::temp_dir().to_string_lossy().into_owned()
}

fn default_nginx_proxy_conf_location() -> String {
    "/etc/nginx/conf.d".to_string()
}

fn default_deployment_host() -> String {
    "host.docker.internal".to_string()
}

fn default_deployment_port_start() -> u16 {
    15000
}

fn default_deployment_port_end() -> u16 {
    25000
}

fn default_domain_name() -> String {
    "localhost".to_string()
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        #[cfg(debug_assertions)]
        let _ = dotenvy::from_filename(".env.local");

        let config = ConfigBuilder::builder()
            .add_source(Environment::default().separator("__"))
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    pub fn is_local(&self) -> bool {
        self.env.eq_ignore_ascii_case("LOCAL")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_local_is_case_insensitive() {
        let mut cfg = bare_config();
        cfg.env = "local".to_string();
        assert!(cfg.is_local());
        cfg.env = "Production".to_string();
        assert!(!cfg.is_local());
    }

    fn bare_config() -> AppConfig {
        AppConfig {
            deployments_mount_dir: "/tmp/previews".to_string(),
            lock_file_base_path: default_lock_file_base_path(),
            nginx_proxy_conf_location: default_nginx_proxy_conf_location(),
            deployment_host: default_deployment_host(),
            deployment_port_start: default_deployment_port_start(),
            deployment_port_end: default_deployment_port_end(),
            domain_name: default_domain_name(),
            vault_base_url: "http://vault.local".to_string(),
            vault_token: "token".to_string(),
            secret_text: "secret".to_string(),
            env: String::new(),
        }
    }
}
