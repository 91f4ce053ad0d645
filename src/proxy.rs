//! Port allocation and two-tier nginx reverse-proxy configuration.
//!
//! The inner nginx lives inside the deployed compose stack and routes by
//! `server_name` to each service. The outer nginx is the host-level
//! `sarthi_nginx` container; this module only ever writes into its conf
//! directory and asks it to validate/reload over `docker exec`.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::net::TcpStream;
use tokio::process::Command;

use crate::compose::ServicePortTable;
use crate::error::{OrchestratorError, Result};

const OUTER_NGINX_CONTAINER: &str = "sarthi_nginx";

pub struct ProxyManager {
    outer_conf_dir: PathBuf,
    domain: String,
    port_start: u16,
    port_end: u16,
    docker_host: String,
}

impl ProxyManager {
    pub fn new(
        outer_conf_dir: impl Into<PathBuf>,
        domain: impl Into<String>,
        port_start: u16,
        port_end: u16,
        docker_host: impl Into<String>,
    ) -> Self {
        Self {
            outer_conf_dir: outer_conf_dir.into(),
            domain: domain.into(),
            port_start,
            port_end,
            docker_host: docker_host.into(),
        }
    }

    /// Probes ports in `[start, end]` against `docker_host`; a refused
    /// connection means the port is free. Probing only, not binding: the
    /// race window up to `docker compose up` is tolerated per design.
    #[tracing::instrument(skip(self))]
    pub async fn find_free_port(&self) -> Result<u16> {
        for port in self.port_start..=self.port_end {
            match TcpStream::connect((self.docker_host.as_str(), port)).await {
                Ok(_) => continue,
                Err(e) if e.kind() == std::io::ErrorKind::ConnectionRefused => return Ok(port),
                Err(_) => continue,
            }
        }
        Err(OrchestratorError::NoFreePort {
            start: self.port_start,
            end: self.port_end,
        })
    }

    /// Generates one `server` block per `(service, host_port, container_port)`
    /// triple and writes the concatenation to the inner conf path inside the
    /// clone directory. Returns the conf path and the external URL for each
    /// block, in the same order as `service_ports`.
    pub async fn generate_inner_conf(
        &self,
        clone_dir: &Path,
        project: &str,
        branch: &str,
        hash: &str,
        service_ports: &ServicePortTable,
    ) -> Result<(PathBuf, Vec<String>)> {
        let mut body = String::new();
        let mut urls = Vec::new();

        for (service, ports) in service_ports {
            for (host_port, container_port) in ports {
                let server_name = format!("{project}-{branch}-{host_port}-{hash}.{}", self.domain);
                body.push_str(&inner_server_block(&server_name, service, container_port));
                urls.push(format!("http://{server_name}"));
            }
        }

        let conf_path = clone_dir.join(format!("{project}-{hash}.conf"));
        tokio::fs::write(&conf_path, body)
            .await
            .map_err(OrchestratorError::Io)?;

        Ok((conf_path, urls))
    }

    /// Writes the outer conf file, then validates it with `nginx -t` in the
    /// host nginx container. On failure, removes the file it just wrote.
    #[tracing::instrument(skip(self))]
    pub async fn generate_outer_conf(
        &self,
        project: &str,
        hash: &str,
        inner_nginx_port: u16,
    ) -> Result<PathBuf> {
        let server_name = format!("~{hash}.{}", self.domain);
        let body = outer_server_block(&server_name, &self.docker_host, inner_nginx_port);

        let conf_path = self.outer_conf_dir.join(format!("{project}-{hash}.conf"));
        tokio::fs::write(&conf_path, body)
            .await
            .map_err(OrchestratorError::Io)?;

        if let Err(e) = self.test_config().await {
            let _ = tokio::fs::remove_file(&conf_path).await;
            return Err(e);
        }

        Ok(conf_path)
    }

    /// Idempotent unlink of an outer conf path.
    pub async fn remove_outer_conf(&self, project: &str, hash: &str) -> Result<()> {
        let conf_path = self.outer_conf_dir.join(format!("{project}-{hash}.conf"));
        match tokio::fs::remove_file(&conf_path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(OrchestratorError::Io(e)),
        }
    }

    /// Validates then reloads the host nginx. `-t` failure is fatal before
    /// reload is attempted; `-s reload` failure surfaces as `NginxReloadFailed`
    /// with the outer conf left on disk.
    #[tracing::instrument(skip(self))]
    pub async fn reload(&self) -> Result<()> {
        self.test_config().await?;

        let output = docker_exec(&["nginx", "-s", "reload"]).await?;
        if !output.status.success() {
            return Err(OrchestratorError::NginxReloadFailed {
                message: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }
        Ok(())
    }

    async fn test_config(&self) -> Result<()> {
        let output = docker_exec(&["nginx", "-t"]).await?;
        if !output.status.success() {
            return Err(OrchestratorError::NginxConfigInvalid {
                message: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }
        Ok(())
    }
}

async fn docker_exec(nginx_args: &[&str]) -> Result<std::process::Output> {
    let mut args = vec!["exec", OUTER_NGINX_CONTAINER];
    args.extend_from_slice(nginx_args);

    Command::new("docker")
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| OrchestratorError::NginxReloadFailed {
            message: format!("failed to spawn docker exec: {e}"),
        })
}

fn inner_server_block(server_name: &str, service: &str, container_port: &str) -> String {
    format!(
        "server {{\n    listen 80;\n    server_name ~{server_name};\n\n    location / {{\n        proxy_pass http://{service}:{container_port};\n        proxy_set_header Host $host;\n        proxy_set_header X-Real-IP $remote_addr;\n        proxy_set_header X-Forwarded-For $proxy_add_x_forwarded_for;\n        proxy_set_header X-Forwarded-Proto $scheme;\n    }}\n}}\n\n"
    )
}

fn outer_server_block(server_name: &str, docker_host: &str, inner_port: u16) -> String {
    format!(
        "server {{\n    listen 80;\n    server_name {server_name};\n\n    location / {{\n        proxy_pass http://{docker_host}:{inner_port};\n        proxy_set_header Host $host;\n        proxy_set_header X-Real-IP $remote_addr;\n        proxy_set_header X-Forwarded-For $proxy_add_x_forwarded_for;\n        proxy_set_header X-Forwarded-Proto $scheme;\n    }}\n}}\n"
    )
}
