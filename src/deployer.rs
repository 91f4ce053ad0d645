//! Orchestrates the Create and Delete pipelines under a per-namespace lock.

use crate::compose::ComposeRewriter;
use crate::config::AppConfig;
use crate::error::Result;
use crate::locks::NamespaceLockRegistry;
use crate::namespace::NormalizedIdentity;
use crate::proxy::ProxyManager;
use crate::runner::ComposeRunner;
use crate::secrets::SecretsClient;
use crate::workspace::Workspace;

#[derive(Debug, Clone)]
pub enum Action {
    Create,
    Delete,
}

#[derive(Debug, Clone)]
pub struct DeploymentRequest {
    pub project_name_raw: String,
    pub branch_name_raw: String,
    pub project_git_url: String,
    pub compose_file_location: String,
    pub action: Action,
}

impl DeploymentRequest {
    pub fn default_compose_file_location() -> String {
        "docker-compose.yml".to_string()
    }
}

pub struct Deployer {
    workspace: Workspace,
    secrets: SecretsClient,
    proxy: ProxyManager,
    locks: NamespaceLockRegistry,
}

impl Deployer {
    pub fn new(config: &AppConfig) -> Result<Self> {
        Ok(Self {
            workspace: Workspace::new(&config.deployments_mount_dir),
            secrets: SecretsClient::new(&config.vault_base_url, &config.vault_token)?,
            proxy: ProxyManager::new(
                &config.nginx_proxy_conf_location,
                &config.domain_name,
                config.deployment_port_start,
                config.deployment_port_end,
                &config.deployment_host,
            ),
            locks: NamespaceLockRegistry::new(&config.lock_file_base_path),
        })
    }

    /// Clone -> rewrite -> allocate port -> inject secrets -> start stack ->
    /// configure outer nginx -> return per-service URLs.
    #[tracing::instrument(skip(self, req), fields(namespace))]
    pub async fn create(&self, req: &DeploymentRequest) -> Result<Vec<String>> {
        let identity = NormalizedIdentity::derive(&req.project_name_raw, &req.branch_name_raw)?;
        tracing::Span::current().record("namespace", identity.namespace.as_str());

        let mutex = self.locks.acquire(&identity.namespace).await?;
        let _guard = mutex.lock().await;

        let clone_dir = self
            .workspace
            .prepare(&identity.namespace, &req.project_git_url, &req.branch_name_raw)
            .await?;

        let compose_path = clone_dir.join(&req.compose_file_location);
        let mut rewriter = ComposeRewriter::load(&compose_path).await?;
        let service_ports = rewriter.extract_service_ports()?;

        let inner_port = self.proxy.find_free_port().await?;

        let (inner_conf_path, urls) = self
            .proxy
            .generate_inner_conf(
                &clone_dir,
                &identity.project,
                &identity.branch,
                &identity.hash,
                &service_ports,
            )
            .await?;

        self.secrets
            .inject(&identity.project, &identity.branch, &clone_dir)
            .await?;

        rewriter
            .rewrite(inner_port, &inner_conf_path, &identity.namespace)
            .await?;

        let runner = ComposeRunner::new(&clone_dir);
        runner.up().await?;

        self.proxy
            .generate_outer_conf(&identity.project, &identity.hash, inner_port)
            .await?;
        self.proxy.reload().await?;

        tracing::info!(namespace = identity.namespace, urls = ?urls, "deployment created");
        Ok(urls)
    }

    /// Tear down a namespace: stop containers, remove the outer conf and
    /// reload nginx, remove the clone directory, then best-effort purge
    /// secrets. Every step tolerates "already gone" and is safe to retry.
    #[tracing::instrument(skip(self, req), fields(namespace))]
    pub async fn delete(&self, req: &DeploymentRequest) -> Result<()> {
        let identity = NormalizedIdentity::derive(&req.project_name_raw, &req.branch_name_raw)?;
        tracing::Span::current().record("namespace", identity.namespace.as_str());

        let mutex = self.locks.acquire(&identity.namespace).await?;
        let _guard = mutex.lock().await;

        let clone_dir = self.workspace.clone_dir(&identity.namespace);
        let runner = ComposeRunner::new(&clone_dir);
        if let Err(e) = runner.down().await {
            tracing::warn!(error = %e, "docker compose down failed; continuing teardown");
        }

        if let Err(e) = self
            .proxy
            .remove_outer_conf(&identity.project, &identity.hash)
            .await
        {
            tracing::warn!(error = %e, "failed to remove outer conf; continuing teardown");
        }

        if let Err(e) = self.proxy.reload().await {
            tracing::warn!(error = %e, "nginx reload failed during teardown; continuing");
        }

        if let Err(e) = self.workspace.remove(&clone_dir).await {
            tracing::warn!(error = %e, "failed to remove clone directory; continuing");
        }

        self.secrets.purge(&identity.project, &identity.branch).await;

        tracing::info!(namespace = identity.namespace, "deployment removed");
        Ok(())
    }
}
