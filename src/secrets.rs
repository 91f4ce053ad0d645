//! Thin client over an HTTP KV store, addressed per-namespace at
//! `{base}/v1/kv/data/{project}/{branch}` and `{base}/v1/kv/metadata/{project}/{branch}`.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{OrchestratorError, Result};

const SAMPLE_ENV_FILENAMES: [&str; 3] = [".env.sample", "env.sample", "sample.env"];

pub struct SecretsClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

#[derive(Deserialize)]
struct KvReadResponse {
    data: KvReadData,
}

#[derive(Deserialize)]
struct KvReadData {
    data: BTreeMap<String, String>,
}

#[derive(Serialize)]
struct KvWriteRequest {
    data: BTreeMap<String, String>,
}

impl SecretsClient {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Result<Self> {
        let base_url = base_url.into();
        let token = token.into();
        if base_url.is_empty() || token.is_empty() {
            return Err(OrchestratorError::SecretStoreUnavailable {
                message: "VAULT_BASE_URL or VAULT_TOKEN is unset".to_string(),
            });
        }
        Ok(Self {
            http: reqwest::Client::new(),
            base_url,
            token,
        })
    }

    fn data_url(&self, project: &str, branch: &str) -> String {
        format!("{}/v1/kv/data/{project}/{branch}", self.base_url)
    }

    fn metadata_url(&self, project: &str, branch: &str) -> String {
        format!("{}/v1/kv/metadata/{project}/{branch}", self.base_url)
    }

    /// Reads secrets for `(project, branch)` and writes them as a `.env` file
    /// into `clone_path`. On a non-200 read, seeds a placeholder entry in the
    /// store instead and proceeds without writing a `.env` file.
    #[tracing::instrument(skip(self, clone_path))]
    pub async fn inject(&self, project: &str, branch: &str, clone_path: &Path) -> Result<()> {
        let resp = self
            .http
            .get(self.data_url(project, branch))
            .header("X-Vault-Token", &self.token)
            .send()
            .await;

        let pairs = match resp {
            Ok(r) if r.status().is_success() => match r.json::<KvReadResponse>().await {
                Ok(body) => Some(body.data.data),
                Err(e) => {
                    tracing::warn!(error = %e, "malformed KV read response");
                    None
                }
            },
            Ok(r) => {
                tracing::info!(status = %r.status(), "secret store has no entry yet");
                None
            }
            Err(e) => {
                tracing::warn!(error = %e, "secret store unreachable on read");
                None
            }
        };

        match pairs {
            Some(pairs) => self.write_dotenv(clone_path, &pairs).await,
            None => self.seed_placeholder(project, branch, clone_path).await,
        }
    }

    async fn write_dotenv(&self, clone_path: &Path, pairs: &BTreeMap<String, String>) -> Result<()> {
        let body: String = pairs
            .iter()
            .map(|(k, v)| format!("{k}=\"{v}\"\n"))
            .collect();
        tokio::fs::write(clone_path.join(".env"), body)
            .await
            .map_err(OrchestratorError::Io)
    }

    /// Seeds the KV store from the first sample env file found in priority
    /// order, or a single placeholder pair if none exist.
    #[tracing::instrument(skip(self, clone_path))]
    async fn seed_placeholder(&self, project: &str, branch: &str, clone_path: &Path) -> Result<()> {
        let pairs = self.load_sample_env(clone_path).await;

        let resp = self
            .http
            .post(self.data_url(project, branch))
            .header("X-Vault-Token", &self.token)
            .json(&KvWriteRequest { data: pairs })
            .send()
            .await;

        if let Err(e) = resp {
            tracing::warn!(error = %e, "failed to seed placeholder secret");
        }
        Ok(())
    }

    async fn load_sample_env(&self, clone_path: &Path) -> BTreeMap<String, String> {
        for name in SAMPLE_ENV_FILENAMES {
            let candidate = clone_path.join(name);
            if let Ok(content) = tokio::fs::read_to_string(&candidate).await {
                return parse_dotenv(&content);
            }
        }
        let mut fallback = BTreeMap::new();
        fallback.insert("key".to_string(), "secret-value".to_string());
        fallback
    }

    /// Best-effort delete of the metadata path, which removes all versions
    /// of the secret (Vault KV v2 semantics). Failures are logged, not raised.
    #[tracing::instrument(skip(self))]
    pub async fn purge(&self, project: &str, branch: &str) {
        let resp = self
            .http
            .delete(self.metadata_url(project, branch))
            .header("X-Vault-Token", &self.token)
            .send()
            .await;

        match resp {
            Ok(r) if r.status().is_success() || r.status() == reqwest::StatusCode::NOT_FOUND => {}
            Ok(r) => tracing::warn!(status = %r.status(), "secret purge returned unexpected status"),
            Err(e) => tracing::warn!(error = %e, "secret purge request failed"),
        }
    }
}

fn parse_dotenv(content: &str) -> BTreeMap<String, String> {
    let mut map = BTreeMap::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            let value = value.trim().trim_matches('"');
            map.insert(key.trim().to_string(), value.to_string());
        }
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_construction_without_base_url_or_token() {
        assert!(SecretsClient::new("", "token").is_err());
        assert!(SecretsClient::new("http://vault", "").is_err());
    }

    #[test]
    fn parses_simple_dotenv() {
        let parsed = parse_dotenv("FOO=bar\n# comment\n\nBAZ=\"qux\"\n");
        assert_eq!(parsed.get("FOO"), Some(&"bar".to_string()));
        assert_eq!(parsed.get("BAZ"), Some(&"qux".to_string()));
        assert_eq!(parsed.len(), 2);
    }

    #[tokio::test]
    async fn load_sample_env_prefers_priority_order() {
        let tmp = tempfile::tempdir().unwrap();
        tokio::fs::write(tmp.path().join("sample.env"), "A=1\n")
            .await
            .unwrap();
        tokio::fs::write(tmp.path().join(".env.sample"), "A=2\n")
            .await
            .unwrap();

        let client = SecretsClient::new("http://vault.local", "t").unwrap();
        let pairs = client.load_sample_env(tmp.path()).await;
        assert_eq!(pairs.get("A"), Some(&"2".to_string()));
    }

    #[tokio::test]
    async fn load_sample_env_falls_back_to_placeholder() {
        let tmp = tempfile::tempdir().unwrap();
        let client = SecretsClient::new("http://vault.local", "t").unwrap();
        let pairs = client.load_sample_env(tmp.path()).await;
        assert_eq!(pairs.get("key"), Some(&"secret-value".to_string()));
    }

    #[tokio::test]
    async fn inject_writes_dotenv_on_successful_read() {
        use wiremock::matchers::{header, method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/kv/data/demo/main"))
            .and(header("X-Vault-Token", "t"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": { "data": { "API_KEY": "xyz" } }
            })))
            .mount(&server)
            .await;

        let client = SecretsClient::new(server.uri(), "t").unwrap();
        let tmp = tempfile::tempdir().unwrap();
        client.inject("demo", "main", tmp.path()).await.unwrap();

        let written = tokio::fs::read_to_string(tmp.path().join(".env"))
            .await
            .unwrap();
        assert_eq!(written, "API_KEY=\"xyz\"\n");
    }

    #[tokio::test]
    async fn inject_seeds_placeholder_when_read_is_not_found() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/kv/data/demo/feature-x"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/kv/data/demo/feature-x"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let client = SecretsClient::new(server.uri(), "t").unwrap();
        let tmp = tempfile::tempdir().unwrap();
        client
            .inject("demo", "feature-x", tmp.path())
            .await
            .unwrap();

        assert!(!tmp.path().join(".env").exists());
    }

    #[tokio::test]
    async fn purge_tolerates_not_found() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/v1/kv/metadata/demo/main"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = SecretsClient::new(server.uri(), "t").unwrap();
        client.purge("demo", "main").await;
    }

    #[tokio::test]
    async fn purge_succeeds_on_200() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/v1/kv/metadata/demo/main"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let client = SecretsClient::new(server.uri(), "t").unwrap();
        client.purge("demo", "main").await;
    }
}
