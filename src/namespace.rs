//! Deterministic derivation of a deployment's identity from raw project/branch strings.

use md5::{Digest, Md5};

use crate::error::{OrchestratorError, Result};

const PROJECT_MAX_LEN: usize = 10;
const BRANCH_MAX_LEN: usize = 20;
const HASH_LEN: usize = 10;

/// The normalized, stable identity of one preview deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedIdentity {
    pub project: String,
    pub branch: String,
    pub hash: String,
    pub namespace: String,
}

impl NormalizedIdentity {
    pub fn derive(raw_project: &str, raw_branch: &str) -> Result<Self> {
        let project = sanitize(raw_project, PROJECT_MAX_LEN);
        let branch = sanitize(raw_branch, BRANCH_MAX_LEN);

        if project.is_empty() {
            return Err(OrchestratorError::InvalidInput {
                message: "project name is empty after normalization".to_string(),
            });
        }
        if branch.is_empty() {
            return Err(OrchestratorError::InvalidInput {
                message: "branch name is empty after normalization".to_string(),
            });
        }

        let hash = content_hash(&project, &branch);
        let namespace = format!("{project}_{branch}_{hash}");

        Ok(Self {
            project,
            branch,
            hash,
            namespace,
        })
    }
}

/// Lowercase, strip everything but ascii letters, then truncate.
fn sanitize(raw: &str, max_len: usize) -> String {
    let lowered = raw.to_lowercase();
    let alpha: String = lowered.chars().filter(|c| c.is_ascii_alphabetic()).collect();
    alpha.chars().take(max_len).collect()
}

fn content_hash(project: &str, branch: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(format!("{project}:{branch}"));
    let digest = hasher.finalize();
    hex::encode(digest)[..HASH_LEN].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitizes_and_truncates() {
        let id = NormalizedIdentity::derive("My-Project!!", "feature/some-very-long-branch-name").unwrap();
        assert_eq!(id.project, "myproject");
        assert!(id.branch.chars().count() <= BRANCH_MAX_LEN);
        assert!(id.project.chars().all(|c| c.is_ascii_alphabetic()));
        assert!(id.branch.chars().all(|c| c.is_ascii_alphabetic()));
    }

    #[test]
    fn hash_is_pure_function_of_normalized_inputs() {
        let a = NormalizedIdentity::derive("p", "main").unwrap();
        let b = NormalizedIdentity::derive("P", "MAIN").unwrap();
        assert_eq!(a.hash, b.hash);
        assert_eq!(a.namespace, b.namespace);
    }

    #[test]
    fn rejects_empty_after_normalization() {
        assert!(NormalizedIdentity::derive("123", "main").is_err());
        assert!(NormalizedIdentity::derive("p", "---").is_err());
    }

    #[test]
    fn reserved_branch_name_normalizes_and_is_accepted() {
        let id = NormalizedIdentity::derive("p", "default-dev-secrets").unwrap();
        assert_eq!(id.branch, "defaultdevsecrets");
    }

    #[test]
    fn scenario_s1_matches_literal_hash() {
        let id = NormalizedIdentity::derive("p", "main").unwrap();
        let mut hasher = Md5::new();
        hasher.update("p:main");
        let expected = hex::encode(hasher.finalize())[..10].to_string();
        assert_eq!(id.hash, expected);
        assert_eq!(id.namespace, format!("p_main_{expected}"));
    }
}
