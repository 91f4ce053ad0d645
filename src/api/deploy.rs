use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

use sarthi_orchestrator::deployer::{Action, DeploymentRequest};
use sarthi_orchestrator::error::OrchestratorError;

use crate::AppState;

use super::auth::BearerAuth;

#[derive(Debug, Deserialize)]
pub struct DeployBody {
    #[serde(default)]
    pub project_git_url: String,
    #[serde(default)]
    pub branch: String,
    pub compose_file_location: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub message: String,
}

fn project_name_from_url(url: &str) -> Result<String, OrchestratorError> {
    let trimmed = url.trim_end_matches('/');
    let last = trimmed.rsplit('/').next().unwrap_or("");
    let name = last.strip_suffix(".git").unwrap_or(last);
    Ok(name.to_string())
}

fn validate_body(body: &DeployBody) -> Result<(), OrchestratorError> {
    if body.project_git_url.trim().is_empty() || !body.project_git_url.ends_with(".git") {
        return Err(OrchestratorError::InvalidInput {
            message: "project_git_url is required and must end with .git".to_string(),
        });
    }
    Ok(())
}

fn build_request(body: DeployBody, action: Action) -> Result<DeploymentRequest, OrchestratorError> {
    validate_body(&body)?;
    let project_name_raw = project_name_from_url(&body.project_git_url)?;

    Ok(DeploymentRequest {
        project_name_raw,
        branch_name_raw: body.branch,
        project_git_url: body.project_git_url,
        compose_file_location: body
            .compose_file_location
            .unwrap_or_else(DeploymentRequest::default_compose_file_location),
        action,
    })
}

pub async fn create_deploy(
    State(state): State<AppState>,
    _auth: BearerAuth,
    Json(body): Json<DeployBody>,
) -> Result<Json<Vec<String>>, OrchestratorError> {
    let req = build_request(body, Action::Create)?;
    let urls = state.deployer.create(&req).await?;
    Ok(Json(urls))
}

pub async fn delete_deploy(
    State(state): State<AppState>,
    _auth: BearerAuth,
    Json(body): Json<DeployBody>,
) -> Result<Json<DeleteResponse>, OrchestratorError> {
    let req = build_request(body, Action::Delete)?;
    state.deployer.delete(&req).await?;
    Ok(Json(DeleteResponse {
        message: "Removed preview environment".to_string(),
    }))
}

pub async fn healthz(State(_state): State<AppState>) -> StatusCode {
    StatusCode::OK
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_missing_or_non_git_url() {
        let body = DeployBody {
            project_git_url: "not-a-url".to_string(),
            branch: "main".to_string(),
            compose_file_location: None,
        };
        let err = validate_body(&body).unwrap_err();
        assert!(err.to_string().contains(".git"));
    }

    #[test]
    fn derives_project_name_from_git_url() {
        assert_eq!(
            project_name_from_url("https://github.com/u/p.git").unwrap(),
            "p"
        );
        assert_eq!(
            project_name_from_url("https://github.com/u/p.git/").unwrap(),
            "p"
        );
    }
}
