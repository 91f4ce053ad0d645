pub mod auth;
pub mod deploy;

use axum::Router;
use axum::routing::{delete, get, post};

use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/healthz", get(deploy::healthz))
        .route("/deploy", post(deploy::create_deploy))
        .route("/deploy", delete(deploy::delete_deploy))
}
