//! Bearer-JWT auth extractor for the `/deploy` endpoints.
//!
//! Claims are not inspected beyond signature validity: a request either
//! carries a token signed with the configured `HS256` secret, or it doesn't.

use std::future::Future;

use axum::http::StatusCode;
use axum::http::request::Parts;
use jsonwebtoken::{DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};

use crate::AppState;

#[derive(Debug, Serialize, Deserialize, Clone)]
struct Claims {
    #[serde(flatten)]
    _rest: std::collections::HashMap<String, serde_json::Value>,
}

/// Marker extractor: presence means the request carried a validly-signed
/// bearer token.
pub struct BearerAuth;

impl axum::extract::FromRequestParts<AppState> for BearerAuth {
    type Rejection = (StatusCode, String);

    fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> impl Future<Output = Result<Self, Self::Rejection>> + Send {
        let token = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer ").or_else(|| v.strip_prefix("bearer ")))
            .map(str::to_string);

        let secret = state.config.secret_text.clone();

        async move {
            let Some(token) = token else {
                return Err((
                    StatusCode::UNAUTHORIZED,
                    "missing bearer token".to_string(),
                ));
            };

            let mut validation = Validation::new(jsonwebtoken::Algorithm::HS256);
            validation.validate_exp = false;
            validation.required_spec_claims.clear();

            decode::<Claims>(&token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
                .map(|_| BearerAuth)
                .map_err(|e| (StatusCode::UNAUTHORIZED, format!("invalid bearer token: {e}")))
        }
    }
}
