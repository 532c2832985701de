// Shared error surface. Handlers recover nothing; every failure flows
// through ApiError and is serialized as a problem-details body.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::repo::RepoError;
use crate::services::auth::AuthError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    NotImplemented(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn not_found(what: impl Into<String>) -> Self {
        ApiError::NotFound(what.into())
    }

    pub fn bad_request(what: impl Into<String>) -> Self {
        ApiError::BadRequest(what.into())
    }

    fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::NotImplemented(_) => StatusCode::NOT_IMPLEMENTED,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<RepoError> for ApiError {
    fn from(e: RepoError) -> Self {
        match e {
            RepoError::NotFound => ApiError::NotFound("not found".to_string()),
            RepoError::Conflict => ApiError::Conflict("conflict".to_string()),
            RepoError::Io(e) => ApiError::Internal(e.into()),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::InvalidCredentials | AuthError::InvalidToken => {
                ApiError::Unauthorized(e.to_string())
            }
            AuthError::Repo(e) => e.into(),
            AuthError::Internal(e) => ApiError::Internal(e),
        }
    }
}

/// Problem-details body, matching what ASP.NET (and therefore real
/// Jellyfin) emits for non-2xx responses.
#[derive(Debug, Serialize)]
pub struct ProblemDetails {
    pub status: u16,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub problem_type: Option<String>,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<serde_json::Value>,
    #[serde(rename = "traceId", skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
}

/// RFC 9110 section URL for the statuses clients care about.
fn problem_type_url(status: StatusCode) -> Option<String> {
    let section = match status {
        StatusCode::BAD_REQUEST => "15.5.1",
        StatusCode::UNAUTHORIZED => "15.5.2",
        StatusCode::FORBIDDEN => "15.5.4",
        StatusCode::NOT_FOUND => "15.5.5",
        StatusCode::METHOD_NOT_ALLOWED => "15.5.6",
        StatusCode::CONFLICT => "15.5.10",
        StatusCode::INTERNAL_SERVER_ERROR => "15.6.1",
        StatusCode::NOT_IMPLEMENTED => "15.6.2",
        _ => return None,
    };
    Some(format!("https://tools.ietf.org/html/rfc9110#section-{section}"))
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("Request failed: {:#}", self);
        } else {
            tracing::debug!("Request rejected: {} {}", status, self);
        }

        let body = ProblemDetails {
            status: status.as_u16(),
            problem_type: problem_type_url(status),
            title: self.to_string(),
            errors: None,
            trace_id: None,
        };
        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_statuses_carry_rfc_urls() {
        assert_eq!(
            problem_type_url(StatusCode::NOT_FOUND).unwrap(),
            "https://tools.ietf.org/html/rfc9110#section-15.5.5"
        );
        assert!(problem_type_url(StatusCode::IM_A_TEAPOT).is_none());
    }

    #[test]
    fn repo_not_found_maps_to_404() {
        let err: ApiError = RepoError::NotFound.into();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }
}
