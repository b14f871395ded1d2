use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        FromRequest, FromRequestParts, Query, Request,
    },
    http::request::Parts,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::{accounts::AccountError, assistant::ChatError};

/// Shown in place of any internal failure; details only go to the log.
pub const GENERIC_ERROR: &str = "Something went wrong.";

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            AppError::Internal(e) => {
                error!(error = ?e, "Request failed");
                GENERIC_ERROR.to_owned()
            }
            other => other.to_string(),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<AccountError> for AppError {
    fn from(e: AccountError) -> Self {
        match e {
            AccountError::InvalidInput => Self::BadRequest(e.to_string()),
            AccountError::InvalidCredentials => Self::Unauthorized(e.to_string()),
            AccountError::EmailInUse => Self::Conflict(e.to_string()),
            AccountError::NotFound => Self::NotFound(e.to_string()),
            AccountError::Hash(_) | AccountError::Database(_) => Self::Internal(e.into()),
        }
    }
}

impl From<ChatError> for AppError {
    fn from(e: ChatError) -> Self {
        match e {
            ChatError::EmptyMessage => Self::BadRequest(e.to_string()),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(e: JsonRejection) -> Self {
        Self::BadRequest(e.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(e: QueryRejection) -> Self {
        Self::BadRequest(e.body_text())
    }
}

/// `Json` whose rejection uses the `{ "error": ... }` body like every other
/// failure of this API.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(Self(value))
    }
}

/// `Query` counterpart of [`ApiJson`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiQuery<T>(pub T);

impl<S, T> FromRequestParts<S> for ApiQuery<T>
where
    Query<T>: FromRequestParts<S, Rejection = QueryRejection>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state).await?;
        Ok(Self(value))
    }
}

#[cfg(test)]
mod tests {
    use axum::body::to_bytes;
    use serde_json::Value;

    use super::*;

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn account_errors_map_to_statuses() {
        assert_eq!(AppError::from(AccountError::InvalidInput).status(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::from(AccountError::InvalidCredentials).status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::from(AccountError::EmailInUse).status(), StatusCode::CONFLICT);
        assert_eq!(AppError::from(AccountError::NotFound).status(), StatusCode::NOT_FOUND);
        assert_eq!(
            AppError::from(AccountError::Hash("boom".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn user_facing_message_survives_conversion() {
        let err = AppError::from(AccountError::EmailInUse);
        assert_eq!(err.to_string(), "Email already in use.");
    }

    #[test]
    fn chat_error_is_bad_request() {
        let err = AppError::from(ChatError::EmptyMessage);
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), "Message is required");
    }

    #[test]
    fn internal_error_status() {
        let err = AppError::from(anyhow::anyhow!("db exploded"));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn internal_error_hides_details() {
        let response = AppError::from(anyhow::anyhow!("db exploded")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body, json!({ "error": "Something went wrong." }));
        assert!(!body.to_string().contains("db exploded"));
    }

    #[tokio::test]
    async fn client_errors_carry_their_message() {
        let response = AppError::NotFound("Device not found.".into()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await, json!({ "error": "Device not found." }));
    }
}
