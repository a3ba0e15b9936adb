use axum::{
    Json,
    extract::{
        Request,
        multipart::{MultipartError, MultipartRejection},
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use docdesk_types::api::ApiResponse;
use tracing::{error, warn};

const HIDDEN_DETAIL: &str = "Something went wrong";

/// Every way a request can fail. Renders as the `{success: false, ...}` envelope.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    /// 400 that also reports what was wrong with the payload in `error`.
    #[error("{message}: {detail}")]
    InvalidInput { message: &'static str, detail: String },

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("rate limit exceeded")]
    RateLimited,

    #[error("{message}: {cause:#}")]
    Internal {
        message: &'static str,
        cause: anyhow::Error,
    },
}

impl ApiError {
    /// `map_err` adapter producing a 500 with a fixed public message.
    pub fn internal<E>(message: &'static str) -> impl FnOnce(E) -> ApiError
    where
        E: Into<anyhow::Error>,
    {
        move |e| ApiError::Internal {
            message,
            cause: e.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) | Self::InvalidInput { .. } => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Attached to 500 responses so `expose_internal_errors` can re-render
/// them with the underlying error text.
#[derive(Debug, Clone)]
pub struct InternalErrorDetail {
    pub message: &'static str,
    pub detail: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            Self::BadRequest(message)
            | Self::Unauthorized(message)
            | Self::Forbidden(message)
            | Self::NotFound(message) => {
                (status, Json(ApiResponse::<()>::failure(message, None))).into_response()
            }
            Self::InvalidInput { message, detail } => {
                warn!("{}: {}", message, detail);
                (status, Json(ApiResponse::<()>::failure(message, Some(detail)))).into_response()
            }
            Self::RateLimited => (
                status,
                Json(ApiResponse::<()>::failure(
                    "Too many requests from this IP, please try again later.",
                    None,
                )),
            )
                .into_response(),
            Self::Internal { message, cause } => {
                error!("{}: {:#}", message, cause);
                let mut response = (
                    status,
                    Json(ApiResponse::<()>::failure(message, Some(HIDDEN_DETAIL.into()))),
                )
                    .into_response();
                response.extensions_mut().insert(InternalErrorDetail {
                    message,
                    detail: format!("{cause:#}"),
                });
                response
            }
        }
    }
}

/// Development-only layer: swaps the generic 500 body for one carrying the
/// real error text.
pub async fn expose_internal_errors(req: Request, next: Next) -> Response {
    let mut response = next.run(req).await;
    match response.extensions_mut().remove::<InternalErrorDetail>() {
        Some(InternalErrorDetail { message, detail }) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiResponse::<()>::failure(message, Some(detail))),
        )
            .into_response(),
        None => response,
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::InvalidInput {
            message: "Invalid request body",
            detail: rejection.body_text(),
        }
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::InvalidInput {
            message: "Invalid query parameters",
            detail: rejection.body_text(),
        }
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::InvalidInput {
            message: "Invalid resource id",
            detail: rejection.body_text(),
        }
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(rejection: MultipartRejection) -> Self {
        Self::InvalidInput {
            message: "File upload error",
            detail: rejection.body_text(),
        }
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        Self::InvalidInput {
            message: "File upload error",
            detail: err.body_text(),
        }
    }
}
