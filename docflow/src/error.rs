//! HTTP-facing error type. Follows the grounding repo's split between the
//! full internal error (logged, may carry sensitive detail) and the
//! user-facing message (returned to the client, always generic for
//! anything above `ErrorKind::InvalidInput` in sensitivity).

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use docflow_api::responses::ErrorBody;
use docflow_api::ErrorKind;

#[derive(Debug, thiserror::Error)]
#[error("{kind:?}: {internal_message}")]
pub struct ApiError {
    pub kind: ErrorKind,
    internal_message: String,
}

impl ApiError {
    pub fn new(kind: ErrorKind, internal_message: impl Into<String>) -> Self {
        ApiError {
            kind,
            internal_message: internal_message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// The message returned in the HTTP body. Never leaks `internal_message`
    /// for anything that might carry DB/filesystem detail, most notably
    /// `PathEscape` and `ProcessorError`.
    pub fn user_message(&self) -> String {
        match self.kind {
            ErrorKind::ProcessorError => "processing failed".to_string(),
            ErrorKind::Internal => "internal error".to_string(),
            ErrorKind::PathEscape => "invalid path".to_string(),
            ErrorKind::SubprocessFailed => "processing failed".to_string(),
            _ => self.internal_message.clone(),
        }
    }
}

macro_rules! ctor {
    ($name:ident, $kind:ident) => {
        pub fn $name(msg: impl Into<String>) -> ApiError {
            ApiError::new(ErrorKind::$kind, msg)
        }
    };
}

impl ApiError {
    ctor!(unauthenticated, Unauthenticated);
    ctor!(forbidden, Forbidden);
    ctor!(quota_exhausted, QuotaExhausted);
    ctor!(file_too_large, FileTooLarge);
    ctor!(invalid_input, InvalidInput);
    ctor!(invalid_page_spec, InvalidPageSpec);
    ctor!(page_out_of_range, PageOutOfRange);
    ctor!(invalid_angle, InvalidAngle);
    ctor!(invalid_password, InvalidPassword);
    ctor!(not_encrypted, NotEncrypted);
    ctor!(wrong_password, WrongPassword);
    ctor!(path_escape, PathEscape);
    ctor!(not_found, NotFound);
    ctor!(processor_error, ProcessorError);
    ctor!(subprocess_failed, SubprocessFailed);
    ctor!(subprocess_timeout, SubprocessTimeout);
    ctor!(busy, Busy);
    ctor!(internal, Internal);
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.kind.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            tracing::error!(kind = ?self.kind, "{}", self.internal_message);
        } else {
            tracing::warn!(kind = ?self.kind, "{}", self.internal_message);
        }
        let body = ErrorBody {
            detail: self.user_message(),
        };
        (status, axum::Json(body)).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        ApiError::new(ErrorKind::Internal, e.to_string())
    }
}

impl From<std::io::Error> for ApiError {
    fn from(e: std::io::Error) -> Self {
        ApiError::new(ErrorKind::Internal, e.to_string())
    }
}
