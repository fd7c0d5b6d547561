use serde::{Deserialize, Serialize};

/// The service's error taxonomy. Each variant maps to exactly one HTTP
/// status and one user-facing message class; job records persist the
/// variant's [`ErrorKind::as_str`] in `error_kind`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    Unauthenticated,
    Forbidden,
    QuotaExhausted,
    FileTooLarge,
    InvalidInput,
    InvalidPageSpec,
    PageOutOfRange,
    InvalidAngle,
    InvalidPassword,
    NotEncrypted,
    WrongPassword,
    PathEscape,
    NotFound,
    ProcessorError,
    SubprocessFailed,
    SubprocessTimeout,
    Busy,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Unauthenticated => "Unauthenticated",
            ErrorKind::Forbidden => "Forbidden",
            ErrorKind::QuotaExhausted => "QuotaExhausted",
            ErrorKind::FileTooLarge => "FileTooLarge",
            ErrorKind::InvalidInput => "InvalidInput",
            ErrorKind::InvalidPageSpec => "InvalidPageSpec",
            ErrorKind::PageOutOfRange => "PageOutOfRange",
            ErrorKind::InvalidAngle => "InvalidAngle",
            ErrorKind::InvalidPassword => "InvalidPassword",
            ErrorKind::NotEncrypted => "NotEncrypted",
            ErrorKind::WrongPassword => "WrongPassword",
            ErrorKind::PathEscape => "PathEscape",
            ErrorKind::NotFound => "NotFound",
            ErrorKind::ProcessorError => "ProcessorError",
            ErrorKind::SubprocessFailed => "SubprocessFailed",
            ErrorKind::SubprocessTimeout => "SubprocessTimeout",
            ErrorKind::Busy => "Busy",
            ErrorKind::Internal => "Internal",
        }
    }

    /// HTTP status code for this error kind.
    pub fn http_status(&self) -> u16 {
        match self {
            ErrorKind::Unauthenticated => 401,
            ErrorKind::Forbidden => 403,
            ErrorKind::QuotaExhausted => 403,
            ErrorKind::FileTooLarge => 413,
            ErrorKind::InvalidInput => 400,
            ErrorKind::InvalidPageSpec => 400,
            ErrorKind::PageOutOfRange => 400,
            ErrorKind::InvalidAngle => 400,
            ErrorKind::InvalidPassword => 400,
            ErrorKind::NotEncrypted => 400,
            ErrorKind::WrongPassword => 401,
            ErrorKind::PathEscape => 400,
            ErrorKind::NotFound => 404,
            ErrorKind::ProcessorError => 500,
            ErrorKind::SubprocessFailed => 500,
            ErrorKind::SubprocessTimeout => 504,
            ErrorKind::Busy => 503,
            ErrorKind::Internal => 500,
        }
    }

    /// True for errors the client may retry as-is (no state changed).
    pub fn is_retriable(&self) -> bool {
        matches!(self, ErrorKind::Busy | ErrorKind::Unauthenticated)
    }
}
