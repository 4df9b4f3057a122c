// envelope.rs - Response envelope and failure-to-status mapping.
//
// Success: {"ok": true, "data": <payload>}
// Failure: {"ok": false, "message": <user-facing text>}

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use fsyn_core::{ErrorKind, FsynError, Severity};

/// Successful response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub ok: bool,
    pub data: T,
}

/// Failure response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Failure {
    pub ok: bool,
    pub message: String,
}

/// Empty `{}` payload returned by uploads.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Empty {}

/// Wrap a payload in a success envelope.
pub fn ok<T: Serialize>(data: T) -> Json<Envelope<T>> {
    Json(Envelope { ok: true, data })
}

/// The HTTP status each failure kind maps to.
pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::MissingField
        | ErrorKind::MalformedDescriptor
        | ErrorKind::PathIsDirectory
        | ErrorKind::AlreadyExists
        | ErrorKind::ParentMissing
        | ErrorKind::FileTooLarge
        | ErrorKind::TreeTooDeep => StatusCode::BAD_REQUEST,
        ErrorKind::UploadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
        ErrorKind::MissingAuth | ErrorKind::BadAuth | ErrorKind::InvalidToken => {
            StatusCode::UNAUTHORIZED
        }
        ErrorKind::OutOfEndpoint => StatusCode::FORBIDDEN,
        ErrorKind::EndpointNotFound | ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::NotADirectory | ErrorKind::Filesystem => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// A handler failure, rendered as a failure envelope.
#[derive(Debug)]
pub enum ApiError {
    /// An operation failure with a known kind.
    Op(FsynError),
    /// Anything outside the taxonomy (a panicked blocking task, a response
    /// that failed to build). Logged in full, reported generically.
    Internal(String),
    /// No route matched.
    RouteNotFound,
    /// A failure status produced by the transport layers (wrong method,
    /// timeout) rather than by an operation.
    Rejected(StatusCode),
}

impl From<FsynError> for ApiError {
    fn from(err: FsynError) -> Self {
        ApiError::Op(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Op(err) => status_for(err.kind()),
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::RouteNotFound => StatusCode::NOT_FOUND,
            ApiError::Rejected(status) => *status,
        }
    }

    pub fn message(&self) -> String {
        match self {
            ApiError::Op(err) => err.user_message(),
            ApiError::Internal(_) => "internal server error happened".to_string(),
            ApiError::RouteNotFound => "route not found".to_string(),
            ApiError::Rejected(status) => status
                .canonical_reason()
                .unwrap_or("request rejected")
                .to_lowercase(),
        }
    }

    fn log(&self) {
        match self {
            ApiError::Op(err) => match err.severity() {
                Severity::Warn => tracing::warn!(kind = ?err.kind(), "{}", err),
                Severity::Error => tracing::error!(kind = ?err.kind(), "{}", err),
            },
            ApiError::Internal(detail) => tracing::error!("internal error: {}", detail),
            ApiError::RouteNotFound => tracing::debug!("no route matched"),
            ApiError::Rejected(status) => tracing::warn!("request rejected with {}", status),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        self.log();
        let body = Failure {
            ok: false,
            message: self.message(),
        };
        (self.status(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::path::PathBuf;

    #[test]
    fn every_kind_has_a_client_or_server_status() {
        for kind in ErrorKind::ALL {
            let status = status_for(kind);
            assert!(
                status.is_client_error() || status.is_server_error(),
                "{:?} -> {}",
                kind,
                status
            );
            // Server faults and only server faults are logged at error level.
            assert_eq!(
                status.is_server_error(),
                kind.severity() == Severity::Error,
                "{:?}",
                kind
            );
        }
    }

    #[test]
    fn representative_statuses() {
        assert_eq!(status_for(ErrorKind::MissingField), StatusCode::BAD_REQUEST);
        assert_eq!(status_for(ErrorKind::InvalidToken), StatusCode::UNAUTHORIZED);
        assert_eq!(status_for(ErrorKind::OutOfEndpoint), StatusCode::FORBIDDEN);
        assert_eq!(status_for(ErrorKind::NotFound), StatusCode::NOT_FOUND);
        assert_eq!(
            status_for(ErrorKind::UploadTooLarge),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(
            status_for(ErrorKind::Filesystem),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn filesystem_detail_stays_out_of_the_message() {
        let err = ApiError::from(FsynError::IoError {
            path: PathBuf::from("/srv/secret/place"),
            source: io::Error::other("disk on fire"),
        });
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let message = err.message();
        assert!(!message.contains("/srv/secret"));
        assert!(!message.contains("disk on fire"));
    }

    #[test]
    fn rejections_keep_their_status() {
        let err = ApiError::Rejected(StatusCode::REQUEST_TIMEOUT);
        assert_eq!(err.status(), StatusCode::REQUEST_TIMEOUT);
        assert_eq!(err.message(), "request timeout");

        let err = ApiError::Rejected(StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(err.message(), "method not allowed");
    }

    #[test]
    fn envelopes_serialize_with_ok_flag() {
        let success = serde_json::to_value(Envelope {
            ok: true,
            data: Empty {},
        })
        .unwrap();
        assert_eq!(success, serde_json::json!({"ok": true, "data": {}}));

        let failure = serde_json::to_value(Failure {
            ok: false,
            message: "file not found".into(),
        })
        .unwrap();
        assert_eq!(
            failure,
            serde_json::json!({"ok": false, "message": "file not found"})
        );
    }
}
