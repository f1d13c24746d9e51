//! HTTP Error Types
//!
//! Every failure on `/invoke` and the reflection routes is reported as a
//! status code with a `text/plain` message body.

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};

use crate::error::ExtFuncError;

/// Error that can be returned from handlers
#[derive(Debug)]
pub struct HttpError {
    pub status: StatusCode,
    pub message: String,
}

impl HttpError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        (
            self.status,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            self.message,
        )
            .into_response()
    }
}

impl From<ExtFuncError> for HttpError {
    fn from(err: ExtFuncError) -> Self {
        tracing::error!(
            value_error = err.is_value_error(),
            error = %err.chain(),
            "request_failed"
        );
        HttpError::internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DispatchError;

    #[test]
    fn test_dispatch_error_maps_to_500() {
        let err: HttpError = ExtFuncError::from(DispatchError::NotFound("nope".into())).into();
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.message.contains("nope"));
    }

    #[test]
    fn test_response_is_plain_text() {
        let resp = HttpError::internal("boom").into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            resp.headers()[header::CONTENT_TYPE],
            "text/plain; charset=utf-8"
        );
    }
}
