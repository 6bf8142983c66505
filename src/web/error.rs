use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::error::ChannelError;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: u16,
    pub message: String,
}

impl ChannelError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ChannelError::ChannelNotFound => StatusCode::NOT_FOUND,
            ChannelError::InvalidPayload(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ChannelError::ChannelAlreadyExists => StatusCode::BAD_REQUEST,
            e if e.is_validation() => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ChannelError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            code: status.as_u16(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::store::StoreError;
    use std::time::Duration;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ChannelError::ChannelNotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            ChannelError::InvalidPayload("eof".to_string()).status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        for err in [
            ChannelError::ChannelAlreadyExists,
            ChannelError::InvalidNameField,
            ChannelError::InvalidMembersField,
            ChannelError::InvalidAdminsField,
            ChannelError::InvalidId,
            ChannelError::InvalidUserIdSent,
            ChannelError::MissingUserIdHeader,
        ] {
            assert_eq!(err.status_code(), StatusCode::BAD_REQUEST, "{err}");
        }
        assert_eq!(
            ChannelError::DatabaseFailure(StoreError::Timeout(Duration::from_secs(1))).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_database_failure_message_hides_cause() {
        let err = ChannelError::DatabaseFailure(StoreError::Timeout(Duration::from_secs(1)));
        assert_eq!(err.to_string(), "channels-api: database failure");
    }
}
