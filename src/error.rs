use thiserror::Error;

use crate::db::store::StoreError;

/// Every failure a channel use case can report to its caller.
#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("channels-api: invalid payload: {0}")]
    InvalidPayload(String),
    #[error("channels-api: channel already exists")]
    ChannelAlreadyExists,
    #[error("channels-api: invalid name field")]
    InvalidNameField,
    #[error("channels-api: invalid members field")]
    InvalidMembersField,
    #[error("channels-api: invalid admins field")]
    InvalidAdminsField,
    #[error("channels-api: invalid ID")]
    InvalidId,
    #[error("channels-api: invalid user ID sent")]
    InvalidUserIdSent,
    #[error("channels-api: user_id header is required")]
    MissingUserIdHeader,
    #[error("channels-api: channel not found")]
    ChannelNotFound,
    // The cause is kept for logs only; Display never shows it.
    #[error("channels-api: database failure")]
    DatabaseFailure(#[source] StoreError),
}

impl ChannelError {
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            ChannelError::InvalidNameField
                | ChannelError::InvalidMembersField
                | ChannelError::InvalidAdminsField
                | ChannelError::InvalidId
                | ChannelError::InvalidUserIdSent
                | ChannelError::MissingUserIdHeader
        )
    }
}
