use axum::http::HeaderMap;
use serde::Deserialize;

use crate::error::ChannelError;
use crate::server::config::ServerConfig;
use crate::services::ListChannelsQuery;

pub const USER_ID_HEADER: &str = "user_id";

/// Raw query string of `GET /v1/channels`.
#[derive(Debug, Default, Deserialize)]
pub struct ListChannelsParams {
    pub channel_ids: Option<String>,
    pub user_ids: Option<String>,
    pub show_members: Option<bool>,
    pub limit: Option<i64>,
    pub next_page: Option<i64>,
}

fn split_ids(raw: Option<&str>) -> Vec<String> {
    raw.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect()
}

impl ListChannelsParams {
    pub fn normalize(self, acting_user_id: String, config: &ServerConfig) -> ListChannelsQuery {
        let limit = match self.limit {
            Some(limit) if limit >= 1 => (limit as u64).min(config.max_page_size),
            _ => config.default_page_size,
        };
        let offset = self.next_page.filter(|page| *page > 0).unwrap_or(0) as u64;

        ListChannelsQuery {
            channel_ids: split_ids(self.channel_ids.as_deref()),
            user_ids: split_ids(self.user_ids.as_deref()),
            show_members: self.show_members.unwrap_or(false),
            acting_user_id,
            limit,
            offset,
        }
    }
}

/// The caller's id from the `user_id` header; absent or blank is rejected.
pub fn acting_user_id(headers: &HeaderMap) -> Result<String, ChannelError> {
    headers
        .get(USER_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .ok_or(ChannelError::MissingUserIdHeader)
}
