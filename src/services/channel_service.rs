use tracing::{debug, instrument};

use crate::db::models::{
    Channel, ChannelPage, ChannelPatchRequest, ChannelRequest, ChannelResponse,
};
use crate::db::object_id::{self, IdPolicy, ObjectId};
use crate::db::repository::ChannelRepository;
use crate::error::ChannelError;

/// Normalized input of a list call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListChannelsQuery {
    pub channel_ids: Vec<String>,
    pub user_ids: Vec<String>,
    pub show_members: bool,
    /// Id of the caller, taken from the `user_id` header.
    pub acting_user_id: String,
    pub limit: u64,
    /// Zero-based page index.
    pub offset: u64,
}

/// When a listed page advertises a following page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextPagePolicy {
    /// Any non-empty page points at the next one.
    NonEmpty,
    /// Only a page filled up to `limit` points at the next one.
    FullPage,
}

impl NextPagePolicy {
    pub fn next_page(self, returned: usize, limit: u64, offset: u64) -> Option<u64> {
        let has_next = match self {
            NextPagePolicy::NonEmpty => returned > 0,
            NextPagePolicy::FullPage => returned > 0 && returned as u64 == limit,
        };
        has_next.then(|| offset + 1)
    }
}

const PLAIN_LIST_NEXT_PAGE: NextPagePolicy = NextPagePolicy::NonEmpty;
const AGGREGATED_LIST_NEXT_PAGE: NextPagePolicy = NextPagePolicy::FullPage;

pub struct ChannelService {
    repository: ChannelRepository,
}

fn parse_id(id: &str) -> Result<ObjectId, ChannelError> {
    ObjectId::parse(id).map_err(|_| ChannelError::InvalidId)
}

impl ChannelService {
    pub fn new(repository: ChannelRepository) -> Self {
        ChannelService { repository }
    }

    #[instrument(skip_all, fields(name = %request.name))]
    pub async fn create(&self, request: ChannelRequest) -> Result<Channel, ChannelError> {
        request.validate()?;
        self.repository.create(request.to_channel()).await
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: &str) -> Result<Channel, ChannelError> {
        let id = parse_id(id)?;
        self.repository.get(id).await
    }

    #[instrument(skip_all, fields(show_members = query.show_members, limit = query.limit, offset = query.offset))]
    pub async fn list(&self, query: ListChannelsQuery) -> Result<ChannelPage, ChannelError> {
        // Filter ids that do not parse are dropped rather than failing the call.
        let channel_ids = object_id::parse_all(&query.channel_ids, IdPolicy::SkipInvalid)
            .map_err(|_| ChannelError::InvalidId)?;
        let user_ids = object_id::parse_all(&query.user_ids, IdPolicy::SkipInvalid)
            .map_err(|_| ChannelError::InvalidUserIdSent)?;
        debug!(
            channel_ids = channel_ids.len(),
            user_ids = user_ids.len(),
            "Parsed list filters."
        );

        if query.show_members {
            let acting_user_id = ObjectId::parse(&query.acting_user_id)
                .map_err(|_| ChannelError::InvalidUserIdSent)?;
            let channels = self
                .repository
                .aggregate(channel_ids, user_ids, acting_user_id, query.limit, query.offset)
                .await?;
            let next_page =
                AGGREGATED_LIST_NEXT_PAGE.next_page(channels.len(), query.limit, query.offset);
            return Ok(ChannelPage::Aggregated(ChannelResponse {
                channels,
                next_page,
            }));
        }

        let channels = self
            .repository
            .list(channel_ids, user_ids, query.limit, query.offset)
            .await?;
        let next_page = PLAIN_LIST_NEXT_PAGE.next_page(channels.len(), query.limit, query.offset);
        Ok(ChannelPage::Plain(ChannelResponse {
            channels,
            next_page,
        }))
    }

    #[instrument(skip(self, request))]
    pub async fn update(
        &self,
        id: &str,
        request: ChannelPatchRequest,
    ) -> Result<Channel, ChannelError> {
        let id = parse_id(id)?;
        request.validate()?;
        let update = request.to_update_document()?;
        self.repository.update(id, update).await
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: &str) -> Result<(), ChannelError> {
        let id = parse_id(id)?;
        self.repository.delete(id).await
    }

    pub async fn health(&self) -> Result<(), ChannelError> {
        self.repository.ping().await
    }
}
