use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::db::models::{Channel, ChannelWithMembers, MemberDetail, NewChannel, UpdateDocument};
use crate::db::object_id::{self, ObjectId};
use crate::db::store::{ChannelFilter, ChannelStore, StoreError};
use crate::error::ChannelError;

/// Mediates every store access for channels and turns store outcomes into
/// `ChannelError` kinds. Each store call is bounded by `query_timeout`.
#[derive(Clone)]
pub struct ChannelRepository {
    store: Arc<dyn ChannelStore>,
    query_timeout: Duration,
}

impl ChannelRepository {
    pub fn new(store: Arc<dyn ChannelStore>, query_timeout: Duration) -> Self {
        ChannelRepository {
            store,
            query_timeout,
        }
    }

    async fn bounded<T>(
        &self,
        operation: &'static str,
        fut: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, StoreError> {
        match tokio::time::timeout(self.query_timeout, fut).await {
            Ok(result) => result,
            Err(_) => {
                warn!(operation, timeout = ?self.query_timeout, "Store call timed out.");
                Err(StoreError::Timeout(self.query_timeout))
            }
        }
    }

    fn database_failure(operation: &'static str, err: StoreError) -> ChannelError {
        error!(operation, error = %err, "Channel store failure.");
        ChannelError::DatabaseFailure(err)
    }

    /// Inserts `channel` unless an existing channel already contains all of
    /// its members.
    pub async fn create(&self, channel: NewChannel) -> Result<Channel, ChannelError> {
        let filter = ChannelFilter::containing_members(channel.members.clone());
        let existing = self
            .bounded("create.find_one", self.store.find_one(&filter))
            .await
            .map_err(|e| Self::database_failure("create.find_one", e))?;
        if let Some(existing) = existing {
            debug!(existing_id = %existing.id, "Channel with these members already exists.");
            return Err(ChannelError::ChannelAlreadyExists);
        }

        match self
            .bounded("create.insert_one", self.store.insert_one(channel))
            .await
        {
            Ok(created) => {
                info!(channel_id = %created.id, members = created.members.len(), "Channel created.");
                Ok(created)
            }
            // Lost the race against a concurrent create with the same members.
            Err(StoreError::DuplicateKey) => Err(ChannelError::ChannelAlreadyExists),
            Err(e) => Err(Self::database_failure("create.insert_one", e)),
        }
    }

    pub async fn get(&self, id: ObjectId) -> Result<Channel, ChannelError> {
        self.bounded("get", self.store.find_one(&ChannelFilter::by_id(id)))
            .await
            .map_err(|e| Self::database_failure("get", e))?
            .ok_or(ChannelError::ChannelNotFound)
    }

    /// Offset pagination: skips `offset * limit` matches and takes `limit`.
    pub async fn list(
        &self,
        channel_ids: Vec<ObjectId>,
        user_ids: Vec<ObjectId>,
        limit: u64,
        offset: u64,
    ) -> Result<Vec<Channel>, ChannelError> {
        let filter = ChannelFilter {
            ids: channel_ids,
            members_all: user_ids,
        };
        self.bounded(
            "list",
            self.store
                .find_many(&filter, offset.saturating_mul(limit), limit),
        )
        .await
        .map_err(|e| Self::database_failure("list", e))
    }

    /// Lists the acting user's channels (narrowed by `channel_ids` and
    /// `user_ids` like `list`) with members expanded to profiles.
    pub async fn aggregate(
        &self,
        channel_ids: Vec<ObjectId>,
        user_ids: Vec<ObjectId>,
        acting_user_id: ObjectId,
        limit: u64,
        offset: u64,
    ) -> Result<Vec<ChannelWithMembers>, ChannelError> {
        let mut required = user_ids;
        required.push(acting_user_id);
        let required = object_id::dedup_preserving_order(required);

        let channels = self.list(channel_ids, required, limit, offset).await?;

        let member_ids = object_id::dedup_preserving_order(
            channels
                .iter()
                .flat_map(|c| c.members.iter().copied())
                .collect(),
        );
        let profiles: HashMap<ObjectId, MemberDetail> = self
            .bounded("aggregate.find_members", self.store.find_members(&member_ids))
            .await
            .map_err(|e| Self::database_failure("aggregate.find_members", e))?
            .into_iter()
            .map(|member| (member.id, member))
            .collect();

        Ok(channels
            .into_iter()
            .map(|channel| ChannelWithMembers {
                members: channel
                    .members
                    .iter()
                    .map(|id| {
                        profiles
                            .get(id)
                            .cloned()
                            .unwrap_or_else(|| MemberDetail::bare(*id))
                    })
                    .collect(),
                id: channel.id,
                name: channel.name,
                description: channel.description,
                admins: channel.admins,
                created_at: channel.created_at,
                updated_at: channel.updated_at,
            })
            .collect())
    }

    /// Applies a sparse update and returns the channel as stored afterwards.
    pub async fn update(
        &self,
        id: ObjectId,
        update: UpdateDocument,
    ) -> Result<Channel, ChannelError> {
        let filter = ChannelFilter::by_id(id);
        match self
            .bounded("update", self.store.find_one_and_update(&filter, &update))
            .await
        {
            Ok(Some(channel)) => {
                info!(channel_id = %id, fields = ?update.field_names(), "Channel updated.");
                Ok(channel)
            }
            Ok(None) => Err(ChannelError::ChannelNotFound),
            Err(StoreError::DuplicateKey) => Err(ChannelError::ChannelAlreadyExists),
            Err(StoreError::AdminsNotMembers) => Err(ChannelError::InvalidAdminsField),
            Err(e) => Err(Self::database_failure("update", e)),
        }
    }

    pub async fn delete(&self, id: ObjectId) -> Result<(), ChannelError> {
        let deleted = self
            .bounded("delete", self.store.delete_one(&ChannelFilter::by_id(id)))
            .await
            .map_err(|e| Self::database_failure("delete", e))?;
        if deleted == 0 {
            return Err(ChannelError::ChannelNotFound);
        }
        info!(channel_id = %id, "Channel deleted.");
        Ok(())
    }

    pub async fn ping(&self) -> Result<(), ChannelError> {
        self.bounded("ping", self.store.ping())
            .await
            .map_err(|e| Self::database_failure("ping", e))
    }
}
