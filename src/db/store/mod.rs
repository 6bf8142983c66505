//! The document-store contract the channel repository is written against.
//!
//! Absence is never an error here: lookups return `None`, deletes return the
//! number of removed documents. The repository decides what absence means.

use async_trait::async_trait;
use sea_orm::DbErr;
use std::time::Duration;

use crate::db::models::{Channel, MemberDetail, NewChannel, UpdateDocument};
use crate::db::object_id::ObjectId;

pub mod memory;
pub mod postgres;

pub use memory::InMemoryChannelStore;
pub use postgres::SeaOrmChannelStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("a channel with the same member key already exists")]
    DuplicateKey,
    #[error("the updated channel would have admins outside its members")]
    AdminsNotMembers,
    #[error("store operation timed out after {0:?}")]
    Timeout(Duration),
    #[error("Database error: {0}")]
    Db(#[from] DbErr),
}

/// Conjunction of the supplied constraints; an empty list constrains nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelFilter {
    /// Channel id must be one of these.
    pub ids: Vec<ObjectId>,
    /// Channel members must include every one of these.
    pub members_all: Vec<ObjectId>,
}

impl ChannelFilter {
    pub fn by_id(id: ObjectId) -> Self {
        ChannelFilter {
            ids: vec![id],
            members_all: Vec::new(),
        }
    }

    pub fn containing_members(members: Vec<ObjectId>) -> Self {
        ChannelFilter {
            ids: Vec::new(),
            members_all: members,
        }
    }

    pub fn matches(&self, channel: &Channel) -> bool {
        (self.ids.is_empty() || self.ids.contains(&channel.id))
            && self
                .members_all
                .iter()
                .all(|member| channel.members.contains(member))
    }
}

#[async_trait]
pub trait ChannelStore: Send + Sync {
    async fn find_one(&self, filter: &ChannelFilter) -> Result<Option<Channel>, StoreError>;

    /// Inserts with a freshly generated id. Fails with `DuplicateKey` when a
    /// channel with the same member key is already stored.
    async fn insert_one(&self, channel: NewChannel) -> Result<Channel, StoreError>;

    async fn find_many(
        &self,
        filter: &ChannelFilter,
        skip: u64,
        limit: u64,
    ) -> Result<Vec<Channel>, StoreError>;

    /// Applies `update` to the first match and returns the document as it is
    /// after the update. Fails with `AdminsNotMembers` when the resulting
    /// document would list an admin that is not a member.
    async fn find_one_and_update(
        &self,
        filter: &ChannelFilter,
        update: &UpdateDocument,
    ) -> Result<Option<Channel>, StoreError>;

    async fn delete_one(&self, filter: &ChannelFilter) -> Result<u64, StoreError>;

    /// Profiles for the given member ids; unknown ids are simply absent.
    async fn find_members(&self, ids: &[ObjectId]) -> Result<Vec<MemberDetail>, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}
