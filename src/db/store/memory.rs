use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::{ChannelFilter, ChannelStore, StoreError};
use crate::db::models::{admins_within_members, member_key, Channel, MemberDetail, NewChannel, UpdateDocument};
use crate::db::object_id::ObjectId;

/// Process-local channel store. Documents keep insertion order, and the
/// member-key uniqueness rule is enforced under the write lock.
#[derive(Default)]
pub struct InMemoryChannelStore {
    channels: RwLock<Vec<Channel>>,
    members: RwLock<HashMap<ObjectId, MemberDetail>>,
}

impl InMemoryChannelStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds member profiles used by the aggregated listing.
    pub async fn insert_member(&self, member: MemberDetail) {
        self.members.write().await.insert(member.id, member);
    }

    pub async fn len(&self) -> usize {
        self.channels.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

fn key_taken(channels: &[Channel], key: &str, except: Option<ObjectId>) -> bool {
    channels
        .iter()
        .filter(|c| Some(c.id) != except)
        .any(|c| member_key(&c.members) == key)
}

#[async_trait]
impl ChannelStore for InMemoryChannelStore {
    async fn find_one(&self, filter: &ChannelFilter) -> Result<Option<Channel>, StoreError> {
        let channels = self.channels.read().await;
        Ok(channels.iter().find(|c| filter.matches(c)).cloned())
    }

    async fn insert_one(&self, new_channel: NewChannel) -> Result<Channel, StoreError> {
        let mut channels = self.channels.write().await;
        if key_taken(&channels, &new_channel.member_key(), None) {
            return Err(StoreError::DuplicateKey);
        }

        let now = Utc::now();
        let channel = Channel {
            id: ObjectId::generate(),
            name: new_channel.name,
            description: new_channel.description,
            members: new_channel.members,
            admins: new_channel.admins,
            created_at: now,
            updated_at: now,
        };
        channels.push(channel.clone());
        Ok(channel)
    }

    async fn find_many(
        &self,
        filter: &ChannelFilter,
        skip: u64,
        limit: u64,
    ) -> Result<Vec<Channel>, StoreError> {
        let channels = self.channels.read().await;
        Ok(channels
            .iter()
            .filter(|c| filter.matches(c))
            .skip(skip as usize)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn find_one_and_update(
        &self,
        filter: &ChannelFilter,
        update: &UpdateDocument,
    ) -> Result<Option<Channel>, StoreError> {
        let mut channels = self.channels.write().await;
        let Some(index) = channels.iter().position(|c| filter.matches(c)) else {
            return Ok(None);
        };
        if update.is_empty() {
            return Ok(Some(channels[index].clone()));
        }

        let mut updated = channels[index].clone();
        update.apply_to(&mut updated);
        if !admins_within_members(&updated.members, &updated.admins) {
            return Err(StoreError::AdminsNotMembers);
        }
        if key_taken(&channels, &member_key(&updated.members), Some(updated.id)) {
            return Err(StoreError::DuplicateKey);
        }
        updated.updated_at = Utc::now();
        channels[index] = updated.clone();
        Ok(Some(updated))
    }

    async fn delete_one(&self, filter: &ChannelFilter) -> Result<u64, StoreError> {
        let mut channels = self.channels.write().await;
        match channels.iter().position(|c| filter.matches(c)) {
            Some(index) => {
                channels.remove(index);
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn find_members(&self, ids: &[ObjectId]) -> Result<Vec<MemberDetail>, StoreError> {
        let members = self.members.read().await;
        Ok(ids.iter().filter_map(|id| members.get(id).cloned()).collect())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(n: usize) -> Vec<ObjectId> {
        (0..n).map(|_| ObjectId::generate()).collect()
    }

    fn new_channel(name: &str, members: &[ObjectId]) -> NewChannel {
        NewChannel {
            name: name.to_string(),
            description: None,
            members: members.to_vec(),
            admins: vec![members[0]],
        }
    }

    #[tokio::test]
    async fn test_insert_rejects_same_member_key_in_any_order() {
        let store = InMemoryChannelStore::new();
        let m = ids(2);
        store.insert_one(new_channel("ops", &m)).await.unwrap();

        let reversed = vec![m[1], m[0]];
        let err = store.insert_one(new_channel("ops-2", &reversed)).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateKey));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_find_many_filters_and_paginates() {
        let store = InMemoryChannelStore::new();
        let shared = ObjectId::generate();
        for _ in 0..5 {
            let other = ObjectId::generate();
            store
                .insert_one(new_channel("team", &[shared, other]))
                .await
                .unwrap();
        }
        store.insert_one(new_channel("solo", &ids(2))).await.unwrap();

        let filter = ChannelFilter::containing_members(vec![shared]);
        assert_eq!(store.find_many(&filter, 0, 10).await.unwrap().len(), 5);
        assert_eq!(store.find_many(&filter, 4, 2).await.unwrap().len(), 1);
        assert_eq!(store.find_many(&ChannelFilter::default(), 0, 100).await.unwrap().len(), 6);
    }

    #[tokio::test]
    async fn test_update_cannot_collide_with_another_member_key() {
        let store = InMemoryChannelStore::new();
        let a = ids(2);
        let b = ids(2);
        store.insert_one(new_channel("a", &a)).await.unwrap();
        let second = store.insert_one(new_channel("b", &b)).await.unwrap();

        let update = UpdateDocument::builder()
            .members(Some(a.clone()))
            .admins(Some(vec![a[0]]))
            .build();
        let err = store
            .find_one_and_update(&ChannelFilter::by_id(second.id), &update)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateKey));
    }

    #[tokio::test]
    async fn test_update_keeps_admins_within_stored_members() {
        let store = InMemoryChannelStore::new();
        let m = ids(2);
        let channel = store.insert_one(new_channel("ops", &m)).await.unwrap();
        let filter = ChannelFilter::by_id(channel.id);

        let outsider = ObjectId::generate();
        let admins_only = UpdateDocument::builder().admins(Some(vec![outsider])).build();
        let err = store.find_one_and_update(&filter, &admins_only).await.unwrap_err();
        assert!(matches!(err, StoreError::AdminsNotMembers));

        // Dropping the current admin from the members is refused as well.
        let members_only = UpdateDocument::builder().members(Some(ids(2))).build();
        let err = store.find_one_and_update(&filter, &members_only).await.unwrap_err();
        assert!(matches!(err, StoreError::AdminsNotMembers));

        let stored = store.find_one(&filter).await.unwrap().unwrap();
        assert_eq!(stored, channel);

        let promote = UpdateDocument::builder().admins(Some(vec![m[1]])).build();
        let updated = store.find_one_and_update(&filter, &promote).await.unwrap().unwrap();
        assert_eq!(updated.admins, vec![m[1]]);
    }

    #[tokio::test]
    async fn test_delete_reports_count() {
        let store = InMemoryChannelStore::new();
        let channel = store.insert_one(new_channel("ops", &ids(2))).await.unwrap();
        let filter = ChannelFilter::by_id(channel.id);
        assert_eq!(store.delete_one(&filter).await.unwrap(), 1);
        assert_eq!(store.delete_one(&filter).await.unwrap(), 0);
        assert!(store.is_empty().await);
    }
}
