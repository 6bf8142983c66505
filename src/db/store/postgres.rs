use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::{Expr, SimpleExpr};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, SqlErr, UpdateMany,
};
use tracing::debug;

use super::{ChannelFilter, ChannelStore, StoreError};
use crate::db::entities::{channel, user};
use crate::db::models::{admins_within_members, member_key, Channel, FieldUpdate, MemberDetail, NewChannel, UpdateDocument};
use crate::db::object_id::ObjectId;

/// Channel store backed by Postgres through SeaORM. Member and admin lists
/// live in `text[]` columns so containment maps onto `@>`.
#[derive(Clone)]
pub struct SeaOrmChannelStore {
    db: DatabaseConnection,
}

impl SeaOrmChannelStore {
    pub fn new(db: DatabaseConnection) -> Self {
        SeaOrmChannelStore { db }
    }
}

fn hex_ids(ids: &[ObjectId]) -> Vec<String> {
    ids.iter().map(ObjectId::to_hex).collect()
}

fn condition(filter: &ChannelFilter) -> Condition {
    let mut cond = Condition::all();
    if !filter.ids.is_empty() {
        cond = cond.add(channel::Column::Id.is_in(hex_ids(&filter.ids)));
    }
    if !filter.members_all.is_empty() {
        cond = cond.add(Expr::cust_with_values(
            r#""members" @> $1"#,
            [hex_ids(&filter.members_all)],
        ));
    }
    cond
}

/// Post-condition keeping `admins <@ members` when only one of the two
/// lists is replaced. The row is left alone when it does not hold.
fn membership_guard(update: &UpdateDocument) -> Result<Option<SimpleExpr>, StoreError> {
    match (update.members(), update.admins()) {
        (Some(members), Some(admins)) => {
            if admins_within_members(members, admins) {
                Ok(None)
            } else {
                Err(StoreError::AdminsNotMembers)
            }
        }
        (Some(members), None) => Ok(Some(Expr::cust_with_values(
            r#""admins" <@ $1"#,
            [hex_ids(members)],
        ))),
        (None, Some(admins)) => Ok(Some(Expr::cust_with_values(
            r#""members" @> $1"#,
            [hex_ids(admins)],
        ))),
        (None, None) => Ok(None),
    }
}

fn update_query(
    filter: &ChannelFilter,
    update: &UpdateDocument,
    now: DateTime<Utc>,
) -> Result<UpdateMany<channel::Entity>, StoreError> {
    let mut cond = condition(filter);
    if let Some(guard) = membership_guard(update)? {
        cond = cond.add(guard);
    }

    let mut query =
        channel::Entity::update_many().col_expr(channel::Column::UpdatedAt, Expr::value(now));
    for field in update.fields() {
        query = match field {
            FieldUpdate::Name(name) => {
                query.col_expr(channel::Column::Name, Expr::value(name.clone()))
            }
            FieldUpdate::Description(description) => query.col_expr(
                channel::Column::Description,
                Expr::value(description.clone()),
            ),
            FieldUpdate::Members(members) => query
                .col_expr(channel::Column::Members, Expr::value(hex_ids(members)))
                .col_expr(channel::Column::MemberKey, Expr::value(member_key(members))),
            FieldUpdate::Admins(admins) => {
                query.col_expr(channel::Column::Admins, Expr::value(hex_ids(admins)))
            }
        };
    }
    Ok(query.filter(cond))
}

fn classify_write_err(err: DbErr) -> StoreError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => StoreError::DuplicateKey,
        _ => StoreError::Db(err),
    }
}

fn parse_stored_ids(ids: Vec<String>) -> Result<Vec<ObjectId>, DbErr> {
    ids.iter()
        .map(|id| ObjectId::parse(id).map_err(|e| DbErr::Type(e.to_string())))
        .collect()
}

impl TryFrom<channel::Model> for Channel {
    type Error = DbErr;

    fn try_from(model: channel::Model) -> Result<Self, Self::Error> {
        Ok(Channel {
            id: ObjectId::parse(&model.id).map_err(|e| DbErr::Type(e.to_string()))?,
            name: model.name,
            description: model.description,
            members: parse_stored_ids(model.members)?,
            admins: parse_stored_ids(model.admins)?,
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }
}

impl TryFrom<user::Model> for MemberDetail {
    type Error = DbErr;

    fn try_from(model: user::Model) -> Result<Self, Self::Error> {
        Ok(MemberDetail {
            id: ObjectId::parse(&model.id).map_err(|e| DbErr::Type(e.to_string()))?,
            first_name: Some(model.first_name),
            last_name: Some(model.last_name),
            nickname: Some(model.nickname),
            email: Some(model.email),
        })
    }
}

#[async_trait]
impl ChannelStore for SeaOrmChannelStore {
    async fn find_one(&self, filter: &ChannelFilter) -> Result<Option<Channel>, StoreError> {
        let model = channel::Entity::find()
            .filter(condition(filter))
            .one(&self.db)
            .await?;
        Ok(model.map(Channel::try_from).transpose()?)
    }

    async fn insert_one(&self, new_channel: NewChannel) -> Result<Channel, StoreError> {
        let now = Utc::now();
        let key = new_channel.member_key();
        let active = channel::ActiveModel {
            id: Set(ObjectId::generate().to_hex()),
            name: Set(new_channel.name),
            description: Set(new_channel.description),
            members: Set(hex_ids(&new_channel.members)),
            admins: Set(hex_ids(&new_channel.admins)),
            member_key: Set(key),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let model = active.insert(&self.db).await.map_err(classify_write_err)?;
        debug!(channel_id = %model.id, "Inserted channel row.");
        Ok(Channel::try_from(model)?)
    }

    async fn find_many(
        &self,
        filter: &ChannelFilter,
        skip: u64,
        limit: u64,
    ) -> Result<Vec<Channel>, StoreError> {
        let models = channel::Entity::find()
            .filter(condition(filter))
            .order_by_asc(channel::Column::CreatedAt)
            .order_by_asc(channel::Column::Id)
            .offset(skip)
            .limit(limit)
            .all(&self.db)
            .await?;

        models
            .into_iter()
            .map(|m| Channel::try_from(m).map_err(StoreError::from))
            .collect()
    }

    async fn find_one_and_update(
        &self,
        filter: &ChannelFilter,
        update: &UpdateDocument,
    ) -> Result<Option<Channel>, StoreError> {
        if update.is_empty() {
            return self.find_one(filter).await;
        }

        let updated = update_query(filter, update, Utc::now())?
            .exec_with_returning(&self.db)
            .await
            .map_err(classify_write_err)?;

        match updated.into_iter().next() {
            Some(model) => Ok(Some(Channel::try_from(model)?)),
            // The guard rejected the row if it still exists.
            None if update.members().is_some() || update.admins().is_some() => {
                match self.find_one(filter).await? {
                    Some(_) => Err(StoreError::AdminsNotMembers),
                    None => Ok(None),
                }
            }
            None => Ok(None),
        }
    }

    async fn delete_one(&self, filter: &ChannelFilter) -> Result<u64, StoreError> {
        let result = channel::Entity::delete_many()
            .filter(condition(filter))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected)
    }

    async fn find_members(&self, ids: &[ObjectId]) -> Result<Vec<MemberDetail>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let models = user::Entity::find()
            .filter(user::Column::Id.is_in(hex_ids(ids)))
            .all(&self.db)
            .await?;

        models
            .into_iter()
            .map(|m| MemberDetail::try_from(m).map_err(StoreError::from))
            .collect()
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(self.db.ping().await?)
    }
}
