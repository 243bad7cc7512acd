use chrono::Utc;
use log::debug;
use sea_orm::{
    sea_query::Query, ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, ModelTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, SqlErr,
};

use crate::account::find_user;
use crate::entity::{attend, micropost};
use crate::error::{AppError, EdgeKind};

async fn find_edge<C: ConnectionTrait>(
    db: &C,
    user_id: i32,
    micropost_id: i32,
) -> Result<Option<attend::Model>, AppError> {
    Ok(attend::Entity::find()
        .filter(attend::Column::AttendeeId.eq(user_id))
        .filter(attend::Column::AttendingId.eq(micropost_id))
        .one(db)
        .await?)
}

/// Marks `user_id` as attending the event. Attending twice returns the
/// existing edge.
pub async fn attend<C: ConnectionTrait>(
    db: &C,
    user_id: i32,
    micropost_id: i32,
) -> Result<attend::Model, AppError> {
    find_user(db, user_id).await?;
    micropost::Entity::find_by_id(micropost_id)
        .one(db)
        .await?
        .ok_or(AppError::NotFound("micropost"))?;
    if let Some(existing) = find_edge(db, user_id, micropost_id).await? {
        return Ok(existing);
    }

    let inserted = attend::ActiveModel {
        attendee_id: Set(user_id),
        attending_id: Set(micropost_id),
        created: Set(Some(Utc::now())),
        ..Default::default()
    }
    .insert(db)
    .await;
    match inserted {
        Ok(edge) => {
            debug!("attend {} -> {}", user_id, micropost_id);
            Ok(edge)
        }
        Err(err) if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
            find_edge(db, user_id, micropost_id).await?.ok_or(AppError::Storage(err))
        }
        Err(err) => Err(err.into()),
    }
}

pub async fn unattend<C: ConnectionTrait>(db: &C, user_id: i32, micropost_id: i32) -> Result<(), AppError> {
    let edge = find_edge(db, user_id, micropost_id)
        .await?
        .ok_or(AppError::EdgeNotFound {
            kind: EdgeKind::Attend,
            from: user_id,
            to: micropost_id,
        })?;
    edge.delete(db).await?;
    debug!("unattend {} -> {}", user_id, micropost_id);
    Ok(())
}

pub async fn attending<C: ConnectionTrait>(db: &C, user_id: i32, micropost_id: i32) -> Result<bool, AppError> {
    Ok(find_edge(db, user_id, micropost_id).await?.is_some())
}

pub async fn attending_ids<C: ConnectionTrait>(db: &C, user_id: i32) -> Result<Vec<i32>, AppError> {
    Ok(attend::Entity::find()
        .select_only()
        .column(attend::Column::AttendingId)
        .filter(attend::Column::AttendeeId.eq(user_id))
        .order_by_asc(attend::Column::Id)
        .into_tuple()
        .all(db)
        .await?)
}

/// Events the user attends, soonest first.
pub async fn attending_posts<C: ConnectionTrait>(db: &C, user_id: i32) -> Result<Vec<micropost::Model>, AppError> {
    let ids = Query::select()
        .column(attend::Column::AttendingId)
        .from(attend::Entity)
        .and_where(attend::Column::AttendeeId.eq(user_id))
        .to_owned();
    Ok(micropost::Entity::find()
        .filter(micropost::Column::Id.in_subquery(ids))
        .order_by_asc(micropost::Column::EventDate)
        .order_by_asc(micropost::Column::Id)
        .all(db)
        .await?)
}

pub async fn attendee_count<C: ConnectionTrait>(db: &C, micropost_id: i32) -> Result<u64, AppError> {
    Ok(attend::Entity::find()
        .filter(attend::Column::AttendingId.eq(micropost_id))
        .count(db)
        .await?)
}
