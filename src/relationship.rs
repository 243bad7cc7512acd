use chrono::Utc;
use log::debug;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, ModelTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, SqlErr,
};

use crate::account::find_user;
use crate::entity::{relationship, user};
use crate::error::{AppError, EdgeKind};

async fn find_edge<C: ConnectionTrait>(
    db: &C,
    follower_id: i32,
    followed_id: i32,
) -> Result<Option<relationship::Model>, AppError> {
    Ok(relationship::Entity::find()
        .filter(relationship::Column::FollowerId.eq(follower_id))
        .filter(relationship::Column::FollowedId.eq(followed_id))
        .one(db)
        .await?)
}

/// Creates the edge `user_id -> other_id`. Following twice returns the
/// existing edge; following yourself is rejected.
pub async fn follow<C: ConnectionTrait>(
    db: &C,
    user_id: i32,
    other_id: i32,
) -> Result<relationship::Model, AppError> {
    if user_id == other_id {
        return Err(AppError::invalid("followed_id", "can't be yourself"));
    }
    find_user(db, user_id).await?;
    find_user(db, other_id).await?;
    if let Some(existing) = find_edge(db, user_id, other_id).await? {
        return Ok(existing);
    }

    let inserted = relationship::ActiveModel {
        follower_id: Set(user_id),
        followed_id: Set(other_id),
        created: Set(Some(Utc::now())),
        ..Default::default()
    }
    .insert(db)
    .await;
    match inserted {
        Ok(edge) => {
            debug!("follow {} -> {}", user_id, other_id);
            Ok(edge)
        }
        // a concurrent follow won the unique index
        Err(err) if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
            find_edge(db, user_id, other_id).await?.ok_or(AppError::Storage(err))
        }
        Err(err) => Err(err.into()),
    }
}

pub async fn unfollow<C: ConnectionTrait>(db: &C, user_id: i32, other_id: i32) -> Result<(), AppError> {
    let edge = find_edge(db, user_id, other_id)
        .await?
        .ok_or(AppError::EdgeNotFound {
            kind: EdgeKind::Follow,
            from: user_id,
            to: other_id,
        })?;
    edge.delete(db).await?;
    debug!("unfollow {} -> {}", user_id, other_id);
    Ok(())
}

pub async fn following<C: ConnectionTrait>(db: &C, user_id: i32, other_id: i32) -> Result<bool, AppError> {
    let count = relationship::Entity::find()
        .filter(relationship::Column::FollowerId.eq(user_id))
        .filter(relationship::Column::FollowedId.eq(other_id))
        .count(db)
        .await?;
    Ok(count > 0)
}

/// Ids of the users `user_id` follows, in follow order.
pub async fn followed_ids<C: ConnectionTrait>(db: &C, user_id: i32) -> Result<Vec<i32>, AppError> {
    Ok(relationship::Entity::find()
        .select_only()
        .column(relationship::Column::FollowedId)
        .filter(relationship::Column::FollowerId.eq(user_id))
        .order_by_asc(relationship::Column::Id)
        .into_tuple()
        .all(db)
        .await?)
}

/// Ids of the users following `user_id`, in follow order.
pub async fn follower_ids<C: ConnectionTrait>(db: &C, user_id: i32) -> Result<Vec<i32>, AppError> {
    Ok(relationship::Entity::find()
        .select_only()
        .column(relationship::Column::FollowerId)
        .filter(relationship::Column::FollowedId.eq(user_id))
        .order_by_asc(relationship::Column::Id)
        .into_tuple()
        .all(db)
        .await?)
}

pub async fn following_users<C: ConnectionTrait>(db: &C, user_id: i32) -> Result<Vec<user::Model>, AppError> {
    let ids = followed_ids(db, user_id).await?;
    load_users(db, ids).await
}

pub async fn followers<C: ConnectionTrait>(db: &C, user_id: i32) -> Result<Vec<user::Model>, AppError> {
    let ids = follower_ids(db, user_id).await?;
    load_users(db, ids).await
}

async fn load_users<C: ConnectionTrait>(db: &C, ids: Vec<i32>) -> Result<Vec<user::Model>, AppError> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    Ok(user::Entity::find()
        .filter(user::Column::Id.is_in(ids))
        .order_by_asc(user::Column::Id)
        .all(db)
        .await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::{create_user, destroy_user, NewUser};
    use crate::credential::testing::PlainHasher;
    use crate::db::testing::memory_db;

    async fn users(db: &sea_orm::DatabaseConnection) -> (user::Model, user::Model) {
        let a = create_user(db, &PlainHasher, NewUser::new("a", "a@example.com", "foobar")).await.unwrap();
        let b = create_user(db, &PlainHasher, NewUser::new("b", "b@example.com", "foobar")).await.unwrap();
        (a, b)
    }

    #[actix_rt::test]
    async fn follow_and_unfollow() {
        let db = memory_db().await;
        let (a, b) = users(&db).await;
        assert!(!following(&db, a.id, b.id).await.unwrap());

        follow(&db, a.id, b.id).await.unwrap();
        assert!(following(&db, a.id, b.id).await.unwrap());
        assert!(!following(&db, b.id, a.id).await.unwrap());
        assert_eq!(followed_ids(&db, a.id).await.unwrap(), vec![b.id]);
        assert_eq!(follower_ids(&db, b.id).await.unwrap(), vec![a.id]);
        let followed: Vec<i32> = following_users(&db, a.id).await.unwrap().into_iter().map(|u| u.id).collect();
        assert_eq!(followed, vec![b.id]);
        let fans: Vec<i32> = followers(&db, b.id).await.unwrap().into_iter().map(|u| u.id).collect();
        assert_eq!(fans, vec![a.id]);

        unfollow(&db, a.id, b.id).await.unwrap();
        assert!(!following(&db, a.id, b.id).await.unwrap());
        assert!(followed_ids(&db, a.id).await.unwrap().is_empty());
        assert!(followers(&db, b.id).await.unwrap().is_empty());
    }

    #[actix_rt::test]
    async fn unfollow_without_edge_is_an_error() {
        let db = memory_db().await;
        let (a, b) = users(&db).await;
        let err = unfollow(&db, a.id, b.id).await.unwrap_err();
        assert!(matches!(
            err,
            AppError::EdgeNotFound { kind: EdgeKind::Follow, from, to } if from == a.id && to == b.id
        ));
    }

    #[actix_rt::test]
    async fn follow_is_idempotent() {
        let db = memory_db().await;
        let (a, b) = users(&db).await;
        let first = follow(&db, a.id, b.id).await.unwrap();
        let second = follow(&db, a.id, b.id).await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(relationship::Entity::find().count(&db).await.unwrap(), 1);
    }

    #[actix_rt::test]
    async fn follow_rejects_self_and_unknown_users() {
        let db = memory_db().await;
        let (a, _) = users(&db).await;
        assert!(matches!(follow(&db, a.id, a.id).await, Err(AppError::Validation(_))));
        assert!(matches!(follow(&db, a.id, 999).await, Err(AppError::NotFound("user"))));
    }

    #[actix_rt::test]
    async fn deleted_user_cannot_follow() {
        let db = memory_db().await;
        let (a, b) = users(&db).await;
        destroy_user(&db, a.id).await.unwrap();
        assert!(matches!(follow(&db, a.id, b.id).await, Err(AppError::NotFound("user"))));
        assert_eq!(relationship::Entity::find().count(&db).await.unwrap(), 0);
    }

    #[actix_rt::test]
    async fn pair_index_rejects_a_second_edge() {
        let db = memory_db().await;
        let (a, b) = users(&db).await;
        let first = follow(&db, a.id, b.id).await.unwrap();
        let err = relationship::ActiveModel {
            follower_id: Set(a.id),
            followed_id: Set(b.id),
            ..Default::default()
        }
        .insert(&db)
        .await
        .unwrap_err();
        assert!(matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))));
        assert_eq!(follow(&db, a.id, b.id).await.unwrap().id, first.id);
    }
}
