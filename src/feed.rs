//! Personal event feed: the user's own posts plus those of everyone they
//! follow, restricted to events no older than one day.
//!
//! The functions here only describe the query. Nothing touches the store
//! until the returned [`Select`] is executed, so callers can add filters,
//! paginate, or run it again later.

use chrono::{DateTime, Duration, Utc};
use sea_orm::{
    sea_query::{Expr, Query, SimpleExpr},
    ColumnTrait, Condition, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    Select,
};

use crate::entity::{micropost, relationship};
use crate::error::AppError;

pub fn window() -> Duration {
    Duration::days(1)
}

pub fn feed(user_id: i32) -> Select<micropost::Entity> {
    feed_at(user_id, Utc::now())
}

pub fn feed_at(user_id: i32, now: DateTime<Utc>) -> Select<micropost::Entity> {
    let followed_ids = Query::select()
        .column(relationship::Column::FollowedId)
        .from(relationship::Entity)
        .and_where(relationship::Column::FollowerId.eq(user_id))
        .to_owned();

    micropost::Entity::find()
        .filter(
            Condition::any()
                .add(micropost::Column::UserId.in_subquery(followed_ids))
                .add(micropost::Column::UserId.eq(user_id)),
        )
        .filter(micropost::Column::EventDate.gte(now - window()))
        .order_by_asc(micropost::Column::EventDate)
        .order_by_asc(micropost::Column::Id)
}

pub fn search(user_id: i32, term: Option<&str>) -> Select<micropost::Entity> {
    search_at(user_id, term, Utc::now())
}

/// Narrows the feed to posts whose content, event date or location contains
/// `term`, case-sensitively. A missing or empty term leaves the feed as is.
pub fn search_at(user_id: i32, term: Option<&str>, now: DateTime<Utc>) -> Select<micropost::Entity> {
    let query = feed_at(user_id, now);
    match term.filter(|t| !t.is_empty()) {
        Some(term) => query.filter(
            Condition::any()
                .add(contains_exact(micropost::Column::Content, term))
                .add(contains_exact(micropost::Column::EventDate, term))
                .add(contains_exact(micropost::Column::Location, term)),
        ),
        None => query,
    }
}

/// `instr` compares bytes, unlike `LIKE`, which folds ASCII case on SQLite
/// and treats `%` and `_` as wildcards.
fn contains_exact(column: micropost::Column, term: &str) -> SimpleExpr {
    Expr::cust_with_exprs(
        "instr($1, $2) > 0",
        [
            SimpleExpr::from(Expr::col((micropost::Entity, column))),
            SimpleExpr::from(Expr::val(term)),
        ],
    )
}

#[derive(Debug)]
pub struct FeedPage {
    pub items: Vec<micropost::Model>,
    pub total: u64,
    pub total_page: u64,
}

/// Executes a feed query one page at a time. `page` starts at 1.
pub async fn fetch_page<C: ConnectionTrait>(
    db: &C,
    query: Select<micropost::Entity>,
    page: u64,
    size: u64,
) -> Result<FeedPage, AppError> {
    let paginator = query.paginate(db, size.max(1));
    let counts = paginator.num_items_and_pages().await?;
    let items = paginator.fetch_page(page.max(1) - 1).await?;
    Ok(FeedPage {
        items,
        total: counts.number_of_items,
        total_page: counts.number_of_pages,
    })
}
