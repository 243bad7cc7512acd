use sea_orm::entity::prelude::*;

/// Attendance edge from a user to a micropost event.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "t_attend")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub attendee_id: i32,
    pub attending_id: i32,
    pub created: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
