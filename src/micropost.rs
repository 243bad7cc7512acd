use chrono::{DateTime, Utc};
use log::debug;
use sea_orm::{ActiveModelTrait, ConnectionTrait, Set};

use crate::account::find_user;
use crate::entity::micropost;
use crate::error::{AppError, ValidationErrors};

pub const CONTENT_MAX_CHARS: usize = 140;

#[derive(Clone, Debug)]
pub struct NewMicropost {
    pub content: String,
    pub location: Option<String>,
    pub event_date: DateTime<Utc>,
}

impl NewMicropost {
    pub fn new(content: impl Into<String>, event_date: DateTime<Utc>) -> Self {
        Self {
            content: content.into(),
            location: None,
            event_date,
        }
    }

    pub fn at(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }
}

pub async fn create_micropost<C: ConnectionTrait>(
    db: &C,
    user_id: i32,
    new: NewMicropost,
) -> Result<micropost::Model, AppError> {
    let mut errors = ValidationErrors::new();
    if new.content.trim().is_empty() {
        errors.add("content", "can't be blank");
    } else if new.content.chars().count() > CONTENT_MAX_CHARS {
        errors.add("content", format!("is too long (maximum is {} characters)", CONTENT_MAX_CHARS));
    }
    errors.into_result()?;
    find_user(db, user_id).await?;

    let now = Utc::now();
    let location = new.location.filter(|l| !l.trim().is_empty());
    let inserted = micropost::ActiveModel {
        user_id: Set(user_id),
        content: Set(new.content),
        location: Set(location),
        event_date: Set(new.event_date),
        created: Set(Some(now)),
        updated: Set(Some(now)),
        ..Default::default()
    }
    .insert(db)
    .await?;
    debug!("micropost saved id={} user_id={}", inserted.id, user_id);
    Ok(inserted)
}
