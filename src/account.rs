use chrono::Utc;
use log::{debug, info};
use once_cell::sync::Lazy;
use regex::Regex;
use sea_orm::{
    sea_query::Query, ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection,
    DbErr, EntityTrait, QueryFilter, Set, SqlErr, TransactionTrait,
};

use crate::credential::{self, PasswordHasher};
use crate::db::map_tx_error;
use crate::entity::{attend, micropost, relationship, user};
use crate::error::{AppError, ValidationErrors};

pub const NAME_MAX_CHARS: usize = 50;
pub const EMAIL_MAX_CHARS: usize = 200;
pub const PASSWORD_MIN_CHARS: usize = 6;
/// bcrypt ignores input past this many bytes.
pub const PASSWORD_MAX_BYTES: usize = 72;

static EMAIL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i-u)^[\w+\-.]+@[a-z\d\-.]+\.[a-z]+$").expect("email pattern compiles")
});

#[derive(Clone, Debug)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password: String,
    pub password_confirmation: Option<String>,
}

impl NewUser {
    pub fn new(name: impl Into<String>, email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            password: password.into(),
            password_confirmation: None,
        }
    }
}

/// Partial update; `None` keeps the stored value.
#[derive(Clone, Debug, Default)]
pub struct UserChanges {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub password_confirmation: Option<String>,
}

pub fn normalize_email(email: &str) -> String {
    email.to_lowercase()
}

pub fn valid_email(email: &str) -> bool {
    EMAIL_REGEX.is_match(email)
}

fn validate_name(name: &str, errors: &mut ValidationErrors) {
    if name.trim().is_empty() {
        errors.add("name", "can't be blank");
    } else if name.chars().count() > NAME_MAX_CHARS {
        errors.add("name", format!("is too long (maximum is {} characters)", NAME_MAX_CHARS));
    }
}

/// Runs on the address as submitted, before lowercasing.
fn validate_email(email: &str, errors: &mut ValidationErrors) {
    if email.trim().is_empty() {
        errors.add("email", "can't be blank");
        return;
    }
    if email.chars().count() > EMAIL_MAX_CHARS {
        errors.add("email", format!("is too long (maximum is {} characters)", EMAIL_MAX_CHARS));
    }
    if !valid_email(email) {
        errors.add("email", "is invalid");
    }
}

fn validate_password(password: &str, confirmation: Option<&str>, errors: &mut ValidationErrors) {
    if password.trim().is_empty() {
        errors.add("password", "can't be blank");
        return;
    }
    if password.chars().count() < PASSWORD_MIN_CHARS {
        errors.add("password", format!("is too short (minimum is {} characters)", PASSWORD_MIN_CHARS));
    }
    if password.len() > PASSWORD_MAX_BYTES {
        errors.add("password", format!("is too long (maximum is {} bytes)", PASSWORD_MAX_BYTES));
    }
    if let Some(confirmation) = confirmation {
        if confirmation != password {
            errors.add("password_confirmation", "doesn't match password");
        }
    }
}

/// Case-insensitive because stored emails are always lowercase.
async fn email_taken<C: ConnectionTrait>(db: &C, email: &str, except: Option<i32>) -> Result<bool, DbErr> {
    let mut query = user::Entity::find().filter(user::Column::Email.eq(normalize_email(email)));
    if let Some(id) = except {
        query = query.filter(user::Column::Id.ne(id));
    }
    Ok(query.one(db).await?.is_some())
}

fn map_write_error(err: DbErr) -> AppError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => AppError::invalid("email", "has already been taken"),
        _ => AppError::Storage(err),
    }
}

pub async fn find_user<C: ConnectionTrait>(db: &C, id: i32) -> Result<user::Model, AppError> {
    user::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or(AppError::NotFound("user"))
}

pub async fn create_user<C, H>(db: &C, hasher: &H, new: NewUser) -> Result<user::Model, AppError>
where
    C: ConnectionTrait,
    H: PasswordHasher + ?Sized,
{
    let email = normalize_email(&new.email);

    let mut errors = ValidationErrors::new();
    validate_name(&new.name, &mut errors);
    validate_email(&new.email, &mut errors);
    validate_password(&new.password, new.password_confirmation.as_deref(), &mut errors);
    if !errors.has("email") && email_taken(db, &email, None).await? {
        errors.add("email", "has already been taken");
    }
    errors.into_result()?;

    let password_digest = credential::digest(hasher, &new.password)?;
    let now = Utc::now();
    let model = user::ActiveModel {
        name: Set(new.name),
        email: Set(email),
        password_digest: Set(password_digest),
        remember_digest: Set(None),
        created: Set(Some(now)),
        updated: Set(Some(now)),
        ..Default::default()
    };
    let inserted = model.insert(db).await.map_err(map_write_error)?;
    info!("user created id={}", inserted.id);
    Ok(inserted)
}

pub async fn update_user<C, H>(
    db: &C,
    hasher: &H,
    id: i32,
    changes: UserChanges,
) -> Result<user::Model, AppError>
where
    C: ConnectionTrait,
    H: PasswordHasher + ?Sized,
{
    let existing = find_user(db, id).await?;
    let name = changes.name.unwrap_or(existing.name);
    let raw_email = changes.email.as_deref().unwrap_or(&existing.email);
    let email = normalize_email(raw_email);

    let mut errors = ValidationErrors::new();
    validate_name(&name, &mut errors);
    validate_email(raw_email, &mut errors);
    match changes.password.as_deref() {
        Some(password) => {
            validate_password(password, changes.password_confirmation.as_deref(), &mut errors)
        }
        None if existing.password_digest.is_empty() => errors.add("password", "can't be blank"),
        None => {}
    }
    if !errors.has("email") && email_taken(db, &email, Some(id)).await? {
        errors.add("email", "has already been taken");
    }
    errors.into_result()?;

    let mut active = user::ActiveModel {
        id: Set(id),
        name: Set(name),
        email: Set(email),
        updated: Set(Some(Utc::now())),
        ..Default::default()
    };
    if let Some(password) = changes.password {
        active.password_digest = Set(credential::digest(hasher, &password)?);
    }

    let updated = user::Entity::update(active)
        .exec(db)
        .await
        .map_err(map_write_error)?;
    debug!("user updated id={}", id);
    Ok(updated)
}

/// Password login. Unknown email and wrong password both yield `None`.
pub async fn authenticate<C, H>(
    db: &C,
    hasher: &H,
    email: &str,
    password: &str,
) -> Result<Option<user::Model>, AppError>
where
    C: ConnectionTrait,
    H: PasswordHasher + ?Sized,
{
    let user = user::Entity::find()
        .filter(user::Column::Email.eq(normalize_email(email)))
        .one(db)
        .await?;
    Ok(user.filter(|u| hasher.verify(password, &u.password_digest)))
}

/// Removes the user with its microposts and every edge touching either.
pub async fn destroy_user(db: &DatabaseConnection, id: i32) -> Result<(), AppError> {
    find_user(db, id).await?;

    db.transaction::<_, (), AppError>(move |txn| {
        Box::pin(async move {
            let own_posts = Query::select()
                .column(micropost::Column::Id)
                .from(micropost::Entity)
                .and_where(micropost::Column::UserId.eq(id))
                .to_owned();
            attend::Entity::delete_many()
                .filter(
                    Condition::any()
                        .add(attend::Column::AttendeeId.eq(id))
                        .add(attend::Column::AttendingId.in_subquery(own_posts)),
                )
                .exec(txn)
                .await?;
            relationship::Entity::delete_many()
                .filter(
                    Condition::any()
                        .add(relationship::Column::FollowerId.eq(id))
                        .add(relationship::Column::FollowedId.eq(id)),
                )
                .exec(txn)
                .await?;
            micropost::Entity::delete_many()
                .filter(micropost::Column::UserId.eq(id))
                .exec(txn)
                .await?;
            user::Entity::delete_by_id(id).exec(txn).await?;
            Ok(())
        })
    })
    .await
    .map_err(map_tx_error)?;

    info!("user destroyed id={}", id);
    Ok(())
}
