use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use log::debug;
use rand::RngCore;
use sea_orm::{ConnectionTrait, EntityTrait, Set};

use crate::entity::user;
use crate::error::AppError;

/// Lowest cost bcrypt accepts, used by test configurations.
pub const MIN_COST: u32 = 4;

/// Hashing primitive used for passwords and remember tokens.
pub trait PasswordHasher: Send + Sync {
    fn hash(&self, plaintext: &str) -> Result<String, AppError>;

    /// Malformed digests verify as `false`.
    fn verify(&self, plaintext: &str, digest: &str) -> bool;
}

#[derive(Clone, Copy, Debug)]
pub struct BcryptHasher {
    cost: u32,
}

impl BcryptHasher {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }
}

impl Default for BcryptHasher {
    fn default() -> Self {
        Self::new(bcrypt::DEFAULT_COST)
    }
}

impl PasswordHasher for BcryptHasher {
    fn hash(&self, plaintext: &str) -> Result<String, AppError> {
        Ok(bcrypt::hash(plaintext, self.cost)?)
    }

    fn verify(&self, plaintext: &str, digest: &str) -> bool {
        bcrypt::verify(plaintext, digest).unwrap_or(false)
    }
}

pub fn digest<H: PasswordHasher + ?Sized>(hasher: &H, plaintext: &str) -> Result<String, AppError> {
    hasher.hash(plaintext)
}

/// 128 random bits, URL-safe base64 without padding.
pub fn new_token() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Stores the digest of a fresh remember token and hands the token back.
/// Only `remember_digest` is written.
pub async fn remember<C, H>(db: &C, hasher: &H, user: &mut user::Model) -> Result<String, AppError>
where
    C: ConnectionTrait,
    H: PasswordHasher + ?Sized,
{
    let token = new_token();
    let hashed = digest(hasher, &token)?;
    write_remember_digest(db, user.id, Some(hashed.clone())).await?;
    user.remember_digest = Some(hashed);
    debug!("remember token issued user_id={}", user.id);
    Ok(token)
}

pub fn authenticated<H: PasswordHasher + ?Sized>(hasher: &H, user: &user::Model, token: &str) -> bool {
    match user.remember_digest.as_deref() {
        Some(stored) if !stored.is_empty() => hasher.verify(token, stored),
        _ => false,
    }
}

pub async fn forget<C: ConnectionTrait>(db: &C, user: &mut user::Model) -> Result<(), AppError> {
    write_remember_digest(db, user.id, None).await?;
    user.remember_digest = None;
    debug!("remember token cleared user_id={}", user.id);
    Ok(())
}

async fn write_remember_digest<C: ConnectionTrait>(
    db: &C,
    user_id: i32,
    value: Option<String>,
) -> Result<(), AppError> {
    let active = user::ActiveModel {
        id: Set(user_id),
        remember_digest: Set(value),
        ..Default::default()
    };
    user::Entity::update(active).exec(db).await?;
    Ok(())
}
