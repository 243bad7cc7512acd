use actix_web::{web, HttpResponse};
use chrono::SecondsFormat;
use log::info;
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};

use crate::account::{self, NewUser, UserChanges};
use crate::auth::{issue_token, AuthUser};
use crate::config::AppConfig;
use crate::credential::{self, BcryptHasher};
use crate::entity::user;
use crate::error::AppError;
use crate::relationship;
use crate::response::ResponseDto;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/register").route(web::post().to(register_user)))
        .service(web::resource("/login").route(web::post().to(login)))
        .service(web::resource("/resume").route(web::post().to(resume)))
        .service(web::resource("/logout").route(web::post().to(logout)))
        .service(web::resource("/update").route(web::post().to(update_user)))
        .service(web::resource("/remove").route(web::post().to(remove_user)))
        .service(web::resource("/{id:\\d+}").route(web::post().to(get_user)))
        .service(web::resource("/{id:\\d+}/following").route(web::post().to(list_following)))
        .service(web::resource("/{id:\\d+}/followers").route(web::post().to(list_followers)));
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegisterUserRequest {
    name: Option<String>,
    email: Option<String>,
    password: Option<String>,
    password_confirmation: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateUserRequest {
    name: Option<String>,
    email: Option<String>,
    password: Option<String>,
    password_confirmation: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginRequest {
    email: Option<String>,
    password: Option<String>,
    remember_me: Option<bool>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResumeRequest {
    user_id: i32,
    remember_token: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LoginResponse {
    token: String,
    user_id: i32,
    name: String,
    remember_token: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UserDto {
    id: i32,
    name: String,
    email: String,
    created: Option<String>,
    updated: Option<String>,
}

async fn register_user(
    db: web::Data<DatabaseConnection>,
    hasher: web::Data<BcryptHasher>,
    payload: web::Json<RegisterUserRequest>,
) -> Result<HttpResponse, AppError> {
    let payload = payload.into_inner();
    let new = NewUser {
        name: payload.name.unwrap_or_default(),
        email: payload.email.unwrap_or_default(),
        password: payload.password.unwrap_or_default(),
        password_confirmation: payload.password_confirmation,
    };
    let user = account::create_user(db.get_ref(), hasher.get_ref(), new).await?;
    Ok(HttpResponse::Ok().json(ResponseDto::success(Some(user.id))))
}

async fn login(
    db: web::Data<DatabaseConnection>,
    config: web::Data<AppConfig>,
    hasher: web::Data<BcryptHasher>,
    payload: web::Json<LoginRequest>,
) -> Result<HttpResponse, AppError> {
    let email = payload.email.clone().unwrap_or_default();
    let password = payload.password.clone().unwrap_or_default();
    if email.trim().is_empty() {
        return Err(AppError::param_error("email cannot be null"));
    }
    if password.is_empty() {
        return Err(AppError::param_error("password cannot be null"));
    }

    let mut user = account::authenticate(db.get_ref(), hasher.get_ref(), &email, &password)
        .await?
        .ok_or_else(|| AppError::fail("invalid email/password combination"))?;

    let remember_token = if payload.remember_me.unwrap_or(false) {
        Some(credential::remember(db.get_ref(), hasher.get_ref(), &mut user).await?)
    } else {
        credential::forget(db.get_ref(), &mut user).await?;
        None
    };

    info!("user logged in id={}", user.id);
    let response = LoginResponse {
        token: issue_token(&config, user.id)?,
        user_id: user.id,
        name: user.name,
        remember_token,
    };
    Ok(HttpResponse::Ok().json(ResponseDto::success(Some(response))))
}

/// Trades a remember token for a fresh session token.
async fn resume(
    db: web::Data<DatabaseConnection>,
    config: web::Data<AppConfig>,
    hasher: web::Data<BcryptHasher>,
    payload: web::Json<ResumeRequest>,
) -> Result<HttpResponse, AppError> {
    let user = match account::find_user(db.get_ref(), payload.user_id).await {
        Ok(user) => user,
        Err(AppError::NotFound(_)) => return Err(AppError::need_login()),
        Err(e) => return Err(e),
    };
    if !credential::authenticated(hasher.get_ref(), &user, &payload.remember_token) {
        return Err(AppError::need_login());
    }

    let response = LoginResponse {
        token: issue_token(&config, user.id)?,
        user_id: user.id,
        name: user.name,
        remember_token: None,
    };
    Ok(HttpResponse::Ok().json(ResponseDto::success(Some(response))))
}

async fn logout(db: web::Data<DatabaseConnection>, auth: AuthUser) -> Result<HttpResponse, AppError> {
    let mut user = account::find_user(db.get_ref(), auth.user_id).await?;
    credential::forget(db.get_ref(), &mut user).await?;
    Ok(HttpResponse::Ok().json(ResponseDto::<()>::success(None)))
}

async fn update_user(
    db: web::Data<DatabaseConnection>,
    hasher: web::Data<BcryptHasher>,
    auth: AuthUser,
    payload: web::Json<UpdateUserRequest>,
) -> Result<HttpResponse, AppError> {
    let payload = payload.into_inner();
    let changes = UserChanges {
        name: payload.name,
        email: payload.email,
        password: payload.password.filter(|p| !p.is_empty()),
        password_confirmation: payload.password_confirmation.filter(|p| !p.is_empty()),
    };
    let user = account::update_user(db.get_ref(), hasher.get_ref(), auth.user_id, changes).await?;
    Ok(HttpResponse::Ok().json(ResponseDto::success(Some(to_user_dto(user)))))
}

async fn remove_user(db: web::Data<DatabaseConnection>, auth: AuthUser) -> Result<HttpResponse, AppError> {
    account::destroy_user(db.get_ref(), auth.user_id).await?;
    Ok(HttpResponse::Ok().json(ResponseDto::<()>::success(None)))
}

async fn get_user(
    db: web::Data<DatabaseConnection>,
    _auth: AuthUser,
    path: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    let user = account::find_user(db.get_ref(), *path).await?;
    Ok(HttpResponse::Ok().json(ResponseDto::success(Some(to_user_dto(user)))))
}

async fn list_following(
    db: web::Data<DatabaseConnection>,
    _auth: AuthUser,
    path: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    let users = relationship::following_users(db.get_ref(), *path).await?;
    let list: Vec<UserDto> = users.into_iter().map(to_user_dto).collect();
    Ok(HttpResponse::Ok().json(ResponseDto::success(Some(list))))
}

async fn list_followers(
    db: web::Data<DatabaseConnection>,
    _auth: AuthUser,
    path: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    let users = relationship::followers(db.get_ref(), *path).await?;
    let list: Vec<UserDto> = users.into_iter().map(to_user_dto).collect();
    Ok(HttpResponse::Ok().json(ResponseDto::success(Some(list))))
}

fn to_user_dto(model: user::Model) -> UserDto {
    UserDto {
        id: model.id,
        name: model.name,
        email: model.email,
        created: model.created.map(to_rfc3339),
        updated: model.updated.map(to_rfc3339),
    }
}

pub(crate) fn to_rfc3339(dt: chrono::DateTime<chrono::Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, false)
}
