use std::collections::HashSet;

use actix_web::{web, HttpResponse};
use chrono::{DateTime, NaiveDateTime, Utc};
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};

use crate::attendance;
use crate::auth::AuthUser;
use crate::entity::micropost;
use crate::error::AppError;
use crate::feed;
use crate::micropost::{create_micropost, NewMicropost};
use crate::response::ResponseDto;
use crate::routes::user::to_rfc3339;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/save").route(web::post().to(save)))
        .service(web::resource("/feed").route(web::post().to(list_feed)))
        .service(web::resource("/attend").route(web::post().to(attend)))
        .service(web::resource("/unattend").route(web::post().to(unattend)))
        .service(web::resource("/attending").route(web::post().to(list_attending)));
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SaveMicropostRequest {
    content: Option<String>,
    location: Option<String>,
    event_date: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FeedRequest {
    page: Option<u64>,
    size: Option<u64>,
    search: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AttendRequest {
    micropost_id: i32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FeedResponse {
    items: Vec<MicropostDto>,
    total: u64,
    total_page: u64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MicropostDto {
    id: i32,
    user_id: i32,
    content: String,
    location: Option<String>,
    event_date: String,
    created: Option<String>,
    attending: bool,
    attendees: u64,
}

async fn save(
    db: web::Data<DatabaseConnection>,
    auth: AuthUser,
    payload: web::Json<SaveMicropostRequest>,
) -> Result<HttpResponse, AppError> {
    let payload = payload.into_inner();
    let event_date = payload
        .event_date
        .as_deref()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| AppError::param_error("eventDate cannot be null"))
        .and_then(parse_date)?;
    let mut new = NewMicropost::new(payload.content.unwrap_or_default(), event_date);
    if let Some(location) = payload.location {
        new = new.at(location);
    }
    let post = create_micropost(db.get_ref(), auth.user_id, new).await?;
    Ok(HttpResponse::Ok().json(ResponseDto::success(Some(post.id))))
}

async fn list_feed(
    db: web::Data<DatabaseConnection>,
    auth: AuthUser,
    payload: web::Json<FeedRequest>,
) -> Result<HttpResponse, AppError> {
    let page = payload.page.unwrap_or(1).max(1);
    let size = payload.size.unwrap_or(20).clamp(1, 100);
    let query = match payload.search.as_deref() {
        Some(term) => feed::search(auth.user_id, Some(term)),
        None => feed::feed(auth.user_id),
    };
    let result = feed::fetch_page(db.get_ref(), query, page, size).await?;

    let attending: HashSet<i32> = attendance::attending_ids(db.get_ref(), auth.user_id)
        .await?
        .into_iter()
        .collect();
    let mut items = Vec::with_capacity(result.items.len());
    for post in result.items {
        let is_attending = attending.contains(&post.id);
        items.push(to_micropost_dto(db.get_ref(), post, is_attending).await?);
    }
    let response = FeedResponse {
        items,
        total: result.total,
        total_page: result.total_page,
    };
    Ok(HttpResponse::Ok().json(ResponseDto::success(Some(response))))
}

async fn attend(
    db: web::Data<DatabaseConnection>,
    auth: AuthUser,
    payload: web::Json<AttendRequest>,
) -> Result<HttpResponse, AppError> {
    let edge = attendance::attend(db.get_ref(), auth.user_id, payload.micropost_id).await?;
    Ok(HttpResponse::Ok().json(ResponseDto::success(Some(edge.id))))
}

async fn unattend(
    db: web::Data<DatabaseConnection>,
    auth: AuthUser,
    payload: web::Json<AttendRequest>,
) -> Result<HttpResponse, AppError> {
    attendance::unattend(db.get_ref(), auth.user_id, payload.micropost_id).await?;
    Ok(HttpResponse::Ok().json(ResponseDto::<()>::success(None)))
}

async fn list_attending(
    db: web::Data<DatabaseConnection>,
    auth: AuthUser,
) -> Result<HttpResponse, AppError> {
    let posts = attendance::attending_posts(db.get_ref(), auth.user_id).await?;
    let mut list = Vec::with_capacity(posts.len());
    for post in posts {
        list.push(to_micropost_dto(db.get_ref(), post, true).await?);
    }
    Ok(HttpResponse::Ok().json(ResponseDto::success(Some(list))))
}

async fn to_micropost_dto(
    db: &DatabaseConnection,
    model: micropost::Model,
    attending: bool,
) -> Result<MicropostDto, AppError> {
    let attendees = attendance::attendee_count(db, model.id).await?;
    Ok(MicropostDto {
        id: model.id,
        user_id: model.user_id,
        content: model.content,
        location: model.location,
        event_date: to_rfc3339(model.event_date),
        created: model.created.map(to_rfc3339),
        attending,
        attendees,
    })
}

/// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS` (UTC) or epoch milliseconds.
fn parse_date(input: &str) -> Result<DateTime<Utc>, AppError> {
    let input = input.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(input, "%Y-%m-%d %H:%M:%S") {
        return Ok(DateTime::<Utc>::from_naive_utc_and_offset(dt, Utc));
    }
    if let Ok(ts) = input.parse::<i64>() {
        return DateTime::<Utc>::from_timestamp_millis(ts)
            .ok_or_else(|| AppError::param_error("invalid eventDate"));
    }
    Err(AppError::param_error("invalid eventDate"))
}
