use actix_web::{web, HttpResponse};
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};

use crate::auth::AuthUser;
use crate::error::AppError;
use crate::relationship;
use crate::response::ResponseDto;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/follow").route(web::post().to(follow)))
        .service(web::resource("/unfollow").route(web::post().to(unfollow)))
        .service(web::resource("/status").route(web::post().to(status)));
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RelationshipRequest {
    user_id: i32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RelationshipStatus {
    following: bool,
    followed_by: bool,
}

async fn follow(
    db: web::Data<DatabaseConnection>,
    auth: AuthUser,
    payload: web::Json<RelationshipRequest>,
) -> Result<HttpResponse, AppError> {
    let edge = relationship::follow(db.get_ref(), auth.user_id, payload.user_id).await?;
    Ok(HttpResponse::Ok().json(ResponseDto::success(Some(edge.id))))
}

async fn unfollow(
    db: web::Data<DatabaseConnection>,
    auth: AuthUser,
    payload: web::Json<RelationshipRequest>,
) -> Result<HttpResponse, AppError> {
    relationship::unfollow(db.get_ref(), auth.user_id, payload.user_id).await?;
    Ok(HttpResponse::Ok().json(ResponseDto::<()>::success(None)))
}

async fn status(
    db: web::Data<DatabaseConnection>,
    auth: AuthUser,
    payload: web::Json<RelationshipRequest>,
) -> Result<HttpResponse, AppError> {
    let dto = RelationshipStatus {
        following: relationship::following(db.get_ref(), auth.user_id, payload.user_id).await?,
        followed_by: relationship::following(db.get_ref(), payload.user_id, auth.user_id).await?,
    };
    Ok(HttpResponse::Ok().json(ResponseDto::success(Some(dto))))
}
