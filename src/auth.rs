use actix_web::{dev::Payload, web, FromRequest, HttpRequest};
use chrono::{Duration, Utc};
use futures_util::future::{ready, Ready};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::config::AppConfig;
use crate::error::AppError;

/// Session tokens stay valid this long; remember tokens outlive them.
const SESSION_DAYS: i64 = 1;

#[derive(Clone, Debug)]
pub struct AuthUser {
    pub user_id: i32,
}

#[derive(Serialize, Deserialize)]
struct Claims {
    #[serde(rename = "loginId")]
    login_id: i32,
    exp: usize,
}

impl FromRequest for AuthUser {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let config = match req.app_data::<web::Data<AppConfig>>() {
            Some(cfg) => cfg.clone(),
            None => return ready(Err(AppError::system_exception().into())),
        };
        let result = extract_token(req, &config)
            .ok_or_else(AppError::need_login)
            .and_then(|token| authenticate_token(&config, &token))
            .map_err(Into::into);
        ready(result)
    }
}

fn extract_token(req: &HttpRequest, config: &AppConfig) -> Option<String> {
    let header = config.token_header.as_str();
    req.headers()
        .get(header)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub fn issue_token(config: &AppConfig, user_id: i32) -> Result<String, AppError> {
    let exp = (Utc::now() + Duration::days(SESSION_DAYS)).timestamp() as usize;
    let claims = Claims { login_id: user_id, exp };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .map_err(|_| AppError::system_exception())
}

fn authenticate_token(config: &AppConfig, token: &str) -> Result<AuthUser, AppError> {
    let key = DecodingKey::from_secret(config.jwt_secret.as_bytes());
    let validation = Validation::new(Algorithm::HS256);
    decode::<Claims>(token, &key, &validation)
        .map(|data| AuthUser { user_id: data.claims.login_id })
        .map_err(|_| AppError::need_login())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(secret: &str) -> AppConfig {
        AppConfig {
            jwt_secret: secret.to_string(),
            ..AppConfig::for_test()
        }
    }

    #[test]
    fn issued_token_authenticates() {
        let cfg = config("secret");
        let token = issue_token(&cfg, 7).unwrap();
        assert_eq!(authenticate_token(&cfg, &token).unwrap().user_id, 7);
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let token = issue_token(&config("one"), 7).unwrap();
        let err = authenticate_token(&config("two"), &token).unwrap_err();
        assert_eq!(err.code(), 3);
    }

    #[test]
    fn header_token_is_trimmed() {
        let cfg = config("secret");
        let req = actix_web::test::TestRequest::default()
            .insert_header(("token", "  abc  "))
            .to_http_request();
        assert_eq!(extract_token(&req, &cfg).as_deref(), Some("abc"));
        let req = actix_web::test::TestRequest::default().to_http_request();
        assert!(extract_token(&req, &cfg).is_none());
    }
}
