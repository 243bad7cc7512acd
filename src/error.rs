use std::fmt;

use actix_web::{http::StatusCode, ResponseError};
use log::error;
use serde::Serialize;
use thiserror::Error;

use crate::response::response_from_error;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

/// Field-level validation failures collected over a whole entity.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(Vec<FieldError>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.push(FieldError { field, message: message.into() });
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn errors(&self) -> &[FieldError] {
        &self.0
    }

    pub fn has(&self, field: &str) -> bool {
        self.0.iter().any(|e| e.field == field)
    }

    pub fn into_result(self) -> Result<(), AppError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(self))
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .errors()
            .iter()
            .map(|e| format!("{} {}", e.field, e.message))
            .collect();
        f.write_str(&parts.join(", "))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EdgeKind {
    Follow,
    Attend,
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Follow => f.write_str("relationship"),
            Self::Attend => f.write_str("attendance"),
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{msg}")]
    Biz { code: i32, msg: String },
    #[error("validation failed: {0}")]
    Validation(ValidationErrors),
    #[error("{kind} {from} -> {to} not found")]
    EdgeNotFound { kind: EdgeKind, from: i32, to: i32 },
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("storage failure: {0}")]
    Storage(#[from] sea_orm::DbErr),
    #[error("credential failure: {0}")]
    Credential(#[from] bcrypt::BcryptError),
}

impl AppError {
    pub fn param_error(msg: impl Into<String>) -> Self {
        Self::Biz { code: 1, msg: msg.into() }
    }

    pub fn fail(msg: impl Into<String>) -> Self {
        Self::Biz { code: 2, msg: msg.into() }
    }

    pub fn need_login() -> Self {
        Self::Biz { code: 3, msg: "please login first".to_string() }
    }

    pub fn system_exception() -> Self {
        Self::Biz { code: 99, msg: "system_exception".to_string() }
    }

    pub fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        let mut errors = ValidationErrors::new();
        errors.add(field, message);
        Self::Validation(errors)
    }

    pub fn code(&self) -> i32 {
        match self {
            Self::Biz { code, .. } => *code,
            Self::Validation(_) => 1,
            Self::EdgeNotFound { .. } | Self::NotFound(_) => 2,
            Self::Storage(_) | Self::Credential(_) => 99,
        }
    }

    pub fn msg(&self) -> String {
        match self {
            Self::Storage(_) | Self::Credential(_) => "system_exception".to_string(),
            other => other.to_string(),
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        StatusCode::OK
    }

    fn error_response(&self) -> actix_web::HttpResponse {
        if matches!(self, Self::Storage(_) | Self::Credential(_)) {
            error!("request failed: {}", self);
        }
        response_from_error(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_collect_fields() {
        let mut errors = ValidationErrors::new();
        assert!(errors.is_empty());
        errors.add("name", "can't be blank");
        errors.add("email", "is invalid");
        assert!(errors.has("email"));
        assert!(!errors.has("password"));
        assert_eq!(errors.to_string(), "name can't be blank, email is invalid");
        assert!(matches!(errors.into_result(), Err(AppError::Validation(_))));
    }

    #[test]
    fn storage_failures_hide_details() {
        let err = AppError::from(sea_orm::DbErr::Custom("disk full".into()));
        assert_eq!(err.code(), 99);
        assert_eq!(err.msg(), "system_exception");
    }

    #[test]
    fn edge_not_found_names_the_edge() {
        let err = AppError::EdgeNotFound { kind: EdgeKind::Follow, from: 1, to: 2 };
        assert_eq!(err.code(), 2);
        assert_eq!(err.msg(), "relationship 1 -> 2 not found");
    }
}
