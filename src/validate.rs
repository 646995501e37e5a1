use std::collections::BTreeMap;

use async_trait::async_trait;
use axum::{
    extract::{FromRequest, FromRequestParts, Request},
    http::request::Parts,
};
use serde::{de::DeserializeOwned, Serialize};
use url::Url;

use crate::error::AppError;

/// Field-keyed validation messages, serialized as the `details` object of a
/// `ValidationError` response.
#[derive(Debug, Default, Serialize)]
pub struct ValidationErrors(BTreeMap<String, Vec<String>>);

impl ValidationErrors {
    pub fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_default().push(message.into());
    }

    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = Self::default();
        errors.push(field, message);
        errors
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_result(self) -> Result<(), AppError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(self))
        }
    }
}

impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> Self {
        AppError::Validation(errors)
    }
}

pub fn require_min_chars(errors: &mut ValidationErrors, field: &str, value: &str, min: usize) {
    if value.trim().chars().count() < min {
        errors.push(field, format!("must be at least {min} characters"));
    }
}

pub fn require_email(errors: &mut ValidationErrors, field: &str, value: &str) {
    if !is_email(value) {
        errors.push(field, "must be a valid email address");
    }
}

pub fn require_url(errors: &mut ValidationErrors, field: &str, value: &str) {
    if Url::parse(value).is_err() {
        errors.push(field, "must be a valid URL");
    }
}

pub fn is_email(value: &str) -> bool {
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.is_empty()
        && domain.contains('.')
        && !value.chars().any(char::is_whitespace)
}

/// JSON body extractor that reports malformed payloads in the
/// `ValidationError` response shape instead of axum's plain-text rejection.
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match axum::Json::<T>::from_request(req, state).await {
            Ok(axum::Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(ValidationErrors::single("body", rejection.body_text()).into()),
        }
    }
}

/// Path extractor with the same rejection mapping; catches non-UUID ids.
pub struct ValidatedPath<T>(pub T);

#[async_trait]
impl<S, T> FromRequestParts<S> for ValidatedPath<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match axum::extract::Path::<T>::from_request_parts(parts, state).await {
            Ok(axum::extract::Path(value)) => Ok(Self(value)),
            Err(rejection) => Err(ValidationErrors::single("params", rejection.body_text()).into()),
        }
    }
}

/// Query-string extractor with the same rejection mapping.
pub struct ValidatedQuery<T>(pub T);

#[async_trait]
impl<S, T> FromRequestParts<S> for ValidatedQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match axum::extract::Query::<T>::from_request_parts(parts, state).await {
            Ok(axum::extract::Query(value)) => Ok(Self(value)),
            Err(rejection) => Err(ValidationErrors::single("query", rejection.body_text()).into()),
        }
    }
}
