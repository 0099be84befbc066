use std::fmt;
use std::fmt::Display;

use actix_web::{HttpResponse, ResponseError};
use serde_derive::{Deserialize, Serialize};

use common::err::decode_error::ReError;

use crate::api::result::R;

/// Result returning Error
pub type WResult<T> = std::result::Result<T, WebError>;

/// Errors the HTTP control surface can return; every variant renders as this
/// codebase's existing `R` JSON envelope (§6).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum WebError {
    /// a request body failed to parse or was missing required fields
    Parse(String),
    /// the dump/proxy engine returned an error
    Engine(String),
    /// the referenced task or proxy id does not exist
    NotFound(String),
}

impl std::error::Error for WebError {}

impl Display for WebError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> fmt::Result {
        match self {
            WebError::Parse(s) => write!(f, "{}", s),
            WebError::Engine(s) => write!(f, "{}", s),
            WebError::NotFound(s) => write!(f, "{}", s),
        }
    }
}

impl ResponseError for WebError {
    fn error_response(&self) -> HttpResponse {
        let code = match self {
            WebError::NotFound(_) => 404,
            _ => 500,
        };

        HttpResponse::InternalServerError().json(R::error(code, &self.to_string()))
    }
}

impl From<ReError> for WebError {
    fn from(err: ReError) -> Self {
        WebError::Engine(err.to_string())
    }
}

impl From<serde_json::error::Error> for WebError {
    fn from(err: serde_json::error::Error) -> Self {
        WebError::Parse(err.to_string())
    }
}

impl From<actix_web::error::JsonPayloadError> for WebError {
    fn from(err: actix_web::error::JsonPayloadError) -> Self {
        WebError::Parse(err.to_string())
    }
}
