//! Error taxonomy for the article store and its HTTP mapping.
//!
//! - `NotFound`: the id does not exist. Rendered as `404 {"error":"Article not found"}`.
//! - `InvalidAsset` / `InvalidRequest`: the caller sent something unacceptable.
//!   Rejected before any file or document is written and rendered as `400`.
//! - `Storage` / `MalformedDocument`: I/O or parse failures on the data file or
//!   the uploads directory. Never retried; rendered as `500`.

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use cms_common::responses::ErrorBody;
use log::error;

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Article not found")]
    NotFound,

    /// Upload rejected by the type check or the size ceiling.
    #[error("{0}")]
    InvalidAsset(String),

    /// Malformed body or a field that cannot be set by clients.
    #[error("{0}")]
    InvalidRequest(String),

    #[error("storage failure while {context}: {source}")]
    Storage {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("data file is not a valid article document: {0}")]
    MalformedDocument(#[from] serde_json::Error),
}

impl StoreError {
    pub fn storage(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Storage {
            context: context.into(),
            source,
        }
    }

    /// True for the failures the caller cannot fix by changing the request.
    pub fn is_storage_failure(&self) -> bool {
        matches!(self, Self::Storage { .. } | Self::MalformedDocument(_))
    }
}

impl ResponseError for StoreError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::InvalidAsset(_) | Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::Storage { .. } | Self::MalformedDocument(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let body = if self.is_storage_failure() {
            error!("{}", self);
            ErrorBody::new("Internal server error")
        } else {
            ErrorBody::new(self.to_string())
        };
        HttpResponse::build(self.status_code()).json(body)
    }
}
