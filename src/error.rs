use crate::io_struct::ErrorBody;
use crate::translator::TranslateError;
use actix_web::http::{StatusCode, header};
use actix_web::{HttpResponse, ResponseError};

/// Errors that end a request; each maps to one `{"error", "details"}` response.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("Query interpretation failed")]
    Translation(#[from] TranslateError),

    #[error("Rate limit exceeded")]
    RateLimited {
        limit: String,
        retry_after_secs: u64,
    },

    #[error("Invalid request body")]
    BadRequest(String),

    #[error("Payload too large")]
    PayloadTooLarge(String),
}

impl RelayError {
    pub fn details(&self) -> String {
        match self {
            RelayError::Translation(e) => e.to_string(),
            RelayError::RateLimited { limit, .. } => limit.clone(),
            RelayError::BadRequest(details) | RelayError::PayloadTooLarge(details) => {
                details.clone()
            }
        }
    }
}

impl ResponseError for RelayError {
    fn status_code(&self) -> StatusCode {
        match self {
            RelayError::Translation(_) => StatusCode::INTERNAL_SERVER_ERROR,
            RelayError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            RelayError::BadRequest(_) => StatusCode::BAD_REQUEST,
            RelayError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let mut builder = HttpResponse::build(self.status_code());
        if let RelayError::RateLimited {
            retry_after_secs, ..
        } = self
        {
            builder.insert_header((header::RETRY_AFTER, retry_after_secs.to_string()));
        }
        builder.json(ErrorBody {
            error: self.to_string(),
            details: self.details(),
        })
    }
}
