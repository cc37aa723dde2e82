mod admin;
mod picks;
mod seasons;
mod system;

use axum::{
    response::{IntoResponse, Response},
    Json,
};
use hyper::StatusCode;
use log::error;
use serde_json::json;

use crate::domain::Error;

pub use admin::*;
pub use picks::*;
pub use seasons::*;
pub use system::*;

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            Error::NotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            Error::BadRequest(_) | Error::Validation(_) => {
                (StatusCode::BAD_REQUEST, self.to_string())
            }
            Error::BettingClosed { .. } | Error::SeasonClosed { .. } => {
                (StatusCode::FORBIDDEN, self.to_string())
            }
            Error::FeedFailed(_) => (StatusCode::SERVICE_UNAVAILABLE, self.to_string()),
            Error::DbError(_) | Error::MalformedRecord(_) | Error::Thread(_) => {
                error!("internal error: {}", self);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    String::from("internal server error"),
                )
            }
        };
        let body = Json(json!({
            "error": error_message,
        }));
        (status, body).into_response()
    }
}
