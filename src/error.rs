use jsonwebtoken::errors::Error as JwtError;
use log::{error, warn};
use rocket::{http::Status, response::Responder, serde::json::Json, Request};
use serde::Serialize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Email already registered")]
    DuplicateEmail,
    #[error("Not authenticated")]
    NotAuthenticated,
    #[error("You have already voted")]
    AlreadyVoted,
    #[error("Invalid candidate")]
    UnknownCandidate,
    #[error("Suspicious voting activity detected by our security system!")]
    FraudSuspected,
    #[error(transparent)]
    Jwt(#[from] JwtError),
}

impl Error {
    /// The HTTP status this error is reported with.
    pub fn status(&self) -> Status {
        match self {
            Self::InvalidCredentials | Self::NotAuthenticated => Status::Unauthorized,
            Self::DuplicateEmail
            | Self::AlreadyVoted
            | Self::UnknownCandidate
            | Self::FraudSuspected => Status::BadRequest,
            Self::Jwt(_) => Status::InternalServerError,
        }
    }
}

/// JSON payload sent back for every failed request.
#[derive(Debug, Serialize)]
struct ErrorBody {
    success: bool,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    fraud_detected: Option<bool>,
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, req: &'r Request<'_>) -> rocket::response::Result<'o> {
        let status = self.status();
        let message = match self {
            // Don't leak token internals to the caller.
            Self::Jwt(ref err) => {
                error!("Failed to issue session token: {err}");
                "Internal server error".to_string()
            }
            ref other => {
                warn!("{} {}: {other}", req.method(), req.uri());
                other.to_string()
            }
        };
        let body = ErrorBody {
            success: false,
            message,
            fraud_detected: matches!(self, Self::FraudSuspected).then_some(true),
        };
        (status, Json(body)).respond_to(req)
    }
}
