use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use booking_engine::traits::BookingError;
use log::error;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("Could not read request path: {0}")]
    InvalidRequestPath(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
    #[error("Authentication Error. {0}")]
    AuthenticationError(#[from] AuthError),
    #[error("The data was not found. {0}")]
    NoRecordFound(String),
    #[error("Insufficient Permissions. {0}")]
    InsufficientPermissions(String),
    #[error("The request conflicts with the current state of the order. {0}")]
    Conflict(String),
    #[error("The request was understood, but cannot be processed. {0}")]
    Unprocessable(String),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::InvalidRequestPath(_) => StatusCode::BAD_REQUEST,
            Self::AuthenticationError(e) => match e {
                AuthError::MissingPrincipal => StatusCode::UNAUTHORIZED,
                AuthError::MalformedPrincipal(_) => StatusCode::BAD_REQUEST,
                AuthError::InvalidAdminKey => StatusCode::UNAUTHORIZED,
                AuthError::AdminAccessDisabled => StatusCode::FORBIDDEN,
            },
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::InsufficientPermissions(_) => StatusCode::FORBIDDEN,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
        }
    }

    /// Server-side failures are logged in full, but the caller only learns that something went wrong.
    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let message = if status.is_server_error() {
            error!("💻️ Internal error while handling request: {self}");
            "An internal error occurred. Please try again later.".to_string()
        } else {
            self.to_string()
        };
        HttpResponse::build(status)
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "error": message }).to_string())
    }
}

#[derive(Debug, Clone, Error)]
pub enum AuthError {
    #[error("No principal was supplied. Set the X-Booking-Principal header.")]
    MissingPrincipal,
    #[error("The principal id is not valid. {0}")]
    MalformedPrincipal(String),
    #[error("The admin key is not valid.")]
    InvalidAdminKey,
    #[error("Admin access is not configured on this server.")]
    AdminAccessDisabled,
}

impl From<BookingError> for ServerError {
    fn from(e: BookingError) -> Self {
        match e {
            BookingError::NotFound(_) => Self::NoRecordFound(e.to_string()),
            BookingError::Unauthorized(_) => Self::InsufficientPermissions(e.to_string()),
            BookingError::InvalidTransition { .. } |
            BookingError::InvalidOrderState(_) |
            BookingError::AlreadyVerified(_) |
            BookingError::CancellationNotAllowed(_) |
            BookingError::DuplicatePayment(_) |
            BookingError::DocumentNotAvailable(_) |
            BookingError::MeetingAlreadyActive(_) |
            BookingError::InvalidMeetingUpdate(_) |
            BookingError::ConcurrentModification(_) => Self::Conflict(e.to_string()),
            BookingError::AmountMismatch { .. } |
            BookingError::InvalidAmount(_) |
            BookingError::UnsupportedPaymentMethod(_) => Self::Unprocessable(e.to_string()),
            BookingError::LedgerInvariantViolation(_) |
            BookingError::IdentifierExhausted(_) |
            BookingError::DatabaseError(_) |
            BookingError::RenderError(_) => Self::BackendError(e.to_string()),
        }
    }
}
