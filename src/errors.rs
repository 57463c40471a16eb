use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

/// Main error type for the haulway service
#[derive(Debug, thiserror::Error)]
pub enum HaulwayError {
    // HTTP and API errors
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Internal server error: {0}")]
    InternalServer(String),

    // Store errors
    #[error("Store connection error: {0}")]
    StoreConnection(String),
    #[error("Store query error: {0}")]
    StoreQuery(String),
    #[error("Store serialization error: {0}")]
    StoreSerialization(String),

    // External service errors
    #[error("FCM delivery error: {0}")]
    FcmDelivery(String),
    #[error("Invalid FCM token: {0}")]
    FcmInvalidToken(String),
    #[error("Webhook delivery failed: {0}")]
    WebhookDelivery(String),

    // Network and HTTP client errors
    #[error("Network request timed out")]
    NetworkTimeout,
    #[error("Network connection error: {0}")]
    NetworkConnection(String),
    #[error("HTTP client error: {0}")]
    HttpClient(String),

    // Serialization and parsing errors
    #[error("JSON parsing error: {0}")]
    JsonParsing(String),
    #[error("JSON serialization error: {0}")]
    JsonSerialization(String),
    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    // Business logic errors
    #[error("User not found: {0}")]
    UserNotFound(String),
    #[error("Driver not found: {0}")]
    DriverNotFound(String),
    #[error("Booking not found: {0}")]
    BookingNotFound(String),
    #[error("Zone not found: {0}")]
    ZoneNotFound(String),
    #[error("Place not found: {0}")]
    PlaceNotFound(String),
    #[error("Order not found: {0}")]
    OrderNotFound(String),
    #[error("Subscription plan not found: {0}")]
    PlanNotFound(String),
    #[error("Booking is already assigned to another driver")]
    BookingAlreadyAssigned,
    #[error("Driver is not available: {0}")]
    DriverNotAvailable(String),
    #[error("Cannot move from {from} to {to}")]
    InvalidTransition { from: String, to: String },
    #[error("Pickup location is outside every active service zone")]
    OutsideServiceArea,
    #[error("Driver zone does not match booking zone")]
    ZoneMismatch,

    // Validation errors
    #[error("Validation failed: {} errors", .0.len())]
    ValidationFailed(Vec<ValidationError>),
    #[error("Missing required field: {0}")]
    MissingRequiredField(String),
    #[error("Invalid value '{value}' for field '{field}': {reason}")]
    InvalidFieldValue { field: String, value: String, reason: String },

    // Configuration errors
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
    #[error("Missing environment variable: {0}")]
    MissingEnvironmentVariable(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    // Security and authentication errors
    #[error("Authentication token is invalid")]
    TokenInvalid,
    #[error("Insufficient permissions for this operation")]
    InsufficientPermissions,
    #[error("Account is suspended")]
    AccountSuspended,

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

#[derive(Serialize)]
struct ErrorResponse {
    success: bool,
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

impl HaulwayError {
    /// HTTP status and machine-readable code for this error.
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            HaulwayError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            HaulwayError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "unauthorized"),
            HaulwayError::Forbidden(_) => (StatusCode::FORBIDDEN, "forbidden"),
            HaulwayError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            HaulwayError::Conflict(_) => (StatusCode::CONFLICT, "conflict"),

            HaulwayError::ValidationFailed(_) => (StatusCode::BAD_REQUEST, "validation_failed"),
            HaulwayError::MissingRequiredField(_) => (StatusCode::BAD_REQUEST, "missing_field"),
            HaulwayError::InvalidFieldValue { .. } => (StatusCode::BAD_REQUEST, "invalid_field"),
            HaulwayError::InvalidFormat(_) => (StatusCode::BAD_REQUEST, "invalid_format"),
            HaulwayError::JsonParsing(_) => (StatusCode::BAD_REQUEST, "invalid_json"),

            HaulwayError::UserNotFound(_) => (StatusCode::NOT_FOUND, "user_not_found"),
            HaulwayError::DriverNotFound(_) => (StatusCode::NOT_FOUND, "driver_not_found"),
            HaulwayError::BookingNotFound(_) => (StatusCode::NOT_FOUND, "booking_not_found"),
            HaulwayError::ZoneNotFound(_) => (StatusCode::NOT_FOUND, "zone_not_found"),
            HaulwayError::PlaceNotFound(_) => (StatusCode::NOT_FOUND, "place_not_found"),
            HaulwayError::OrderNotFound(_) => (StatusCode::NOT_FOUND, "order_not_found"),
            HaulwayError::PlanNotFound(_) => (StatusCode::NOT_FOUND, "plan_not_found"),

            HaulwayError::BookingAlreadyAssigned => (StatusCode::CONFLICT, "booking_already_assigned"),
            HaulwayError::DriverNotAvailable(_) => (StatusCode::CONFLICT, "driver_not_available"),
            HaulwayError::InvalidTransition { .. } => (StatusCode::CONFLICT, "invalid_transition"),
            HaulwayError::OutsideServiceArea => (StatusCode::BAD_REQUEST, "outside_service_area"),
            HaulwayError::ZoneMismatch => (StatusCode::FORBIDDEN, "zone_mismatch"),

            HaulwayError::TokenInvalid => (StatusCode::UNAUTHORIZED, "token_invalid"),
            HaulwayError::InsufficientPermissions => (StatusCode::FORBIDDEN, "insufficient_permissions"),
            HaulwayError::AccountSuspended => (StatusCode::FORBIDDEN, "account_suspended"),

            HaulwayError::ServiceUnavailable(_) | HaulwayError::StoreConnection(_) => {
                (StatusCode::SERVICE_UNAVAILABLE, "service_unavailable")
            }

            // All other errors are treated as internal server errors
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        }
    }
}

impl IntoResponse for HaulwayError {
    fn into_response(self) -> Response {
        let (status, error_type) = self.status_and_code();

        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let details = match &self {
            HaulwayError::ValidationFailed(errors) => serde_json::to_value(errors).ok(),
            _ => None,
        };
        let message = match &self {
            HaulwayError::ValidationFailed(_) => "Validation errors occurred".to_string(),
            other => other.to_string(),
        };

        let error_response = ErrorResponse {
            success: false,
            error: error_type.to_string(),
            message,
            details,
        };

        (status, axum::Json(error_response)).into_response()
    }
}

// Convenience type alias for Results
pub type HaulwayResult<T> = Result<T, HaulwayError>;

impl From<redis::RedisError> for HaulwayError {
    fn from(err: redis::RedisError) -> Self {
        match err.kind() {
            redis::ErrorKind::IoError => HaulwayError::StoreConnection(err.to_string()),
            redis::ErrorKind::AuthenticationFailed => {
                HaulwayError::StoreConnection("Authentication failed".to_string())
            }
            _ => HaulwayError::StoreQuery(err.to_string()),
        }
    }
}

impl From<reqwest::Error> for HaulwayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            HaulwayError::NetworkTimeout
        } else if err.is_connect() {
            HaulwayError::NetworkConnection(err.to_string())
        } else {
            HaulwayError::HttpClient(err.to_string())
        }
    }
}

impl From<serde_json::Error> for HaulwayError {
    fn from(err: serde_json::Error) -> Self {
        if err.is_syntax() {
            HaulwayError::JsonParsing(err.to_string())
        } else {
            HaulwayError::JsonSerialization(err.to_string())
        }
    }
}

impl From<uuid::Error> for HaulwayError {
    fn from(err: uuid::Error) -> Self {
        HaulwayError::InvalidFormat(format!("Invalid UUID: {}", err))
    }
}

impl From<chrono::ParseError> for HaulwayError {
    fn from(err: chrono::ParseError) -> Self {
        HaulwayError::InvalidFormat(format!("Invalid date/time format: {}", err))
    }
}

// Helper functions for creating common errors
impl HaulwayError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        HaulwayError::BadRequest(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        HaulwayError::Unauthorized(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        HaulwayError::Forbidden(msg.into())
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        HaulwayError::NotFound(resource.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        HaulwayError::Conflict(msg.into())
    }

    pub fn internal_error(msg: impl Into<String>) -> Self {
        HaulwayError::InternalServer(msg.into())
    }

    pub fn validation_error(field: impl Into<String>, message: impl Into<String>) -> Self {
        HaulwayError::ValidationFailed(vec![ValidationError {
            field: field.into(),
            message: message.into(),
        }])
    }

    pub fn invalid_transition(from: impl std::fmt::Debug, to: impl std::fmt::Debug) -> Self {
        HaulwayError::InvalidTransition {
            from: format!("{:?}", from),
            to: format!("{:?}", to),
        }
    }
}

/// Collects field errors so a request can report all of them at once.
#[derive(Debug, Default)]
pub struct Validator {
    errors: Vec<ValidationError>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn check(&mut self, ok: bool, field: &str, message: &str) -> &mut Self {
        if !ok {
            self.errors.push(ValidationError {
                field: field.to_string(),
                message: message.to_string(),
            });
        }
        self
    }

    pub fn require_text(&mut self, value: &str, field: &str) -> &mut Self {
        self.check(!value.trim().is_empty(), field, "must not be empty")
    }

    pub fn finish(&mut self) -> HaulwayResult<()> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(HaulwayError::ValidationFailed(std::mem::take(&mut self.errors)))
        }
    }
}
