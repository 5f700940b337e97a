pub mod api;
pub mod geo;
pub mod http;
pub mod identity;
pub mod payment;

pub use api::{AuthApi, OrderApi, OrderScope};
pub use geo::{AddressResolver, GeoPoint, NominatimResolver};
pub use http::BackendClient;
pub use identity::{DeliveryAddress, Role, User};
pub use payment::{PaymentStatus, PaymentVerifier};

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// The backend refused the request (HTTP 4xx). The message is meant for the user as-is.
    #[error("{message}")]
    Rejected { status: u16, message: String },
    #[error("Not authenticated")]
    Unauthorized,
    /// Network failure, 5xx or an unreadable response. Safe to retry.
    #[error("Service unavailable: {0}")]
    Transport(String),
    #[error("Validation failed: {0}")]
    ValidationError(String),
}

impl CoreError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, CoreError::Transport(_))
    }
}

impl From<reqwest::Error> for CoreError {
    fn from(err: reqwest::Error) -> Self {
        CoreError::Transport(err.to_string())
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
