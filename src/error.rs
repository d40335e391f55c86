use actix_web::http::StatusCode;
use actix_web::ResponseError;
use thiserror::Error;

/// Failures surfaced by the payment gateway. None of these are retried; they
/// propagate unchanged to the HTTP layer, which maps them to an error status.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("cart is empty")]
    EmptyCart,

    #[error("invalid order request: {0}")]
    InvalidCart(String),

    #[error("paypal auth failed: {0}")]
    Auth(String),

    #[error("paypal request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("paypal returned {status}: {body}")]
    Api { status: u16, body: String },
}

impl ResponseError for GatewayError {
    fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::EmptyCart | GatewayError::InvalidCart(_) | GatewayError::Auth(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            GatewayError::Transport(_) | GatewayError::Api { .. } => StatusCode::BAD_GATEWAY,
        }
    }
}
