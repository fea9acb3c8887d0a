//! JSON rejection bodies for the HTTP boundary.
//!
//! The core owns no wire protocol; these are the bodies the surrounding
//! handler layer serializes when it turns a rejection into a response.

use serde::{Deserialize, Serialize};

/// Message carried by the 429 body for a rate-limited request.
pub const RATE_LIMIT_MESSAGE: &str = "Rate limit exceeded. Please try again later.";

/// Message carried by the 403 body for a failed CSRF check.
pub const CSRF_MESSAGE: &str = "Invalid CSRF token.";

/// JSON body returned when a request is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectionBody {
    /// Always `false` for rejections
    pub success: bool,
    /// Human-readable reason
    pub message: String,
}

impl RejectionBody {
    /// Body for a 429 rate limit rejection.
    pub fn rate_limited() -> Self {
        Self {
            success: false,
            message: RATE_LIMIT_MESSAGE.to_string(),
        }
    }

    /// Body for a 403 CSRF rejection.
    pub fn csrf_rejected() -> Self {
        Self {
            success: false,
            message: CSRF_MESSAGE.to_string(),
        }
    }
}
