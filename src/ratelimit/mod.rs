//! Rate limiting logic and state management.

mod counter;
mod limiter;

pub use counter::WindowCounter;
pub use limiter::{RateLimitStatus, RateLimiter};
