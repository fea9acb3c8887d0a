//! CSRF protection for state-changing requests.

mod guard;

pub use guard::CsrfGuard;
