//! Error types shared by the services and the HTTP layer
//!
//! Services return [`CoreError`], a kind-tagged error that maps onto the API's
//! error taxonomy: validation (400), authentication (401), authorisation (403),
//! missing tenant (403 with `NO_COMPANY`), not found (404), conflict (409),
//! rate limiting (429) and opaque internal failures (500).
//!
//! ```rust
//! use sourcetrack::errors::{CoreError, CoreErrorKind};
//!
//! let err = CoreError::invalid_field("reason", "Reason is required");
//! assert_eq!(err.kind(), CoreErrorKind::Validation);
//! ```

pub mod core_error;
pub mod mail;

pub use core_error::{CoreError, CoreErrorKind};
pub use mail::MailError;

/// Result type alias for service operations
pub type CoreResult<T> = Result<T, CoreError>;
