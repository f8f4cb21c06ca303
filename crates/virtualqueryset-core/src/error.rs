//! Core error types for virtualqueryset.
//!
//! [`VirtualError`] covers the failure modes of in-memory querysets: lookups
//! that match the wrong number of objects, unsupported persistence on
//! virtual models, malformed lookups, and the loading side (fetch, cache,
//! serialization, configuration, IO).

use thiserror::Error;

/// The primary error type for virtualqueryset.
///
/// Each variant maps to an HTTP status code via [`VirtualError::status_code`],
/// which the admin integration uses when rendering JSON errors.
#[derive(Error, Debug)]
pub enum VirtualError {
    // ── Query errors ─────────────────────────────────────────────────

    /// Raised when a query expected exactly one result but found none.
    #[error("{0}")]
    DoesNotExist(String),

    /// Raised when a query expected exactly one result but found multiple.
    #[error("{0}")]
    MultipleObjectsReturned(String),

    /// The lookup name or its argument is not valid (e.g. `name__fuzzy`).
    #[error("Invalid lookup: {0}")]
    InvalidLookup(String),

    /// A record could not be converted to or from the model type.
    #[error("Field error: {0}")]
    FieldError(String),

    // ── Persistence ──────────────────────────────────────────────────

    /// The operation (save, delete) is not available on a virtual model.
    #[error("{0}")]
    NotSupported(String),

    /// The data source is read-only.
    #[error("Read-only: {0}")]
    ReadOnly(String),

    /// A requested object or registration does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    // ── Loading ──────────────────────────────────────────────────────

    /// A fetcher (API call, callback) failed.
    #[error("Fetch error: {0}")]
    FetchError(String),

    /// A cache backend operation failed.
    #[error("Cache error: {0}")]
    CacheError(String),

    /// An error occurred during serialization or deserialization.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    // ── Configuration ────────────────────────────────────────────────

    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// The library is improperly configured.
    #[error("Improperly configured: {0}")]
    ImproperlyConfigured(String),

    // ── IO ───────────────────────────────────────────────────────────

    /// An I/O error occurred.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl VirtualError {
    /// Returns the HTTP status code associated with this error.
    ///
    /// - `InvalidLookup`, `FieldError` -> 400
    /// - `DoesNotExist`, `NotFound` -> 404
    /// - `NotSupported`, `ReadOnly` -> 405
    /// - Everything else -> 500
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::InvalidLookup(_) | Self::FieldError(_) => 400,
            Self::DoesNotExist(_) | Self::NotFound(_) => 404,
            Self::NotSupported(_) | Self::ReadOnly(_) => 405,
            Self::MultipleObjectsReturned(_)
            | Self::FetchError(_)
            | Self::CacheError(_)
            | Self::SerializationError(_)
            | Self::ConfigurationError(_)
            | Self::ImproperlyConfigured(_)
            | Self::IoError(_) => 500,
        }
    }

    /// Returns `true` for the "no matching object" family of errors.
    pub const fn is_does_not_exist(&self) -> bool {
        matches!(self, Self::DoesNotExist(_))
    }
}

impl From<serde_json::Error> for VirtualError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}

/// A convenience type alias for `Result<T, VirtualError>`.
pub type VirtualResult<T> = Result<T, VirtualError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(VirtualError::InvalidLookup("x".into()).status_code(), 400);
        assert_eq!(VirtualError::FieldError("x".into()).status_code(), 400);
        assert_eq!(VirtualError::DoesNotExist("x".into()).status_code(), 404);
        assert_eq!(VirtualError::NotFound("x".into()).status_code(), 404);
        assert_eq!(VirtualError::NotSupported("x".into()).status_code(), 405);
        assert_eq!(VirtualError::ReadOnly("x".into()).status_code(), 405);
        assert_eq!(
            VirtualError::MultipleObjectsReturned("x".into()).status_code(),
            500
        );
        assert_eq!(VirtualError::FetchError("x".into()).status_code(), 500);
        assert_eq!(VirtualError::CacheError("x".into()).status_code(), 500);
    }

    #[test]
    fn test_query_errors_display_message_verbatim() {
        let err = VirtualError::DoesNotExist("Product matching query does not exist.".into());
        assert_eq!(err.to_string(), "Product matching query does not exist.");
        assert!(err.is_does_not_exist());
    }

    #[test]
    fn test_prefixed_display() {
        let err = VirtualError::InvalidLookup("name__fuzzy".into());
        assert_eq!(err.to_string(), "Invalid lookup: name__fuzzy");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
        let err: VirtualError = io_err.into();
        assert_eq!(err.status_code(), 500);
        assert!(err.to_string().contains("file missing"));
    }

    #[test]
    fn test_serde_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: VirtualError = json_err.into();
        assert!(matches!(err, VirtualError::SerializationError(_)));
    }
}
