//! Error kinds raised by the numeric routines.
//!
//! Public functions return [`anyhow::Result`]; the underlying cause is always
//! a [`HicError`], so callers that need to tell configuration problems from
//! numeric failures can `downcast_ref::<HicError>()`.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum HicError {
    /// Invalid arguments or input shape. Raised before any work is done.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The computation itself is undefined for the given data.
    #[error("computation error: {0}")]
    Computation(String),
}

/// Returns early with [`HicError::InvalidConfig`].
macro_rules! bail_config {
    ($($arg:tt)*) => {
        return Err(anyhow::Error::new($crate::error::HicError::InvalidConfig(format!($($arg)*))))
    };
}

/// Returns early with [`HicError::Computation`].
macro_rules! bail_computation {
    ($($arg:tt)*) => {
        return Err(anyhow::Error::new($crate::error::HicError::Computation(format!($($arg)*))))
    };
}

/// Returns the [`HicError`] behind an [`anyhow::Error`], if any.
pub fn hic_error(err: &anyhow::Error) -> Option<&HicError> {
    err.downcast_ref::<HicError>()
}
