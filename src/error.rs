use crate::smi::SmiError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("ROCm SMI error: {0}")]
    Smi(#[from] SmiError),

    #[error("Feature not available: {0}")]
    NotAvailable(String),

    #[error("Invalid bus address: {0}")]
    InvalidBusAddress(String),
}

impl Error {
    #[allow(dead_code)]
    pub(crate) fn not_available<S: Into<String>>(msg: S) -> Self {
        Error::NotAvailable(msg.into())
    }

    pub(crate) fn invalid_bus_address<S: Into<String>>(msg: S) -> Self {
        Error::InvalidBusAddress(msg.into())
    }
}

/// Result type for rocm-metrics operations
pub type Result<T> = std::result::Result<T, Error>;
