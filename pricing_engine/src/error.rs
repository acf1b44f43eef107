//! Error types for the pricing engine.

use thiserror::Error;

/// Result type alias for pricing operations.
pub type Result<T> = std::result::Result<T, PricingError>;

/// Errors that can occur while loading rate tables or pricing a job.
#[derive(Error, Debug)]
pub enum PricingError {
    /// Job inputs outside their valid range (area, hours, multiplier...).
    #[error("invalid job attributes: {0}")]
    InvalidJobAttributes(String),

    /// Commission rates or tier thresholds that cannot produce a price.
    #[error("invalid tier configuration: {0}")]
    InvalidTierConfiguration(String),

    /// System rate table fields out of range.
    #[error("invalid system configuration: {0}")]
    InvalidSystemConfig(String),

    /// No usable rate table could be resolved.
    #[error("configuration unavailable: {0}")]
    ConfigUnavailable(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PricingError {
    pub fn invalid_job(msg: impl Into<String>) -> Self {
        Self::InvalidJobAttributes(msg.into())
    }

    pub fn invalid_tier(msg: impl Into<String>) -> Self {
        Self::InvalidTierConfiguration(msg.into())
    }

    pub fn invalid_system(msg: impl Into<String>) -> Self {
        Self::InvalidSystemConfig(msg.into())
    }

    /// Whether the error was caused by the caller's input rather than by
    /// the rate tables.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidJobAttributes(_))
    }
}
