//! Error types shared across the service
//!
//! Validation failures for order requests and events, using thiserror

use thiserror::Error;

/// A request or event failed field-level validation
///
/// Always reported synchronously to whoever submitted the data; nothing is
/// published when one of these is returned.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Missing field: {field}")]
    MissingField { field: &'static str },

    #[error("Invalid {field}: {value} is not a positive id")]
    InvalidId { field: &'static str, value: i64 },

    #[error("Quantity must be a positive integer, got {0}")]
    NonPositiveQuantity(i64),

    #[error("Quantity {quantity} exceeds the maximum of {max}")]
    QuantityTooLarge { quantity: i64, max: u32 },

    #[error("Product name must not be empty")]
    EmptyProduct,

    #[error("Malformed request body: {0}")]
    MalformedBody(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_field() {
        let err = ValidationError::MissingField { field: "quantity" };
        assert_eq!(err.to_string(), "Missing field: quantity");

        let err = ValidationError::InvalidId {
            field: "store_id",
            value: -1,
        };
        assert!(err.to_string().contains("store_id"));
    }
}
