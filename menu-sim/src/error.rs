use thiserror::Error;

/// Rejection of malformed input at engine construction.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("malformed menu: {0}")]
    Malformed(String),

    #[error("menu item #{index} has an empty id")]
    EmptyId { index: usize },

    #[error("menu item #{index} ('{id}') has an empty name")]
    EmptyName { index: usize, id: String },

    #[error("menu item #{index} reuses id '{id}'")]
    DuplicateId { index: usize, id: String },

    #[error("menu item #{index} ('{id}') has an invalid price: {price}")]
    InvalidPrice { index: usize, id: String, price: f64 },

    #[error("{field} must be a finite range with min <= max, got ({min}, {max})")]
    InvalidRange {
        field: &'static str,
        min: f64,
        max: f64,
    },

    #[error("{field} out of bounds: ({min}, {max})")]
    RangeOutOfBounds {
        field: &'static str,
        min: f64,
        max: f64,
    },
}
