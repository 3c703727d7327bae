use crate::tracker::OrderStatus;

/// Everything that can go wrong between a request and the order ledger.
///
/// Validation errors are raised before any mutation, so a failed call never
/// leaves partial state behind.
#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    #[error("order has no items")]
    EmptyOrder,

    /// Unknown or currently unavailable item; carries the first offending id.
    #[error("unknown or unavailable item: {0}")]
    InvalidItem(String),

    #[error("unknown order: {0}")]
    NotFound(String),

    /// Illegal status advance. Indicates a caller (or internal) bug.
    #[error("illegal transition for order {order_id}: {from} -> {requested}")]
    InvalidTransition {
        order_id: String,
        from: OrderStatus,
        requested: OrderStatus,
    },
}

/// Failures loading the published menu file.
#[derive(Debug, thiserror::Error)]
pub enum MenuError {
    #[error("unable to read menu file: {0}")]
    Io(#[from] std::io::Error),

    #[error("unable to parse menu file: {0}")]
    Parse(#[from] serde_json::Error),
}
