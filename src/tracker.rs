use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing_attributes::instrument;

use crate::error::OrderError;
use crate::ledger::OrderLedger;

/// Lifecycle of an order. Strictly forward: a status never regresses, and
/// `Completed`/`Cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrderStatus {
    Received,
    Preparing,
    Ready,
    Completed,
    Cancelled,
}

lazy_static::lazy_static! {
    static ref LEGAL_SUCCESSORS: HashMap<OrderStatus, &'static [OrderStatus]> = {
        let mut table = HashMap::new();
        table.insert(
            OrderStatus::Received,
            &[OrderStatus::Preparing, OrderStatus::Cancelled][..],
        );
        table.insert(
            OrderStatus::Preparing,
            &[OrderStatus::Ready, OrderStatus::Cancelled][..],
        );
        table.insert(OrderStatus::Ready, &[OrderStatus::Completed][..]);
        table.insert(OrderStatus::Completed, &[][..]);
        table.insert(OrderStatus::Cancelled, &[][..]);
        table
    };
}

impl OrderStatus {
    pub fn can_advance_to(self, next: OrderStatus) -> bool {
        LEGAL_SUCCESSORS
            .get(&self)
            .map(|successors| successors.contains(&next))
            .unwrap_or(false)
    }

    pub fn is_terminal(self) -> bool {
        LEGAL_SUCCESSORS
            .get(&self)
            .map(|successors| successors.is_empty())
            .unwrap_or(true)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OrderStatus::Received => "RECEIVED",
            OrderStatus::Preparing => "PREPARING",
            OrderStatus::Ready => "READY",
            OrderStatus::Completed => "COMPLETED",
            OrderStatus::Cancelled => "CANCELLED",
        };
        f.write_str(name)
    }
}

/// Advances and exposes order status, decoupled from the ledger's write
/// path. Transitions are serialized per order on the order's own lock, so
/// different orders advance independently.
#[derive(Debug)]
pub struct StatusTracker {
    ledger: Arc<OrderLedger>,
}

impl StatusTracker {
    pub fn new(ledger: Arc<OrderLedger>) -> Self {
        StatusTracker { ledger }
    }

    /// Move an order to `next`, failing if `next` is not a legal successor
    /// of its current status.
    #[instrument(skip(self))]
    pub fn advance(&self, order_id: &str, next: OrderStatus) -> Result<(), OrderError> {
        let handle = self.ledger.order_handle(order_id)?;
        let mut order = handle.lock().expect("order lock poisoned");

        if !order.status.can_advance_to(next) {
            return Err(OrderError::InvalidTransition {
                order_id: order_id.to_string(),
                from: order.status,
                requested: next,
            });
        }

        tracing::info!(%order_id, from = %order.status, to = %next, "order advanced");
        order.status = next;
        Ok(())
    }

    pub fn status(&self, order_id: &str) -> Result<OrderStatus, OrderError> {
        Ok(self.ledger.order(order_id)?.status)
    }
}
