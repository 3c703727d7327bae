use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use tracing_attributes::instrument;

use crate::catalog::{Catalog, Item};
use crate::error::OrderError;
use crate::tracker::OrderStatus;

/// A placed order. Owned by the ledger; everything but `status` is frozen
/// at placement time, and only the status tracker writes `status`.
#[derive(Debug, Clone)]
pub struct Order {
    pub id: String,
    /// Item snapshots copied from the catalog, in submission order.
    pub items: Vec<Item>,
    pub status: OrderStatus,
    pub created_at: SystemTime,
    pub idempotency_key: String,
}

/// Read-only projection handed back to callers. Frozen at placement; a
/// replayed idempotency key gets this exact receipt back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub order_id: String,
    pub total_cents: u32,
    pub status: OrderStatus,
}

/// Assigns order ids, tracks order state, and enforces the exactly-once
/// placement guarantee.
///
/// The ledger mutex covers only the idempotency check-then-insert critical
/// section; each order then lives behind its own mutex so operations on
/// different orders never contend.
#[derive(Debug)]
pub struct OrderLedger {
    catalog: Arc<Catalog>,
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    orders: HashMap<String, Arc<Mutex<Order>>>,
    receipts: HashMap<String, Receipt>,
    last_seq: u64,
}

impl OrderLedger {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        OrderLedger {
            catalog,
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Place an order for the given catalog item ids.
    ///
    /// A previously seen idempotency key returns the stored receipt with no
    /// re-validation and no side effects. For a new key the whole
    /// check-validate-insert sequence runs under the ledger mutex, so
    /// concurrent calls sharing a key create exactly one order and all see
    /// the same receipt.
    #[instrument(skip(self))]
    pub fn place_order(
        &self,
        item_ids: &[String],
        idempotency_key: &str,
    ) -> Result<Receipt, OrderError> {
        if item_ids.is_empty() {
            return Err(OrderError::EmptyOrder);
        }

        let mut inner = self.inner.lock().expect("ledger lock poisoned");

        if let Some(receipt) = inner.receipts.get(idempotency_key) {
            tracing::debug!(
                order_id = %receipt.order_id,
                "replayed idempotency key, returning stored receipt"
            );
            return Ok(receipt.clone());
        }

        let mut items = Vec::with_capacity(item_ids.len());
        for id in item_ids {
            match self.catalog.item(id) {
                Some(item) if item.available => items.push(item),
                _ => return Err(OrderError::InvalidItem(id.clone())),
            }
        }
        let total_cents = items.iter().map(|item| item.price_cents).sum();

        inner.last_seq += 1;
        let order_id = format!("o{}", inner.last_seq);

        let order = Order {
            id: order_id.clone(),
            items,
            status: OrderStatus::Received,
            created_at: SystemTime::now(),
            idempotency_key: idempotency_key.to_string(),
        };
        let receipt = Receipt {
            order_id: order_id.clone(),
            total_cents,
            status: OrderStatus::Received,
        };

        inner
            .orders
            .insert(order_id.clone(), Arc::new(Mutex::new(order)));
        inner
            .receipts
            .insert(idempotency_key.to_string(), receipt.clone());

        tracing::info!(%order_id, total_cents, "order placed");
        Ok(receipt)
    }

    /// A point-in-time copy of the order.
    pub fn order(&self, order_id: &str) -> Result<Order, OrderError> {
        let handle = self.order_handle(order_id)?;
        let order = handle.lock().expect("order lock poisoned");
        Ok(order.clone())
    }

    /// The per-order lock handle. The status tracker serializes transitions
    /// on it.
    pub(crate) fn order_handle(&self, order_id: &str) -> Result<Arc<Mutex<Order>>, OrderError> {
        let inner = self.inner.lock().expect("ledger lock poisoned");
        inner
            .orders
            .get(order_id)
            .cloned()
            .ok_or_else(|| OrderError::NotFound(order_id.to_string()))
    }
}
