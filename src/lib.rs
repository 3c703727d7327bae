//! Coffee-shop order service: streaming menu delivery, exactly-once order
//! placement, and order-status tracking.
//!
//! The pieces, leaves first: [`catalog`] holds the published menu,
//! [`ledger`] owns orders and the idempotency map, [`tracker`] advances
//! order status through its state machine, and [`coordinator`] exposes the
//! whole thing as the `CoffeeShop` gRPC service.

pub mod catalog;
pub mod configuration;
pub mod coordinator;
pub mod error;
pub mod ledger;
pub mod tracker;

pub mod proto {
    tonic::include_proto!("coffeeshop");
}
