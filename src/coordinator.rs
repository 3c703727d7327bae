use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::pin::Pin;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use futures::Stream;
use tonic::{Request, Response, Status};
use tracing_futures::Instrument;

use crate::catalog::{Catalog, Item};
use crate::error::OrderError;
use crate::ledger::{OrderLedger, Receipt};
use crate::proto;
use crate::proto::coffee_shop_server::CoffeeShop;
use crate::tracker::{OrderStatus, StatusTracker};

/// The service-facing layer: menu streaming, order placement, and status
/// queries over the catalog, ledger, and tracker.
#[derive(Debug)]
pub struct CoffeeShopService {
    catalog: Arc<Catalog>,
    ledger: Arc<OrderLedger>,
    tracker: StatusTracker,
}

impl CoffeeShopService {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        let ledger = Arc::new(OrderLedger::new(catalog.clone()));
        let tracker = StatusTracker::new(ledger.clone());
        CoffeeShopService {
            catalog,
            ledger,
            tracker,
        }
    }
}

#[tonic::async_trait]
impl CoffeeShop for CoffeeShopService {
    type GetMenuStream =
        Pin<Box<dyn Stream<Item = Result<proto::Item, Status>> + Send + Sync + 'static>>;

    async fn get_menu(
        &self,
        _request: Request<proto::MenuRequest>,
    ) -> Result<Response<Self::GetMenuStream>, Status> {
        let menu = self.catalog.list_menu();
        tracing::info!(items = menu.len(), "menu stream opened");

        // Lazy pull: nothing is produced until the caller polls, and
        // dropping the stream (caller gone, deadline expired) stops
        // production and releases the snapshot.
        let outbound = async_stream::stream! {
            for item in menu {
                yield Ok(item_to_proto(&item));
            }
        };

        Ok(Response::new(
            Box::pin(outbound.instrument(tracing::info_span!("menu_stream")))
                as Self::GetMenuStream,
        ))
    }

    async fn place_order(
        &self,
        request: Request<proto::Order>,
    ) -> Result<Response<proto::Receipt>, Status> {
        let order = request.into_inner();
        let item_ids: Vec<String> = order.items.into_iter().map(|item| item.id).collect();

        let idempotency_key = if order.idempotency_key.is_empty() {
            let derived = derived_key(&item_ids);
            tracing::debug!(%derived, "caller sent no idempotency key");
            derived
        } else {
            order.idempotency_key
        };

        let receipt = self
            .ledger
            .place_order(&item_ids, &idempotency_key)
            .map_err(error_to_status)?;

        Ok(Response::new(receipt_to_proto(&receipt)))
    }

    async fn get_order_status(
        &self,
        request: Request<proto::StatusRequest>,
    ) -> Result<Response<proto::OrderStatusResponse>, Status> {
        let req = request.into_inner();
        let status = self
            .tracker
            .status(&req.order_id)
            .map_err(error_to_status)?;

        Ok(Response::new(proto::OrderStatusResponse {
            order_id: req.order_id,
            status: status_to_proto(status) as i32,
        }))
    }

    async fn advance_order(
        &self,
        request: Request<proto::AdvanceRequest>,
    ) -> Result<Response<proto::OrderStatusResponse>, Status> {
        let req = request.into_inner();
        let requested = proto::OrderStatus::from_i32(req.status)
            .ok_or_else(|| Status::invalid_argument(format!("unrecognized status {}", req.status)))?;
        let next = status_from_proto(requested);

        match self.tracker.advance(&req.order_id, next) {
            Ok(()) => Ok(Response::new(proto::OrderStatusResponse {
                order_id: req.order_id,
                status: status_to_proto(next) as i32,
            })),
            Err(error) => {
                if let OrderError::InvalidTransition { .. } = error {
                    // A caller asking for an illegal transition is a bug
                    // somewhere, not normal traffic.
                    tracing::error!("rejected status advance: {}", error);
                }
                Err(error_to_status(error))
            }
        }
    }
}

/// Best-effort fallback key for callers that omit one: the sorted item
/// multiset plus a 60-second timestamp bucket. Deduplicates immediate
/// retries only; true exactly-once needs a caller-supplied key.
fn derived_key(item_ids: &[String]) -> String {
    let mut sorted = item_ids.to_vec();
    sorted.sort();

    let bucket = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs() / 60)
        .unwrap_or(0);

    let mut hasher = DefaultHasher::new();
    sorted.hash(&mut hasher);
    bucket.hash(&mut hasher);
    format!("derived-{:016x}", hasher.finish())
}

fn error_to_status(error: OrderError) -> Status {
    match error {
        OrderError::EmptyOrder | OrderError::InvalidItem(_) => {
            Status::invalid_argument(error.to_string())
        }
        OrderError::NotFound(_) => Status::not_found(error.to_string()),
        OrderError::InvalidTransition { .. } => Status::failed_precondition(error.to_string()),
    }
}

fn item_to_proto(item: &Item) -> proto::Item {
    proto::Item {
        id: item.id.clone(),
        name: item.name.clone(),
        price_cents: item.price_cents,
        available: item.available,
    }
}

fn receipt_to_proto(receipt: &Receipt) -> proto::Receipt {
    proto::Receipt {
        order_id: receipt.order_id.clone(),
        total_cents: receipt.total_cents,
        status: status_to_proto(receipt.status) as i32,
    }
}

fn status_to_proto(status: OrderStatus) -> proto::OrderStatus {
    match status {
        OrderStatus::Received => proto::OrderStatus::Received,
        OrderStatus::Preparing => proto::OrderStatus::Preparing,
        OrderStatus::Ready => proto::OrderStatus::Ready,
        OrderStatus::Completed => proto::OrderStatus::Completed,
        OrderStatus::Cancelled => proto::OrderStatus::Cancelled,
    }
}

fn status_from_proto(status: proto::OrderStatus) -> OrderStatus {
    match status {
        proto::OrderStatus::Received => OrderStatus::Received,
        proto::OrderStatus::Preparing => OrderStatus::Preparing,
        proto::OrderStatus::Ready => OrderStatus::Ready,
        proto::OrderStatus::Completed => OrderStatus::Completed,
        proto::OrderStatus::Cancelled => OrderStatus::Cancelled,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;

    fn espresso() -> Item {
        Item {
            id: "espresso".to_string(),
            name: "Espresso".to_string(),
            price_cents: 300,
            available: true,
        }
    }

    fn latte() -> Item {
        Item {
            id: "latte".to_string(),
            name: "Latte".to_string(),
            price_cents: 500,
            available: true,
        }
    }

    fn service_with(items: Vec<Item>) -> CoffeeShopService {
        CoffeeShopService::new(Arc::new(Catalog::new(items)))
    }

    fn order_request(item_ids: &[&str], idempotency_key: &str) -> Request<proto::Order> {
        Request::new(proto::Order {
            items: item_ids
                .iter()
                .map(|id| proto::Item {
                    id: id.to_string(),
                    ..Default::default()
                })
                .collect(),
            idempotency_key: idempotency_key.to_string(),
        })
    }

    #[tokio::test]
    async fn menu_stream_delivers_every_item_in_order() {
        let service = service_with(vec![espresso(), latte()]);

        let stream = service
            .get_menu(Request::new(proto::MenuRequest {}))
            .await
            .expect("get_menu")
            .into_inner();
        let items: Vec<proto::Item> = stream
            .map(|item| item.expect("stream item"))
            .collect()
            .await;

        let got: Vec<&str> = items.iter().map(|item| item.id.as_str()).collect();
        assert_eq!(got, vec!["espresso", "latte"]);
        assert_eq!(items[0].price_cents, 300);
    }

    #[tokio::test]
    async fn empty_catalog_streams_zero_items_and_completes() {
        let service = service_with(vec![]);

        let stream = service
            .get_menu(Request::new(proto::MenuRequest {}))
            .await
            .expect("get_menu")
            .into_inner();
        assert_eq!(stream.count().await, 0);
    }

    #[tokio::test]
    async fn dropping_the_stream_mid_flight_stops_production() {
        let service = service_with(vec![espresso(), latte()]);

        let mut stream = service
            .get_menu(Request::new(proto::MenuRequest {}))
            .await
            .expect("get_menu")
            .into_inner();
        let first = stream.next().await.expect("one item").expect("ok item");
        assert_eq!(first.id, "espresso");
        drop(stream);
    }

    #[tokio::test]
    async fn espresso_order_walks_the_state_machine() {
        let service = service_with(vec![espresso()]);

        let receipt = service
            .place_order(order_request(&["espresso"], "k1"))
            .await
            .expect("place_order")
            .into_inner();
        assert_eq!(receipt.order_id, "o1");
        assert_eq!(receipt.total_cents, 300);
        assert_eq!(receipt.status(), proto::OrderStatus::Received);

        let advanced = service
            .advance_order(Request::new(proto::AdvanceRequest {
                order_id: "o1".to_string(),
                status: proto::OrderStatus::Preparing as i32,
            }))
            .await
            .expect("advance to PREPARING")
            .into_inner();
        assert_eq!(advanced.status(), proto::OrderStatus::Preparing);

        let error = service
            .advance_order(Request::new(proto::AdvanceRequest {
                order_id: "o1".to_string(),
                status: proto::OrderStatus::Completed as i32,
            }))
            .await
            .expect_err("PREPARING -> COMPLETED must fail");
        assert_eq!(error.code(), tonic::Code::FailedPrecondition);

        let status = service
            .get_order_status(Request::new(proto::StatusRequest {
                order_id: "o1".to_string(),
            }))
            .await
            .expect("get_order_status")
            .into_inner();
        assert_eq!(status.status(), proto::OrderStatus::Preparing);
    }

    #[tokio::test]
    async fn unknown_item_is_rejected_with_its_id() {
        let service = service_with(vec![espresso()]);

        let error = service
            .place_order(order_request(&["espresso", "flat-white"], "k1"))
            .await
            .expect_err("unknown item must fail");
        assert_eq!(error.code(), tonic::Code::InvalidArgument);
        assert!(error.message().contains("flat-white"));

        // Nothing was created.
        let error = service
            .get_order_status(Request::new(proto::StatusRequest {
                order_id: "o1".to_string(),
            }))
            .await
            .expect_err("no order exists");
        assert_eq!(error.code(), tonic::Code::NotFound);
    }

    #[tokio::test]
    async fn empty_item_list_is_rejected() {
        let service = service_with(vec![espresso()]);

        let error = service
            .place_order(order_request(&[], "k1"))
            .await
            .expect_err("empty order must fail");
        assert_eq!(error.code(), tonic::Code::InvalidArgument);
    }

    #[tokio::test]
    async fn unknown_order_status_is_not_found() {
        let service = service_with(vec![espresso()]);

        let error = service
            .get_order_status(Request::new(proto::StatusRequest {
                order_id: "o42".to_string(),
            }))
            .await
            .expect_err("unknown order");
        assert_eq!(error.code(), tonic::Code::NotFound);
    }

    #[tokio::test]
    async fn replayed_key_gets_the_same_receipt_through_the_rpc_surface() {
        let service = service_with(vec![espresso()]);

        let first = service
            .place_order(order_request(&["espresso"], "k1"))
            .await
            .expect("first placement")
            .into_inner();
        let replay = service
            .place_order(order_request(&["espresso"], "k1"))
            .await
            .expect("replay")
            .into_inner();
        assert_eq!(first, replay);
    }

    #[test]
    fn derived_key_ignores_submission_order() {
        let forward = derived_key(&["espresso".to_string(), "latte".to_string()]);
        let reversed = derived_key(&["latte".to_string(), "espresso".to_string()]);
        assert_eq!(forward, reversed);

        let other = derived_key(&["espresso".to_string()]);
        assert_ne!(forward, other);
    }
}
