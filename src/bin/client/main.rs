use anyhow::{anyhow, Result};
use clap::{App, Arg};
use tokio::time;
use tonic::Request;

use coffeeshop::proto::coffee_shop_client::CoffeeShopClient;
use coffeeshop::proto::{Item, MenuRequest, Order, StatusRequest};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let matches = App::new("shop-client")
        .version("0.1.0")
        .arg(
            Arg::with_name("addr")
                .short("a")
                .long("addr")
                .help("server address, host:port")
                .takes_value(true),
        )
        .get_matches();

    let addr = matches.value_of("addr").unwrap_or("[::1]:9001");
    let mut client = connect_client(addr).await?;

    let mut menu_stream = client
        .get_menu(Request::new(MenuRequest {}))
        .await?
        .into_inner();

    let mut items: Vec<Item> = Vec::new();
    while let Some(item) = menu_stream.message().await? {
        tracing::info!("menu item = {:?}", item);
        items.push(item);
    }

    let order_items: Vec<Item> = items.into_iter().filter(|item| item.available).collect();
    if order_items.is_empty() {
        return Err(anyhow!("nothing on the menu is available to order"));
    }

    let idempotency_key = format!("cli-{:016x}", rand::random::<u64>());
    let receipt = client
        .place_order(Request::new(Order {
            items: order_items,
            idempotency_key,
        }))
        .await?
        .into_inner();
    tracing::info!("receipt = {:?}", receipt);

    let status = client
        .get_order_status(Request::new(StatusRequest {
            order_id: receipt.order_id.clone(),
        }))
        .await?
        .into_inner();
    tracing::info!("order {} status = {:?}", status.order_id, status.status());

    Ok(())
}

async fn connect_client(addr: &str) -> Result<CoffeeShopClient<tonic::transport::Channel>> {
    let mut retries: usize = 10;
    loop {
        let uri = format!("http://{}", addr);
        match CoffeeShopClient::connect(uri).await {
            Ok(c) => {
                return Ok(c);
            }
            Err(e) => {
                tracing::warn!(
                    "unable to connect to server, retries left = {}: {}",
                    retries,
                    e
                );
                if retries == 0 {
                    return Err(anyhow!("unable to connect to server {}", e));
                };
                time::sleep(time::Duration::from_secs(2)).await;
                retries -= 1;
            }
        }
    }
}
