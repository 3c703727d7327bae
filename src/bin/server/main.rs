use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use clap::{App, Arg};
use tonic::transport::Server;

use coffeeshop::catalog::Catalog;
use coffeeshop::configuration::get_configuration;
use coffeeshop::coordinator::CoffeeShopService;
use coffeeshop::proto::coffee_shop_server::CoffeeShopServer;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let matches = App::new("shop-server")
        .version("0.1.0")
        .arg(
            Arg::with_name("menu")
                .short("m")
                .long("menu")
                .help("path to the menu file, overrides configuration")
                .takes_value(true),
        )
        .get_matches();

    let settings = get_configuration()?;
    let menu_path = matches
        .value_of("menu")
        .unwrap_or(&settings.catalog.menu_path)
        .to_string();

    let catalog = Arc::new(Catalog::load(Path::new(&menu_path))?);
    tracing::info!("loaded menu from {}: {} items", menu_path, catalog.len());

    let shop_service = CoffeeShopService::new(catalog);
    let svc = CoffeeShopServer::new(shop_service);

    let server_addr = settings.application.addr();
    tracing::info!(message = "Starting server.", %server_addr);
    Server::builder()
        .trace_fn(|_| tracing::info_span!("coffeeshop_server"))
        .add_service(svc)
        .serve(server_addr.parse()?)
        .await?;

    Ok(())
}
