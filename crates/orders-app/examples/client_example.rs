///  To run :
///  cargo r --example client_example
use orders_client::{error_status, OrdersClient, PlaceOrderRequest};
use orders_hex::application::order_lifecycle::OrderLifecycle;
use orders_hex::inbound::http::{HttpServer, HttpServerConfig};
use orders_repo::build_store;
use orders_types::domain::order::{LineItem, OrderStatus};
use tempfile::tempdir;

fn find_free_port() -> u16 {
    std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let port = find_free_port();
    let addr = format!("http://127.0.0.1:{port}/");

    // Use a temp file-backed SQLite DB so multiple connections see the same data.
    let tmp = tempdir()?;
    let db_path = tmp.path().join("orders.db");
    let db_url = format!("sqlite://{}", db_path.display());

    let store = build_store(Some(&db_url)).await?;
    let server = HttpServer::new(
        OrderLifecycle::new(store),
        HttpServerConfig {
            port: port.to_string(),
        },
    )
    .await?;

    let handle = tokio::spawn(async move {
        server.run().await.expect("server run");
    });
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    let client = OrdersClient::new(&addr)?;
    let placed = client
        .place_order(PlaceOrderRequest {
            customer_id: "example".into(),
            items: vec![LineItem {
                sku: "w-1".into(),
                name: "Widget".into(),
                price_cents: 500,
                quantity: 1,
            }],
        })
        .await?;
    println!("Placed order id={} total={}", placed.id, placed.total_cents);

    let processing = client.process_order(placed.id).await?;
    println!("Order {} is {}", processing.id, processing.status);

    // Ship and cancel race against the same Processing order.
    let (shipped, cancelled) = tokio::join!(
        client.ship_order(placed.id),
        client.cancel_order(placed.id)
    );
    for (name, res) in [("ship", shipped), ("cancel", cancelled)] {
        match res {
            Ok(order) => println!("{name}: ok, status={}", order.status),
            Err(err) => println!("{name}: rejected ({:?})", error_status(&err)),
        }
    }

    let fetched = client.get_order(placed.id).await?;
    println!(
        "Final status={} shipped_date={:?} finalized_date={:?}",
        fetched.status, fetched.shipped_date, fetched.finalized_date
    );
    assert!(matches!(
        fetched.status,
        OrderStatus::Shipped | OrderStatus::Cancelled
    ));
    assert!(fetched.is_consistent());

    handle.abort();
    Ok(())
}
