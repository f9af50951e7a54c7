use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    serve, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::application::order_lifecycle::OrderLifecycle;
use crate::errors::AppError;
use orders_types::domain::order::{LineItem, Order};
use orders_types::ports::order_store::{OrderIntake, OrderStore};

#[derive(Clone)]
pub struct HttpServerConfig {
    pub port: String,
}

#[derive(Clone)]
pub struct HttpServer<S>
where
    S: OrderStore + OrderIntake,
{
    pub lifecycle: Arc<OrderLifecycle<S>>,
    pub config: HttpServerConfig,
}

#[derive(Serialize, Deserialize)]
pub struct PlaceOrderRequest {
    pub customer_id: String,
    pub items: Vec<LineItem>,
}

type Shared<S> = State<Arc<OrderLifecycle<S>>>;

impl<S> HttpServer<S>
where
    S: OrderStore + OrderIntake,
{
    pub async fn new(lifecycle: OrderLifecycle<S>, config: HttpServerConfig) -> anyhow::Result<Self> {
        Ok(Self {
            lifecycle: Arc::new(lifecycle),
            config,
        })
    }

    pub fn router(&self) -> Router {
        let trace_layer = TraceLayer::new_for_http()
            .make_span_with(|request: &axum::extract::Request<_>| {
                let uri = request.uri().to_string();
                let request_id = Uuid::new_v4();
                tracing::info_span!(
                    "http_request",
                    %request_id,
                    method = %request.method(),
                    uri
                )
            })
            .on_request(
                |request: &axum::extract::Request<_>, span: &tracing::Span| {
                    tracing::info!(
                        parent: span,
                        method = %request.method(),
                        uri = %request.uri(),
                        "request"
                    );
                },
            )
            .on_response(
                |response: &axum::response::Response, latency: Duration, span: &tracing::Span| {
                    tracing::info!(
                        parent: span,
                        status = %response.status(),
                        latency_ms = %latency.as_millis(),
                        "response"
                    );
                },
            );

        Router::new()
            .route("/health", get(health))
            .route("/orders", post(place_order::<S>))
            .route("/orders/{id}", get(get_order::<S>))
            .route("/orders/{id}/process", post(process_order::<S>))
            .route("/orders/{id}/ship", post(ship_order::<S>))
            .route("/orders/{id}/deliver", post(deliver_order::<S>))
            .route("/orders/{id}/cancel", post(cancel_order::<S>))
            .layer(trace_layer)
            .with_state(self.lifecycle.clone())
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let app = self.router();
        let addr: SocketAddr = format!("0.0.0.0:{}", self.config.port).parse()?;
        tracing::info!("starting server on {}", addr);
        let listener = tokio::net::TcpListener::bind(addr).await?;
        serve(listener, app.into_make_service()).await?;
        Ok(())
    }
}

fn parse_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|e| AppError::BadRequest(format!("invalid order id {raw:?}: {e}")))
}

async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

async fn place_order<S>(
    State(lifecycle): Shared<S>,
    Json(payload): Json<PlaceOrderRequest>,
) -> Result<(StatusCode, Json<Order>), AppError>
where
    S: OrderStore + OrderIntake,
{
    let order = lifecycle
        .place_order(payload.customer_id, payload.items)
        .await?;
    Ok((StatusCode::CREATED, Json(order)))
}

async fn get_order<S>(
    State(lifecycle): Shared<S>,
    Path(id): Path<String>,
) -> Result<Json<Order>, AppError>
where
    S: OrderStore + OrderIntake,
{
    let order = lifecycle.get_order(parse_id(&id)?).await?;
    Ok(Json(order))
}

async fn process_order<S>(
    State(lifecycle): Shared<S>,
    Path(id): Path<String>,
) -> Result<Json<Order>, AppError>
where
    S: OrderStore + OrderIntake,
{
    Ok(Json(lifecycle.process_order(parse_id(&id)?).await?))
}

async fn ship_order<S>(
    State(lifecycle): Shared<S>,
    Path(id): Path<String>,
) -> Result<Json<Order>, AppError>
where
    S: OrderStore + OrderIntake,
{
    Ok(Json(lifecycle.ship_order(parse_id(&id)?).await?))
}

async fn deliver_order<S>(
    State(lifecycle): Shared<S>,
    Path(id): Path<String>,
) -> Result<Json<Order>, AppError>
where
    S: OrderStore + OrderIntake,
{
    Ok(Json(lifecycle.deliver_order(parse_id(&id)?).await?))
}

async fn cancel_order<S>(
    State(lifecycle): Shared<S>,
    Path(id): Path<String>,
) -> Result<Json<Order>, AppError>
where
    S: OrderStore + OrderIntake,
{
    Ok(Json(lifecycle.cancel_order(parse_id(&id)?).await?))
}
