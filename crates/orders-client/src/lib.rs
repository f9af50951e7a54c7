use std::time::Duration;

use anyhow::Context;
use orders_types::domain::order::{LineItem, Order, Transition};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone)]
pub struct OrdersClientBuilder {
    base: Url,
    headers: HeaderMap,
    timeout: Option<Duration>,
    client: Option<reqwest::Client>,
}

/// HTTP client for the orders API. Non-2xx responses become errors carrying
/// the status; a lost race shows up as a 400 on `ship_order`/`cancel_order`.
#[derive(Clone)]
pub struct OrdersClient {
    base: Url,
    client: reqwest::Client,
}

impl OrdersClient {
    pub fn new(base_url: &str) -> anyhow::Result<Self> {
        Self::builder(base_url)?.build()
    }

    pub fn builder(base_url: &str) -> anyhow::Result<OrdersClientBuilder> {
        let base = Url::parse(base_url).context("invalid base url")?;
        Ok(OrdersClientBuilder {
            base,
            headers: HeaderMap::new(),
            timeout: None,
            client: None,
        })
    }

    fn url(&self, path: &str) -> anyhow::Result<Url> {
        self.base.join(path).context("failed to join url")
    }

    pub async fn place_order(&self, req: PlaceOrderRequest) -> anyhow::Result<Order> {
        let res = self
            .client
            .post(self.url("orders")?)
            .json(&req)
            .send()
            .await?
            .error_for_status()?;
        Ok(res.json().await?)
    }

    pub async fn get_order(&self, id: Uuid) -> anyhow::Result<Order> {
        let res = self
            .client
            .get(self.url(&format!("orders/{id}"))?)
            .send()
            .await?
            .error_for_status()?;
        Ok(res.json().await?)
    }

    pub async fn process_order(&self, id: Uuid) -> anyhow::Result<Order> {
        self.transition(id, Transition::Process).await
    }

    pub async fn ship_order(&self, id: Uuid) -> anyhow::Result<Order> {
        self.transition(id, Transition::Ship).await
    }

    pub async fn deliver_order(&self, id: Uuid) -> anyhow::Result<Order> {
        self.transition(id, Transition::Deliver).await
    }

    pub async fn cancel_order(&self, id: Uuid) -> anyhow::Result<Order> {
        self.transition(id, Transition::Cancel).await
    }

    async fn transition(&self, id: Uuid, transition: Transition) -> anyhow::Result<Order> {
        tracing::debug!(order_id = %id, %transition, "requesting transition");
        let res = self
            .client
            .post(self.url(&format!("orders/{id}/{transition}"))?)
            .send()
            .await?
            .error_for_status()
            .with_context(|| format!("{transition} order {id}"))?;
        Ok(res.json().await?)
    }
}

impl OrdersClientBuilder {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_header(
        mut self,
        key: impl AsRef<str>,
        value: impl AsRef<str>,
    ) -> anyhow::Result<Self> {
        let header_name =
            HeaderName::from_bytes(key.as_ref().as_bytes()).context("invalid header name")?;
        let header_value = HeaderValue::from_str(value.as_ref()).context("invalid header value")?;
        self.headers.insert(header_name, header_value);
        Ok(self)
    }

    pub fn with_reqwest_client(mut self, client: reqwest::Client) -> Self {
        self.client = Some(client);
        self
    }

    pub fn build(self) -> anyhow::Result<OrdersClient> {
        if let Some(client) = self.client {
            return Ok(OrdersClient {
                base: self.base,
                client,
            });
        }

        let mut builder = reqwest::Client::builder();
        if !self.headers.is_empty() {
            builder = builder.default_headers(self.headers);
        }
        if let Some(t) = self.timeout {
            builder = builder.timeout(t);
        }
        let client = builder.build()?;
        Ok(OrdersClient {
            base: self.base,
            client,
        })
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct PlaceOrderRequest {
    pub customer_id: String,
    pub items: Vec<LineItem>,
}

/// Status code of a failed request, if the failure came from the server.
pub fn error_status(err: &anyhow::Error) -> Option<reqwest::StatusCode> {
    err.downcast_ref::<reqwest::Error>().and_then(|e| e.status())
}
