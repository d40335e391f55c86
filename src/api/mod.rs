use actix_web::{get, post, web, HttpResponse};
use opentelemetry::KeyValue;
use serde::Deserialize;
use serde_json::json;

use crate::error::GatewayError;
use crate::paypal::CartItem;
use crate::traced::{run_traced, Operation};
use crate::AppContext;

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub cart: Vec<CartItem>,
}

pub fn route(cfg: &mut web::ServiceConfig) {
    cfg.service(client_id)
        .service(create_order)
        .service(capture_order);
}

#[get("/clientid")]
async fn client_id(context: web::Data<AppContext>) -> Result<HttpResponse, GatewayError> {
    let client_id = context.client_id.clone();
    let attributes = vec![KeyValue::new(
        "paypal.client_id.present",
        !client_id.is_empty(),
    )];

    let body = run_traced(Operation::ClientId, &context.metrics, attributes, async move {
        tracing::info!("client id requested");
        Ok(json!({ "clientid": client_id }))
    })
    .await?;

    Ok(HttpResponse::Ok().json(body))
}

#[post("/orders")]
async fn create_order(
    context: web::Data<AppContext>,
    body: web::Bytes,
) -> Result<HttpResponse, GatewayError> {
    // The cart is deserialized here rather than by an extractor so malformed
    // input still flows through the traced pipeline as an error outcome.
    let parsed: Result<CreateOrderRequest, GatewayError> = serde_json::from_slice(&body)
        .map_err(|error| GatewayError::InvalidCart(error.to_string()));
    let item = parsed
        .as_ref()
        .ok()
        .and_then(|request| request.cart.first().cloned());
    // Span attributes are prepared up front so the error path never has to
    // read cart data that turned out to be missing.
    let attributes = vec![
        KeyValue::new(
            "paypal.order.amount",
            item.as_ref()
                .map_or_else(|| "unavailable".to_owned(), |i| i.amount.clone()),
        ),
        KeyValue::new(
            "paypal.order.currency",
            item.as_ref()
                .map_or_else(|| "unavailable".to_owned(), |i| i.currency.clone()),
        ),
        KeyValue::new(
            "paypal.order.product_id",
            item.as_ref()
                .and_then(|i| i.id.clone())
                .unwrap_or_else(|| "unknown".to_owned()),
        ),
    ];

    let gateway = context.gateway.clone();
    let order = run_traced(Operation::CreateOrder, &context.metrics, attributes, async move {
        parsed?;
        let item = item.ok_or(GatewayError::EmptyCart)?;
        tracing::info!(amount = %item.amount, currency = %item.currency, "creating paypal order");
        gateway.create_order(&item).await
    })
    .await?;

    Ok(HttpResponse::Ok().json(order))
}

#[post("/capture/{order_id}")]
async fn capture_order(
    context: web::Data<AppContext>,
    path: web::Path<String>,
) -> Result<HttpResponse, GatewayError> {
    let order_id = path.into_inner();
    let attributes = vec![KeyValue::new("paypal.order.id", order_id.clone())];

    let gateway = context.gateway.clone();
    let body = run_traced(Operation::CaptureOrder, &context.metrics, attributes, async move {
        tracing::info!(order_id = %order_id, "capturing paypal order");
        gateway.capture_order(&order_id).await
    })
    .await?;

    Ok(HttpResponse::Ok().json(body))
}
