use actix_files::Files;
use actix_web::middleware::{from_fn, Logger};
use actix_web::{web, App, HttpServer};
use opentelemetry::global;
use opentelemetry::global::shutdown_tracer_provider;
use paypal_checkout_otel::api::route;
use paypal_checkout_otel::middleware::metrics::HttpMetrics;
use paypal_checkout_otel::middleware::tracing::record_trace;
use paypal_checkout_otel::paypal::{PaymentGateway, PaypalClient};
use paypal_checkout_otel::telemetry::{build_metrics_provider, init_subscriber, PaymentMetrics};
use paypal_checkout_otel::{AppConfig, AppContext};
use std::sync::Arc;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let app_config = AppConfig::load("app.toml");

    init_subscriber(&app_config.otel);
    let meter_provider = build_metrics_provider(&app_config.otel);
    global::set_meter_provider(meter_provider.clone());
    let meter = global::meter("paypal-checkout-server");

    let metrics = PaymentMetrics::new(&meter);
    let http_metrics = HttpMetrics::new(&meter);
    let gateway: Arc<dyn PaymentGateway> = Arc::new(PaypalClient::new(&app_config.paypal));
    let client_id = app_config.paypal.client_id();
    let static_dir = app_config.server.static_dir.clone();

    tracing::info!(
        host = %app_config.server.host,
        port = app_config.server.port,
        "starting paypal checkout server"
    );

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(AppContext::new(
                metrics.clone(),
                gateway.clone(),
                client_id.clone(),
            )))
            .wrap(Logger::default())
            .wrap(from_fn(record_trace))
            .wrap(http_metrics.clone())
            .configure(route)
            .service(Files::new("/", static_dir.clone()).index_file("index.html"))
    })
    .bind((app_config.server.host.as_str(), app_config.server.port))?
    .run()
    .await?;

    tokio::task::spawn_blocking(shutdown_tracer_provider);
    tokio::task::spawn_blocking(move || meter_provider.shutdown());

    Ok(())
}
