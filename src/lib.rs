use std::path::Path;
use std::sync::Arc;
use std::{env, fs};

use serde::Deserialize;

use crate::paypal::PaymentGateway;
use crate::telemetry::PaymentMetrics;

pub mod api;
pub mod error;
pub mod middleware;
pub mod paypal;
pub mod telemetry;
pub mod traced;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub otel: OtelConfig,
    pub paypal: PaypalConfig,
}

impl AppConfig {
    /// A missing config file means "run on defaults"; a file that exists but
    /// does not parse is a hard startup error, never a silent fallback.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(value) => toml::from_str(&value)
                .unwrap_or_else(|error| panic!("failed to parse {}: {error}", path.display())),
            Err(_) => Self::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub static_dir: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_owned(),
            port: 3000,
            static_dir: "./static".to_owned(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OtelConfig {
    pub endpoint: String,
}

impl Default for OtelConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:4317".to_owned(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PaypalConfig {
    pub base_url: String,
}

impl Default for PaypalConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api-m.sandbox.paypal.com".to_owned(),
        }
    }
}

impl PaypalConfig {
    /// Credentials come from the environment; the demo fallbacks keep the
    /// service bootable without a PayPal account.
    pub fn client_id(&self) -> String {
        env::var("PAYPAL_CLIENT_ID").unwrap_or_else(|_| "demo_client_id".to_owned())
    }

    pub fn client_secret(&self) -> String {
        env::var("PAYPAL_CLIENT_SECRET").unwrap_or_else(|_| "demo_client_secret".to_owned())
    }
}

/// Everything a request handler needs: the pre-registered payment metrics and
/// the gateway. Constructed once in `main` and handed to handlers through
/// `web::Data` instead of ambient globals.
pub struct AppContext {
    pub metrics: PaymentMetrics,
    pub gateway: Arc<dyn PaymentGateway>,
    pub client_id: String,
}

impl AppContext {
    pub fn new(metrics: PaymentMetrics, gateway: Arc<dyn PaymentGateway>, client_id: String) -> Self {
        Self {
            metrics,
            gateway,
            client_id,
        }
    }
}
