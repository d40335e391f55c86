use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::GatewayError;
use crate::PaypalConfig;

/// One entry of the inbound cart. `amount` stays a decimal string end to end;
/// this service never does money arithmetic.
#[derive(Debug, Clone, Deserialize)]
pub struct CartItem {
    pub amount: String,
    pub currency: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub quantity: Option<String>,
}

/// Capture or authorization record pulled out of a capture response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub id: String,
    pub status: String,
}

/// Boundary to the external payment processor. The HTTP surface only sees
/// this trait, so tests run against a stub instead of the live sandbox.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_order(&self, item: &CartItem) -> Result<Value, GatewayError>;
    async fn capture_order(&self, order_id: &str) -> Result<Value, GatewayError>;
}

/// Thin pass-through to PayPal's Orders v2 REST API using client-credentials
/// auth. Response bodies are returned verbatim; PayPal stays the system of
/// record for order state.
pub struct PaypalClient {
    http: reqwest::Client,
    base_url: String,
    client_id: String,
    client_secret: String,
}

impl PaypalClient {
    pub fn new(config: &PaypalConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            client_id: config.client_id(),
            client_secret: config.client_secret(),
        }
    }

    async fn access_token(&self) -> Result<String, GatewayError> {
        let response = self
            .http
            .post(format!("{}/v1/oauth2/token", self.base_url))
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(GatewayError::Auth(format!(
                "token endpoint returned {}",
                response.status()
            )));
        }

        let body: Value = response.json().await?;
        body.get("access_token")
            .and_then(Value::as_str)
            .map(str::to_owned)
            .ok_or_else(|| GatewayError::Auth("token response missing access_token".to_owned()))
    }

    async fn order_body(response: reqwest::Response) -> Result<Value, GatewayError> {
        let status = response.status();
        if status.is_success() {
            Ok(response.json().await?)
        } else {
            Err(GatewayError::Api {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            })
        }
    }
}

#[async_trait]
impl PaymentGateway for PaypalClient {
    async fn create_order(&self, item: &CartItem) -> Result<Value, GatewayError> {
        let token = self.access_token().await?;
        let request = json!({
            "intent": "CAPTURE",
            "purchase_units": [{
                "amount": {
                    "currency_code": item.currency,
                    "value": item.amount,
                },
            }],
        });

        let response = self
            .http
            .post(format!("{}/v2/checkout/orders", self.base_url))
            .bearer_auth(token)
            .json(&request)
            .send()
            .await?;

        Self::order_body(response).await
    }

    async fn capture_order(&self, order_id: &str) -> Result<Value, GatewayError> {
        let token = self.access_token().await?;
        let response = self
            .http
            .post(format!(
                "{}/v2/checkout/orders/{}/capture",
                self.base_url, order_id
            ))
            .bearer_auth(token)
            .header("Prefer", "return=representation")
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .send()
            .await?;

        Self::order_body(response).await
    }
}

/// Best-effort extraction of the transaction reported by a capture response:
/// the first capture wins, else the first authorization. Absence of both is
/// not an error, there is simply nothing to report.
pub fn extract_transaction(order: &Value) -> Option<Transaction> {
    let payments = order.get("purchase_units")?.get(0)?.get("payments")?;
    let record = payments
        .get("captures")
        .and_then(|captures| captures.get(0))
        .or_else(|| {
            payments
                .get("authorizations")
                .and_then(|authorizations| authorizations.get(0))
        })?;

    Some(Transaction {
        id: record.get("id")?.as_str()?.to_owned(),
        status: record.get("status")?.as_str()?.to_owned(),
    })
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    pub(crate) const KNOWN_ORDER_ID: &str = "5O190127TN364715T";
    pub(crate) const KNOWN_CAPTURE_ID: &str = "3C679366HH908993F";

    /// Healthy-processor stand-in: creation always succeeds, capture succeeds
    /// only for the one order id it knows about.
    pub(crate) struct StubGateway;

    #[async_trait]
    impl PaymentGateway for StubGateway {
        async fn create_order(&self, item: &CartItem) -> Result<Value, GatewayError> {
            Ok(json!({
                "id": KNOWN_ORDER_ID,
                "status": "CREATED",
                "purchase_units": [{
                    "amount": { "currency_code": item.currency, "value": item.amount },
                }],
            }))
        }

        async fn capture_order(&self, order_id: &str) -> Result<Value, GatewayError> {
            if order_id == KNOWN_ORDER_ID {
                Ok(json!({
                    "id": order_id,
                    "status": "COMPLETED",
                    "purchase_units": [{
                        "payments": {
                            "captures": [{ "id": KNOWN_CAPTURE_ID, "status": "COMPLETED" }],
                        },
                    }],
                }))
            } else {
                Err(GatewayError::Api {
                    status: 404,
                    body: "RESOURCE_NOT_FOUND".to_owned(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_takes_priority_over_authorization() {
        let order = json!({
            "purchase_units": [{
                "payments": {
                    "captures": [{ "id": "CAP-1", "status": "COMPLETED" }],
                    "authorizations": [{ "id": "AUTH-1", "status": "CREATED" }],
                },
            }],
        });

        let transaction = extract_transaction(&order).unwrap();
        assert_eq!(transaction.id, "CAP-1");
        assert_eq!(transaction.status, "COMPLETED");
    }

    #[test]
    fn falls_back_to_first_authorization() {
        let order = json!({
            "purchase_units": [{
                "payments": {
                    "authorizations": [
                        { "id": "AUTH-1", "status": "CREATED" },
                        { "id": "AUTH-2", "status": "VOIDED" },
                    ],
                },
            }],
        });

        let transaction = extract_transaction(&order).unwrap();
        assert_eq!(transaction.id, "AUTH-1");
        assert_eq!(transaction.status, "CREATED");
    }

    #[test]
    fn missing_payments_yields_none() {
        assert_eq!(extract_transaction(&json!({})), None);
        assert_eq!(extract_transaction(&json!({ "purchase_units": [] })), None);
        assert_eq!(
            extract_transaction(&json!({ "purchase_units": [{ "payments": {} }] })),
            None
        );
    }

    #[test]
    fn malformed_record_yields_none() {
        let order = json!({
            "purchase_units": [{
                "payments": { "captures": [{ "status": "COMPLETED" }] },
            }],
        });
        assert_eq!(extract_transaction(&order), None);
    }

    #[test]
    fn cart_item_requires_amount_and_currency() {
        let ok: CartItem =
            serde_json::from_value(json!({ "amount": "10.00", "currency": "USD" })).unwrap();
        assert_eq!(ok.amount, "10.00");
        assert!(ok.id.is_none());

        let missing =
            serde_json::from_value::<CartItem>(json!({ "amount": "10.00", "id": "x" }));
        assert!(missing.is_err());
    }
}
