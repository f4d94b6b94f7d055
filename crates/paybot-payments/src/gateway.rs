//! ToyyibPay Gateway Client
//!
//! Both API calls share one shape: POST a form, get back a single-element
//! JSON array, read one field from element 0. `post_for_field` does that
//! once; `create_category` and `create_bill` only build the payloads.

use std::fmt;

use async_trait::async_trait;
use serde_json::Value;

use crate::config::PaymentConfig;
use crate::error::{GatewayError, PaymentError, Result};
use crate::ident::{BILL_NAME_LENGTH, DEFAULT_ID_LENGTH, generate_random_string};
use crate::order::OrderReference;

const CATEGORY_DESCRIPTION: &str = "Payment for bot services";
const BILL_CONTENT_EMAIL: &str = "Thank you for purchasing!";

/// Provider-side category identifier
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CategoryCode(String);

impl CategoryCode {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CategoryCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A created bill and the link the payer opens
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PaymentLink {
    pub bill_code: String,
    pub url: String,
    pub order: OrderReference,
}

/// Bill-payment gateway (Strategy pattern)
///
/// `ToyyibPayClient` is the production implementation; tests substitute fakes.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a fresh category for one transaction
    async fn create_category(&self) -> std::result::Result<CategoryCode, GatewayError>;

    /// Create a bill under `category` and return its payment link
    async fn create_bill(
        &self,
        category: &CategoryCode,
        user_id: i64,
        price_code: u32,
        item_name: &str,
    ) -> std::result::Result<PaymentLink, GatewayError>;
}

/// HTTP client for the ToyyibPay REST API
pub struct ToyyibPayClient {
    http: reqwest::Client,
    base_url: String,
    secret_key: String,
    return_url: String,
    callback_url: String,
}

impl ToyyibPayClient {
    /// Create from configuration
    pub fn new(config: &PaymentConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| PaymentError::Config(format!("HTTP client: {e}")))?;

        Ok(Self::with_http(http, config))
    }

    /// Create with a preconfigured `reqwest::Client`
    pub fn with_http(http: reqwest::Client, config: &PaymentConfig) -> Self {
        Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            secret_key: config.secret_key.clone(),
            return_url: config.return_url.clone(),
            callback_url: config.callback_url.clone(),
        }
    }

    /// Link a payer opens for `bill_code`
    pub fn payment_url(&self, bill_code: &str) -> String {
        format!("{}/{}", self.base_url, bill_code)
    }

    async fn post_for_field(
        &self,
        endpoint: &str,
        form: &[(&str, String)],
        field: &str,
    ) -> std::result::Result<String, GatewayError> {
        let url = format!("{}/index.php/api/{}", self.base_url, endpoint);

        let result = async {
            let response = self
                .http
                .post(&url)
                .form(form)
                .send()
                .await
                .and_then(reqwest::Response::error_for_status)
                .map_err(|e| GatewayError::Transport(e.to_string()))?;

            let body = response
                .text()
                .await
                .map_err(|e| GatewayError::Transport(e.to_string()))?;

            let json: Value = serde_json::from_str(&body)
                .map_err(|e| GatewayError::Unexpected(format!("invalid JSON ({e}): {body}")))?;

            extract_field(&json, field)
        }
        .await;

        if let Err(ref e) = result {
            tracing::error!(endpoint = %endpoint, error = %e, "ToyyibPay request failed");
        }

        result
    }
}

#[async_trait]
impl PaymentGateway for ToyyibPayClient {
    async fn create_category(&self) -> std::result::Result<CategoryCode, GatewayError> {
        let category_name = format!(
            "Telegram Payment for {}",
            generate_random_string(DEFAULT_ID_LENGTH)
        );

        let form = [
            ("catname", category_name),
            ("catdescription", CATEGORY_DESCRIPTION.to_string()),
            ("userSecretKey", self.secret_key.clone()),
        ];

        let code = self.post_for_field("createCategory", &form, "CategoryCode").await?;
        tracing::info!(category_code = %code, "Created payment category");

        Ok(CategoryCode::new(code))
    }

    async fn create_bill(
        &self,
        category: &CategoryCode,
        user_id: i64,
        price_code: u32,
        item_name: &str,
    ) -> std::result::Result<PaymentLink, GatewayError> {
        let bill_name = generate_random_string(BILL_NAME_LENGTH);
        let order = OrderReference::new(user_id, bill_name.clone(), item_name)
            .map_err(|e| GatewayError::Unexpected(e.to_string()))?;

        let form = [
            ("userSecretKey", self.secret_key.clone()),
            ("categoryCode", category.to_string()),
            ("billName", bill_name),
            ("billDescription", format!("Bill for {user_id}")),
            ("billPriceSetting", "1".to_string()),
            ("billPayorInfo", "1".to_string()),
            ("billAmount", price_code.to_string()),
            ("billReturnUrl", self.return_url.clone()),
            ("billCallbackUrl", self.callback_url.clone()),
            ("billExternalReferenceNo", order.to_string()),
            ("billTo", String::new()),
            ("billEmail", String::new()),
            ("billPhone", String::new()),
            ("billSplitPayment", "0".to_string()),
            ("billPaymentChannel", "0".to_string()),
            ("billContentEmail", BILL_CONTENT_EMAIL.to_string()),
            ("billChargeToCustomer", "1".to_string()),
            ("billExpiryDays", "1".to_string()),
        ];

        let bill_code = self.post_for_field("createBill", &form, "BillCode").await?;
        tracing::info!(
            bill_code = %bill_code,
            user_id,
            order_id = %order,
            "Created bill"
        );

        Ok(PaymentLink {
            url: self.payment_url(&bill_code),
            bill_code,
            order,
        })
    }
}

/// Read `field` from element 0 of a JSON array response
fn extract_field(body: &Value, field: &str) -> std::result::Result<String, GatewayError> {
    let first = body
        .as_array()
        .ok_or_else(|| GatewayError::Unexpected(format!("expected JSON array, got {body}")))?
        .first()
        .ok_or_else(|| GatewayError::Unexpected("empty response array".into()))?;

    match first.get(field) {
        Some(Value::String(s)) if !s.is_empty() => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        _ => Err(GatewayError::Unexpected(format!("{field} not found in response: {first}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> ToyyibPayClient {
        let config = PaymentConfig {
            base_url: server.uri(),
            ..PaymentConfig::new("secret-123")
        };
        ToyyibPayClient::new(&config).unwrap()
    }

    #[test]
    fn test_extract_field() {
        let body = json!([{ "CategoryCode": "abc123" }]);
        assert_eq!(extract_field(&body, "CategoryCode").unwrap(), "abc123");
    }

    #[test]
    fn test_extract_field_rejects_non_array() {
        let err = extract_field(&json!({}), "CategoryCode").unwrap_err();
        assert!(matches!(err, GatewayError::Unexpected(_)));
        assert!(extract_field(&json!([]), "CategoryCode").is_err());
        assert!(extract_field(&json!([{ "Other": "x" }]), "BillCode").is_err());
    }

    #[tokio::test]
    async fn test_create_category() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/index.php/api/createCategory"))
            .and(body_string_contains("userSecretKey=secret-123"))
            .and(body_string_contains("catdescription=Payment+for+bot+services"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!([{ "CategoryCode": "abc123" }])),
            )
            .expect(1)
            .mount(&server)
            .await;

        let code = client_for(&server).create_category().await.unwrap();
        assert_eq!(code.as_str(), "abc123");
    }

    #[tokio::test]
    async fn test_create_category_object_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/index.php/api/createCategory"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;

        let err = client_for(&server).create_category().await.unwrap_err();
        assert!(matches!(err, GatewayError::Unexpected(_)));
    }

    #[tokio::test]
    async fn test_create_category_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let err = client_for(&server).create_category().await.unwrap_err();
        assert!(matches!(err, GatewayError::Transport(_)));
    }

    #[tokio::test]
    async fn test_create_bill() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/index.php/api/createBill"))
            .and(body_string_contains("categoryCode=abc123"))
            .and(body_string_contains("billAmount=1000"))
            .and(body_string_contains("billDescription=Bill+for+42"))
            .and(body_string_contains("billPriceSetting=1"))
            .and(body_string_contains("billPayorInfo=1"))
            .and(body_string_contains("billSplitPayment=0"))
            .and(body_string_contains("billPaymentChannel=0"))
            .and(body_string_contains("billChargeToCustomer=1"))
            .and(body_string_contains("billExpiryDays=1"))
            .and(body_string_contains("billExternalReferenceNo=42_"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!([{ "BillCode": "xyz789" }])),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let link = client
            .create_bill(&CategoryCode::new("abc123"), 42, 1000, "premium_access")
            .await
            .unwrap();

        assert_eq!(link.bill_code, "xyz789");
        assert_eq!(link.url, format!("{}/xyz789", server.uri()));
        assert!(link.url.ends_with("/xyz789"));
        assert_eq!(link.order.user_id, 42);
        assert_eq!(link.order.bill_name.len(), BILL_NAME_LENGTH);
        assert_eq!(link.order.item_name, "premium_access");
    }

    #[tokio::test]
    async fn test_create_bill_missing_code() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/index.php/api/createBill"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "Status": "error" }])))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .create_bill(&CategoryCode::new("abc123"), 42, 1000, "premium_access")
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Unexpected(_)));
    }

    #[tokio::test]
    async fn test_create_bill_non_json_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("[KEY-DID-NOT-EXIST]"))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .create_bill(&CategoryCode::new("abc123"), 1, 1000, "premium_access")
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Unexpected(_)));
    }
}
