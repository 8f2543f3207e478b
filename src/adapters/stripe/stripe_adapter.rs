//! Stripe payment provider adapter.
//!
//! Implements the `PaymentProvider` port over Stripe's REST API using form
//! encoded requests and basic auth with the secret key.

use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::domain::payments::{Invoice, PaymentIntent, Subscription};
use crate::ports::{PaymentError, PaymentErrorCode, PaymentProvider};

/// Stripe API configuration.
#[derive(Clone)]
pub struct StripeConfig {
    /// Secret API key (`sk_live_...` or `sk_test_...`).
    api_key: SecretString,

    /// Base URL for the API (default: https://api.stripe.com).
    api_base_url: String,
}

impl StripeConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: SecretString::new(api_key.into()),
            api_base_url: "https://api.stripe.com".to_string(),
        }
    }

    /// Overrides the API host, used against stripe-mock in tests.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into().trim_end_matches('/').to_string();
        self
    }
}

/// Stripe adapter backed by a pooled `reqwest` client.
pub struct StripePaymentAdapter {
    config: StripeConfig,
    http_client: reqwest::Client,
}

#[derive(Deserialize)]
struct StripeErrorBody {
    error: StripeErrorDetail,
}

#[derive(Deserialize)]
struct StripeErrorDetail {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl StripePaymentAdapter {
    pub fn new(config: StripeConfig) -> Self {
        Self {
            config,
            http_client: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.config.api_base_url, path)
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, PaymentError> {
        let response = self
            .http_client
            .get(self.url(path))
            .basic_auth(self.config.api_key.expose_secret(), Option::<&str>::None)
            .query(query)
            .send()
            .await
            .map_err(|e| PaymentError::network(e.to_string()))?;
        parse_response(path, response).await
    }

    async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        form: &[(String, String)],
    ) -> Result<T, PaymentError> {
        let response = self
            .http_client
            .post(self.url(path))
            .basic_auth(self.config.api_key.expose_secret(), Option::<&str>::None)
            .form(form)
            .send()
            .await
            .map_err(|e| PaymentError::network(e.to_string()))?;
        parse_response(path, response).await
    }
}

async fn parse_response<T: DeserializeOwned>(
    path: &str,
    response: reqwest::Response,
) -> Result<T, PaymentError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        tracing::error!(path, status = status.as_u16(), error = %body, "Stripe request failed");
        return Err(error_from_response(status, &body));
    }
    response.json().await.map_err(|e| {
        PaymentError::new(
            PaymentErrorCode::ProviderError,
            format!("Failed to parse Stripe response: {}", e),
        )
    })
}

fn error_from_response(status: StatusCode, body: &str) -> PaymentError {
    let code = match status {
        StatusCode::NOT_FOUND => PaymentErrorCode::NotFound,
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => PaymentErrorCode::AuthenticationError,
        StatusCode::TOO_MANY_REQUESTS => PaymentErrorCode::RateLimitExceeded,
        s if s.is_client_error() => PaymentErrorCode::InvalidRequest,
        _ => PaymentErrorCode::ProviderError,
    };
    match serde_json::from_str::<StripeErrorBody>(body) {
        Ok(parsed) => {
            let message = parsed
                .error
                .message
                .unwrap_or_else(|| format!("Stripe API error ({})", status));
            let err = PaymentError::new(code, message);
            match parsed.error.code {
                Some(provider_code) => err.with_provider_code(provider_code),
                None => err,
            }
        }
        Err(_) => PaymentError::new(code, format!("Stripe API error ({}): {}", status, body)),
    }
}

/// Encodes a metadata patch as `metadata[key]=value` form pairs.
fn metadata_form(metadata: &HashMap<String, String>) -> Vec<(String, String)> {
    let mut form: Vec<(String, String)> = metadata
        .iter()
        .map(|(k, v)| (format!("metadata[{}]", k), v.clone()))
        .collect();
    form.sort();
    form
}

#[derive(Deserialize)]
struct Ignored {}

#[async_trait]
impl PaymentProvider for StripePaymentAdapter {
    async fn get_subscription(&self, subscription_id: &str) -> Result<Subscription, PaymentError> {
        self.get(&format!("subscriptions/{}", subscription_id), &[]).await
    }

    async fn get_invoice(&self, invoice_id: &str) -> Result<Invoice, PaymentError> {
        self.get(&format!("invoices/{}", invoice_id), &[]).await
    }

    async fn get_payment_intent(&self, payment_intent_id: &str) -> Result<PaymentIntent, PaymentError> {
        self.get(
            &format!("payment_intents/{}", payment_intent_id),
            &[("expand[]", "review")],
        )
        .await
    }

    async fn update_subscription_metadata(
        &self,
        subscription_id: &str,
        metadata: &HashMap<String, String>,
    ) -> Result<(), PaymentError> {
        let _: Ignored = self
            .post(&format!("subscriptions/{}", subscription_id), &metadata_form(metadata))
            .await?;
        Ok(())
    }

    async fn void_invoice(&self, invoice_id: &str) -> Result<(), PaymentError> {
        let _: Ignored = self.post(&format!("invoices/{}/void", invoice_id), &[]).await?;
        Ok(())
    }

    async fn delete_subscription(&self, subscription_id: &str) -> Result<(), PaymentError> {
        let response = self
            .http_client
            .delete(self.url(&format!("subscriptions/{}", subscription_id)))
            .basic_auth(self.config.api_key.expose_secret(), Option::<&str>::None)
            .send()
            .await
            .map_err(|e| PaymentError::network(e.to_string()))?;
        let _: Ignored = parse_response("subscriptions", response).await?;
        Ok(())
    }
}
