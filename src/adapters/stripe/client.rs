//! Stripe implementation of the processor query port.
//!
//! Talks to the REST API with form-encoded requests authenticated via HTTP
//! basic auth (the API key as username). Secrets are held in
//! `secrecy::SecretString` so they never land in logs.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use crate::ports::{
    ProcessorCheckoutSession, ProcessorClient, ProcessorCustomer, ProcessorError,
    ProcessorErrorCode, ProcessorSubscription,
};

use super::types::{ApiCheckoutSession, ApiCustomer, ApiList, ApiSubscription};

/// Stripe API configuration.
#[derive(Clone)]
pub struct StripeConfig {
    /// Secret API key (sk_live_... or sk_test_...).
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

    /// Set a custom API base URL (for testing).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }
}

/// Stripe-backed processor client.
pub struct StripeProcessorClient {
    config: StripeConfig,
    http_client: reqwest::Client,
}

impl StripeProcessorClient {
    pub fn new(config: StripeConfig) -> Self {
        Self {
            config,
            http_client: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.api_base_url, path)
    }

    async fn get(&self, path: &str, query: &[(&str, &str)]) -> Result<reqwest::Response, ProcessorError> {
        self.http_client
            .get(self.url(path))
            .basic_auth(self.config.api_key.expose_secret(), Option::<&str>::None)
            .query(query)
            .send()
            .await
            .map_err(|e| ProcessorError::network(e.to_string()))
    }

    /// Maps non-success statuses to processor errors. 404 is handled by the
    /// callers that treat it as absence.
    async fn check(response: reqwest::Response) -> Result<reqwest::Response, ProcessorError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let code = match status.as_u16() {
            401 | 403 => ProcessorErrorCode::Authentication,
            429 => ProcessorErrorCode::RateLimited,
            _ => ProcessorErrorCode::Provider,
        };

        tracing::warn!(status = %status, "processor API error");
        Err(ProcessorError::new(
            code,
            format!("API error ({}): {}", status, body),
        ))
    }

    async fn decode<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ProcessorError> {
        response
            .json::<T>()
            .await
            .map_err(|e| ProcessorError::invalid_response(e.to_string()))
    }
}

#[async_trait]
impl ProcessorClient for StripeProcessorClient {
    async fn get_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<Option<ProcessorSubscription>, ProcessorError> {
        let path = format!("/v1/subscriptions/{}", subscription_id);
        let response = self.get(&path, &[]).await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let response = Self::check(response).await?;
        let subscription: ApiSubscription = Self::decode(response).await?;
        Ok(Some(subscription.into_snapshot()?))
    }

    async fn get_checkout_session(
        &self,
        session_id: &str,
    ) -> Result<Option<ProcessorCheckoutSession>, ProcessorError> {
        let path = format!("/v1/checkout/sessions/{}", session_id);
        let response = self.get(&path, &[]).await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let response = Self::check(response).await?;
        let session: ApiCheckoutSession = Self::decode(response).await?;
        Ok(Some(session.into()))
    }

    async fn list_subscriptions(
        &self,
        customer_id: &str,
    ) -> Result<Vec<ProcessorSubscription>, ProcessorError> {
        // status=all includes canceled subscriptions; the API returns newest
        // first.
        let response = self
            .get(
                "/v1/subscriptions",
                &[("customer", customer_id), ("status", "all"), ("limit", "100")],
            )
            .await?;

        let response = Self::check(response).await?;
        let list: ApiList<ApiSubscription> = Self::decode(response).await?;

        list.data
            .into_iter()
            .map(ApiSubscription::into_snapshot)
            .collect()
    }

    async fn find_customer_by_email(
        &self,
        email: &str,
    ) -> Result<Option<ProcessorCustomer>, ProcessorError> {
        let response = self
            .get("/v1/customers", &[("email", email), ("limit", "1")])
            .await?;

        let response = Self::check(response).await?;
        let list: ApiList<ApiCustomer> = Self::decode(response).await?;

        Ok(list
            .data
            .into_iter()
            .find(|c| !c.deleted)
            .map(ProcessorCustomer::from))
    }

    async fn list_customers(&self, limit: u32) -> Result<Vec<ProcessorCustomer>, ProcessorError> {
        let limit = limit.min(100).to_string();
        let response = self.get("/v1/customers", &[("limit", &limit)]).await?;

        let response = Self::check(response).await?;
        let list: ApiList<ApiCustomer> = Self::decode(response).await?;

        Ok(list
            .data
            .into_iter()
            .filter(|c| !c.deleted)
            .map(ProcessorCustomer::from)
            .collect())
    }
}
