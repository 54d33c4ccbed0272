//! Thin REST client for the Stripe API.
//!
//! Rides on the process-wide reqwest connection pool. Requests are
//! form-encoded the way Stripe expects (`line_items[0][price_data][...]`
//! style bracket keys); responses are deserialized into the projections in
//! [`super::types`].

use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use super::types::{CheckoutSession, Event, EventList};

const API_BASE: &str = "https://api.stripe.com/v1";

/// Errors from the Stripe API client.
#[derive(Debug, Error)]
pub enum StripeError {
    #[error("stripe request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("stripe returned {status}: {message}")]
    Api { status: u16, message: String },
    #[error("failed to parse stripe response: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("checkout session response missing redirect url")]
    MissingRedirectUrl,
}

/// Parameters for creating a hosted checkout session.
#[derive(Debug, Clone)]
pub struct CreateSessionParams {
    /// "payment" or "subscription"
    pub mode: &'static str,
    /// Amount in minor units
    pub amount: i64,
    /// Lowercase ISO currency code
    pub currency: String,
    /// Recurring interval ("month" / "year"), subscription mode only
    pub interval: Option<&'static str>,
    /// Number of intervals between charges, subscription mode only
    pub interval_count: Option<u32>,
    /// Sanitized donor note, stored in session metadata
    pub note: Option<String>,
    /// Donor consented to public display
    pub public: bool,
    pub success_url: String,
    pub cancel_url: String,
}

impl CreateSessionParams {
    /// Render the bracket-keyed form body for the session-creation call.
    fn to_form(&self) -> Vec<(String, String)> {
        let mut form: Vec<(String, String)> = Vec::new();
        form.push(("mode".to_string(), self.mode.to_string()));
        form.push(("payment_method_types[]".to_string(), "card".to_string()));
        form.push(("success_url".to_string(), self.success_url.clone()));
        form.push(("cancel_url".to_string(), self.cancel_url.clone()));

        form.push((
            "line_items[0][price_data][currency]".to_string(),
            self.currency.clone(),
        ));
        form.push((
            "line_items[0][price_data][product_data][name]".to_string(),
            "Donation".to_string(),
        ));
        form.push((
            "line_items[0][price_data][unit_amount]".to_string(),
            self.amount.to_string(),
        ));
        if let Some(interval) = self.interval {
            form.push((
                "line_items[0][price_data][recurring][interval]".to_string(),
                interval.to_string(),
            ));
            form.push((
                "line_items[0][price_data][recurring][interval_count]".to_string(),
                self.interval_count.unwrap_or(1).to_string(),
            ));
        }
        form.push(("line_items[0][quantity]".to_string(), "1".to_string()));

        form.push((
            "metadata[public]".to_string(),
            if self.public { "true" } else { "false" }.to_string(),
        ));
        if let Some(note) = &self.note {
            form.push(("metadata[note]".to_string(), note.clone()));
        }

        form
    }
}

/// A freshly created checkout session: the id and the hosted-page URL.
#[derive(Debug, Clone, Deserialize)]
pub struct CreatedSession {
    pub id: String,
    #[serde(default)]
    pub url: Option<String>,
}

/// Stripe API client bound to one secret key.
#[derive(Clone)]
pub struct StripeClient {
    http: Client,
    secret_key: String,
}

impl StripeClient {
    pub fn new(http: Client, secret_key: String) -> Self {
        Self { http, secret_key }
    }

    /// Create a hosted checkout session.
    ///
    /// The idempotency key makes a retried request reuse the original
    /// session instead of creating a duplicate.
    pub async fn create_checkout_session(
        &self,
        params: &CreateSessionParams,
        idempotency_key: &str,
    ) -> Result<CreatedSession, StripeError> {
        let response = self
            .http
            .post(format!("{}/checkout/sessions", API_BASE))
            .basic_auth(&self.secret_key, None::<&str>)
            .header("Idempotency-Key", idempotency_key)
            .form(&params.to_form())
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(api_error(status.as_u16(), &body));
        }

        let created: CreatedSession = serde_json::from_str(&body)?;
        info!(session_id = %created.id, "checkout_session_created");

        if created.url.is_none() {
            return Err(StripeError::MissingRedirectUrl);
        }
        Ok(created)
    }

    /// Retrieve a checkout session by id.
    pub async fn retrieve_checkout_session(
        &self,
        session_id: &str,
    ) -> Result<CheckoutSession, StripeError> {
        let response = self
            .http
            .get(format!("{}/checkout/sessions/{}", API_BASE, session_id))
            .basic_auth(&self.secret_key, None::<&str>)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(api_error(status.as_u16(), &body));
        }

        Ok(serde_json::from_str(&body)?)
    }

    /// List recent completed-checkout and invoice-paid events, newest first.
    ///
    /// The batch is intentionally larger than any feed page so that the
    /// filtering downstream still has enough candidates to fill a page.
    pub async fn list_recent_events(&self, limit: usize) -> Result<Vec<Event>, StripeError> {
        let limit = limit.min(100).to_string();
        let response = self
            .http
            .get(format!("{}/events", API_BASE))
            .basic_auth(&self.secret_key, None::<&str>)
            .query(&[
                ("limit", limit.as_str()),
                ("types[]", "checkout.session.completed"),
                ("types[]", "invoice.paid"),
            ])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(api_error(status.as_u16(), &body));
        }

        let list: EventList = serde_json::from_str(&body)?;
        info!(event_count = list.data.len(), has_more = list.has_more, "events_listed");
        Ok(list.data)
    }
}

impl std::fmt::Debug for StripeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeClient")
            .field("secret_key", &"[REDACTED]")
            .finish()
    }
}

/// Extract the human-readable message from a Stripe error body.
fn api_error(status: u16, body: &str) -> StripeError {
    let message = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")?
                .get("message")?
                .as_str()
                .map(|s| s.to_string())
        })
        .unwrap_or_else(|| body.to_string());

    StripeError::Api { status, message }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> CreateSessionParams {
        CreateSessionParams {
            mode: "payment",
            amount: 500,
            currency: "usd".to_string(),
            interval: None,
            interval_count: None,
            note: Some("for the food bank".to_string()),
            public: true,
            success_url: "https://example.org/thank-you".to_string(),
            cancel_url: "https://example.org/give".to_string(),
        }
    }

    #[test]
    fn test_one_time_form_body() {
        let form = params().to_form();

        assert!(form.contains(&("mode".to_string(), "payment".to_string())));
        assert!(form.contains(&(
            "line_items[0][price_data][unit_amount]".to_string(),
            "500".to_string()
        )));
        assert!(form.contains(&("metadata[public]".to_string(), "true".to_string())));
        assert!(form.contains(&(
            "metadata[note]".to_string(),
            "for the food bank".to_string()
        )));
        assert!(!form.iter().any(|(k, _)| k.contains("recurring")));
    }

    #[test]
    fn test_subscription_form_body() {
        let mut p = params();
        p.mode = "subscription";
        p.interval = Some("month");
        p.interval_count = Some(1);
        p.note = None;
        p.public = false;

        let form = p.to_form();

        assert!(form.contains(&(
            "line_items[0][price_data][recurring][interval]".to_string(),
            "month".to_string()
        )));
        assert!(form.contains(&(
            "line_items[0][price_data][recurring][interval_count]".to_string(),
            "1".to_string()
        )));
        assert!(form.contains(&("metadata[public]".to_string(), "false".to_string())));
        assert!(!form.iter().any(|(k, _)| k == "metadata[note]"));
    }

    #[test]
    fn test_api_error_extracts_message() {
        let body = r#"{"error": {"type": "invalid_request_error", "message": "No such session"}}"#;
        match api_error(404, body) {
            StripeError::Api { status, message } => {
                assert_eq!(status, 404);
                assert_eq!(message, "No such session");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_api_error_falls_back_to_raw_body() {
        match api_error(500, "gateway timeout") {
            StripeError::Api { message, .. } => assert_eq!(message, "gateway timeout"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_created_session_deserialization() {
        let json = r#"{"id": "cs_1", "url": "https://checkout.stripe.com/pay/cs_1"}"#;
        let created: CreatedSession = serde_json::from_str(json).unwrap();
        assert_eq!(created.id, "cs_1");
        assert!(created.url.is_some());
    }
}
