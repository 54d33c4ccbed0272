//! HTTP endpoint handlers.
//!
//! Each handler validates its small request, makes at most one payment-API
//! call, and reshapes the response. The webhook handler additionally hands
//! verified payloads to the fire-and-forget forwarder; its own response
//! never depends on the forwarding outcome.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::Config;
use crate::display::sanitize_note;
use crate::error::ApiError;
use crate::feed::{self, FeedItem};
use crate::stripe::{signature, CreateSessionParams, StripeClient};
use crate::webhook::{classify_event, evaluate_event, Disposition, Forwarder};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub stripe: StripeClient,
    pub forwarder: Forwarder,
}

impl AppState {
    pub fn new(config: Config, stripe: StripeClient, forwarder: Forwarder) -> Self {
        Self {
            config: Arc::new(config),
            stripe,
            forwarder,
        }
    }
}

// =============================================================================
// Health Check
// =============================================================================

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

// =============================================================================
// Stripe Webhook
// =============================================================================

/// Webhook acknowledgement body.
#[derive(Serialize)]
pub struct WebhookAck {
    pub received: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skipped: Option<&'static str>,
}

/// Liveness probe body for GET on the webhook path.
#[derive(Serialize)]
pub struct ProbeResponse {
    pub ok: bool,
}

/// GET on the webhook path answers a liveness probe.
pub async fn webhook_probe() -> Json<ProbeResponse> {
    Json(ProbeResponse { ok: true })
}

/// Stripe webhook endpoint.
///
/// Verification runs against the raw byte body before anything is parsed;
/// the signature is byte-exact over the original payload. Only a
/// verification failure or a malformed body produces a non-200 response —
/// the provider retries on non-success, and a downstream forwarding failure
/// must never trigger that.
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>, ApiError> {
    info!(
        body_length = body.len(),
        has_signature = headers.contains_key("stripe-signature"),
        "stripe_webhook_received"
    );

    match state.config.webhook_secret.as_deref() {
        Some(secret) => {
            let sig_header = headers
                .get("stripe-signature")
                .and_then(|v| v.to_str().ok());

            signature::verify_signature(
                secret,
                &body,
                sig_header,
                state.config.signature_max_age,
                signature::unix_now(),
            )
            .map_err(|e| {
                warn!(error = %e, "stripe_webhook_verification_failed");
                ApiError::Signature(e.to_string())
            })?;
        }
        None => {
            // Known weakening: trust the body as-is when no secret is set.
            warn!("stripe_webhook_secret_missing");
        }
    }

    let event: crate::stripe::Event = serde_json::from_slice(&body)
        .map_err(|e| ApiError::Validation(format!("malformed event payload: {}", e)))?;

    info!(
        event_id = %event.id,
        event_type = %event.event_type,
        livemode = event.livemode,
        "stripe_webhook_verified"
    );

    let classified = classify_event(&event).map_err(ApiError::Validation)?;

    match evaluate_event(classified, event.created, &state.config) {
        Disposition::Forward(payload) => {
            if state.forwarder.is_configured() {
                info!(object_id = %payload.object_id, "forward_dispatching");
                state.forwarder.dispatch(payload);
            } else {
                info!(object_id = %payload.object_id, "forward_target_not_configured");
            }
            Ok(Json(WebhookAck { received: true, skipped: None }))
        }
        Disposition::Skip(reason) => {
            info!(event_id = %event.id, reason = reason, "stripe_webhook_skipped");
            Ok(Json(WebhookAck { received: true, skipped: Some(reason) }))
        }
        Disposition::Acknowledge => Ok(Json(WebhookAck { received: true, skipped: None })),
    }
}

// =============================================================================
// Session Retrieval
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct SessionQuery {
    #[serde(default)]
    pub session_id: Option<String>,
}

/// Projection of a checkout session for the thank-you page.
#[derive(Debug, Serialize)]
pub struct SessionView {
    pub id: String,
    pub mode: Option<String>,
    pub status: Option<String>,
    pub payment_status: Option<String>,
    pub amount_total: Option<i64>,
    pub currency: Option<String>,
    pub customer_email: Option<String>,
    pub display_name: Option<String>,
    pub subscription: Option<String>,
    pub payment_intent: Option<String>,
}

/// Session-retrieval endpoint for the post-payment thank-you page.
pub async fn get_session(
    State(state): State<AppState>,
    Query(query): Query<SessionQuery>,
) -> Result<Json<SessionView>, ApiError> {
    let session_id = query
        .session_id
        .filter(|id| !id.trim().is_empty())
        .ok_or(ApiError::MissingParam("session_id"))?;

    let session = state.stripe.retrieve_checkout_session(&session_id).await?;

    info!(
        session_id = %session.id,
        payment_status = ?session.payment_status,
        "session_retrieved"
    );

    let view = SessionView {
        display_name: session.resolved_name().map(|n| n.to_string()),
        customer_email: session.customer_email().map(|e| e.to_string()),
        id: session.id,
        mode: session.mode,
        status: session.status,
        payment_status: session.payment_status,
        amount_total: session.amount_total,
        currency: session.currency,
        subscription: session.subscription,
        payment_intent: session.payment_intent,
    };

    Ok(Json(view))
}

// =============================================================================
// Checkout Creation
// =============================================================================

/// Donation mode requested by the form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DonationMode {
    Payment,
    Subscription,
}

/// Recurring billing interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingInterval {
    Month,
    Year,
}

impl BillingInterval {
    fn as_str(self) -> &'static str {
        match self {
            BillingInterval::Month => "month",
            BillingInterval::Year => "year",
        }
    }
}

/// Checkout-creation request from the donation form.
#[derive(Debug, Deserialize)]
pub struct CreateDonationRequest {
    pub mode: DonationMode,
    pub amount: i64,
    pub currency: String,
    #[serde(default)]
    pub interval: Option<BillingInterval>,
    #[serde(default)]
    pub interval_count: Option<u32>,
    #[serde(default)]
    pub note: Option<String>,
    /// Donor consented to appearing in the public feed
    #[serde(default)]
    pub public: bool,
}

/// Checkout-creation response: the hosted payment page URL.
#[derive(Serialize)]
pub struct CheckoutResponse {
    pub url: String,
}

/// Checkout-session creation endpoint.
pub async fn create_checkout(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<CreateDonationRequest>,
) -> Result<Json<CheckoutResponse>, ApiError> {
    let params = validate_donation_request(&request, &state.config)?;

    // A client-supplied key lets the form retry safely; otherwise one
    // request gets one generated key.
    let idempotency_key = headers
        .get("idempotency-key")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string())
        .unwrap_or_else(generate_idempotency_key);

    info!(
        mode = ?request.mode,
        amount = request.amount,
        currency = %request.currency,
        "checkout_create_requested"
    );

    let created = state
        .stripe
        .create_checkout_session(&params, &idempotency_key)
        .await?;

    // create_checkout_session guarantees the url is present on success
    let url = created.url.unwrap_or_default();

    Ok(Json(CheckoutResponse { url }))
}

/// Field-level validation, rejecting before any provider call.
fn validate_donation_request(
    request: &CreateDonationRequest,
    config: &Config,
) -> Result<CreateSessionParams, ApiError> {
    if request.amount < 1 {
        return Err(ApiError::Validation(
            "amount must be a positive integer in minor units".to_string(),
        ));
    }

    if !config.is_allowed_currency(&request.currency) {
        return Err(ApiError::Validation(format!(
            "currency {} is not accepted",
            request.currency
        )));
    }

    let (mode, interval, interval_count) = match request.mode {
        DonationMode::Payment => ("payment", None, None),
        DonationMode::Subscription => {
            let interval = request.interval.ok_or_else(|| {
                ApiError::Validation("interval is required for subscription mode".to_string())
            })?;
            let count = request.interval_count.unwrap_or(1);
            if !(1..=12).contains(&count) {
                return Err(ApiError::Validation(
                    "interval_count must be between 1 and 12".to_string(),
                ));
            }
            ("subscription", Some(interval.as_str()), Some(count))
        }
    };

    Ok(CreateSessionParams {
        mode,
        amount: request.amount,
        currency: request.currency.trim().to_lowercase(),
        interval,
        interval_count,
        note: request
            .note
            .as_deref()
            .map(sanitize_note)
            .filter(|n| !n.is_empty()),
        public: request.public,
        success_url: config.success_url.clone(),
        cancel_url: config.cancel_url.clone(),
    })
}

/// Generate a server-side idempotency key.
fn generate_idempotency_key() -> String {
    let mut rng = rand::thread_rng();
    let bytes: [u8; 16] = rng.gen();
    format!("dk_{}", hex::encode(bytes))
}

// =============================================================================
// Donations Feed
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct FeedQuery {
    #[serde(default)]
    pub limit: Option<i64>,
}

/// Feed response body.
#[derive(Serialize)]
pub struct FeedResponse {
    pub items: Vec<FeedItem>,
}

/// Public donations feed endpoint.
pub async fn donations_feed(
    State(state): State<AppState>,
    Query(query): Query<FeedQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let limit = feed::clamp_limit(query.limit);

    let events = state.stripe.list_recent_events(feed::CANDIDATE_BATCH).await?;

    let candidates = events
        .iter()
        .filter_map(feed::candidate_from_event)
        .collect();

    let items = feed::build_feed(candidates, &state.config, limit);

    info!(
        requested_limit = limit,
        item_count = items.len(),
        "donations_feed_built"
    );

    // Advisory edge-cache hint only; correctness never depends on it.
    let cache_control = format!("public, max-age={}", state.config.feed_cache_seconds);

    Ok((
        StatusCode::OK,
        [(header::CACHE_CONTROL, cache_control)],
        Json(FeedResponse { items }),
    ))
}
