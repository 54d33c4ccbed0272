//! Public donations feed pipeline.
//!
//! Candidates come from the provider's recent-events query. Each candidate
//! runs through the filters in order (paid, exclusion list, public consent),
//! is deduplicated on its payment identifier, and is then formatted into a
//! display item. The pipeline is pure; the handler supplies the candidates
//! and the clamped limit.

use serde::Serialize;
use std::collections::HashMap;
use tracing::debug;

use crate::config::Config;
use crate::display::{derive_display_name, donation_sentence, format_amount};
use crate::stripe::types::{CheckoutSession, Event, Invoice};

/// Feed page bounds: `limit` is clamped into this range.
pub const MIN_LIMIT: usize = 1;
pub const MAX_LIMIT: usize = 50;
pub const DEFAULT_LIMIT: usize = 10;

/// Upstream batch size; larger than any page so filtering can't starve it.
pub const CANDIDATE_BATCH: usize = 100;

/// One entry in the public feed.
#[derive(Debug, Clone, Serialize)]
pub struct FeedItem {
    pub name: String,
    pub text: String,
    /// Epoch seconds, for client-side relative-time rendering
    pub ts: i64,
}

/// Where a candidate came from; checkout wins over invoice on dedup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateKind {
    Checkout,
    Invoice,
}

/// A donation candidate, normalized from either event kind.
#[derive(Debug, Clone)]
pub struct FeedCandidate {
    pub kind: CandidateKind,
    pub object_id: String,
    /// Stable payment-level identifier used for dedup; session-level ids
    /// can repeat across retried attempts of the same payment.
    pub payment_intent: Option<String>,
    pub email: Option<String>,
    pub name: Option<String>,
    pub amount: i64,
    pub currency: String,
    pub recurring: bool,
    pub paid: bool,
    pub public_consent: bool,
    pub created: i64,
}

impl FeedCandidate {
    /// Dedup key: prefer the payment-intent id, fall back to the object id.
    fn dedup_key(&self) -> &str {
        self.payment_intent.as_deref().unwrap_or(&self.object_id)
    }
}

/// Normalize a provider event into a feed candidate.
///
/// Events that are not donation-shaped (unknown kinds, malformed objects)
/// yield `None` and drop out of the pipeline silently.
pub fn candidate_from_event(event: &Event) -> Option<FeedCandidate> {
    match event.event_type.as_str() {
        "checkout.session.completed" => {
            let session: CheckoutSession =
                serde_json::from_value(event.data.object.clone()).ok()?;
            Some(FeedCandidate {
                kind: CandidateKind::Checkout,
                payment_intent: session.payment_intent.clone(),
                email: session.customer_email().map(|e| e.to_string()),
                name: session.resolved_name().map(|n| n.to_string()),
                amount: session.amount_total.unwrap_or(0),
                currency: session.currency.clone().unwrap_or_else(|| "usd".to_string()),
                recurring: session.is_recurring(),
                paid: session.payment_status.as_deref() == Some("paid"),
                public_consent: is_truthy(session.metadata_value("public")),
                created: session.created.unwrap_or(event.created),
                object_id: session.id,
            })
        }
        "invoice.paid" => {
            let invoice: Invoice = serde_json::from_value(event.data.object.clone()).ok()?;
            Some(FeedCandidate {
                kind: CandidateKind::Invoice,
                payment_intent: invoice.payment_intent.clone(),
                email: invoice.customer_email.clone(),
                name: invoice.customer_name.clone(),
                amount: invoice.amount_paid.unwrap_or(0),
                currency: invoice.currency.clone().unwrap_or_else(|| "usd".to_string()),
                recurring: true,
                paid: invoice.is_paid(),
                public_consent: is_truthy(invoice.metadata_value("public")),
                created: invoice.created.unwrap_or(event.created),
                object_id: invoice.id,
            })
        }
        _ => None,
    }
}

fn is_truthy(value: Option<&str>) -> bool {
    matches!(
        value.map(|v| v.trim().to_lowercase()).as_deref(),
        Some("true") | Some("yes") | Some("1")
    )
}

/// Run the filter/dedupe/format pipeline and return the newest-first page.
pub fn build_feed(candidates: Vec<FeedCandidate>, config: &Config, limit: usize) -> Vec<FeedItem> {
    let mut accepted: HashMap<String, FeedCandidate> = HashMap::new();

    for candidate in candidates {
        // Filters short-circuit in order: paid, exclusion, consent.
        if !candidate.paid {
            debug!(object_id = %candidate.object_id, "feed_skip_unpaid");
            continue;
        }

        if let Some(email) = candidate.email.as_deref() {
            if config.is_excluded_email(email) {
                debug!(object_id = %candidate.object_id, "feed_skip_excluded");
                continue;
            }
        }

        // The consent bypass is a staging aid; it never weakens the paid or
        // exclusion filters above.
        if !candidate.public_consent && !config.feed_consent_bypass {
            debug!(object_id = %candidate.object_id, "feed_skip_no_consent");
            continue;
        }

        // A checkout-derived entry always wins over an invoice-derived one;
        // otherwise the first accepted entry for a payment keeps its slot.
        let key = candidate.dedup_key().to_string();
        let accept = match accepted.get(&key) {
            None => true,
            Some(existing) => {
                existing.kind != CandidateKind::Checkout
                    && candidate.kind == CandidateKind::Checkout
            }
        };

        if accept {
            accepted.insert(key, candidate);
        } else {
            debug!(object_id = %candidate.object_id, "feed_skip_duplicate");
        }
    }

    let mut items: Vec<(i64, FeedItem)> = accepted
        .into_values()
        .map(|c| {
            let name = derive_display_name(c.name.as_deref(), c.email.as_deref());
            let text =
                donation_sentence(&name, &format_amount(c.amount, &c.currency), c.recurring);
            (c.created, FeedItem { name, text, ts: c.created })
        })
        .collect();

    // Newest first
    items.sort_by(|a, b| b.0.cmp(&a.0));

    items
        .into_iter()
        .map(|(_, item)| item)
        .take(limit)
        .collect()
}

/// Clamp a requested page size into the supported range.
pub fn clamp_limit(requested: Option<i64>) -> usize {
    match requested {
        Some(n) => (n.max(MIN_LIMIT as i64) as usize).min(MAX_LIMIT),
        None => DEFAULT_LIMIT,
    }
}
