//! Inbound webhook event processing.
//!
//! After the raw body has passed signature verification, the event is
//! classified into a closed set of known kinds and evaluated into a
//! disposition: forward a minimized payload, skip with a reason, or
//! acknowledge without action. The HTTP handler owns the response; this
//! module owns the decision.

pub mod forward;
pub mod payload;

use serde_json::Value;
use tracing::info;

use crate::config::Config;
use crate::stripe::types::{CheckoutSession, Event, Invoice};

pub use forward::Forwarder;
pub use payload::ForwardPayload;

/// Known webhook event kinds, with an explicit arm for everything else.
#[derive(Debug, Clone)]
pub enum WebhookEvent {
    CheckoutCompleted(CheckoutSession),
    InvoicePaid(Invoice),
    /// Acknowledged but not processed; keeps the endpoint forward-compatible.
    Ignored(String),
}

/// What the handler should do with a verified event.
#[derive(Debug, Clone)]
pub enum Disposition {
    /// Forward this payload downstream (if a target is configured).
    Forward(ForwardPayload),
    /// Benign skip: acknowledge with a reason, never forward.
    Skip(&'static str),
    /// Unrecognized event kind: acknowledge, nothing to do.
    Acknowledge,
}

/// Classify a verified event envelope by its type tag.
///
/// Returns an error string when the nested object does not match the shape
/// the type tag promises (a malformed payload, rejected as a client error).
pub fn classify_event(event: &Event) -> Result<WebhookEvent, String> {
    match event.event_type.as_str() {
        "checkout.session.completed" => {
            let session: CheckoutSession = parse_object(&event.data.object)
                .map_err(|e| format!("malformed checkout session object: {}", e))?;
            Ok(WebhookEvent::CheckoutCompleted(session))
        }
        "invoice.paid" => {
            let invoice: Invoice = parse_object(&event.data.object)
                .map_err(|e| format!("malformed invoice object: {}", e))?;
            Ok(WebhookEvent::InvoicePaid(invoice))
        }
        other => Ok(WebhookEvent::Ignored(other.to_string())),
    }
}

fn parse_object<T: serde::de::DeserializeOwned>(object: &Value) -> Result<T, serde_json::Error> {
    serde_json::from_value(object.clone())
}

/// Decide the disposition for a classified event.
pub fn evaluate_event(event: WebhookEvent, created: i64, config: &Config) -> Disposition {
    match event {
        WebhookEvent::CheckoutCompleted(session) => {
            if let Some(email) = session.customer_email() {
                if config.is_excluded_email(email) {
                    info!(session_id = %session.id, "checkout_donor_excluded");
                    return Disposition::Skip("excluded");
                }
            }
            Disposition::Forward(ForwardPayload::from_checkout(&session, created))
        }
        WebhookEvent::InvoicePaid(invoice) => {
            if config.disable_invoice_forwarding {
                info!(invoice_id = %invoice.id, "invoice_forwarding_disabled");
                return Disposition::Skip("invoices_disabled");
            }
            if let Some(email) = invoice.customer_email.as_deref() {
                if config.is_excluded_email(email) {
                    info!(invoice_id = %invoice.id, "invoice_donor_excluded");
                    return Disposition::Skip("excluded");
                }
            }
            Disposition::Forward(ForwardPayload::from_invoice(&invoice, created))
        }
        WebhookEvent::Ignored(event_type) => {
            info!(event_type = %event_type, "webhook_event_ignored");
            Disposition::Acknowledge
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checkout_event(email: &str) -> Event {
        let json = format!(
            r#"{{
                "id": "evt_1",
                "type": "checkout.session.completed",
                "created": 1700000000,
                "livemode": false,
                "data": {{"object": {{
                    "id": "cs_1",
                    "mode": "payment",
                    "payment_status": "paid",
                    "amount_total": 500,
                    "currency": "usd",
                    "customer_details": {{"email": "{}", "name": "Jane Doe"}}
                }}}}
            }}"#,
            email
        );
        serde_json::from_str(&json).unwrap()
    }

    fn test_config() -> Config {
        let mut config = Config::from_env();
        config.excluded_emails = vec!["board@example.org".to_string()];
        config.disable_invoice_forwarding = false;
        config
    }

    #[test]
    fn test_classify_checkout_completed() {
        let event = checkout_event("jane@example.com");
        match classify_event(&event).unwrap() {
            WebhookEvent::CheckoutCompleted(session) => assert_eq!(session.id, "cs_1"),
            other => panic!("unexpected classification: {:?}", other),
        }
    }

    #[test]
    fn test_classify_unknown_type_is_ignored() {
        let mut event = checkout_event("jane@example.com");
        event.event_type = "customer.subscription.deleted".to_string();
        match classify_event(&event).unwrap() {
            WebhookEvent::Ignored(t) => assert_eq!(t, "customer.subscription.deleted"),
            other => panic!("unexpected classification: {:?}", other),
        }
    }

    #[test]
    fn test_classify_malformed_object_is_error() {
        let json = r#"{
            "id": "evt_1",
            "type": "checkout.session.completed",
            "created": 1700000000,
            "data": {"object": {"no_id_here": true}}
        }"#;
        let event: Event = serde_json::from_str(json).unwrap();
        assert!(classify_event(&event).is_err());
    }

    #[test]
    fn test_evaluate_forwards_regular_donor() {
        let event = classify_event(&checkout_event("jane@example.com")).unwrap();
        match evaluate_event(event, 1700000000, &test_config()) {
            Disposition::Forward(payload) => {
                assert_eq!(payload.object_id, "cs_1");
                assert_eq!(payload.amount, 500);
            }
            other => panic!("unexpected disposition: {:?}", other),
        }
    }

    #[test]
    fn test_evaluate_skips_excluded_donor_case_insensitive() {
        let event = classify_event(&checkout_event("Board@Example.ORG")).unwrap();
        match evaluate_event(event, 1700000000, &test_config()) {
            Disposition::Skip(reason) => assert_eq!(reason, "excluded"),
            other => panic!("unexpected disposition: {:?}", other),
        }
    }

    #[test]
    fn test_evaluate_skips_invoices_when_disabled() {
        let json = r#"{
            "id": "evt_2",
            "type": "invoice.paid",
            "created": 1700000100,
            "data": {"object": {
                "id": "in_1",
                "status": "paid",
                "amount_paid": 2500,
                "currency": "usd",
                "customer_email": "jane@example.com"
            }}
        }"#;
        let event: Event = serde_json::from_str(json).unwrap();
        let classified = classify_event(&event).unwrap();

        let mut config = test_config();
        config.disable_invoice_forwarding = true;

        match evaluate_event(classified, event.created, &config) {
            Disposition::Skip(reason) => assert_eq!(reason, "invoices_disabled"),
            other => panic!("unexpected disposition: {:?}", other),
        }
    }

    #[test]
    fn test_evaluate_acknowledges_ignored_kinds() {
        let disposition = evaluate_event(
            WebhookEvent::Ignored("payout.created".to_string()),
            1700000000,
            &test_config(),
        );
        assert!(matches!(disposition, Disposition::Acknowledge));
    }
}
