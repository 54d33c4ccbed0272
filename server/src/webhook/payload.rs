//! Minimized, anonymized projection of a verified webhook event.
//!
//! The forwarded payload never carries the donor's raw email; only a
//! deterministic one-way hash, a first-name-level display string, and a
//! capped, sanitized note survive the projection.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::display::{derive_display_name, donation_sentence, format_amount, sanitize_note};
use crate::stripe::types::{CheckoutSession, Invoice};

/// Payload forwarded to the downstream automation endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForwardPayload {
    /// Event type tag ("checkout.session.completed" / "invoice.paid")
    pub event_type: String,
    /// Session or invoice identifier
    pub object_id: String,
    /// Event creation time, epoch seconds
    pub created: i64,
    /// Amount in minor units
    pub amount: i64,
    /// Uppercase ISO currency code
    pub currency: String,
    /// True for subscriptions and their renewals
    pub recurring: bool,
    /// SHA-256 hex of the lowercased donor email; never the raw address
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_hash: Option<String>,
    /// Capped, control-char-stripped donor note
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    /// Ready-to-render sentence for the downstream consumer
    pub display_text: String,
}

impl ForwardPayload {
    /// Build from a completed checkout session.
    pub fn from_checkout(session: &CheckoutSession, created: i64) -> Self {
        let amount = session.amount_total.unwrap_or(0);
        let currency = session
            .currency
            .as_deref()
            .unwrap_or("usd")
            .to_uppercase();
        let recurring = session.is_recurring();

        let name = derive_display_name(session.resolved_name(), session.customer_email());
        let display_text =
            donation_sentence(&name, &format_amount(amount, &currency), recurring);

        ForwardPayload {
            event_type: "checkout.session.completed".to_string(),
            object_id: session.id.clone(),
            created,
            amount,
            currency,
            recurring,
            email_hash: session.customer_email().map(hash_email),
            note: session
                .metadata_value("note")
                .map(sanitize_note)
                .filter(|n| !n.is_empty()),
            display_text,
        }
    }

    /// Build from a paid invoice (subscription renewal).
    pub fn from_invoice(invoice: &Invoice, created: i64) -> Self {
        let amount = invoice.amount_paid.unwrap_or(0);
        let currency = invoice
            .currency
            .as_deref()
            .unwrap_or("usd")
            .to_uppercase();

        let name = derive_display_name(
            invoice.customer_name.as_deref(),
            invoice.customer_email.as_deref(),
        );
        let display_text = donation_sentence(&name, &format_amount(amount, &currency), true);

        ForwardPayload {
            event_type: "invoice.paid".to_string(),
            object_id: invoice.id.clone(),
            created,
            amount,
            currency,
            recurring: true,
            email_hash: invoice.customer_email.as_deref().map(hash_email),
            note: invoice
                .metadata_value("note")
                .map(sanitize_note)
                .filter(|n| !n.is_empty()),
            display_text,
        }
    }
}

/// Deterministic one-way hash of an email address.
fn hash_email(email: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(email.trim().to_lowercase().as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(json: &str) -> CheckoutSession {
        serde_json::from_str(json).unwrap()
    }

    fn one_time_session() -> CheckoutSession {
        session(
            r#"{
                "id": "cs_1",
                "mode": "payment",
                "payment_status": "paid",
                "amount_total": 500,
                "currency": "usd",
                "customer_details": {"email": "jane.doe@example.com", "name": "Jane Doe"},
                "metadata": {"note": "for the food bank"}
            }"#,
        )
    }

    #[test]
    fn test_from_checkout_one_time() {
        let payload = ForwardPayload::from_checkout(&one_time_session(), 1700000000);

        assert_eq!(payload.event_type, "checkout.session.completed");
        assert_eq!(payload.object_id, "cs_1");
        assert_eq!(payload.amount, 500);
        assert_eq!(payload.currency, "USD");
        assert!(!payload.recurring);
        assert_eq!(payload.display_text, "Jane D. just gave $5.00");
        assert_eq!(payload.note.as_deref(), Some("for the food bank"));
    }

    #[test]
    fn test_from_checkout_subscription_sentence() {
        let s = session(
            r#"{
                "id": "cs_2",
                "mode": "subscription",
                "amount_total": 2500,
                "currency": "usd",
                "customer_details": {"email": "bob@example.com", "name": "Bob Smith"}
            }"#,
        );
        let payload = ForwardPayload::from_checkout(&s, 1700000000);

        assert!(payload.recurring);
        assert_eq!(payload.display_text, "Bob S. became a Partner ($25.00/mo)");
    }

    #[test]
    fn test_email_hash_is_deterministic_and_one_way() {
        let payload = ForwardPayload::from_checkout(&one_time_session(), 1700000000);
        let hash = payload.email_hash.unwrap();

        // Deterministic over the normalized address
        assert_eq!(hash, hash_email("Jane.Doe@Example.COM "));
        // Never the raw address
        assert!(!hash.contains('@'));
        assert_eq!(hash.len(), 64);
    }

    #[test]
    fn test_serialized_payload_has_no_raw_email() {
        let payload = ForwardPayload::from_checkout(&one_time_session(), 1700000000);
        let json = serde_json::to_string(&payload).unwrap();

        assert!(!json.contains("jane.doe@example.com"));
        assert!(json.contains("email_hash"));
    }

    #[test]
    fn test_note_is_sanitized_and_capped() {
        let mut s = one_time_session();
        s.metadata
            .as_mut()
            .unwrap()
            .insert("note".to_string(), format!("evil\u{0}\n{}", "x".repeat(300)));

        let payload = ForwardPayload::from_checkout(&s, 1700000000);
        let note = payload.note.unwrap();

        assert!(note.starts_with("evil"));
        assert!(!note.contains('\u{0}'));
        assert!(note.chars().count() <= crate::display::NOTE_MAX_CHARS);
    }

    #[test]
    fn test_from_invoice() {
        let invoice: Invoice = serde_json::from_str(
            r#"{
                "id": "in_1",
                "status": "paid",
                "amount_paid": 1000,
                "currency": "usd",
                "customer_email": "jane@example.com",
                "customer_name": "Jane Doe"
            }"#,
        )
        .unwrap();

        let payload = ForwardPayload::from_invoice(&invoice, 1700000100);

        assert_eq!(payload.event_type, "invoice.paid");
        assert!(payload.recurring);
        assert_eq!(payload.display_text, "Jane D. became a Partner ($10.00/mo)");
    }

    #[test]
    fn test_missing_email_omits_hash() {
        let s = session(r#"{"id": "cs_3", "mode": "payment", "amount_total": 100, "currency": "usd"}"#);
        let payload = ForwardPayload::from_checkout(&s, 1700000000);

        assert!(payload.email_hash.is_none());
        let json = serde_json::to_string(&payload).unwrap();
        assert!(!json.contains("email_hash"));
    }
}
