//! Serde projections of the Stripe API objects this service reads.
//!
//! Only the fields the handlers actually consume are modeled; everything
//! else in the provider's response is ignored on deserialization.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Outer event envelope delivered to the webhook endpoint.
///
/// Until the raw request body has passed signature verification, none of
/// these fields may be trusted.
#[derive(Debug, Clone, Deserialize)]
pub struct Event {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub created: i64,
    #[serde(default)]
    pub livemode: bool,
    pub data: EventData,
}

/// The `data` wrapper around the event's domain object.
#[derive(Debug, Clone, Deserialize)]
pub struct EventData {
    /// Left untyped until the event type tag selects a projection.
    pub object: serde_json::Value,
}

/// A checkout session, as embedded in `checkout.session.completed` events
/// and returned by the session-retrieval API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutSession {
    /// Session ID (cs_...)
    pub id: String,
    /// "payment" for one-time, "subscription" for recurring
    #[serde(default)]
    pub mode: Option<String>,
    /// e.g. "open", "complete", "expired"
    #[serde(default)]
    pub status: Option<String>,
    /// e.g. "paid", "unpaid", "no_payment_required"
    #[serde(default)]
    pub payment_status: Option<String>,
    /// Total amount in minor units
    #[serde(default)]
    pub amount_total: Option<i64>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub customer_details: Option<CustomerDetails>,
    /// Custom fields collected on the hosted page
    #[serde(default)]
    pub custom_fields: Vec<CustomField>,
    #[serde(default)]
    pub metadata: Option<HashMap<String, String>>,
    /// Payment Intent ID (pi_...) for one-time payments
    #[serde(default)]
    pub payment_intent: Option<String>,
    /// Subscription ID (sub_...) for recurring payments
    #[serde(default)]
    pub subscription: Option<String>,
    #[serde(default)]
    pub created: Option<i64>,
}

impl CheckoutSession {
    /// Donor email, if the provider collected one.
    pub fn customer_email(&self) -> Option<&str> {
        self.customer_details.as_ref()?.email.as_deref()
    }

    /// Donor name as entered on the hosted page.
    pub fn customer_name(&self) -> Option<&str> {
        self.customer_details.as_ref()?.name.as_deref()
    }

    /// Resolved display name: an explicit `full_name` custom field wins
    /// over the provider's default customer name.
    pub fn resolved_name(&self) -> Option<&str> {
        self.custom_field_value("full_name")
            .or_else(|| self.customer_name())
    }

    /// True when the session represents a recurring donation.
    pub fn is_recurring(&self) -> bool {
        self.mode.as_deref() == Some("subscription")
    }

    /// Metadata value lookup.
    pub fn metadata_value(&self, key: &str) -> Option<&str> {
        self.metadata.as_ref()?.get(key).map(String::as_str)
    }

    fn custom_field_value(&self, key: &str) -> Option<&str> {
        self.custom_fields
            .iter()
            .find(|f| f.key == key)
            .and_then(|f| f.text.as_ref())
            .and_then(|t| t.value.as_deref())
    }
}

/// Customer contact details attached to a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerDetails {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

/// One custom field collected on the hosted checkout page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomField {
    pub key: String,
    #[serde(default)]
    pub text: Option<CustomFieldText>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomFieldText {
    #[serde(default)]
    pub value: Option<String>,
}

/// An invoice, as embedded in `invoice.paid` events (subscription renewals).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invoice {
    /// Invoice ID (in_...)
    pub id: String,
    /// e.g. "paid", "open", "void"
    #[serde(default)]
    pub status: Option<String>,
    /// Amount actually collected, in minor units
    #[serde(default)]
    pub amount_paid: Option<i64>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub customer_email: Option<String>,
    #[serde(default)]
    pub customer_name: Option<String>,
    #[serde(default)]
    pub payment_intent: Option<String>,
    #[serde(default)]
    pub subscription: Option<String>,
    #[serde(default)]
    pub created: Option<i64>,
    #[serde(default)]
    pub metadata: Option<HashMap<String, String>>,
}

impl Invoice {
    pub fn is_paid(&self) -> bool {
        self.status.as_deref() == Some("paid")
    }

    pub fn metadata_value(&self, key: &str) -> Option<&str> {
        self.metadata.as_ref()?.get(key).map(String::as_str)
    }
}

/// Paginated list envelope returned by the events API.
#[derive(Debug, Clone, Deserialize)]
pub struct EventList {
    pub data: Vec<Event>,
    #[serde(default)]
    pub has_more: bool,
}
