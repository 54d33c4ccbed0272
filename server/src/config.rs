//! Configuration module for environment variable parsing.
//!
//! All configuration is read once at process start and shared read-only
//! with every request handler.

use std::env;
use tracing::warn;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Port for the web server to listen on
    pub port: u16,

    /// Stripe API key for outbound calls (session creation, retrieval, events)
    pub stripe_secret_key: String,

    /// Stripe webhook signing secret; absent means degraded, unverified mode
    pub webhook_secret: Option<String>,

    /// Maximum age in seconds for webhook signature timestamps
    pub signature_max_age: u64,

    /// Optional downstream automation endpoint for forwarded payloads
    pub forward_url: Option<String>,

    /// Optional HMAC key for signing forwarded payloads
    pub forward_secret: Option<String>,

    /// Donor emails suppressed from forwarding and the public feed (lowercase)
    pub excluded_emails: Vec<String>,

    /// Disable invoice-paid forwarding entirely
    pub disable_invoice_forwarding: bool,

    /// Staging-only override that skips the feed consent check
    pub feed_consent_bypass: bool,

    /// CORS origin allow-list for the browser-facing endpoints
    pub allowed_origins: Vec<String>,

    /// Currencies accepted by the checkout-creation endpoint (uppercase)
    pub allowed_currencies: Vec<String>,

    /// Hosted-payment-page redirect target after a successful checkout
    pub success_url: String,

    /// Hosted-payment-page redirect target after a cancelled checkout
    pub cancel_url: String,

    /// HTTP request timeout in milliseconds for Stripe API calls
    pub request_timeout_ms: u64,

    /// Timeout in milliseconds for the fire-and-forget forwarding call
    pub forward_timeout_ms: u64,

    /// Advisory Cache-Control max-age for feed responses
    pub feed_cache_seconds: u64,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Config {
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(8080),

            stripe_secret_key: env::var("STRIPE_SECRET_KEY").unwrap_or_default(),

            webhook_secret: non_empty(env::var("STRIPE_WEBHOOK_SECRET").ok()),

            signature_max_age: env::var("WEBHOOK_SIGNATURE_MAX_AGE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(300), // 5 minutes default

            forward_url: parse_forward_url(env::var("FORWARD_URL").ok()),

            forward_secret: non_empty(env::var("FORWARD_SECRET").ok()),

            excluded_emails: parse_csv("EXCLUDED_EMAILS")
                .unwrap_or_default()
                .into_iter()
                .map(|e| e.to_lowercase())
                .collect(),

            disable_invoice_forwarding: parse_flag("DISABLE_INVOICE_FORWARDING"),

            feed_consent_bypass: parse_flag("FEED_CONSENT_BYPASS"),

            allowed_origins: parse_csv("ALLOWED_ORIGINS")
                .unwrap_or_else(|| vec!["https://example.org".to_string()]),

            allowed_currencies: parse_csv("ALLOWED_CURRENCIES")
                .unwrap_or_else(|| vec!["USD".to_string()])
                .into_iter()
                .map(|c| c.to_uppercase())
                .collect(),

            success_url: env::var("SUCCESS_URL")
                .unwrap_or_else(|_| "https://example.org/thank-you".to_string()),

            cancel_url: env::var("CANCEL_URL")
                .unwrap_or_else(|_| "https://example.org/give".to_string()),

            request_timeout_ms: env::var("REQUEST_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(8000),

            forward_timeout_ms: env::var("FORWARD_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5000),

            feed_cache_seconds: env::var("FEED_CACHE_SECONDS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(30),
        }
    }

    /// Case-insensitive membership test against the excluded-email list.
    pub fn is_excluded_email(&self, email: &str) -> bool {
        let email = email.trim().to_lowercase();
        self.excluded_emails.iter().any(|e| e == &email)
    }

    /// Case-insensitive membership test against the currency allow-list.
    pub fn is_allowed_currency(&self, currency: &str) -> bool {
        let currency = currency.trim().to_uppercase();
        self.allowed_currencies.iter().any(|c| c == &currency)
    }
}

/// Treat empty or whitespace-only values as unset.
fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Parse and validate the forwarding URL, dropping unusable values.
fn parse_forward_url(value: Option<String>) -> Option<String> {
    let raw = non_empty(value)?;
    match url::Url::parse(&raw) {
        Ok(_) => Some(raw),
        Err(e) => {
            warn!(url = %raw, error = %e, "Invalid FORWARD_URL, forwarding disabled");
            None
        }
    }
}

/// Parse a comma-separated list of strings.
fn parse_csv(name: &str) -> Option<Vec<String>> {
    env::var(name).ok().map(|raw| {
        raw.split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    })
}

/// Parse a boolean feature flag ("1", "true", "yes" enable it).
fn parse_flag(name: &str) -> bool {
    env::var(name)
        .map(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_empty() {
        assert_eq!(non_empty(None), None);
        assert_eq!(non_empty(Some("".to_string())), None);
        assert_eq!(non_empty(Some("   ".to_string())), None);
        assert_eq!(non_empty(Some("whsec_x".to_string())), Some("whsec_x".to_string()));
    }

    #[test]
    fn test_parse_csv() {
        env::set_var("TEST_CSV_CONFIG", "foo, bar, baz");
        let result = parse_csv("TEST_CSV_CONFIG");
        assert_eq!(result, Some(vec!["foo".to_string(), "bar".to_string(), "baz".to_string()]));
        env::remove_var("TEST_CSV_CONFIG");
    }

    #[test]
    fn test_parse_csv_missing() {
        assert_eq!(parse_csv("NONEXISTENT_CSV_VAR"), None);
    }

    #[test]
    fn test_parse_flag() {
        env::set_var("TEST_FLAG_ON", "true");
        assert!(parse_flag("TEST_FLAG_ON"));
        env::set_var("TEST_FLAG_ON", "YES");
        assert!(parse_flag("TEST_FLAG_ON"));
        env::set_var("TEST_FLAG_ON", "0");
        assert!(!parse_flag("TEST_FLAG_ON"));
        env::remove_var("TEST_FLAG_ON");
        assert!(!parse_flag("TEST_FLAG_ON"));
    }

    #[test]
    fn test_parse_forward_url_rejects_garbage() {
        assert_eq!(parse_forward_url(Some("not a url".to_string())), None);
        assert_eq!(
            parse_forward_url(Some("https://hooks.example.com/donations".to_string())),
            Some("https://hooks.example.com/donations".to_string())
        );
    }

    #[test]
    fn test_is_excluded_email_case_insensitive() {
        let mut config = Config::from_env();
        config.excluded_emails = vec!["board@example.org".to_string()];

        assert!(config.is_excluded_email("board@example.org"));
        assert!(config.is_excluded_email("Board@Example.ORG"));
        assert!(config.is_excluded_email("  board@example.org  "));
        assert!(!config.is_excluded_email("donor@example.org"));
    }

    #[test]
    fn test_is_allowed_currency() {
        let mut config = Config::from_env();
        config.allowed_currencies = vec!["USD".to_string()];

        assert!(config.is_allowed_currency("usd"));
        assert!(config.is_allowed_currency("USD"));
        assert!(!config.is_allowed_currency("EUR"));
    }
}
