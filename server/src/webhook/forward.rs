//! Fire-and-forget delivery of forwarded payloads.
//!
//! The webhook's own HTTP response must not wait on (or fail with) the
//! downstream call: the upstream provider only needs a fast acknowledgement
//! to stop retrying. Delivery runs in a spawned task with a bounded timeout;
//! failures are logged and dropped.

use std::time::Duration;

use hmac::{Hmac, Mac};
use reqwest::Client;
use sha2::Sha256;
use tracing::{error, info};

use crate::config::Config;
use crate::webhook::payload::ForwardPayload;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the hex HMAC of the forwarded body.
pub const SIGNATURE_HEADER: &str = "X-Givewire-Signature";

/// Downstream forwarding target and its signing key.
#[derive(Debug, Clone)]
pub struct Forwarder {
    http: Client,
    url: Option<String>,
    secret: Option<String>,
    timeout: Duration,
}

impl Forwarder {
    pub fn from_config(http: Client, config: &Config) -> Self {
        Self {
            http,
            url: config.forward_url.clone(),
            secret: config.forward_secret.clone(),
            timeout: Duration::from_millis(config.forward_timeout_ms),
        }
    }

    /// Whether a forwarding target is configured at all.
    pub fn is_configured(&self) -> bool {
        self.url.is_some()
    }

    /// Serialize, sign and POST the payload in a background task.
    ///
    /// Returns immediately. The signature is computed over the exact bytes
    /// that go on the wire, so the receiver can verify byte-for-byte.
    pub fn dispatch(&self, payload: ForwardPayload) {
        let Some(url) = self.url.clone() else {
            return;
        };

        let body = match serde_json::to_vec(&payload) {
            Ok(body) => body,
            Err(e) => {
                error!(error = %e, object_id = %payload.object_id, "forward_serialize_failed");
                return;
            }
        };

        let signature = self
            .secret
            .as_deref()
            .map(|secret| sign_payload(secret.as_bytes(), &body));

        let http = self.http.clone();
        let timeout = self.timeout;
        let object_id = payload.object_id.clone();

        tokio::spawn(async move {
            let mut request = http
                .post(&url)
                .timeout(timeout)
                .header("Content-Type", "application/json")
                .body(body);

            if let Some(signature) = signature {
                request = request.header(SIGNATURE_HEADER, signature);
            }

            match request.send().await {
                Ok(response) if response.status().is_success() => {
                    info!(
                        object_id = %object_id,
                        status = response.status().as_u16(),
                        "forward_delivered"
                    );
                }
                Ok(response) => {
                    error!(
                        object_id = %object_id,
                        status = response.status().as_u16(),
                        "forward_rejected"
                    );
                }
                Err(e) => {
                    if e.is_timeout() {
                        error!(object_id = %object_id, error = %e, "forward_timeout");
                    } else {
                        error!(object_id = %object_id, error = %e, "forward_request_failed");
                    }
                }
            }
        });
    }
}

/// HMAC-SHA256 hex digest over the serialized payload bytes.
pub fn sign_payload(secret: &[u8], payload: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret)
        .expect("HMAC accepts keys of any length");
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}
