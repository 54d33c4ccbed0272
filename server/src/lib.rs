//! Givewire - donation checkout, webhook relay and public feed.
//!
//! This library backs the `givewire-web` binary, a thin HTTP layer between
//! donation forms and the payment provider:
//!
//! ```text
//! Donation form → /checkout → hosted payment page
//! Provider webhook → /webhooks/stripe → verify → minimize → forward
//! Thank-you page → /session
//! Ticker widget → /feed
//! ```

pub mod config;
pub mod display;
pub mod error;
pub mod feed;
pub mod stripe;
pub mod web;
pub mod webhook;

// Re-export commonly used types
pub use config::Config;
pub use error::ApiError;
pub use stripe::StripeClient;
pub use web::AppState;
pub use webhook::{ForwardPayload, Forwarder};
