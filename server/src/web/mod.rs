//! Web server module: the HTTP surface between the donation forms, the
//! payment provider's webhooks, and the public feed widget.

pub mod handlers;

pub use handlers::{
    create_checkout, donations_feed, get_session, health, stripe_webhook, webhook_probe,
    AppState, CheckoutResponse, CreateDonationRequest, FeedResponse, HealthResponse,
    SessionView, WebhookAck,
};
