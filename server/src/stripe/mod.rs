//! Minimal Stripe integration: typed projections of the API objects the
//! handlers read, webhook signature verification, and a thin REST client
//! over the shared HTTP connection pool.

pub mod client;
pub mod signature;
pub mod types;

pub use client::{CreateSessionParams, StripeClient, StripeError};
pub use signature::{verify_signature, SignatureError};
pub use types::{CheckoutSession, CustomerDetails, Event, Invoice};
