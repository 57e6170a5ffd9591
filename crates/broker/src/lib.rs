//! Broker-side collaborators for the options risk desk.
//!
//! Provides a deterministic paper broker backed by a JSON state file, a
//! bounded retry wrapper for idempotent collaborator reads, and alert
//! delivery over logs or a webhook.

pub mod notifier;
pub mod paper;
pub mod retry;
pub mod state;

pub use notifier::{LogNotifier, WebhookNotifier};
pub use paper::PaperBroker;
pub use retry::{retry_bounded, RetryPolicy, Retrying};
pub use state::{FillMode, LinearInstrument, OptionModel, PaperMarket, PaperState};
