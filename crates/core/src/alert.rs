//! Structured alert payload handed to notification channels.

use serde::{Deserialize, Serialize};

/// Alert urgency, rendered by channels as a colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Green,
    Yellow,
    Red,
    Info,
}

/// Channel-agnostic alert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertPayload {
    pub title: String,
    pub body: String,
    pub urgency: Urgency,
    pub suggestions: Vec<String>,
}
