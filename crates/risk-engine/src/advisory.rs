//! Validation of advisory commentary responses.
//!
//! The advisory collaborator is untrusted. Its response must parse into the
//! fixed schema below; anything else yields commentary only and zero
//! suggestions. Suggestions never reach the order workflow without a human
//! turning one into an order.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use riskdesk_core::order::validate_legs;
use riskdesk_core::{
    with_timeout, AdvisoryProvider, AdvisorySnapshot, AiTradeSuggestion, OrderLeg,
};

/// Most suggestions accepted from one response.
pub const MAX_SUGGESTIONS: usize = 3;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawResponse {
    #[serde(default)]
    commentary: String,
    #[serde(default)]
    suggestions: Vec<RawSuggestion>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawSuggestion {
    legs: Vec<OrderLeg>,
    projected_delta_change: Decimal,
    projected_theta_cost: Decimal,
    rationale: String,
}

/// Commentary plus validated suggestions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdvisoryResponse {
    pub commentary: String,
    pub suggestions: Vec<AiTradeSuggestion>,
}

/// Parses a raw advisory response.
///
/// Accepts a bare JSON object or one embedded in surrounding prose. Any
/// shape mismatch, including a single malformed suggestion or more than
/// [`MAX_SUGGESTIONS`], drops every suggestion.
#[must_use]
pub fn parse_response(raw: &str) -> AdvisoryResponse {
    let Some(json) = extract_object(raw) else {
        return commentary_only(raw, "no JSON object in advisory response");
    };
    let parsed: RawResponse = match serde_json::from_str(json) {
        Ok(parsed) => parsed,
        Err(e) => return commentary_only(raw, &format!("advisory schema mismatch: {e}")),
    };

    if parsed.suggestions.len() > MAX_SUGGESTIONS {
        tracing::warn!(
            count = parsed.suggestions.len(),
            "Advisory returned too many suggestions, ignoring all"
        );
        return AdvisoryResponse {
            commentary: parsed.commentary,
            suggestions: Vec::new(),
        };
    }

    let mut suggestions = Vec::with_capacity(parsed.suggestions.len());
    for raw_suggestion in parsed.suggestions {
        if let Err(e) = validate_legs(&raw_suggestion.legs) {
            tracing::warn!(error = %e, "Advisory suggestion has invalid legs, ignoring all");
            return AdvisoryResponse {
                commentary: parsed.commentary,
                suggestions: Vec::new(),
            };
        }
        suggestions.push(AiTradeSuggestion {
            id: Uuid::new_v4(),
            legs: raw_suggestion.legs,
            projected_delta_change: raw_suggestion.projected_delta_change,
            projected_theta_cost: raw_suggestion.projected_theta_cost,
            rationale: raw_suggestion.rationale,
        });
    }

    AdvisoryResponse {
        commentary: parsed.commentary,
        suggestions,
    }
}

/// Asks the provider for commentary. Failures and timeouts yield an empty response.
pub async fn fetch_advisory(
    provider: &dyn AdvisoryProvider,
    snapshot: &AdvisorySnapshot,
    timeout: std::time::Duration,
) -> AdvisoryResponse {
    match with_timeout("advisory", timeout, provider.commentary(snapshot)).await {
        Ok(raw) => parse_response(&raw),
        Err(e) => {
            tracing::warn!(error = %e, "Advisory commentary unavailable");
            AdvisoryResponse::default()
        }
    }
}

fn extract_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (end > start).then(|| &raw[start..=end])
}

fn commentary_only(raw: &str, reason: &str) -> AdvisoryResponse {
    tracing::warn!(reason, "Advisory response not usable, zero suggestions");
    AdvisoryResponse {
        commentary: raw.trim().to_string(),
        suggestions: Vec::new(),
    }
}
