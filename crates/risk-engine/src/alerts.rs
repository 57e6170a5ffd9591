//! Alert construction for proposer cycles.

use rust_decimal::Decimal;

use riskdesk_core::{AlertPayload, BreachEvent, BreachSeverity, ProposedTrade, Regime, Urgency};

/// Whether a cycle is worth an outbound alert.
///
/// True in crisis mode, or when the best persisted proposal scores strictly
/// above `threshold`.
#[must_use]
pub fn should_notify(regime: Regime, proposals: &[ProposedTrade], threshold: Decimal) -> bool {
    if regime.is_crisis() {
        return true;
    }
    proposals
        .iter()
        .filter_map(|p| p.candidate.score)
        .max()
        .is_some_and(|top| top > threshold)
}

/// Alert colour for a cycle.
///
/// Within limits the colour is green, except in the high-volatility regime
/// where it is an informational heads-up.
#[must_use]
pub fn urgency(regime: Regime, breaches: &[BreachEvent]) -> Urgency {
    if regime.is_crisis()
        || breaches
            .iter()
            .any(|b| b.severity == BreachSeverity::Critical)
    {
        Urgency::Red
    } else if !breaches.is_empty() {
        Urgency::Yellow
    } else if regime == Regime::HighVolatility {
        Urgency::Info
    } else {
        Urgency::Green
    }
}

/// Builds the alert for a cycle with breaches or a crisis regime.
#[must_use]
pub fn build_alert(
    account_id: &str,
    regime: Regime,
    breaches: &[BreachEvent],
    proposals: &[ProposedTrade],
    commentary: Option<&str>,
) -> AlertPayload {
    let title = if breaches.is_empty() {
        format!("{account_id}: {regime}")
    } else {
        format!("{account_id}: {} risk breach(es) in {regime}", breaches.len())
    };

    let mut body: Vec<String> = breaches
        .iter()
        .map(|b| {
            format!(
                "{} {:?}: {} vs limit {} (VIX {})",
                b.metric,
                b.severity,
                b.current.round_dp(2),
                b.limit.round_dp(2),
                b.vix.round_dp(2),
            )
        })
        .collect();
    if regime.is_crisis() {
        body.push("Crisis regime: delta and vega headroom collapsed, de-risk".to_string());
    }
    if let Some(text) = commentary.filter(|t| !t.is_empty()) {
        body.push(text.to_string());
    }

    let suggestions = proposals
        .iter()
        .map(|p| {
            let legs: Vec<String> = p.candidate.legs.iter().map(|l| l.describe()).collect();
            format!(
                "#{} [{}] {} (score {})",
                p.rank,
                p.id,
                legs.join(" / "),
                p.candidate
                    .score
                    .map_or_else(|| "n/a".to_string(), |s| s.round_dp(4).to_string()),
            )
        })
        .collect();

    AlertPayload {
        title,
        body: body.join("\n"),
        urgency: urgency(regime, breaches),
        suggestions,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use riskdesk_core::{
        BreachMetric, CandidateTrade, HedgeStrategy, InstrumentKind, LegAction, OrderLeg,
        ProposalStatus,
    };
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn breach(severity: BreachSeverity) -> BreachEvent {
        BreachEvent {
            account_id: "U1".to_string(),
            metric: BreachMetric::Vega,
            current: dec!(-8000),
            limit: dec!(-4800),
            severity,
            regime: Regime::NeutralVolatility,
            vix: dec!(18),
            margin_used: dec!(0),
            detected_at: Utc::now(),
        }
    }

    fn proposal(score: Option<Decimal>) -> ProposedTrade {
        ProposedTrade {
            id: 7,
            account_id: "U1".to_string(),
            batch_id: Uuid::new_v4(),
            rank: 1,
            candidate: CandidateTrade {
                benchmark: "MES".to_string(),
                legs: vec![OrderLeg::outright(
                    "MES",
                    InstrumentKind::Future,
                    LegAction::Sell,
                    2,
                )],
                strategy: HedgeStrategy::FutureHedge,
                target: BreachMetric::Delta,
                breach: breach(BreachSeverity::Warning),
                impact: None,
                score,
                justification: String::new(),
            },
            status: ProposalStatus::Pending,
            created_at: Utc::now(),
            decided_at: None,
        }
    }

    #[test]
    fn notifies_above_threshold_or_in_crisis() {
        let threshold = dec!(0.5);
        assert!(!should_notify(Regime::NeutralVolatility, &[], threshold));
        assert!(!should_notify(
            Regime::NeutralVolatility,
            &[proposal(Some(dec!(0.5)))],
            threshold
        ));
        assert!(should_notify(
            Regime::NeutralVolatility,
            &[proposal(Some(dec!(0.51)))],
            threshold
        ));
        assert!(should_notify(Regime::CrisisMode, &[], threshold));
    }

    #[test]
    fn urgency_levels() {
        assert_eq!(urgency(Regime::LowVolatility, &[]), Urgency::Green);
        assert_eq!(urgency(Regime::NeutralVolatility, &[]), Urgency::Green);
        assert_eq!(urgency(Regime::HighVolatility, &[]), Urgency::Info);
        assert_eq!(
            urgency(Regime::HighVolatility, &[breach(BreachSeverity::Warning)]),
            Urgency::Yellow
        );
        assert_eq!(
            urgency(Regime::HighVolatility, &[breach(BreachSeverity::Critical)]),
            Urgency::Red
        );
        assert_eq!(urgency(Regime::CrisisMode, &[]), Urgency::Red);
    }

    #[test]
    fn healthy_alert_is_green() {
        let alert = build_alert("U1", Regime::LowVolatility, &[], &[], None);
        assert_eq!(alert.urgency, Urgency::Green);
        assert_eq!(alert.title, "U1: low_volatility");
        assert!(alert.suggestions.is_empty());
    }

    #[test]
    fn alert_lists_proposals_as_suggestions() {
        let alert = build_alert(
            "U1",
            Regime::NeutralVolatility,
            &[breach(BreachSeverity::Warning)],
            &[proposal(Some(dec!(0.61234)))],
            Some("Vega is stretched."),
        );
        assert_eq!(alert.urgency, Urgency::Yellow);
        assert!(alert.title.contains("1 risk breach"));
        assert!(alert.body.contains("vega"));
        assert!(alert.body.contains("Vega is stretched."));
        assert_eq!(alert.suggestions, vec!["#1 [7] SELL 2 MES (score 0.6123)".to_string()]);
    }
}
