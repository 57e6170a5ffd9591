//! Shared domain types, configuration and collaborator interfaces for the
//! options risk desk.

pub mod alert;
pub mod config;
pub mod config_loader;
pub mod config_watcher;
pub mod error;
pub mod greeks;
pub mod market;
pub mod order;
pub mod regime;
pub mod trade;
pub mod traits;

pub use alert::{AlertPayload, Urgency};
pub use config::{
    AppConfig, BreachConfig, DatabaseConfig, HedgeInstrument, HedgingConfig, ProposerConfig,
    RegimeLimits, RegimeThresholds, RiskLimitMatrix, ScalingPolicy, ScoringWeights,
    TimeoutConfig, VixBand, BENCHMARK_FAMILIES,
};
pub use config_loader::ConfigLoader;
pub use config_watcher::RiskLimitWatcher;
pub use error::{with_timeout, Result, RiskError};
pub use greeks::{
    GreekChange, InstrumentKind, OptionRight, PortfolioGreeks, Position, PositionGreeks,
    ThetaVegaBand,
};
pub use market::{AccountSnapshot, AccountSummary, MarketContext};
pub use order::{
    BrokerAck, BrokerOrderStatus, HumanConfirmation, LegAction, Order, OrderLeg, OrderStatus,
    OrderType, SimulationResult, SubmissionRoute,
};
pub use regime::Regime;
pub use trade::{
    AiTradeSuggestion, BreachEvent, BreachMetric, BreachSeverity, CandidateTrade,
    HedgeStrategy, ProposalStatus, ProposedTrade, TradeImpact,
};
pub use traits::{
    AdvisoryProvider, AdvisorySnapshot, GreeksFeed, MarketContextFeed, Notifier, OrderGateway,
    WhatIfSimulator,
};
