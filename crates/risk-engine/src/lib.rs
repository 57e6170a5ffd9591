//! Deterministic options risk engine.
//!
//! Runs as a long-lived proposer that:
//! - Classifies the market regime from VIX, term structure and macro inputs
//! - Resolves the regime limit matrix into absolute limits for the account
//! - Detects delta, vega, theta and gamma breaches
//! - Generates, scores and persists hedge proposals for human review
//!
//! Orders move through a single state machine. Nothing in this crate
//! transmits an order without a human confirmation bound to it.

pub mod advisory;
pub mod alerts;
pub mod breach;
pub mod candidates;
pub mod flatten;
pub mod lifecycle;
pub mod limits;
pub mod regime;
pub mod scoring;
pub mod service;
pub mod store;

pub use advisory::{fetch_advisory, parse_response, AdvisoryResponse, MAX_SUGGESTIONS};
pub use alerts::{build_alert, should_notify, urgency};
pub use breach::{BreachDetector, CheckContext};
pub use candidates::{CandidateGenerator, GenerationInput};
pub use flatten::{build_flatten_batch, execute_flatten, FlattenConfirmation, FlattenResult};
pub use lifecycle::{FillOutcome, OrderWorkflow, SubmissionReceipt};
pub use limits::{ResolvedLimits, RiskLimitResolver};
pub use regime::RegimeClassifier;
pub use scoring::{rank, top_n, EfficiencyScorer};
pub use service::{Collaborators, CycleOutcome, CycleReport, CycleStage, ProposerOrchestrator};
pub use store::{JournalEntry, ProposalStore, SqliteStore, MAX_BATCH};
