//! CLI commands for the options risk desk.

pub mod flatten;
pub mod order;
pub mod proposals;
pub mod proposer;

pub use flatten::{run_flatten, FlattenArgs};
pub use order::{run_order, OrderCommand};
pub use proposals::{run_proposals, ProposalsCommand};
pub use proposer::{run_check, run_proposer};
