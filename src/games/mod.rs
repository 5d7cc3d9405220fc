pub mod bet_store;
pub mod board;
pub mod evaluator;
pub mod spin;
pub mod types;

pub use bet_store::BetStore;
pub use board::{BoardTopology, Color};
pub use evaluator::evaluate;
pub use spin::{FixedOutcome, OutcomeSource, Payout, RandomOutcome, SpinEngine, SpinReport};
pub use types::*;
