//! Casino Roulette - betting ledger and spin scheduler
//!
//! European roulette for chat bots: players place bets through text
//! commands, a background driver spins the wheel once per two-minute window,
//! and every balance change is committed atomically with the bet or payout
//! it belongs to.

pub mod casino;
pub mod casino_store;
pub mod config;
pub mod delivery;
pub mod driver;
pub mod errors;
pub mod games;
pub mod ledger;
pub mod metrics;
pub mod money;
pub mod scheduler;
pub mod storage;

pub use casino::Casino;
pub use config::{CasinoConfig, ConfigLoader};
pub use delivery::{ChannelSink, LogSink, MessageSink, OutboundMessage};
pub use driver::CasinoDriver;
pub use errors::{BetError, CasinoError, CasinoResult, StorageError};
pub use games::{Bet, BetDescriptor, FixedOutcome, RandomOutcome, SpinReport, SpinResult};
pub use ledger::AccountLedger;
pub use metrics::{CasinoMetrics, MetricsSnapshot};
pub use money::{format_money, parse_money};
pub use scheduler::{BettingWindowScheduler, Clock, ManualClock, SystemClock, WindowState};
pub use storage::{KvStore, MemoryStorage, RocksStorage};
