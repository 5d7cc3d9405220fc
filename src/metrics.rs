//! Casino activity counters

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::{Duration, Instant};

pub struct CasinoMetrics {
    start_time: Instant,
    bets_placed: AtomicU64,
    bets_rejected: AtomicU64,
    bets_cancelled: AtomicU64,
    spins: AtomicU64,
    total_wagered: AtomicI64,
    total_paid_out: AtomicI64,
    stipends_paid: AtomicU64,
}

/// Point-in-time copy of the counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub bets_placed: u64,
    pub bets_rejected: u64,
    pub bets_cancelled: u64,
    pub spins: u64,
    pub total_wagered: i64,
    pub total_paid_out: i64,
    pub stipends_paid: u64,
}

impl MetricsSnapshot {
    /// Wagered minus paid out; negative when players are ahead
    pub fn house_result(&self) -> i64 {
        self.total_wagered - self.total_paid_out
    }
}

impl CasinoMetrics {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            bets_placed: AtomicU64::new(0),
            bets_rejected: AtomicU64::new(0),
            bets_cancelled: AtomicU64::new(0),
            spins: AtomicU64::new(0),
            total_wagered: AtomicI64::new(0),
            total_paid_out: AtomicI64::new(0),
            stipends_paid: AtomicU64::new(0),
        }
    }

    pub fn record_bet(&self, stake_cents: i64) {
        self.bets_placed.fetch_add(1, Ordering::SeqCst);
        self.total_wagered.fetch_add(stake_cents, Ordering::SeqCst);
    }

    pub fn record_rejection(&self) {
        self.bets_rejected.fetch_add(1, Ordering::SeqCst);
    }

    /// A cancelled stake no longer counts as wagered.
    pub fn record_cancellation(&self, stake_cents: i64) {
        self.bets_cancelled.fetch_add(1, Ordering::SeqCst);
        self.total_wagered.fetch_sub(stake_cents, Ordering::SeqCst);
    }

    pub fn record_spin(&self, paid_out_cents: i64) {
        self.spins.fetch_add(1, Ordering::SeqCst);
        self.total_paid_out
            .fetch_add(paid_out_cents, Ordering::SeqCst);
    }

    pub fn record_stipend(&self, accounts: usize) {
        self.stipends_paid
            .fetch_add(accounts as u64, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            bets_placed: self.bets_placed.load(Ordering::SeqCst),
            bets_rejected: self.bets_rejected.load(Ordering::SeqCst),
            bets_cancelled: self.bets_cancelled.load(Ordering::SeqCst),
            spins: self.spins.load(Ordering::SeqCst),
            total_wagered: self.total_wagered.load(Ordering::SeqCst),
            total_paid_out: self.total_paid_out.load(Ordering::SeqCst),
            stipends_paid: self.stipends_paid.load(Ordering::SeqCst),
        }
    }

    pub fn total_runtime(&self) -> Duration {
        self.start_time.elapsed()
    }
}

impl Default for CasinoMetrics {
    fn default() -> Self {
        Self::new()
    }
}
