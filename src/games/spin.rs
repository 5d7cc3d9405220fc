//! One turn of the wheel
//!
//! A spin drains the game's bets and records the winners' payouts as pending
//! settlements in a single batch, then credits each payout while deleting its
//! settlement entry. A crash between the two steps leaves the payouts in
//! storage for [`SpinEngine::recover_pending`] to apply on the next start.

use crate::{
    casino_store::{self, PendingPayout},
    errors::CasinoResult,
    games::{
        board::MAX_NUMBER,
        bet_store::BetStore,
        evaluator,
        types::{Bet, BetDescriptor, SpinResult},
    },
    ledger::AccountLedger,
    metrics::CasinoMetrics,
    money::format_money,
    scheduler::WindowKey,
    storage::{KvStore, WriteOp},
};
use dashmap::DashMap;
use rand::Rng;
use std::{
    collections::BTreeMap,
    sync::{
        atomic::{AtomicU64, AtomicU8, Ordering},
        Arc, Mutex, PoisonError,
    },
};

/// Where winning numbers come from
pub trait OutcomeSource: Send + Sync {
    fn draw(&self) -> u8;
}

/// Uniform draw over 0..=36
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomOutcome;

impl OutcomeSource for RandomOutcome {
    fn draw(&self) -> u8 {
        rand::thread_rng().gen_range(0..=MAX_NUMBER)
    }
}

/// Always lands on the configured number
#[derive(Debug)]
pub struct FixedOutcome {
    outcome: AtomicU8,
}

impl FixedOutcome {
    pub fn new(outcome: u8) -> Self {
        Self {
            outcome: AtomicU8::new(outcome.min(MAX_NUMBER)),
        }
    }

    pub fn set(&self, outcome: u8) {
        self.outcome.store(outcome.min(MAX_NUMBER), Ordering::SeqCst);
    }
}

impl OutcomeSource for FixedOutcome {
    fn draw(&self) -> u8 {
        self.outcome.load(Ordering::SeqCst)
    }
}

/// A winning bet and what it paid
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payout {
    pub user_id: String,
    pub sender_id: String,
    pub descriptor: BetDescriptor,
    pub stake_cents: i64,
    pub amount_cents: i64,
}

#[derive(Debug, Clone)]
pub struct SpinReport {
    pub game_id: String,
    pub spin_id: String,
    pub result: SpinResult,
    pub bets_resolved: usize,
    pub payouts: Vec<Payout>,
    /// Summary text keyed by recipient address
    pub messages: BTreeMap<String, String>,
}

impl SpinReport {
    pub fn total_paid_out(&self) -> i64 {
        self.payouts.iter().map(|p| p.amount_cents).sum()
    }
}

pub struct SpinEngine {
    store: Arc<dyn KvStore>,
    ledger: Arc<AccountLedger>,
    bets: Arc<BetStore>,
    outcomes: Arc<dyn OutcomeSource>,
    metrics: Arc<CasinoMetrics>,
    currency: String,
    spin_locks: DashMap<String, Arc<Mutex<()>>>,
    spin_counter: AtomicU64,
}

impl SpinEngine {
    pub fn new(
        store: Arc<dyn KvStore>,
        ledger: Arc<AccountLedger>,
        bets: Arc<BetStore>,
        outcomes: Arc<dyn OutcomeSource>,
        metrics: Arc<CasinoMetrics>,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            store,
            ledger,
            bets,
            outcomes,
            metrics,
            currency: currency.into(),
            spin_locks: DashMap::new(),
            spin_counter: AtomicU64::new(0),
        }
    }

    /// Spin now, regardless of the betting window. Returns `None` when the
    /// game had no bets.
    pub fn spin(&self, game_id: &str) -> CasinoResult<Option<SpinReport>> {
        self.run(game_id, None)
    }

    /// Spin for a closed window, skipping windows that were already spun.
    pub fn spin_window(
        &self,
        game_id: &str,
        window: WindowKey,
    ) -> CasinoResult<Option<SpinReport>> {
        self.run(game_id, Some(window))
    }

    /// Last window recorded in storage for the game
    pub fn last_window(&self, game_id: &str) -> CasinoResult<Option<WindowKey>> {
        casino_store::load_last_window(self.store.as_ref(), game_id)
    }

    /// Apply payouts left behind by an interrupted spin; returns how many
    /// were credited.
    pub fn recover_pending(&self) -> CasinoResult<usize> {
        let pending = casino_store::load_pending_payouts(self.store.as_ref())?;
        for (key, payout) in &pending {
            tracing::warn!(
                game_id = %payout.game_id,
                spin_id = %payout.spin_id,
                user_id = %payout.user_id,
                amount = payout.amount_cents,
                "Applying unsettled payout"
            );
            self.ledger.transfer_with(
                &payout.user_id,
                payout.amount_cents,
                vec![WriteOp::delete(key.clone())],
            )?;
        }
        Ok(pending.len())
    }

    fn run(&self, game_id: &str, window: Option<WindowKey>) -> CasinoResult<Option<SpinReport>> {
        let lock = self.spin_lock(game_id);
        let _spinning = lock.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(key) = window {
            if let Some(last) = self.last_window(game_id)? {
                if key <= last {
                    tracing::debug!(game_id = %game_id, window = key, last, "Window already spun");
                    return Ok(None);
                }
            }
        }

        let result = SpinResult::new(self.outcomes.draw());
        let spin_id = format!(
            "{}-{}",
            chrono::Utc::now().timestamp_millis(),
            self.spin_counter.fetch_add(1, Ordering::SeqCst)
        );

        let mut settlements: Vec<(Vec<u8>, Payout)> = Vec::new();
        let drained = self.bets.drain_with(game_id, |bets| {
            let mut ops = Vec::new();
            for bet in bets {
                let amount_cents =
                    evaluator::evaluate(&bet.descriptor, bet.stake_cents, result.outcome);
                if amount_cents <= 0 {
                    continue;
                }
                let key = casino_store::pending_payout_key(game_id, &spin_id, settlements.len());
                let pending = PendingPayout {
                    game_id: game_id.to_string(),
                    spin_id: spin_id.clone(),
                    user_id: bet.user_id.clone(),
                    amount_cents,
                    outcome: result.outcome,
                };
                ops.push(WriteOp::put(key.clone(), casino_store::encode(&pending)?));
                settlements.push((key, payout_for(bet, amount_cents)));
            }
            if let Some(key) = window {
                ops.push(WriteOp::put(
                    casino_store::spin_window_key(game_id),
                    casino_store::encode(&key)?,
                ));
            }
            Ok(ops)
        })?;

        if drained.is_empty() {
            tracing::debug!(
                game_id = %game_id,
                outcome = result.outcome,
                "No bets, nothing to resolve"
            );
            return Ok(None);
        }

        let mut payouts = Vec::with_capacity(settlements.len());
        for (key, payout) in settlements {
            self.ledger
                .transfer_with(&payout.user_id, payout.amount_cents, vec![WriteOp::delete(key)])?;
            payouts.push(payout);
        }

        let report = SpinReport {
            game_id: game_id.to_string(),
            messages: self.summarize(&result, &drained, &payouts),
            spin_id,
            result,
            bets_resolved: drained.len(),
            payouts,
        };

        self.metrics.record_spin(report.total_paid_out());
        tracing::info!(
            game_id = %game_id,
            spin_id = %report.spin_id,
            outcome = result.outcome,
            bets = report.bets_resolved,
            winners = report.payouts.len(),
            paid_out = report.total_paid_out(),
            "Spin resolved"
        );

        Ok(Some(report))
    }

    /// One identical summary per distinct sender of the drained bets.
    fn summarize(
        &self,
        result: &SpinResult,
        bets: &[Bet],
        payouts: &[Payout],
    ) -> BTreeMap<String, String> {
        let mut winners: Vec<(&str, i64)> = Vec::new();
        for payout in payouts {
            match winners.iter_mut().find(|(user, _)| *user == payout.user_id) {
                Some((_, total)) => *total += payout.amount_cents,
                None => winners.push((payout.user_id.as_str(), payout.amount_cents)),
            }
        }

        let mut text = format!("The winning number is {}\n", result);
        for (user, amount) in winners {
            text.push_str(&format!("\n{} won {}", user, format_money(amount, &self.currency)));
        }

        bets.iter()
            .map(|bet| (bet.sender_id.clone(), text.clone()))
            .collect()
    }

    fn spin_lock(&self, game_id: &str) -> Arc<Mutex<()>> {
        self.spin_locks
            .entry(game_id.to_string())
            .or_default()
            .clone()
    }
}

fn payout_for(bet: &Bet, amount_cents: i64) -> Payout {
    Payout {
        user_id: bet.user_id.clone(),
        sender_id: bet.sender_id.clone(),
        descriptor: bet.descriptor.clone(),
        stake_cents: bet.stake_cents,
        amount_cents,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::LedgerConfig,
        games::{board::Color, types::BetDescriptor},
        storage::MemoryStorage,
    };

    const GAME: &str = "roulette";

    struct Fixture {
        store: Arc<MemoryStorage>,
        ledger: Arc<AccountLedger>,
        bets: Arc<BetStore>,
        outcome: Arc<FixedOutcome>,
        engine: SpinEngine,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryStorage::new());
        let metrics = Arc::new(CasinoMetrics::new());
        let ledger = Arc::new(AccountLedger::new(
            store.clone(),
            LedgerConfig::default(),
            metrics.clone(),
        ));
        let bets =
            Arc::new(BetStore::open(store.clone(), ledger.clone(), metrics.clone()).unwrap());
        let outcome = Arc::new(FixedOutcome::new(7));
        let engine = SpinEngine::new(
            store.clone(),
            ledger.clone(),
            bets.clone(),
            outcome.clone(),
            metrics,
            "€",
        );
        Fixture {
            store,
            ledger,
            bets,
            outcome,
            engine,
        }
    }

    #[test]
    fn test_random_outcome_in_range() {
        for _ in 0..500 {
            assert!(RandomOutcome.draw() <= MAX_NUMBER);
        }
    }

    #[test]
    fn test_empty_spin_is_noop() {
        let f = fixture();
        assert!(f.engine.spin(GAME).unwrap().is_none());
    }

    #[test]
    fn test_spin_credits_winners_and_clears_bets() {
        let f = fixture();
        f.bets
            .place(GAME, Bet::new(GAME, "alice", "chat-a", BetDescriptor::Straight(7), 1_000))
            .unwrap();
        f.bets
            .place(GAME, Bet::new(GAME, "alice", "chat-a", BetDescriptor::Color(Color::Red), 500))
            .unwrap();
        f.bets
            .place(GAME, Bet::new(GAME, "bob", "chat-b", BetDescriptor::Straight(8), 200))
            .unwrap();

        let report = f.engine.spin(GAME).unwrap().expect("bets were placed");

        assert_eq!(report.result.outcome, 7);
        assert_eq!(report.bets_resolved, 3);
        assert_eq!(report.payouts.len(), 2);
        assert_eq!(report.total_paid_out(), 35_000 + 1_000);
        assert_eq!(f.ledger.get_balance("alice").unwrap(), 200_000 - 1_500 + 36_000);
        assert_eq!(f.ledger.get_balance("bob").unwrap(), 199_800);
        assert_eq!(f.bets.count(GAME), 0);
        assert!(casino_store::load_pending_payouts(f.store.as_ref()).unwrap().is_empty());

        assert_eq!(report.messages.len(), 2);
        let text = &report.messages["chat-b"];
        assert_eq!(text, &report.messages["chat-a"]);
        assert!(text.starts_with("The winning number is 7 (red)\n"));
        assert!(text.contains("alice won 360,00€"));
        assert!(!text.contains("bob"));
    }

    #[test]
    fn test_zero_loses_outside_bets() {
        let f = fixture();
        f.outcome.set(0);
        f.bets
            .place(
                GAME,
                Bet::new(GAME, "alice", "alice", BetDescriptor::Color(Color::Black), 1_000),
            )
            .unwrap();

        let report = f.engine.spin(GAME).unwrap().unwrap();
        assert!(report.payouts.is_empty());
        assert_eq!(report.messages["alice"], "The winning number is 0 (green)\n");
        assert_eq!(f.ledger.get_balance("alice").unwrap(), 199_000);
    }

    #[test]
    fn test_window_spun_once() {
        let f = fixture();
        f.bets
            .place(GAME, Bet::new(GAME, "alice", "alice", BetDescriptor::Straight(7), 100))
            .unwrap();
        assert!(f.engine.spin_window(GAME, 10).unwrap().is_some());
        assert_eq!(f.engine.last_window(GAME).unwrap(), Some(10));

        f.bets
            .place(GAME, Bet::new(GAME, "alice", "alice", BetDescriptor::Straight(7), 100))
            .unwrap();
        assert!(f.engine.spin_window(GAME, 10).unwrap().is_none());
        assert!(f.engine.spin_window(GAME, 9).unwrap().is_none());
        assert_eq!(f.bets.count(GAME), 1);

        assert!(f.engine.spin_window(GAME, 11).unwrap().is_some());
    }

    #[test]
    fn test_recover_pending_credits_once() {
        let f = fixture();
        f.ledger.get_balance("alice").unwrap();
        let payout = PendingPayout {
            game_id: GAME.to_string(),
            spin_id: "1-0".to_string(),
            user_id: "alice".to_string(),
            amount_cents: 3_500,
            outcome: 7,
        };
        f.store
            .write_batch(&[WriteOp::put(
                casino_store::pending_payout_key(GAME, "1-0", 0),
                casino_store::encode(&payout).unwrap(),
            )])
            .unwrap();

        assert_eq!(f.engine.recover_pending().unwrap(), 1);
        assert_eq!(f.ledger.get_balance("alice").unwrap(), 203_500);
        assert_eq!(f.engine.recover_pending().unwrap(), 0);
        assert_eq!(f.ledger.get_balance("alice").unwrap(), 203_500);
    }
}
