//! Entry point for the command layer
//!
//! [`Casino`] wires the ledger, bet store, spin engine and window scheduler
//! together over one storage backend and exposes the operations a chat
//! command handler needs.

use crate::{
    casino_store,
    config::CasinoConfig,
    delivery::MessageSink,
    driver::CasinoDriver,
    errors::{BetError, CasinoResult},
    games::{
        bet_store::BetStore,
        spin::{OutcomeSource, RandomOutcome, SpinEngine, SpinReport},
        types::{Bet, BetDescriptor},
    },
    ledger::AccountLedger,
    metrics::{CasinoMetrics, MetricsSnapshot},
    money::format_money,
    scheduler::{BettingWindowScheduler, Clock, SystemClock, WindowKey, WindowState},
    storage::{self, KvStore},
};
use chrono::NaiveDate;
use std::sync::Arc;

pub struct Casino {
    config: CasinoConfig,
    store: Arc<dyn KvStore>,
    ledger: Arc<AccountLedger>,
    bets: Arc<BetStore>,
    engine: SpinEngine,
    scheduler: BettingWindowScheduler,
    metrics: Arc<CasinoMetrics>,
}

impl Casino {
    /// Open the configured storage with the system clock and a random wheel.
    pub fn open(config: CasinoConfig) -> CasinoResult<Self> {
        config.validate()?;
        let store = storage::open_store(&config.storage)?;
        Self::with_components(config, store, Arc::new(SystemClock), Arc::new(RandomOutcome))
    }

    pub fn with_components(
        config: CasinoConfig,
        store: Arc<dyn KvStore>,
        clock: Arc<dyn Clock>,
        outcomes: Arc<dyn OutcomeSource>,
    ) -> CasinoResult<Self> {
        let metrics = Arc::new(CasinoMetrics::new());
        let ledger = Arc::new(AccountLedger::new(
            store.clone(),
            config.ledger.clone(),
            metrics.clone(),
        ));
        let bets = Arc::new(BetStore::open(store.clone(), ledger.clone(), metrics.clone())?);
        let engine = SpinEngine::new(
            store.clone(),
            ledger.clone(),
            bets.clone(),
            outcomes,
            metrics.clone(),
            config.ledger.currency.clone(),
        );
        let scheduler = BettingWindowScheduler::new(clock, &config.scheduler);

        for game_id in &config.scheduler.games {
            if let Some(window) = engine.last_window(game_id)? {
                scheduler.mark_spun(game_id, window);
            }
        }

        Ok(Self {
            config,
            store,
            ledger,
            bets,
            engine,
            scheduler,
            metrics,
        })
    }

    /// Place a bet and return the balance left after withdrawing the stake.
    pub fn place_bet(
        &self,
        game_id: &str,
        user_id: &str,
        sender_id: &str,
        descriptor: &BetDescriptor,
        stake_cents: i64,
    ) -> CasinoResult<i64> {
        if !self.scheduler.is_accepting_bets(game_id) {
            self.metrics.record_rejection();
            tracing::debug!(game_id = %game_id, user_id = %user_id, "Bet refused, window closing");
            return Err(BetError::BettingClosed.into());
        }

        let bet = Bet::new(game_id, user_id, sender_id, descriptor.clone(), stake_cents);
        let placed = self.bets.place(game_id, bet)?;
        Ok(placed.balance_cents)
    }

    /// [`place_bet`](Self::place_bet) with the descriptor in its textual form
    pub fn place_bet_str(
        &self,
        game_id: &str,
        user_id: &str,
        sender_id: &str,
        descriptor: &str,
        stake_cents: i64,
    ) -> CasinoResult<i64> {
        let descriptor: BetDescriptor = descriptor.parse()?;
        self.place_bet(game_id, user_id, sender_id, &descriptor, stake_cents)
    }

    pub fn list_bets(&self, game_id: &str, user_id: &str) -> CasinoResult<Vec<Bet>> {
        Ok(self.bets.list(game_id, user_id))
    }

    /// Cancel the `index`-th (1-based) bet as shown by `list_bets`.
    pub fn cancel_bet(&self, game_id: &str, user_id: &str, index: usize) -> CasinoResult<Bet> {
        self.bets.delete(game_id, user_id, index)
    }

    pub fn balance_of(&self, user_id: &str) -> CasinoResult<i64> {
        self.ledger.get_balance(user_id)
    }

    pub fn seconds_until_spin(&self, game_id: &str) -> i64 {
        match self.scheduler.state(game_id) {
            WindowState::Spinning => 0,
            WindowState::Open | WindowState::Closing => self.scheduler.seconds_until_spin(),
        }
    }

    pub fn window_state(&self, game_id: &str) -> WindowState {
        self.scheduler.state(game_id)
    }

    /// Spin immediately, outside the regular cycle.
    pub fn force_spin(&self, game_id: &str) -> CasinoResult<Option<SpinReport>> {
        let _spinning = self.scheduler.begin_spin(game_id);
        tracing::info!(game_id = %game_id, "Forced spin");
        self.engine.spin(game_id)
    }

    /// Spin for a window the scheduler reported as closed
    pub fn spin_window(
        &self,
        game_id: &str,
        window: WindowKey,
    ) -> CasinoResult<Option<SpinReport>> {
        let _spinning = self.scheduler.begin_spin(game_id);
        self.engine.spin_window(game_id, window)
    }

    /// Games whose current window has just closed, with the window to spin
    pub fn due_windows(&self) -> Vec<(String, WindowKey)> {
        self.config
            .scheduler
            .games
            .iter()
            .filter_map(|game_id| {
                self.scheduler
                    .poll(game_id)
                    .map(|window| (game_id.clone(), window))
            })
            .collect()
    }

    /// Credit a random small amount; returns (amount, new balance).
    pub fn beg(&self, user_id: &str) -> CasinoResult<(i64, i64)> {
        let (amount, balance) = self.ledger.beg(user_id, &mut rand::thread_rng())?;
        tracing::info!(user_id = %user_id, amount, "Begging paid out");
        Ok((amount, balance))
    }

    /// Text listing of a user's bets, numbered the way `cancel_bet` expects.
    pub fn bets_summary(&self, game_id: &str, user_id: &str) -> CasinoResult<String> {
        let bets = self.list_bets(game_id, user_id)?;
        if bets.is_empty() {
            return Ok("No bets stored".to_string());
        }

        let currency = &self.config.ledger.currency;
        let blocks: Vec<String> = bets
            .iter()
            .enumerate()
            .map(|(i, bet)| {
                format!(
                    "{}: {}\n{}",
                    i + 1,
                    format_money(bet.stake_cents, currency),
                    bet.descriptor
                )
            })
            .collect();
        Ok(blocks.join("\n\n"))
    }

    /// Pay the daily stipend for `day` unless it was already paid; returns
    /// the number of accounts credited.
    pub fn pay_daily_stipend(&self, day: NaiveDate) -> CasinoResult<Option<usize>> {
        if let Some(last) = casino_store::load_last_stipend_day(self.store.as_ref())? {
            if last >= day {
                return Ok(None);
            }
        }

        self.store.write_batch(&[casino_store::put_stipend_day(day)?])?;
        let credited = self.ledger.daily_stipend(self.config.ledger.daily_stipend)?;
        Ok(Some(credited))
    }

    /// Apply payouts an interrupted spin left unsettled.
    pub fn recover_pending(&self) -> CasinoResult<usize> {
        let recovered = self.engine.recover_pending()?;
        if recovered > 0 {
            tracing::info!(payouts = recovered, "Recovered unsettled payouts");
        }
        Ok(recovered)
    }

    pub fn total_balance(&self) -> CasinoResult<i64> {
        self.ledger.total_balance()
    }

    /// Stakes withdrawn for bets that have not been resolved yet
    pub fn pending_stake(&self) -> i64 {
        self.bets.pending_stake()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn config(&self) -> &CasinoConfig {
        &self.config
    }

    pub fn scheduler(&self) -> &BettingWindowScheduler {
        &self.scheduler
    }

    /// Background loop spinning every configured game once per window
    pub fn driver(self: &Arc<Self>, sink: Arc<dyn MessageSink>) -> CasinoDriver {
        CasinoDriver::new(self.clone(), sink)
    }
}
