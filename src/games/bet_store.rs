//! Pending bets per game
//!
//! Each game owns one mutex-guarded list. Placement, cancellation and the
//! spin-time drain all hold that lock for their whole read-modify-write, so a
//! drain always sees a frozen set of bets. Every change to the list is
//! committed to storage (together with the matching balance change) before
//! the in-memory list is touched.

use crate::{
    casino_store,
    errors::{BetError, CasinoError, CasinoResult, StorageError},
    games::types::{Bet, PlacedBet},
    ledger::AccountLedger,
    metrics::CasinoMetrics,
    storage::{KvStore, WriteOp},
};
use dashmap::DashMap;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Mutex, MutexGuard, PoisonError,
};

type GameBets = Arc<Mutex<Vec<Bet>>>;

pub struct BetStore {
    store: Arc<dyn KvStore>,
    ledger: Arc<AccountLedger>,
    metrics: Arc<CasinoMetrics>,
    games: DashMap<String, GameBets>,
    next_seq: AtomicU64,
}

impl BetStore {
    /// Open the store, reloading every bet that was pending in storage.
    pub fn open(
        store: Arc<dyn KvStore>,
        ledger: Arc<AccountLedger>,
        metrics: Arc<CasinoMetrics>,
    ) -> CasinoResult<Self> {
        let mut loaded = casino_store::load_bets(store.as_ref())?;
        loaded.sort_by_key(|bet| bet.seq);
        let next_seq = loaded.last().map_or(0, |bet| bet.seq + 1);
        let restored = loaded.len();

        let games: DashMap<String, GameBets> = DashMap::new();
        for bet in loaded {
            let game = games.entry(bet.game_id.clone()).or_default().clone();
            lock(&game).push(bet);
        }

        if restored > 0 {
            tracing::info!(bets = restored, games = games.len(), "Restored pending bets");
        }

        Ok(Self {
            store,
            ledger,
            metrics,
            games,
            next_seq: AtomicU64::new(next_seq),
        })
    }

    /// Withdraw the stake and record the bet, merging with an existing bet on
    /// the same descriptor by the same user.
    pub fn place(&self, game_id: &str, bet: Bet) -> CasinoResult<PlacedBet> {
        if bet.stake_cents <= 0 {
            self.metrics.record_rejection();
            return Err(BetError::InvalidStake(bet.stake_cents).into());
        }
        if let Err(e) = bet.descriptor.validate() {
            self.metrics.record_rejection();
            return Err(e.into());
        }

        let game = self.game(game_id);
        let mut bets = lock(&game);

        let existing = bets
            .iter()
            .position(|b| b.user_id == bet.user_id && b.descriptor == bet.descriptor);

        let record = match existing {
            Some(index) => {
                let current = &bets[index];
                let stake_cents = current
                    .stake_cents
                    .checked_add(bet.stake_cents)
                    .ok_or_else(|| {
                        CasinoError::from(StorageError::BalanceOverflow(bet.user_id.clone()))
                    })?;
                Bet {
                    game_id: game_id.to_string(),
                    stake_cents,
                    seq: current.seq,
                    ..bet.clone()
                }
            }
            None => Bet {
                game_id: game_id.to_string(),
                seq: self.next_seq.fetch_add(1, Ordering::SeqCst),
                ..bet.clone()
            },
        };

        let balance_cents = match self.ledger.transfer_with(
            &bet.user_id,
            -bet.stake_cents,
            vec![casino_store::put_bet(&record)?],
        ) {
            Ok(balance) => balance,
            Err(e) => {
                self.metrics.record_rejection();
                return Err(e);
            }
        };

        let stake_cents = record.stake_cents;
        tracing::info!(
            game_id = %game_id,
            user_id = %record.user_id,
            descriptor = %record.descriptor,
            stake = bet.stake_cents,
            total_stake = stake_cents,
            merged = existing.is_some(),
            "Bet placed"
        );

        match existing {
            Some(index) => bets[index] = record,
            None => bets.push(record),
        }
        self.metrics.record_bet(bet.stake_cents);

        Ok(PlacedBet {
            stake_cents,
            balance_cents,
        })
    }

    /// The user's bets on a game, smallest stake first.
    pub fn list(&self, game_id: &str, user_id: &str) -> Vec<Bet> {
        let Some(game) = self.existing_game(game_id) else {
            return Vec::new();
        };
        let bets = lock(&game);
        let listed: Vec<Bet> = user_bets(&bets, user_id)
            .into_iter()
            .map(|position| bets[position].clone())
            .collect();
        listed
    }

    /// Cancel the `index`-th (1-based) entry of [`list`](Self::list) and
    /// refund its stake.
    pub fn delete(&self, game_id: &str, user_id: &str, index: usize) -> CasinoResult<Bet> {
        let game = self.game(game_id);
        let mut bets = lock(&game);

        let positions = user_bets(&bets, user_id);
        let position = match index.checked_sub(1).and_then(|i| positions.get(i)) {
            Some(position) => *position,
            None => {
                return Err(BetError::IndexOutOfRange {
                    index,
                    available: positions.len(),
                }
                .into())
            }
        };

        let bet = &bets[position];
        self.ledger.transfer_with(
            user_id,
            bet.stake_cents,
            vec![WriteOp::delete(casino_store::bet_key(bet))],
        )?;

        let removed = bets.remove(position);
        self.metrics.record_cancellation(removed.stake_cents);
        tracing::info!(
            game_id = %game_id,
            user_id = %user_id,
            descriptor = %removed.descriptor,
            refund = removed.stake_cents,
            "Bet cancelled"
        );
        Ok(removed)
    }

    /// Remove and return every bet of the game.
    pub fn drain_all(&self, game_id: &str) -> CasinoResult<Vec<Bet>> {
        self.drain_with(game_id, |_| Ok(Vec::new()))
    }

    /// Remove and return every bet of the game, committing the operations
    /// produced by `extra` in the same batch as the bet deletions.
    pub fn drain_with<F>(&self, game_id: &str, extra: F) -> CasinoResult<Vec<Bet>>
    where
        F: FnOnce(&[Bet]) -> CasinoResult<Vec<WriteOp>>,
    {
        let game = self.game(game_id);
        let mut bets = lock(&game);

        let mut ops: Vec<WriteOp> = bets
            .iter()
            .map(|bet| WriteOp::delete(casino_store::bet_key(bet)))
            .collect();
        ops.extend(extra(&bets)?);

        if !ops.is_empty() {
            self.store.write_batch(&ops)?;
        }

        let drained = std::mem::take(&mut *bets);
        tracing::debug!(game_id = %game_id, bets = drained.len(), "Drained bets");
        Ok(drained)
    }

    pub fn count(&self, game_id: &str) -> usize {
        match self.existing_game(game_id) {
            Some(game) => {
                let bets = lock(&game);
                bets.len()
            }
            None => 0,
        }
    }

    /// Sum of every stake currently withdrawn and riding on a bet
    pub fn pending_stake(&self) -> i64 {
        let games: Vec<GameBets> = self.games.iter().map(|entry| entry.value().clone()).collect();
        games
            .iter()
            .map(|game| lock(game).iter().map(|bet| bet.stake_cents).sum::<i64>())
            .sum()
    }

    fn game(&self, game_id: &str) -> GameBets {
        self.games.entry(game_id.to_string()).or_default().clone()
    }

    fn existing_game(&self, game_id: &str) -> Option<GameBets> {
        self.games.get(game_id).map(|entry| entry.value().clone())
    }
}

fn lock(game: &Mutex<Vec<Bet>>) -> MutexGuard<'_, Vec<Bet>> {
    // The list is only replaced after a successful write, so a panicking
    // holder never leaves it half-updated.
    game.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Positions of the user's bets ordered by stake; ties keep placement order.
fn user_bets(bets: &[Bet], user_id: &str) -> Vec<usize> {
    let mut positions: Vec<usize> = bets
        .iter()
        .enumerate()
        .filter(|(_, bet)| bet.user_id == user_id)
        .map(|(position, _)| position)
        .collect();
    positions.sort_by_key(|position| bets[*position].stake_cents);
    positions
}
