//! Account balances and atomic fund movement
//!
//! Balances are cached in a [`DashMap`]; the shard lock held across the
//! read-modify-write serializes every mutation of one account, and the
//! storage batch is written before the cached value changes.

use crate::{
    casino_store::{self, AccountRecord},
    config::LedgerConfig,
    errors::{BetError, CasinoError, CasinoResult, StorageError},
    metrics::CasinoMetrics,
    storage::{KvStore, WriteOp},
};
use dashmap::{mapref::entry::Entry, mapref::one::RefMut, DashMap};
use rand::{seq::SliceRandom, Rng};
use std::{collections::BTreeSet, sync::Arc};

pub struct AccountLedger {
    store: Arc<dyn KvStore>,
    accounts: DashMap<String, i64>,
    config: LedgerConfig,
    metrics: Arc<CasinoMetrics>,
}

impl AccountLedger {
    pub fn new(store: Arc<dyn KvStore>, config: LedgerConfig, metrics: Arc<CasinoMetrics>) -> Self {
        Self {
            store,
            accounts: DashMap::new(),
            config,
            metrics,
        }
    }

    /// Current balance, opening the account with the starting balance on
    /// first reference.
    pub fn get_balance(&self, user_id: &str) -> CasinoResult<i64> {
        let balance = self.account(user_id)?;
        Ok(*balance)
    }

    /// Apply `delta_cents` to the balance and return the new balance.
    pub fn transfer(&self, user_id: &str, delta_cents: i64) -> CasinoResult<i64> {
        self.transfer_with(user_id, delta_cents, Vec::new())
    }

    /// Like [`transfer`](Self::transfer), committing `extra_ops` in the same
    /// storage batch as the balance change. Nothing is written when the
    /// account would go negative.
    pub fn transfer_with(
        &self,
        user_id: &str,
        delta_cents: i64,
        extra_ops: Vec<WriteOp>,
    ) -> CasinoResult<i64> {
        let mut balance = self.account(user_id)?;

        let new_balance = balance
            .checked_add(delta_cents)
            .ok_or_else(|| CasinoError::from(StorageError::BalanceOverflow(user_id.to_string())))?;

        if new_balance < 0 {
            return Err(BetError::InsufficientFunds {
                balance: *balance,
                requested: -delta_cents,
            }
            .into());
        }

        let mut ops = Vec::with_capacity(extra_ops.len() + 1);
        ops.push(casino_store::put_account(&record(user_id, new_balance))?);
        ops.extend(extra_ops);
        self.store.write_batch(&ops)?;

        *balance = new_balance;
        tracing::debug!(
            user_id = %user_id,
            delta = delta_cents,
            balance = new_balance,
            "Balance updated"
        );
        Ok(new_balance)
    }

    /// Credit every known account once; returns how many were credited.
    pub fn daily_stipend(&self, amount_cents: i64) -> CasinoResult<usize> {
        if amount_cents < 0 {
            return Err(BetError::InvalidStake(amount_cents).into());
        }

        let users = self.known_accounts()?;
        for user in &users {
            self.transfer(user, amount_cents)?;
        }

        self.metrics.record_stipend(users.len());
        tracing::info!(
            accounts = users.len(),
            amount = amount_cents,
            "Paid daily stipend"
        );
        Ok(users.len())
    }

    /// Credit a small random amount; returns (amount, new balance).
    pub fn beg<R: Rng + ?Sized>(&self, user_id: &str, rng: &mut R) -> CasinoResult<(i64, i64)> {
        let amount = self.config.beg_values.choose(rng).copied().unwrap_or(0);
        let balance = self.transfer(user_id, amount)?;
        Ok((amount, balance))
    }

    /// Ids of every account that exists in storage or in the cache
    pub fn known_accounts(&self) -> CasinoResult<Vec<String>> {
        let mut users: BTreeSet<String> = casino_store::load_accounts(self.store.as_ref())?
            .into_iter()
            .map(|record| record.user_id)
            .collect();
        users.extend(self.accounts.iter().map(|entry| entry.key().clone()));
        Ok(users.into_iter().collect())
    }

    /// Sum of all known balances
    pub fn total_balance(&self) -> CasinoResult<i64> {
        let mut total = 0i64;
        for user in self.known_accounts()? {
            total += self.get_balance(&user)?;
        }
        Ok(total)
    }

    pub fn starting_balance(&self) -> i64 {
        self.config.starting_balance
    }

    /// Locked handle on the cached balance, loading or creating the account.
    fn account(&self, user_id: &str) -> CasinoResult<RefMut<'_, String, i64>> {
        match self.accounts.entry(user_id.to_string()) {
            Entry::Occupied(entry) => Ok(entry.into_ref()),
            Entry::Vacant(entry) => {
                let balance = match casino_store::load_account(self.store.as_ref(), user_id)? {
                    Some(existing) => existing.balance_cents,
                    None => {
                        let starting = self.config.starting_balance;
                        let opened = casino_store::put_account(&record(user_id, starting))?;
                        self.store.write_batch(&[opened])?;
                        tracing::info!(user_id = %user_id, balance = starting, "Opened account");
                        starting
                    }
                };
                Ok(entry.insert(balance))
            }
        }
    }
}

fn record(user_id: &str, balance_cents: i64) -> AccountRecord {
    AccountRecord {
        user_id: user_id.to_string(),
        balance_cents,
        updated_at: chrono::Utc::now().timestamp(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use rand::{rngs::StdRng, SeedableRng};

    fn ledger_with(store: Arc<dyn KvStore>) -> AccountLedger {
        AccountLedger::new(store, LedgerConfig::default(), Arc::new(CasinoMetrics::new()))
    }

    fn ledger() -> AccountLedger {
        ledger_with(Arc::new(MemoryStorage::new()))
    }

    #[test]
    fn test_lazy_account_creation() {
        let ledger = ledger();
        assert_eq!(ledger.get_balance("alice").unwrap(), 200_000);
        assert_eq!(ledger.known_accounts().unwrap(), vec!["alice".to_string()]);
    }

    #[test]
    fn test_transfer_and_insufficient_funds() {
        let ledger = ledger();
        assert_eq!(ledger.transfer("alice", -50_000).unwrap(), 150_000);
        assert_eq!(ledger.transfer("alice", 25).unwrap(), 150_025);

        let err = ledger.transfer("alice", -150_026).unwrap_err();
        assert_eq!(
            err.as_bet_error(),
            Some(&BetError::InsufficientFunds {
                balance: 150_025,
                requested: 150_026
            })
        );
        assert_eq!(ledger.get_balance("alice").unwrap(), 150_025);

        assert_eq!(ledger.transfer("alice", -150_025).unwrap(), 0);
    }

    #[test]
    fn test_first_reference_overdraft_keeps_starting_balance() {
        let ledger = ledger();
        assert!(ledger.transfer("bob", -200_001).is_err());
        assert_eq!(ledger.get_balance("bob").unwrap(), 200_000);
    }

    #[test]
    fn test_balances_survive_new_ledger_on_same_store() {
        let store: Arc<dyn KvStore> = Arc::new(MemoryStorage::new());
        ledger_with(store.clone()).transfer("alice", -1_000).unwrap();

        let reopened = ledger_with(store);
        assert_eq!(reopened.get_balance("alice").unwrap(), 199_000);
    }

    #[test]
    fn test_extra_ops_are_not_written_on_failure() {
        let store = Arc::new(MemoryStorage::new());
        let ledger = ledger_with(store.clone());

        let result = ledger.transfer_with(
            "alice",
            -300_000,
            vec![WriteOp::put("bet:roulette:alice:red", "{}")],
        );
        assert!(result.is_err());
        assert_eq!(store.get(b"bet:roulette:alice:red").unwrap(), None);

        ledger
            .transfer_with("alice", -100, vec![WriteOp::put("marker", "1")])
            .unwrap();
        assert_eq!(store.get(b"marker").unwrap(), Some(b"1".to_vec()));
    }

    #[test]
    fn test_daily_stipend_credits_every_account() {
        let ledger = ledger();
        ledger.get_balance("alice").unwrap();
        ledger.transfer("bob", -500).unwrap();

        assert_eq!(ledger.daily_stipend(10_000).unwrap(), 2);
        assert_eq!(ledger.get_balance("alice").unwrap(), 210_000);
        assert_eq!(ledger.get_balance("bob").unwrap(), 209_500);
        assert!(ledger.daily_stipend(-1).is_err());
    }

    #[test]
    fn test_beg_pays_a_configured_amount() {
        let ledger = ledger();
        let mut rng = StdRng::seed_from_u64(7);
        let (amount, balance) = ledger.beg("alice", &mut rng).unwrap();

        assert!(LedgerConfig::default().beg_values.contains(&amount));
        assert_eq!(balance, 200_000 + amount);
    }

    #[test]
    fn test_concurrent_transfers_are_serialized() {
        let ledger = Arc::new(ledger());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let ledger = ledger.clone();
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        ledger.transfer("alice", -10).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(ledger.get_balance("alice").unwrap(), 200_000 - 8_000);
        assert_eq!(ledger.total_balance().unwrap(), 192_000);
    }
}
