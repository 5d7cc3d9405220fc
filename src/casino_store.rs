//! Persistent casino records and their key layout.

use crate::{
    errors::{CasinoError, CasinoResult, StorageError},
    games::types::Bet,
    storage::{KvStore, WriteOp},
};
use chrono::NaiveDate;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

const ACCOUNT_PREFIX: &str = "account:";
const BET_PREFIX: &str = "bet:";
const SETTLEMENT_PENDING_PREFIX: &str = "settlement:pending:";
const SPIN_WINDOW_PREFIX: &str = "spin:window:";
const STIPEND_KEY: &str = "stipend:last_day";

/// Stored balance of one user
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccountRecord {
    pub user_id: String,
    pub balance_cents: i64,
    pub updated_at: i64,
}

/// A winning bet drained by a spin whose credit has not been applied yet
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PendingPayout {
    pub game_id: String,
    pub spin_id: String,
    pub user_id: String,
    pub amount_cents: i64,
    pub outcome: u8,
}

pub fn account_key(user_id: &str) -> Vec<u8> {
    format!("{}{}", ACCOUNT_PREFIX, user_id).into_bytes()
}

/// Game and user ids may contain `:`, so they are stored with their byte
/// length in front to keep keys of different (game, user) pairs distinct.
pub fn bet_key(bet: &Bet) -> Vec<u8> {
    format!(
        "{}{}{}{}",
        BET_PREFIX,
        sized(&bet.game_id),
        sized(&bet.user_id),
        bet.descriptor
    )
    .into_bytes()
}

pub fn pending_payout_key(game_id: &str, spin_id: &str, index: usize) -> Vec<u8> {
    format!(
        "{}{}{}{:06}",
        SETTLEMENT_PENDING_PREFIX,
        sized(game_id),
        sized(spin_id),
        index
    )
    .into_bytes()
}

fn sized(component: &str) -> String {
    format!("{}:{}:", component.len(), component)
}

pub fn spin_window_key(game_id: &str) -> Vec<u8> {
    format!("{}{}", SPIN_WINDOW_PREFIX, game_id).into_bytes()
}

pub fn encode<T: Serialize>(value: &T) -> CasinoResult<Vec<u8>> {
    serde_json::to_vec(value)
        .map_err(|e| CasinoError::Storage(StorageError::WriteFailed(e.to_string())))
}

pub fn decode<T: DeserializeOwned>(key: &[u8], bytes: &[u8]) -> CasinoResult<T> {
    serde_json::from_slice(bytes).map_err(|e| {
        CasinoError::Storage(StorageError::CorruptedData(format!(
            "Failed to decode {}: {}",
            String::from_utf8_lossy(key),
            e
        )))
    })
}

pub fn put_account(record: &AccountRecord) -> CasinoResult<WriteOp> {
    Ok(WriteOp::put(account_key(&record.user_id), encode(record)?))
}

pub fn put_bet(bet: &Bet) -> CasinoResult<WriteOp> {
    Ok(WriteOp::put(bet_key(bet), encode(bet)?))
}

pub fn load_account(store: &dyn KvStore, user_id: &str) -> CasinoResult<Option<AccountRecord>> {
    let key = account_key(user_id);
    match store.get(&key)? {
        Some(bytes) => Ok(Some(decode(&key, &bytes)?)),
        None => Ok(None),
    }
}

pub fn load_accounts(store: &dyn KvStore) -> CasinoResult<Vec<AccountRecord>> {
    load_prefix(store, ACCOUNT_PREFIX)
}

/// Every pending bet across all games. Fails on the first unreadable
/// record, since its stake has already left the owner's balance.
pub fn load_bets(store: &dyn KvStore) -> CasinoResult<Vec<Bet>> {
    store
        .scan_prefix(BET_PREFIX.as_bytes())?
        .into_iter()
        .map(|(key, value)| decode(&key, &value))
        .collect()
}

/// Like [`load_bets`], but skips unreadable records. Only for inspection.
pub fn load_bets_lossy(store: &dyn KvStore) -> CasinoResult<Vec<Bet>> {
    load_prefix(store, BET_PREFIX)
}

/// Pending payouts with the keys they are stored under
pub fn load_pending_payouts(store: &dyn KvStore) -> CasinoResult<Vec<(Vec<u8>, PendingPayout)>> {
    store
        .scan_prefix(SETTLEMENT_PENDING_PREFIX.as_bytes())?
        .into_iter()
        .map(|(key, value)| {
            let payout = decode(&key, &value)?;
            Ok((key, payout))
        })
        .collect()
}

pub fn load_last_window(store: &dyn KvStore, game_id: &str) -> CasinoResult<Option<u64>> {
    let key = spin_window_key(game_id);
    match store.get(&key)? {
        Some(bytes) => Ok(Some(decode(&key, &bytes)?)),
        None => Ok(None),
    }
}

/// Day on which the daily stipend was last paid
pub fn load_last_stipend_day(store: &dyn KvStore) -> CasinoResult<Option<NaiveDate>> {
    match store.get(STIPEND_KEY.as_bytes())? {
        Some(bytes) => Ok(Some(decode(STIPEND_KEY.as_bytes(), &bytes)?)),
        None => Ok(None),
    }
}

pub fn put_stipend_day(day: NaiveDate) -> CasinoResult<WriteOp> {
    Ok(WriteOp::put(STIPEND_KEY, encode(&day)?))
}

fn load_prefix<T: DeserializeOwned>(store: &dyn KvStore, prefix: &str) -> CasinoResult<Vec<T>> {
    let rows = store.scan_prefix(prefix.as_bytes())?;
    let mut records = Vec::with_capacity(rows.len());
    for (key, value) in rows {
        match decode(&key, &value) {
            Ok(record) => records.push(record),
            Err(e) => {
                tracing::warn!("Skipping unreadable record: {}", e);
            }
        }
    }
    Ok(records)
}
