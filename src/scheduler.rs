//! Clock-driven betting windows
//!
//! The state is never persisted: it is recomputed from the wall clock on
//! every query. With the default 120 second cycle and 5 second closing phase
//! the window closes during the last five seconds of every odd minute.

use crate::config::SchedulerConfig;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use dashmap::{mapref::entry::Entry, DashMap};
use std::sync::{Arc, Mutex, PoisonError};

/// Index of a betting window since the Unix epoch
pub type WindowKey = u64;

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    /// Clock set to `seconds` after the Unix epoch
    pub fn at_epoch_seconds(seconds: i64) -> Self {
        Self::new(DateTime::from_timestamp(seconds, 0).unwrap_or_default())
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) = now;
    }

    pub fn advance(&self, by: ChronoDuration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowState {
    /// Bets are accepted
    Open,
    /// Last seconds of the window; bets are refused
    Closing,
    /// A spin for the game is in flight
    Spinning,
}

pub struct BettingWindowScheduler {
    clock: Arc<dyn Clock>,
    cycle_seconds: u64,
    closing_seconds: u64,
    last_spun: DashMap<String, WindowKey>,
    /// Spins in flight per game
    spinning: DashMap<String, usize>,
}

impl BettingWindowScheduler {
    pub fn new(clock: Arc<dyn Clock>, config: &SchedulerConfig) -> Self {
        Self {
            clock,
            cycle_seconds: config.cycle_seconds.max(1),
            closing_seconds: config.closing_seconds.min(config.cycle_seconds),
            last_spun: DashMap::new(),
            spinning: DashMap::new(),
        }
    }

    pub fn state(&self, game_id: &str) -> WindowState {
        if self.spinning.contains_key(game_id) {
            WindowState::Spinning
        } else if self.position(self.clock.now()) >= self.closes_at() {
            WindowState::Closing
        } else {
            WindowState::Open
        }
    }

    pub fn is_accepting_bets(&self, game_id: &str) -> bool {
        self.state(game_id) == WindowState::Open
    }

    /// Seconds until the window closes and the wheel spins; zero while
    /// closing.
    pub fn seconds_until_spin(&self) -> i64 {
        let position = self.position(self.clock.now());
        self.closes_at().saturating_sub(position) as i64
    }

    pub fn current_window(&self) -> WindowKey {
        self.window_of(self.clock.now())
    }

    /// The window to spin for `game_id`, if it has just closed and was not
    /// spun yet. Each window is returned at most once.
    pub fn poll(&self, game_id: &str) -> Option<WindowKey> {
        let now = self.clock.now();
        if self.position(now) < self.closes_at() {
            return None;
        }

        let key = self.window_of(now);
        match self.last_spun.entry(game_id.to_string()) {
            Entry::Occupied(mut last) => {
                if *last.get() >= key {
                    return None;
                }
                last.insert(key);
            }
            Entry::Vacant(last) => {
                last.insert(key);
            }
        }
        Some(key)
    }

    /// Record that `key` was already spun, e.g. from persisted state.
    pub fn mark_spun(&self, game_id: &str, key: WindowKey) {
        let mut last = self.last_spun.entry(game_id.to_string()).or_insert(key);
        if *last < key {
            *last = key;
        }
    }

    pub fn last_spun(&self, game_id: &str) -> Option<WindowKey> {
        self.last_spun.get(game_id).map(|entry| *entry)
    }

    /// Mark the game as spinning until the guard is dropped. Overlapping
    /// spins each hold a guard; the game stays spinning until the last one
    /// is dropped.
    pub fn begin_spin(&self, game_id: &str) -> SpinGuard<'_> {
        *self.spinning.entry(game_id.to_string()).or_insert(0) += 1;
        SpinGuard {
            spinning: &self.spinning,
            game_id: game_id.to_string(),
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    fn closes_at(&self) -> u64 {
        self.cycle_seconds - self.closing_seconds
    }

    fn position(&self, now: DateTime<Utc>) -> u64 {
        now.timestamp().rem_euclid(self.cycle_seconds as i64) as u64
    }

    fn window_of(&self, now: DateTime<Utc>) -> WindowKey {
        now.timestamp().max(0) as u64 / self.cycle_seconds
    }
}

/// Keeps a game in [`WindowState::Spinning`] while alive
pub struct SpinGuard<'a> {
    spinning: &'a DashMap<String, usize>,
    game_id: String,
}

impl Drop for SpinGuard<'_> {
    fn drop(&mut self) {
        if let Entry::Occupied(mut count) = self.spinning.entry(self.game_id.clone()) {
            if *count.get() <= 1 {
                count.remove();
            } else {
                *count.get_mut() -= 1;
            }
        }
    }
}
