//! End-to-end betting flows through the casino facade

use casino_roulette::{
    games::{board::Color, Parity},
    BetDescriptor, BetError, Casino, CasinoConfig, FixedOutcome, KvStore, ManualClock,
    MemoryStorage,
};
use std::sync::Arc;

const GAME: &str = "roulette";

/// 2024-03-01 12:10:00 UTC, the start of a betting window
const OPEN_TIME: i64 = 1_709_295_000;

fn casino_with_balance(starting_balance: i64) -> (Arc<FixedOutcome>, Arc<ManualClock>, Casino) {
    let mut config = CasinoConfig::testing();
    config.ledger.starting_balance = starting_balance;

    let outcome = Arc::new(FixedOutcome::new(7));
    let clock = Arc::new(ManualClock::at_epoch_seconds(OPEN_TIME));
    let store: Arc<dyn KvStore> = Arc::new(MemoryStorage::new());
    let casino = Casino::with_components(config, store, clock.clone(), outcome.clone())
        .expect("Failed to build casino");
    (outcome, clock, casino)
}

#[test]
fn test_straight_up_win_scenario() {
    let (_, _, casino) = casino_with_balance(100_000);
    assert_eq!(casino.balance_of("alice").unwrap(), 100_000);

    let balance = casino
        .place_bet(GAME, "alice", "alice", &BetDescriptor::Straight(7), 1_000)
        .unwrap();
    assert_eq!(balance, 99_000);

    let report = casino.force_spin(GAME).unwrap().expect("one bet was placed");
    assert_eq!(report.result.outcome, 7);
    assert_eq!(report.total_paid_out(), 35_000);

    assert_eq!(casino.balance_of("alice").unwrap(), 134_000);
    assert!(casino.list_bets(GAME, "alice").unwrap().is_empty());
    assert_eq!(casino.pending_stake(), 0);
}

#[test]
fn test_place_decreases_balance_by_stake() {
    let (_, _, casino) = casino_with_balance(100_000);

    let mut expected = 100_000;
    for (descriptor, stake) in [
        ("red", 1_500),
        ("gruppe 2", 700),
        ("neighbours 1-2-4-5", 300),
        ("red", 500),
    ] {
        expected -= stake;
        let balance = casino
            .place_bet_str(GAME, "alice", "alice", descriptor, stake)
            .unwrap();
        assert_eq!(balance, expected, "{descriptor}");
    }

    let bets = casino.list_bets(GAME, "alice").unwrap();
    let listed: Vec<(String, i64)> = bets
        .iter()
        .map(|b| (b.descriptor.to_string(), b.stake_cents))
        .collect();
    assert_eq!(
        listed,
        vec![
            ("neighbours 1-2-4-5".to_string(), 300),
            ("group 2".to_string(), 700),
            ("red".to_string(), 2_000),
        ]
    );
}

#[test]
fn test_insufficient_funds_leaves_balance_unchanged() {
    let (_, _, casino) = casino_with_balance(1_000);

    let err = casino
        .place_bet(GAME, "alice", "alice", &BetDescriptor::Color(Color::Black), 1_001)
        .unwrap_err();

    assert!(err.is_recoverable());
    assert_eq!(
        err.as_bet_error(),
        Some(&BetError::InsufficientFunds {
            balance: 1_000,
            requested: 1_001
        })
    );
    assert_eq!(casino.balance_of("alice").unwrap(), 1_000);
    assert!(casino.list_bets(GAME, "alice").unwrap().is_empty());
}

#[test]
fn test_cancel_restores_balance() {
    let (_, _, casino) = casino_with_balance(100_000);
    casino
        .place_bet(GAME, "alice", "alice", &BetDescriptor::Straight(12), 2_500)
        .unwrap();
    casino
        .place_bet(GAME, "alice", "alice", &BetDescriptor::Straight(13), 100)
        .unwrap();

    let cancelled = casino.cancel_bet(GAME, "alice", 2).unwrap();
    assert_eq!(cancelled.descriptor, BetDescriptor::Straight(12));

    let remaining = casino.list_bets(GAME, "alice").unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].descriptor, BetDescriptor::Straight(13));
    assert_eq!(casino.balance_of("alice").unwrap(), 99_900);

    let err = casino.cancel_bet(GAME, "alice", 5).unwrap_err();
    assert_eq!(
        err.as_bet_error(),
        Some(&BetError::IndexOutOfRange {
            index: 5,
            available: 1
        })
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_placements_merge() {
    let (_, _, casino) = casino_with_balance(100_000);
    let casino = Arc::new(casino);

    let placements = [500, 300].map(|stake| {
        let casino = casino.clone();
        tokio::task::spawn_blocking(move || {
            casino.place_bet(GAME, "alice", "alice", &BetDescriptor::Color(Color::Red), stake)
        })
    });

    for result in futures::future::join_all(placements).await {
        result.unwrap().unwrap();
    }

    let bets = casino.list_bets(GAME, "alice").unwrap();
    assert_eq!(bets.len(), 1);
    assert_eq!(bets[0].stake_cents, 800);
    assert_eq!(casino.balance_of("alice").unwrap(), 99_200);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_placements_racing_a_spin_conserve_money() {
    let (outcome, _, casino) = casino_with_balance(100_000);
    outcome.set(0);
    let casino = Arc::new(casino);

    let users: Vec<String> = (0..8).map(|i| format!("user{i}")).collect();
    for user in &users {
        casino.balance_of(user).unwrap();
    }

    let mut tasks = Vec::new();
    for user in users.clone() {
        let casino = casino.clone();
        tasks.push(tokio::task::spawn_blocking(move || {
            for _ in 0..25 {
                casino
                    .place_bet(GAME, &user, &user, &BetDescriptor::Color(Color::Red), 10)
                    .unwrap();
            }
        }));
    }
    let spinner = {
        let casino = casino.clone();
        tokio::task::spawn_blocking(move || {
            let mut resolved = 0;
            for _ in 0..10 {
                if let Some(report) = casino.force_spin(GAME).unwrap() {
                    resolved += report.bets_resolved;
                }
            }
            resolved
        })
    };

    for task in futures::future::join_all(tasks).await {
        task.unwrap();
    }
    spinner.await.unwrap();

    // Zero loses every red bet: each stake is either still pending or gone,
    // and nothing was paid back out.
    let snapshot = casino.metrics();
    let wagered = 8 * 25 * 10;
    assert_eq!(snapshot.total_wagered, wagered);
    assert_eq!(snapshot.total_paid_out, 0);
    assert!(casino.pending_stake() <= wagered);
    assert_eq!(casino.total_balance().unwrap() + wagered, 8 * 100_000);
}

#[test]
fn test_empty_spin_conserves_total_balance() {
    let (_, _, casino) = casino_with_balance(100_000);
    for user in ["alice", "bob", "carol"] {
        casino.balance_of(user).unwrap();
    }
    casino.beg("bob").unwrap();

    let before = casino.total_balance().unwrap();
    assert!(casino.force_spin(GAME).unwrap().is_none());
    assert_eq!(casino.total_balance().unwrap(), before);
}

#[test]
fn test_spin_summary_goes_to_every_sender() {
    let (outcome, _, casino) = casino_with_balance(100_000);
    outcome.set(17);
    casino
        .place_bet(GAME, "alice", "group-chat", &BetDescriptor::Straight(17), 100)
        .unwrap();
    casino
        .place_bet(GAME, "bob", "group-chat", &BetDescriptor::Color(Color::Black), 1_000)
        .unwrap();
    casino
        .place_bet(
            GAME,
            "carol",
            "carol",
            &BetDescriptor::Parity(Parity::Even),
            400,
        )
        .unwrap();

    let report = casino.force_spin(GAME).unwrap().unwrap();
    assert_eq!(report.messages.len(), 2);

    let text = &report.messages["group-chat"];
    assert_eq!(
        text,
        "The winning number is 17 (black)\n\nalice won 35,00€\nbob won 20,00€"
    );
    assert_eq!(&report.messages["carol"], text);
}

#[test]
fn test_betting_closed_before_spin() {
    let (_, clock, casino) = casino_with_balance(100_000);
    clock.advance(chrono::Duration::seconds(116));

    let err = casino
        .place_bet(GAME, "alice", "alice", &BetDescriptor::Straight(3), 100)
        .unwrap_err();
    assert_eq!(err.as_bet_error(), Some(&BetError::BettingClosed));
    assert_eq!(casino.balance_of("alice").unwrap(), 100_000);
}
