//! Casino database inspection binary

use casino_roulette::{casino_store, config::StorageConfig, format_money, RocksStorage};
use std::{collections::BTreeMap, path::Path};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let db_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| StorageConfig::default().data_directory);

    if !Path::new(&db_path).exists() {
        println!("❌ No casino data found at {}", db_path);
        return Ok(());
    }

    let store = RocksStorage::new(&db_path)?;

    println!("🔍 Casino Inspector");
    println!("===================");
    println!("Database: {}\n", db_path);

    let accounts = casino_store::load_accounts(&store)?;
    let total: i64 = accounts.iter().map(|a| a.balance_cents).sum();
    println!("👤 Accounts ({}):", accounts.len());
    for account in &accounts {
        println!("   {:<24} {:>16}", account.user_id, format_money(account.balance_cents, "€"));
    }
    println!("   Total: {}\n", format_money(total, "€"));

    let bets = casino_store::load_bets_lossy(&store)?;
    let mut by_game: BTreeMap<&str, Vec<_>> = BTreeMap::new();
    for bet in &bets {
        by_game.entry(bet.game_id.as_str()).or_default().push(bet);
    }
    println!("🎲 Pending bets ({}):", bets.len());
    for (game_id, game_bets) in &by_game {
        let last_window = casino_store::load_last_window(&store, game_id)?;
        println!("   {} (last spun window: {:?})", game_id, last_window);
        for bet in game_bets {
            println!(
                "      {:<20} {:<20} {:>12}",
                bet.user_id,
                bet.descriptor.to_string(),
                format_money(bet.stake_cents, "€")
            );
        }
    }
    println!();

    let pending = casino_store::load_pending_payouts(&store)?;
    if pending.is_empty() {
        println!("✓ No unsettled payouts");
    } else {
        println!("⚠️  Unsettled payouts ({}):", pending.len());
        for (key, payout) in &pending {
            println!(
                "   {} -> {} {}",
                String::from_utf8_lossy(key),
                payout.user_id,
                format_money(payout.amount_cents, "€")
            );
        }
    }

    if let Some(day) = casino_store::load_last_stipend_day(&store)? {
        println!("💶 Last daily stipend: {}", day);
    }

    Ok(())
}
