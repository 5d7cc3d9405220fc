//! Background loop that spins each game once per betting window
//!
//! The driver polls the scheduler on a fixed interval, runs the spin for any
//! window that just closed, and hands the resulting summaries to a
//! [`MessageSink`]. It also pays the daily stipend once the configured UTC
//! hour is reached.

use crate::{
    casino::Casino,
    delivery::{MessageSink, OutboundMessage},
    errors::CasinoResult,
    games::spin::SpinReport,
};
use chrono::Timelike;
use futures::future::join_all;
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Instant,
};
use tokio::time::interval;

pub struct CasinoDriver {
    casino: Arc<Casino>,
    sink: Arc<dyn MessageSink>,
    running: Arc<AtomicBool>,
}

impl CasinoDriver {
    pub fn new(casino: Arc<Casino>, sink: Arc<dyn MessageSink>) -> Self {
        Self {
            casino,
            sink,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Run until [`stop`](Self::stop) is called.
    pub async fn start(self: Arc<Self>) {
        self.running.store(true, Ordering::SeqCst);

        let config = self.casino.config();
        tracing::info!(
            games = ?config.scheduler.games,
            cycle_seconds = config.scheduler.cycle_seconds,
            poll_interval_ms = config.scheduler.poll_interval_ms,
            "Casino driver started"
        );

        let mut poll_interval = interval(config.poll_interval());
        let mut stats_interval = interval(config.stats_interval());
        let start_time = Instant::now();

        loop {
            tokio::select! {
                _ = poll_interval.tick() => {
                    if !self.running.load(Ordering::SeqCst) {
                        break;
                    }

                    if let Err(e) = self.tick().await {
                        tracing::error!("Driver tick failed: {}", e);
                    }
                }

                _ = stats_interval.tick() => {
                    self.log_stats(start_time);
                }
            }
        }

        tracing::info!("Casino driver stopped");
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// One poll: spin every game whose window closed, then pay the stipend
    /// if due. Returns the number of spins that resolved bets.
    pub async fn tick(&self) -> CasinoResult<usize> {
        let mut resolved = 0;

        for (game_id, window) in self.casino.due_windows() {
            match self.casino.spin_window(&game_id, window) {
                Ok(Some(report)) => {
                    resolved += 1;
                    self.dispatch(report).await;
                }
                Ok(None) => {
                    tracing::debug!(game_id = %game_id, window, "Window closed without bets");
                }
                Err(e) => {
                    tracing::error!(game_id = %game_id, window, "Spin failed: {}", e);
                }
            }
        }

        self.pay_stipend_if_due()?;
        Ok(resolved)
    }

    async fn dispatch(&self, report: SpinReport) {
        let deliveries = report.messages.into_iter().map(|(recipient, text)| {
            let sink = self.sink.clone();
            async move {
                let target = recipient.clone();
                (target, sink.deliver(OutboundMessage { recipient, text }).await)
            }
        });

        for (recipient, result) in join_all(deliveries).await {
            if let Err(e) = result {
                tracing::warn!(
                    game_id = %report.game_id,
                    recipient = %recipient,
                    "Delivery failed: {}",
                    e
                );
            }
        }
    }

    fn pay_stipend_if_due(&self) -> CasinoResult<()> {
        let now = self.casino.scheduler().now();
        if now.hour() < self.casino.config().ledger.stipend_hour_utc {
            return Ok(());
        }

        if let Some(credited) = self.casino.pay_daily_stipend(now.date_naive())? {
            tracing::info!(accounts = credited, day = %now.date_naive(), "Daily stipend paid");
        }
        Ok(())
    }

    fn log_stats(&self, start_time: Instant) {
        let snapshot = self.casino.metrics();
        tracing::info!(
            uptime_secs = start_time.elapsed().as_secs(),
            bets_placed = snapshot.bets_placed,
            bets_rejected = snapshot.bets_rejected,
            spins = snapshot.spins,
            wagered = snapshot.total_wagered,
            paid_out = snapshot.total_paid_out,
            pending_stake = self.casino.pending_stake(),
            "Casino stats"
        );
    }
}
