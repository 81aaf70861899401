//! Periodic reconciliation of the local cache against the node.
//!
//! Each cycle pulls the active-bet list, the node's basic info and every
//! active bet, derives the locally computed fields and writes them back.
//! Bets that drop out of the active list are flipped to inactive, never
//! deleted. Per-bet failures only cost that bet its refresh.

use std::collections::BTreeSet;
use std::future::Future;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use time::OffsetDateTime;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::enrich::enrich;
use crate::error::{CoreError, NodeError};
use crate::node::NodeClient;
use crate::store::Store;
use crate::types::{Bet, BetStatus, OptionParticipants};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Pause between cycle starts. Missed ticks are delayed, never burst.
    pub interval: Duration,
    /// Bet-info requests in flight at once.
    pub rpc_concurrency: usize,
    pub refresh_option_details: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(3),
            rpc_concurrency: 4,
            refresh_option_details: true,
        }
    }
}

/// Outcome of one cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Size of the active-id list; `None` when it could not be fetched.
    pub ids_seen: Option<usize>,
    pub basic_info_updated: bool,
    pub upserted: usize,
    pub failed: usize,
    pub deactivated: usize,
    /// Tick stored at the end of a fully successful cycle.
    pub tick_persisted: Option<u32>,
}

type FetchedBet = (Bet, Vec<(u32, OptionParticipants)>);

pub struct ReconciliationEngine {
    client: NodeClient,
    store: Store,
    config: EngineConfig,
    clock: fn() -> OffsetDateTime,
}

impl ReconciliationEngine {
    pub fn new(client: NodeClient, store: Store, config: EngineConfig) -> Self {
        Self {
            client,
            store,
            config,
            clock: OffsetDateTime::now_utc,
        }
    }

    /// Replace the wall clock used for bet expiry.
    pub fn with_clock(mut self, clock: fn() -> OffsetDateTime) -> Self {
        self.clock = clock;
        self
    }

    /// Run cycles on the configured interval until `shutdown` resolves.
    /// A cycle in progress when it resolves is dropped; every write already
    /// committed stays.
    pub async fn run_until<F>(&self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let mut ticker = tokio::time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut shutdown = std::pin::pin!(shutdown);

        info!(
            node = %self.client.address(),
            interval_ms = self.config.interval.as_millis() as u64,
            "reconciliation started"
        );
        loop {
            tokio::select! {
                biased;
                () = &mut shutdown => break,
                _ = ticker.tick() => {}
            }
            tokio::select! {
                biased;
                () = &mut shutdown => break,
                outcome = self.run_cycle() => {
                    if let Err(e) = outcome {
                        warn!(error = %e, "reconciliation cycle failed");
                    }
                }
            }
        }
        info!("reconciliation stopped");
    }

    /// One full pass. Node failures are absorbed into the report; only
    /// store failures outside a single bet's write abort the cycle.
    pub async fn run_cycle(&self) -> Result<CycleReport, CoreError> {
        let now = (self.clock)();
        let mut report = CycleReport::default();
        let mut clean = true;

        let active = match self.client.get_active_bet_ids().await {
            Ok(mut ids) => {
                ids.sort_unstable();
                ids.dedup();
                if ids.is_empty() {
                    warn!("node reported no active bets, nothing will be deactivated");
                }
                report.ids_seen = Some(ids.len());
                Some(ids)
            }
            Err(_) => {
                clean = false;
                None
            }
        };

        match self.client.get_basic_info().await {
            Ok(info) => {
                let node = self.client.address().clone();
                self.store
                    .blocking(move |s| s.replace_basic_info(&node, &info))
                    .await?;
                report.basic_info_updated = true;
            }
            Err(_) => clean = false,
        }

        if let Some(ids) = active {
            self.refresh_bets(&ids, now, &mut report).await;
            if report.failed > 0 {
                clean = false;
            }
            if !ids.is_empty() {
                report.deactivated = self.deactivate_stale(ids).await?;
            }
        }

        if clean {
            if let Ok(tick) = self.client.get_tick_info().await {
                let stored = self.store.blocking(move |s| s.write_tick(&tick)).await?;
                report.tick_persisted = Some(stored);
            }
        }

        info!(
            ids = report.ids_seen,
            upserted = report.upserted,
            failed = report.failed,
            deactivated = report.deactivated,
            tick = report.tick_persisted,
            "reconciliation cycle complete"
        );
        Ok(report)
    }

    /// Fetch every id with bounded fan-out and write the results back in id
    /// order, one transaction per bet.
    async fn refresh_bets(&self, ids: &[u32], now: OffsetDateTime, report: &mut CycleReport) {
        let mut fetched = stream::iter(ids.iter().copied())
            .map(|bet_id| self.fetch_bet(bet_id, now))
            .buffered(self.config.rpc_concurrency.max(1));

        while let Some(result) = fetched.next().await {
            let (bet, details) = match result {
                Ok(fetched) => fetched,
                Err(_) => {
                    report.failed += 1;
                    continue;
                }
            };
            let bet_id = bet.bet_id();
            match self
                .store
                .blocking(move |s| s.upsert_bet(&bet, &details))
                .await
            {
                Ok(()) => report.upserted += 1,
                Err(e) => {
                    warn!(bet_id, error = %e, "failed to store bet");
                    report.failed += 1;
                }
            }
        }
    }

    async fn fetch_bet(&self, bet_id: u32, now: OffsetDateTime) -> Result<FetchedBet, NodeError> {
        let info = self.client.get_bet_info(bet_id).await?;
        let bet = enrich(info, now);
        debug!(bet_id, status = %bet.status, result = bet.result, "bet fetched");

        let mut details = Vec::new();
        if self.config.refresh_option_details && bet.status == BetStatus::Active {
            for option in 0..bet.info.no_options {
                // Failures and empty options keep whatever rows are cached.
                if let Ok(participants) = self.client.get_bet_option_detail(bet_id, option).await {
                    details.push((option, participants));
                }
            }
        }
        Ok((bet, details))
    }

    async fn deactivate_stale(&self, active: Vec<u32>) -> Result<usize, CoreError> {
        let active: BTreeSet<u32> = active.into_iter().collect();
        let deactivated = self
            .store
            .blocking(move |s| {
                let stale: Vec<u32> = s.known_bet_ids()?.difference(&active).copied().collect();
                if !stale.is_empty() {
                    debug!(?stale, "bets left the active list");
                }
                s.mark_inactive(&stale)
            })
            .await?;
        Ok(deactivated)
    }
}
