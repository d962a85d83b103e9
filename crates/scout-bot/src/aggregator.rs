use std::time::{Duration, Instant};

use chrono::Utc;
use scout_core::report::{self, FacetData};
use scout_core::{FacetKind, ScoutError, ScoutResult, WalletIdentifier, WalletReport};

use crate::config::ReportConfig;
use crate::gateway::MarketplaceGateway;

/// Result of checking one wallet in a batch
#[derive(Debug)]
pub struct BatchEntry {
    pub wallet: WalletIdentifier,
    pub result: ScoutResult<WalletReport>,
}

#[derive(Debug)]
pub struct BatchOutcome {
    pub entries: Vec<BatchEntry>,
    /// Wallets submitted, including the ones past the batch cap
    pub total: usize,
}

impl BatchOutcome {
    pub fn skipped(&self) -> usize {
        self.total.saturating_sub(self.entries.len())
    }

    pub fn is_truncated(&self) -> bool {
        self.skipped() > 0
    }
}

#[derive(Clone)]
pub struct Aggregator {
    gateway: MarketplaceGateway,
    settings: ReportConfig,
}

impl Aggregator {
    pub fn new(gateway: MarketplaceGateway, settings: &ReportConfig) -> Self {
        tracing::debug!(
            max_batch = settings.max_batch,
            batch_delay_ms = settings.batch_delay_ms,
            report_timeout_ms = settings.report_timeout_ms,
            "Initializing aggregator"
        );
        Self {
            gateway,
            settings: settings.clone(),
        }
    }

    /// Build the report for one address.
    ///
    /// Facet failures are already contained by the gateway; this only fails
    /// when the fan-out as a whole does not finish within the deadline.
    pub async fn build_report(&self, address: &str) -> ScoutResult<WalletReport> {
        let start = Instant::now();
        let deadline = Duration::from_millis(self.settings.report_timeout_ms);

        tracing::info!(wallet = %address, "Building wallet report");

        let data = tokio::time::timeout(deadline, self.collect_facets(address))
            .await
            .map_err(|_| {
                tracing::error!(
                    wallet = %address,
                    timeout_ms = self.settings.report_timeout_ms,
                    "Wallet report timed out"
                );
                ScoutError::wallet_check_failed(
                    address,
                    format!("no response within {}ms", self.settings.report_timeout_ms),
                )
            })?;

        let report = report::assemble(
            address,
            data,
            self.settings.recent_activity_limit,
            Utc::now(),
        );

        tracing::info!(
            wallet = %address,
            trading_count = report.trading_count,
            listed = report.listed_count(),
            escrow = %report.escrow_balance,
            offers_made = report.offers_made_count(),
            offers_received = report.offers_received_count(),
            degraded = ?report.degraded,
            duration_ms = %start.elapsed().as_millis(),
            "Wallet report ready"
        );

        Ok(report)
    }

    /// Issue all five facet requests at once and wait for every one of them.
    async fn collect_facets(&self, address: &str) -> FacetData {
        let (activity, tokens, escrow, offers_made, offers_received) = tokio::join!(
            self.gateway.fetch_activity(address),
            self.gateway.fetch_tokens(address),
            self.gateway.fetch_escrow_balance(address),
            self.gateway.fetch_offers_made(address),
            self.gateway.fetch_offers_received(address),
        );

        let degraded = [
            (FacetKind::Activity, activity.is_degraded()),
            (FacetKind::Tokens, tokens.is_degraded()),
            (FacetKind::Escrow, escrow.is_degraded()),
            (FacetKind::OffersMade, offers_made.is_degraded()),
            (FacetKind::OffersReceived, offers_received.is_degraded()),
        ]
        .into_iter()
        .filter_map(|(kind, degraded)| degraded.then_some(kind))
        .collect();

        FacetData {
            activity: activity.into_value(),
            tokens: tokens.into_value(),
            escrow_balance: escrow.into_value(),
            offers_made: offers_made.into_value(),
            offers_received: offers_received.into_value(),
            degraded,
        }
    }

    /// Check wallets one after another, up to the batch cap, pausing between checks.
    pub async fn check_batch(&self, wallets: &[WalletIdentifier]) -> BatchOutcome {
        let limit = wallets.len().min(self.settings.max_batch);
        let delay = Duration::from_millis(self.settings.batch_delay_ms);
        let mut entries = Vec::with_capacity(limit);

        tracing::info!(
            total = wallets.len(),
            checking = limit,
            "Starting batch wallet check"
        );

        for (i, wallet) in wallets.iter().take(limit).enumerate() {
            let result = self.build_report(wallet.address()).await;
            if let Err(e) = &result {
                tracing::warn!(wallet = %wallet.address(), error = %e, "Batch entry failed");
            }
            entries.push(BatchEntry {
                wallet: wallet.clone(),
                result,
            });

            if i + 1 < limit && !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }

        BatchOutcome {
            entries,
            total: wallets.len(),
        }
    }
}
