// src/services/aggregator.rs
use chrono::Utc;
use log::{error, info, warn};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use super::browser::{BrowserSession, SessionFactory};
use super::evaluator::{classify, evaluate};
use super::extractor::{ExtractionRules, Extractor};
use super::snapshot::SnapshotStore;
use crate::config::{Settings, Thresholds, UNKNOWN_NICKNAME};
use crate::error::Result;
use crate::models::{AccountFields, AccountVerdict, FleetReport, Meter, MeterSnapshot, VerdictStatus};

/// Scrapes every configured meter in turn and classifies each one.
pub struct FleetAggregator {
    sessions: Arc<dyn SessionFactory>,
    extractor: Extractor,
    thresholds: Thresholds,
    website_url: String,
    nicknames: HashMap<String, String>,
    inter_account_delay: Duration,
    snapshots: Option<SnapshotStore>,
}

impl FleetAggregator {
    pub fn new(
        sessions: Arc<dyn SessionFactory>,
        extractor: Extractor,
        thresholds: Thresholds,
        website_url: impl Into<String>,
        nicknames: HashMap<String, String>,
    ) -> Self {
        FleetAggregator {
            sessions,
            extractor,
            thresholds,
            website_url: website_url.into(),
            nicknames,
            inter_account_delay: Duration::ZERO,
            snapshots: None,
        }
    }

    pub fn from_settings(settings: &Settings, sessions: Arc<dyn SessionFactory>) -> Self {
        let extractor = Extractor::new(ExtractionRules {
            currency_marker: settings.currency_marker.clone(),
            recharge_floor: settings.thresholds.recharge_floor,
            excluded_balance_literals: settings.excluded_balance_literals.clone(),
        });
        Self::new(
            sessions,
            extractor,
            settings.thresholds,
            settings.website_url.clone(),
            settings.nicknames(),
        )
        .with_inter_account_delay(settings.inter_account_delay)
        .with_snapshots(SnapshotStore::new(settings.snapshot_path.clone()))
    }

    pub fn with_inter_account_delay(mut self, delay: Duration) -> Self {
        self.inter_account_delay = delay;
        self
    }

    pub fn with_snapshots(mut self, store: SnapshotStore) -> Self {
        self.snapshots = Some(store);
        self
    }

    pub fn extractor(&self) -> &Extractor {
        &self.extractor
    }

    pub fn meter(&self, account_id: &str) -> Meter {
        Meter {
            id: account_id.to_string(),
            nickname: self
                .nicknames
                .get(account_id)
                .cloned()
                .unwrap_or_else(|| UNKNOWN_NICKNAME.to_string()),
        }
    }

    /// Logs in as `account_id` in a fresh session and returns the page text.
    /// The session is closed whether or not the scrape succeeded.
    pub async fn harvest(&self, account_id: &str) -> Result<Vec<String>> {
        let mut session = self.sessions.open().await?;
        let outcome = scrape_page(session.as_mut(), &self.website_url, account_id).await;
        if let Err(e) = session.close().await {
            warn!("Failed to close browser session for {}: {}", account_id, e);
        }
        outcome
    }

    /// Extraction, recharge evaluation and classification for already harvested text.
    pub fn assess(&self, meter: &Meter, fields: &AccountFields) -> AccountVerdict {
        let assessment = evaluate(fields, &self.thresholds);
        let status = classify(fields, &assessment, &self.thresholds);
        AccountVerdict {
            account_id: meter.id.clone(),
            nickname: meter.nickname.clone(),
            status,
            balance: fields.balance_numeric,
            balance_text: fields.balance_text.as_found().map(str::to_string),
            recharge_amount: assessment.recharge_amount_numeric,
            error: None,
        }
    }

    pub async fn check_account(&self, meter: &Meter) -> AccountVerdict {
        info!("=== Scraping Account: {} ({}) ===", meter.id, meter.nickname);
        let snippets = match self.harvest(&meter.id).await {
            Ok(snippets) => snippets,
            Err(e) => {
                error!("FAILED: Failed to scrape account {} ({}): {}", meter.id, meter.nickname, e);
                return AccountVerdict::failed(meter, e.to_string());
            }
        };

        let fields = self.extractor.extract(&snippets);
        let verdict = self.assess(meter, &fields);
        match verdict.status {
            VerdictStatus::RecentlyRecharged => info!(
                "{}: Account {} ({}) - {:?} recharged",
                verdict.status, meter.id, meter.nickname, verdict.recharge_amount
            ),
            _ => info!(
                "{}: Account {} ({}) has {:?}",
                verdict.status, meter.id, meter.nickname, verdict.balance
            ),
        }

        if let Some(store) = &self.snapshots {
            let snapshot = MeterSnapshot::from_fields(
                meter,
                &fields,
                verdict.status == VerdictStatus::RecentlyRecharged,
                Utc::now(),
            );
            if let Err(e) = store.save(&snapshot).await {
                warn!("Failed to save snapshot: {}", e);
            }
        }
        verdict
    }

    /// One verdict per id, in the given order. A failing account never stops the cycle.
    pub async fn run_cycle(&self, account_ids: &[String]) -> FleetReport {
        let mut report = FleetReport::new(Utc::now());
        for (index, account_id) in account_ids.iter().enumerate() {
            if index > 0 && !self.inter_account_delay.is_zero() {
                tokio::time::sleep(self.inter_account_delay).await;
            }
            let meter = self.meter(account_id);
            report.verdicts.push(self.check_account(&meter).await);
        }

        info!(
            "Cycle finished: {} warning(s), {} recently recharged, {} failed, {} total",
            report.warnings().len(),
            report.recently_recharged().len(),
            report.with_status(VerdictStatus::Failed).count(),
            report.verdicts.len()
        );
        report
    }
}

async fn scrape_page(
    session: &mut dyn BrowserSession,
    website_url: &str,
    account_id: &str,
) -> Result<Vec<String>> {
    session.navigate(website_url).await?;
    session.submit_login(account_id).await?;
    session.find_text().await
}
