// src/services/monitor.rs
use chrono::Utc;
use log::{error, info};
use std::sync::Arc;

use super::aggregator::FleetAggregator;
use super::browser::SessionFactory;
use super::formatter::ReportFormatter;
use super::notifier::Notifier;
use super::scheduler::MeterScheduler;
use crate::config::Settings;
use crate::models::FleetReport;

/// One scheduled run: scrape every meter, then notify if anything needs attention.
pub struct MeterMonitor {
    aggregator: FleetAggregator,
    notifier: Arc<dyn Notifier>,
    formatter: ReportFormatter,
    account_ids: Vec<String>,
}

impl MeterMonitor {
    pub fn new(
        aggregator: FleetAggregator,
        notifier: Arc<dyn Notifier>,
        formatter: ReportFormatter,
        account_ids: Vec<String>,
    ) -> Self {
        MeterMonitor {
            aggregator,
            notifier,
            formatter,
            account_ids,
        }
    }

    pub fn from_settings(
        settings: &Settings,
        sessions: Arc<dyn SessionFactory>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self::new(
            FleetAggregator::from_settings(settings, sessions),
            notifier,
            ReportFormatter::from_settings(settings),
            settings.account_ids(),
        )
    }

    pub fn formatter(&self) -> &ReportFormatter {
        &self.formatter
    }

    pub async fn run_cycle(&self) -> FleetReport {
        info!("Starting meter check for {} account(s)", self.account_ids.len());
        let report = self.aggregator.run_cycle(&self.account_ids).await;

        if report.all_failed() {
            error!("Every meter failed to scrape this cycle");
            let message = self.formatter.format_cycle_failure(report.started_at);
            if !self.notifier.deliver(&message).await {
                error!("Failed to deliver cycle failure notice");
            }
            return report;
        }

        match self.formatter.format_report(&report) {
            Some(message) => {
                if self.notifier.deliver(&message).await {
                    info!("Meter report delivered");
                } else {
                    error!("Failed to deliver meter report");
                }
            }
            None => info!("All meters have sufficient balance, no notification needed"),
        }
        report
    }

    pub async fn announce_startup(&self, scheduler: &MeterScheduler) -> bool {
        let message = self
            .formatter
            .format_startup(&scheduler.labels(), scheduler.next_run_after(Utc::now()));
        self.notifier.deliver(&message).await
    }
}
