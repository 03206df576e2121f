use meter_alert_bot::config::Settings;
use meter_alert_bot::models::{MeterSnapshot, VerdictStatus};
use meter_alert_bot::services::aggregator::FleetAggregator;
use meter_alert_bot::services::snapshot::SnapshotStore;
use meter_alert_bot::services::webdriver::WebDriverFactory;
use log::{info, error};
use env_logger;
use dotenv::dotenv;
use chrono::Utc;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::init();

    let settings = Settings::from_env();
    let account_id = match std::env::args().nth(1) {
        Some(id) => id,
        None => settings
            .account_ids()
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("usage: scrape_meter <account-id>"))?,
    };

    let sessions = Arc::new(WebDriverFactory::new(
        settings.webdriver_url.clone(),
        settings.page_load_wait,
    ));
    let aggregator = FleetAggregator::from_settings(&settings, sessions);
    let meter = aggregator.meter(&account_id);
    info!("Scraping account {} ({})...", meter.id, meter.nickname);

    let snippets = match aggregator.harvest(&meter.id).await {
        Ok(snippets) => snippets,
        Err(e) => {
            error!("FAILED: {}", e);
            return Err(e.into());
        }
    };
    info!("Collected {} text snippet(s):", snippets.len());
    for snippet in &snippets {
        info!("  | {}", snippet);
    }

    let fields = aggregator.extractor().extract(&snippets);
    info!("Remaining balance: {} ({:?})", fields.balance_text, fields.balance_numeric);
    info!("Reading time: {} ({:?})", fields.reading_time_text, fields.reading_timestamp);
    info!(
        "Last recharge: {} on {} ({:?})",
        fields.recharge_amount_text, fields.recharge_date_text, fields.recharge_timestamp
    );

    let verdict = aggregator.assess(&meter, &fields);
    info!("Verdict: {}", verdict.status);

    let store = SnapshotStore::new(settings.snapshot_path.clone());
    let snapshot = MeterSnapshot::from_fields(
        &meter,
        &fields,
        verdict.status == VerdictStatus::RecentlyRecharged,
        Utc::now(),
    );
    store.save(&snapshot).await?;
    info!("Snapshot written to {}", store.path().display());

    Ok(())
}
