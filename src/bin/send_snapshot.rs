use meter_alert_bot::config::Settings;
use meter_alert_bot::services::formatter::ReportFormatter;
use meter_alert_bot::services::notifier::notifier_from_settings;
use meter_alert_bot::services::snapshot::SnapshotStore;
use log::{info, warn};
use env_logger;
use dotenv::dotenv;
use chrono::Utc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::init();

    let settings = Settings::from_env();
    let formatter = ReportFormatter::from_settings(&settings);
    let store = SnapshotStore::new(settings.snapshot_path.clone());

    let message = match store.load().await {
        Ok(snapshot) => {
            info!("Loaded snapshot for {} taken {}", snapshot.account_number, snapshot.timestamp);
            formatter.format_meter_snapshot(&snapshot, Utc::now())
        }
        Err(e) => {
            warn!("No usable snapshot at {}: {}", store.path().display(), e);
            formatter.format_missing_snapshot()
        }
    };

    let notifier = notifier_from_settings(&settings);
    if !notifier.deliver(&message).await {
        anyhow::bail!("failed to deliver snapshot message");
    }
    info!("Snapshot message delivered");
    Ok(())
}
