use meter_alert_bot::config::Settings;
use meter_alert_bot::models::VerdictStatus;
use meter_alert_bot::services::monitor::MeterMonitor;
use meter_alert_bot::services::notifier::notifier_from_settings;
use meter_alert_bot::services::webdriver::WebDriverFactory;
use log::info;
use env_logger;
use dotenv::dotenv;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::init();

    let settings = Settings::from_env();
    info!("Running one meter check now for {} account(s)...", settings.meters.len());

    let sessions = Arc::new(WebDriverFactory::new(
        settings.webdriver_url.clone(),
        settings.page_load_wait,
    ));
    let monitor = MeterMonitor::from_settings(&settings, sessions, notifier_from_settings(&settings));
    let report = monitor.run_cycle().await;

    for verdict in &report.verdicts {
        info!(
            "  {} ({}): {} balance={:?} recharge={:?}",
            verdict.account_id, verdict.nickname, verdict.status, verdict.balance, verdict.recharge_amount
        );
    }
    info!(
        "Done: {} warning(s), {} recharged, {} failed",
        report.warnings().len(),
        report.recently_recharged().len(),
        report.with_status(VerdictStatus::Failed).count()
    );

    if report.all_failed() {
        anyhow::bail!("every account failed to scrape");
    }
    Ok(())
}
