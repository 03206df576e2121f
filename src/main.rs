use dotenv::dotenv;
use env_logger;
use log::{error, info, warn};
use meter_alert_bot::config::Settings;
use meter_alert_bot::handlers::status::ServiceInfo;
use meter_alert_bot::routes;
use meter_alert_bot::services::monitor::MeterMonitor;
use meter_alert_bot::services::notifier::notifier_from_settings;
use meter_alert_bot::services::scheduler::MeterScheduler;
use meter_alert_bot::services::snapshot::SnapshotStore;
use meter_alert_bot::services::webdriver::WebDriverFactory;
use std::net::SocketAddr;
use std::sync::Arc;

#[tokio::main]
async fn main() {
    dotenv().ok();
    env_logger::init();
    info!("Logger initialized. Starting the electricity meter bot...");

    let settings = Settings::from_env();
    info!(
        "Monitoring {} meter(s), warning below {} {}",
        settings.meters.len(),
        settings.thresholds.low_balance,
        settings.currency_marker
    );

    let sessions = Arc::new(WebDriverFactory::new(
        settings.webdriver_url.clone(),
        settings.page_load_wait,
    ));
    let notifier = notifier_from_settings(&settings);
    let monitor = Arc::new(MeterMonitor::from_settings(&settings, sessions, notifier));

    if settings.test_run {
        info!("TEST_RUN set, running a single cycle...");
        monitor.run_cycle().await;
        return;
    }

    let scheduler = MeterScheduler::from_settings(&settings);

    // Keep-alive server
    let service = Arc::new(ServiceInfo {
        schedule: scheduler.labels(),
        timezone: scheduler.timezone().name().to_string(),
        meters: settings.meters.len(),
    });
    let snapshots = Arc::new(SnapshotStore::new(settings.snapshot_path.clone()));
    let addr: SocketAddr = ([0, 0, 0, 0], settings.port).into();
    info!("Starting keep-alive server on {}", addr);
    tokio::spawn(warp::serve(routes::routes(service, snapshots)).run(addr));

    let job_monitor = monitor.clone();
    let mut cron = match scheduler
        .start(move || {
            let monitor = job_monitor.clone();
            async move {
                monitor.run_cycle().await;
            }
        })
        .await
    {
        Ok(cron) => cron,
        Err(e) => {
            error!("Failed to start scheduler: {}", e);
            return;
        }
    };

    if !monitor.announce_startup(&scheduler).await {
        warn!("Startup notification was not delivered");
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Shutting down scheduler");
    if let Err(e) = cron.shutdown().await {
        warn!("Scheduler shutdown failed: {:?}", e);
    }
}
