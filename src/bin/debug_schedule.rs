use meter_alert_bot::config::Settings;
use meter_alert_bot::services::scheduler::MeterScheduler;
use log::{info, warn};
use env_logger;
use dotenv::dotenv;
use chrono::Utc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::init();

    let settings = Settings::from_env();
    let scheduler = MeterScheduler::from_settings(&settings);
    let timezone = scheduler.timezone();

    let now = Utc::now();
    info!("Current time:");
    info!("  UTC: {}", now);
    info!("  {}: {}", timezone.name(), now.with_timezone(&timezone));

    info!("Configured run times ({}):", timezone.name());
    for label in scheduler.labels() {
        info!("  {}", label);
    }

    match scheduler.due_slot(now) {
        Some(slot) => info!("Due this minute: {}", slot),
        None => info!("Nothing due this minute"),
    }

    info!("Upcoming runs:");
    for run in scheduler.upcoming_runs(now, 5) {
        info!("  {} ({} UTC)", run.format("%Y-%m-%d %H:%M %Z"), run.with_timezone(&Utc).format("%Y-%m-%d %H:%M"));
    }

    match scheduler.next_run_after(now) {
        Some(next) => {
            info!("Next run: {}", next.format("%Y-%m-%d %H:%M %Z"));
            info!("  in {} minute(s)", (next.with_timezone(&Utc) - now).num_minutes());
        }
        None => warn!("No upcoming run could be computed"),
    }

    Ok(())
}
