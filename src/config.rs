// src/config.rs
use chrono::NaiveTime;
use chrono_tz::Tz;
use log::{info, warn};
use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::models::Meter;

pub const DEFAULT_WEBSITE_URL: &str = "https://prepaid.desco.org.bd/customer/#/customer-login";
pub const DEFAULT_TIMEZONE: Tz = chrono_tz::Asia::Dhaka;
pub const UNKNOWN_NICKNAME: &str = "Unknown";

/// Numeric limits shared by the extractor and the evaluator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub low_balance: f64,
    pub recharge_floor: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Thresholds {
            low_balance: 100.0,
            recharge_floor: 500.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub chat_id: String,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub website_url: String,
    pub meters: Vec<Meter>,
    pub thresholds: Thresholds,
    pub currency_marker: String,
    pub excluded_balance_literals: Vec<String>,
    pub timezone: Tz,
    pub schedule_times: Vec<NaiveTime>,
    pub telegram: Option<TelegramConfig>,
    pub webdriver_url: String,
    pub page_load_wait: Duration,
    pub inter_account_delay: Duration,
    pub snapshot_path: PathBuf,
    pub port: u16,
    pub test_run: bool,
}

impl Settings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let meters = match get("METER_ACCOUNTS") {
            Some(raw) => parse_meters(&raw),
            None => {
                warn!("METER_ACCOUNTS not set, no meters will be checked");
                Vec::new()
            }
        };

        let defaults = Thresholds::default();
        let thresholds = Thresholds {
            low_balance: parse_amount_or("LOW_BALANCE_THRESHOLD", get("LOW_BALANCE_THRESHOLD"), defaults.low_balance),
            recharge_floor: parse_amount_or("RECHARGE_FLOOR", get("RECHARGE_FLOOR"), defaults.recharge_floor),
        };

        let timezone = match get("DISPLAY_TIMEZONE") {
            Some(name) => name.parse::<Tz>().unwrap_or_else(|_| {
                warn!("Unknown DISPLAY_TIMEZONE '{}', falling back to {}", name, DEFAULT_TIMEZONE);
                DEFAULT_TIMEZONE
            }),
            None => DEFAULT_TIMEZONE,
        };

        let schedule_times = parse_schedule_times(&get("SCHEDULE_TIMES").unwrap_or_else(|| "08:00".to_string()));

        let telegram = match (get("TELEGRAM_BOT_TOKEN"), get("TELEGRAM_CHAT_ID")) {
            (Some(bot_token), Some(chat_id)) => Some(TelegramConfig { bot_token, chat_id }),
            _ => {
                warn!("TELEGRAM_BOT_TOKEN or TELEGRAM_CHAT_ID not set, notifications are disabled");
                None
            }
        };

        let test_run = get("TEST_RUN")
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        Settings {
            website_url: get("METER_WEBSITE_URL").unwrap_or_else(|| DEFAULT_WEBSITE_URL.to_string()),
            meters,
            thresholds,
            currency_marker: get("CURRENCY_MARKER").unwrap_or_else(|| "BDT".to_string()),
            excluded_balance_literals: get("BALANCE_EXCLUDE_LITERALS")
                .map(|raw| {
                    raw.split('|')
                        .map(str::trim)
                        .filter(|l| !l.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
            timezone,
            schedule_times,
            telegram,
            webdriver_url: get("WEBDRIVER_URL").unwrap_or_else(|| "http://localhost:9515".to_string()),
            page_load_wait: Duration::from_secs(parse_or("PAGE_LOAD_WAIT_SECS", get("PAGE_LOAD_WAIT_SECS"), 5)),
            inter_account_delay: Duration::from_secs(parse_or(
                "INTER_ACCOUNT_DELAY_SECS",
                get("INTER_ACCOUNT_DELAY_SECS"),
                2,
            )),
            snapshot_path: PathBuf::from(get("SNAPSHOT_PATH").unwrap_or_else(|| "data.json".to_string())),
            port: parse_or("PORT", get("PORT"), 8080),
            test_run,
        }
    }

    pub fn account_ids(&self) -> Vec<String> {
        self.meters.iter().map(|m| m.id.clone()).collect()
    }

    pub fn nicknames(&self) -> HashMap<String, String> {
        self.meters
            .iter()
            .map(|m| (m.id.clone(), m.nickname.clone()))
            .collect()
    }

    pub fn schedule_labels(&self) -> Vec<String> {
        self.schedule_times
            .iter()
            .map(|t| t.format("%H:%M").to_string())
            .collect()
    }
}

fn parse_or<T>(key: &str, raw: Option<String>, default: T) -> T
where
    T: std::str::FromStr + std::fmt::Display + Copy,
{
    match raw {
        Some(value) => value.parse::<T>().unwrap_or_else(|_| {
            warn!("Invalid {} '{}', falling back to {}", key, value, default);
            default
        }),
        None => default,
    }
}

/// Currency limits must be finite and non-negative; `NaN` would disable every comparison.
fn parse_amount_or(key: &str, raw: Option<String>, default: f64) -> f64 {
    let value = parse_or(key, raw, default);
    if value.is_finite() && value >= 0.0 {
        value
    } else {
        warn!("Invalid {} '{}', falling back to {}", key, value, default);
        default
    }
}

/// Parses `id:nickname,id:nickname`. A bare id gets the unknown nickname.
pub fn parse_meters(raw: &str) -> Vec<Meter> {
    let mut meters: Vec<Meter> = Vec::new();
    for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let (id, nickname) = match entry.split_once(':') {
            Some((id, nick)) => (id.trim(), nick.trim()),
            None => (entry, ""),
        };
        if id.is_empty() || !id.chars().all(|c| c.is_ascii_digit()) {
            warn!("Skipping malformed meter entry '{}'", entry);
            continue;
        }
        if meters.iter().any(|m| m.id == id) {
            warn!("Skipping duplicate meter {}", id);
            continue;
        }
        let nickname = if nickname.is_empty() { UNKNOWN_NICKNAME } else { nickname };
        meters.push(Meter {
            id: id.to_string(),
            nickname: nickname.to_string(),
        });
    }
    meters
}

/// Normalises a wall-clock time such as `1:7` to `01:07`.
pub fn normalize_time_format(raw: &str) -> Option<String> {
    let (h, m) = raw.trim().split_once(':')?;
    let hour: u32 = h.trim().parse().ok()?;
    let minute: u32 = m.trim().parse().ok()?;
    if hour > 23 || minute > 59 {
        return None;
    }
    Some(format!("{:02}:{:02}", hour, minute))
}

pub fn parse_schedule_times(raw: &str) -> Vec<NaiveTime> {
    let mut times: Vec<NaiveTime> = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let parsed = normalize_time_format(part)
            .and_then(|normalized| NaiveTime::parse_from_str(&normalized, "%H:%M").ok());
        match parsed {
            Some(time) if !times.contains(&time) => times.push(time),
            Some(_) => {}
            None => warn!("Ignoring invalid schedule time '{}'", part),
        }
    }

    if times.is_empty() {
        warn!("No valid schedule times in '{}', falling back to 08:00", raw);
        times.push(NaiveTime::from_hms_opt(8, 0, 0).unwrap_or_default());
    }
    info!(
        "Schedule times: {:?}",
        times.iter().map(|t| t.format("%H:%M").to_string()).collect::<Vec<_>>()
    );
    times
}
