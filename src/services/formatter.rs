// src/services/formatter.rs
//
// Pure rendering of Telegram (HTML parse mode) messages.
use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use crate::config::{Settings, Thresholds};
use crate::models::{FleetReport, MeterSnapshot};

pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[derive(Debug, Clone)]
pub struct ReportFormatter {
    pub timezone: Tz,
    pub currency: String,
    pub thresholds: Thresholds,
}

impl ReportFormatter {
    pub fn new(timezone: Tz, currency: impl Into<String>, thresholds: Thresholds) -> Self {
        ReportFormatter {
            timezone,
            currency: currency.into(),
            thresholds,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.timezone, settings.currency_marker.clone(), settings.thresholds)
    }

    pub fn display_time(&self, at: DateTime<Utc>) -> String {
        format!(
            "{} ({})",
            at.with_timezone(&self.timezone).format("%d %B %Y, %I:%M %p"),
            self.timezone.name()
        )
    }

    /// `None` when nothing needs attention and no message should be sent.
    pub fn format_report(&self, report: &FleetReport) -> Option<String> {
        let warnings = report.warnings();
        let recharged = report.recently_recharged();
        if warnings.is_empty() && recharged.is_empty() {
            return None;
        }

        let mut lines = vec![
            "⚡ <b>Electricity Meter Report</b>".to_string(),
            format!("📅 <b>Time:</b> {}", self.display_time(report.started_at)),
        ];

        if !warnings.is_empty() {
            lines.push(String::new());
            lines.push("🚨 <b>Low Balance Warning</b>".to_string());
            for verdict in &warnings {
                let mut balance = verdict
                    .balance
                    .map(|b| format!("{:.2} {}", b, self.currency))
                    .unwrap_or_else(|| "unknown".to_string());
                // The number loses any sign the portal printed.
                if let Some(shown) = &verdict.balance_text {
                    balance.push_str(&format!(" <i>({})</i>", escape_html(shown)));
                }
                lines.push(format!(
                    "• <b>{}</b> ({}): {}",
                    escape_html(&verdict.nickname),
                    escape_html(&verdict.account_id),
                    balance
                ));
            }
            lines.push("💡 Please recharge soon.".to_string());
        }

        if !recharged.is_empty() {
            lines.push(String::new());
            lines.push("🔋 <b>Recently Recharged</b>".to_string());
            for verdict in &recharged {
                let amount = verdict
                    .recharge_amount
                    .map(|a| format!("{:.2} {}", a, self.currency))
                    .unwrap_or_else(|| "unknown amount".to_string());
                lines.push(format!(
                    "• <b>{}</b> ({}): recharged {} today",
                    escape_html(&verdict.nickname),
                    escape_html(&verdict.account_id),
                    amount
                ));
            }
        }

        lines.push(String::new());
        lines.push(format!(
            "✅ {} other meter(s) have sufficient balance.",
            report.sufficient_count()
        ));

        Some(lines.join("\n"))
    }

    pub fn format_startup(&self, schedule: &[String], next_run: Option<DateTime<Tz>>) -> String {
        let next = next_run
            .map(|at| at.format("%d %B %Y, %I:%M %p").to_string())
            .unwrap_or_else(|| "unknown".to_string());
        format!(
            "🤖 <b>Electricity meter bot started!</b>\n📅 Scheduled daily at {} ({})\n⏰ Next run: {}",
            schedule.join(", "),
            self.timezone.name(),
            next
        )
    }

    pub fn format_cycle_failure(&self, at: DateTime<Utc>) -> String {
        format!("❌ Electricity meter scraping failed at {}", self.display_time(at))
    }

    pub fn format_missing_snapshot(&self) -> String {
        "❌ No meter data found. Scraper may have failed.".to_string()
    }

    /// Detailed single-meter report.
    pub fn format_meter_snapshot(&self, snapshot: &MeterSnapshot, now: DateTime<Utc>) -> String {
        let status_emoji = if snapshot.status == "success" { "✅" } else { "❌" };

        let (balance_emoji, advice) = match snapshot.balance_numeric {
            Some(b) if b < self.thresholds.low_balance => ("🚨", Some("⚠️ <b>WARNING: Low balance detected!</b>")),
            Some(b) if b < self.thresholds.recharge_floor => ("⚠️", Some("💡 <b>Consider recharging soon</b>")),
            _ => ("💰", None),
        };

        let mut message = format!(
            "{} <b>Electricity Meter Report</b>\n\
             📅 <b>Date:</b> {}\n\n\
             {} <b>Remaining Balance:</b> {}\n\
             ⏰ <b>Last Reading:</b> {}\n\n\
             💳 <b>Last Recharge:</b> {}\n\
             📆 <b>Recharge Date:</b> {}\n\n\
             🏠 <b>Account:</b> {} ({})\n\
             🔄 <b>Updated:</b> {}",
            status_emoji,
            self.display_time(now),
            balance_emoji,
            escape_html(&snapshot.remaining_balance),
            escape_html(&snapshot.reading_time),
            escape_html(&snapshot.last_recharge_amount),
            escape_html(&snapshot.last_recharge_date),
            escape_html(&snapshot.account_number),
            escape_html(&snapshot.nickname),
            escape_html(&snapshot.timestamp),
        );

        if let Some(advice) = advice {
            message.push_str("\n\n");
            message.push_str(advice);
        }
        message
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AccountVerdict, VerdictStatus};
    use chrono::TimeZone;

    fn formatter() -> ReportFormatter {
        ReportFormatter::new(chrono_tz::Asia::Dhaka, "BDT", Thresholds::default())
    }

    fn verdict(id: &str, nickname: &str, status: VerdictStatus, balance: Option<f64>, recharge: Option<f64>) -> AccountVerdict {
        AccountVerdict {
            account_id: id.to_string(),
            nickname: nickname.to_string(),
            status,
            balance,
            balance_text: None,
            recharge_amount: recharge,
            error: None,
        }
    }

    fn report(verdicts: Vec<AccountVerdict>) -> FleetReport {
        FleetReport {
            started_at: Utc.with_ymd_and_hms(2025, 8, 17, 3, 3, 0).unwrap(),
            verdicts,
        }
    }

    #[test]
    fn test_no_message_without_alerts() {
        let quiet = report(vec![
            verdict("1", "A", VerdictStatus::Sufficient, Some(150.0), None),
            verdict("2", "B", VerdictStatus::Failed, None, None),
        ]);
        assert_eq!(formatter().format_report(&quiet), None);
    }

    #[test]
    fn test_report_sections() {
        let mixed = report(vec![
            verdict("37226784", "Ayon", VerdictStatus::Warning, Some(89.5), None),
            verdict("37202772", "Arif", VerdictStatus::RecentlyRecharged, Some(36.3), Some(1000.0)),
            verdict("37195501", "Payel", VerdictStatus::Sufficient, Some(250.0), None),
        ]);
        let message = formatter().format_report(&mixed).unwrap();

        assert!(message.contains("17 August 2025, 09:03 AM (Asia/Dhaka)"));
        assert!(message.contains("• <b>Ayon</b> (37226784): 89.50 BDT"));
        assert!(message.contains("• <b>Arif</b> (37202772): recharged 1000.00 BDT today"));
        assert!(message.contains("1 other meter(s) have sufficient balance."));
    }

    #[test]
    fn test_warning_shows_scraped_balance_text() {
        let mut deficit = verdict("37202772", "Arif", VerdictStatus::Warning, Some(36.3), None);
        deficit.balance_text = Some("Remaining Balance: -36.3 BDT".to_string());
        let message = formatter().format_report(&report(vec![deficit])).unwrap();
        assert!(message.contains("• <b>Arif</b> (37202772): 36.30 BDT <i>(Remaining Balance: -36.3 BDT)</i>"));
    }

    #[test]
    fn test_report_is_deterministic() {
        let r = report(vec![verdict("1", "A", VerdictStatus::Warning, Some(10.0), None)]);
        let f = formatter();
        assert_eq!(f.format_report(&r), f.format_report(&r));
    }

    #[test]
    fn test_nicknames_are_escaped() {
        let r = report(vec![verdict("1", "<Tom & Jerry>", VerdictStatus::Warning, Some(10.0), None)]);
        let message = formatter().format_report(&r).unwrap();
        assert!(message.contains("&lt;Tom &amp; Jerry&gt;"));
    }

    #[test]
    fn test_meter_snapshot_tiers() {
        let mut snapshot = MeterSnapshot {
            timestamp: "2025-08-17 09:03:00".to_string(),
            account_number: "37226784".to_string(),
            nickname: "Ayon".to_string(),
            status: "success".to_string(),
            remaining_balance: "Remaining Balance: 89.50 BDT".to_string(),
            reading_time: "Not found".to_string(),
            last_recharge_amount: "Not found".to_string(),
            last_recharge_date: "Not found".to_string(),
            balance_numeric: Some(89.5),
            recharge_amount_numeric: None,
            recently_recharged: false,
            error_message: None,
        };
        let now = Utc.with_ymd_and_hms(2025, 8, 17, 3, 3, 0).unwrap();
        let f = formatter();

        let message = f.format_meter_snapshot(&snapshot, now);
        assert!(message.starts_with("✅"));
        assert!(message.contains("🚨 <b>Remaining Balance:</b>"));
        assert!(message.ends_with("WARNING: Low balance detected!</b>"));

        snapshot.balance_numeric = Some(300.0);
        assert!(f.format_meter_snapshot(&snapshot, now).ends_with("Consider recharging soon</b>"));

        snapshot.balance_numeric = Some(800.0);
        assert!(f.format_meter_snapshot(&snapshot, now).contains("💰 <b>Remaining Balance:</b>"));
    }

    #[test]
    fn test_startup_message() {
        let f = formatter();
        let next = chrono_tz::Asia::Dhaka.with_ymd_and_hms(2025, 8, 18, 8, 0, 0).single();
        let message = f.format_startup(&["08:00".to_string(), "20:00".to_string()], next);
        assert!(message.contains("08:00, 20:00 (Asia/Dhaka)"));
        assert!(message.contains("Next run: 18 August 2025, 08:00 AM"));
    }
}
