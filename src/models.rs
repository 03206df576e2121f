// src/models.rs
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Text located for one field on the meter page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldText {
    Found(String),
    NotFound,
    /// The matcher itself could not run.
    Error,
}

impl FieldText {
    pub fn as_found(&self) -> Option<&str> {
        match self {
            FieldText::Found(text) => Some(text),
            _ => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, FieldText::Found(_))
    }
}

impl Default for FieldText {
    fn default() -> Self {
        FieldText::NotFound
    }
}

impl fmt::Display for FieldText {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            FieldText::Found(text) => write!(f, "{}", text),
            FieldText::NotFound => write!(f, "Not found"),
            FieldText::Error => write!(f, "Error"),
        }
    }
}

/// Structured facts pulled from one account's page. Absent numbers are a
/// normal outcome, not a failure.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AccountFields {
    pub balance_text: FieldText,
    pub balance_numeric: Option<f64>,
    pub reading_time_text: FieldText,
    pub reading_timestamp: Option<NaiveDateTime>,
    pub recharge_amount_text: FieldText,
    pub recharge_amount_numeric: Option<f64>,
    pub recharge_date_text: FieldText,
    pub recharge_timestamp: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Meter {
    pub id: String,
    pub nickname: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VerdictStatus {
    Warning,
    RecentlyRecharged,
    Sufficient,
    Failed,
}

impl fmt::Display for VerdictStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let label = match self {
            VerdictStatus::Warning => "LOW BALANCE WARNING",
            VerdictStatus::RecentlyRecharged => "RECENTLY RECHARGED",
            VerdictStatus::Sufficient => "SUFFICIENT BALANCE",
            VerdictStatus::Failed => "FAILED",
        };
        write!(f, "{}", label)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AccountVerdict {
    pub account_id: String,
    pub nickname: String,
    pub status: VerdictStatus,
    pub balance: Option<f64>,
    /// Balance as the portal printed it, sign included.
    pub balance_text: Option<String>,
    pub recharge_amount: Option<f64>,
    pub error: Option<String>,
}

impl AccountVerdict {
    pub fn failed(meter: &Meter, error: impl Into<String>) -> Self {
        AccountVerdict {
            account_id: meter.id.clone(),
            nickname: meter.nickname.clone(),
            status: VerdictStatus::Failed,
            balance: None,
            balance_text: None,
            recharge_amount: None,
            error: Some(error.into()),
        }
    }
}

/// Verdicts of one scrape cycle, in configured account order.
#[derive(Debug, Clone, PartialEq)]
pub struct FleetReport {
    pub started_at: DateTime<Utc>,
    pub verdicts: Vec<AccountVerdict>,
}

impl FleetReport {
    pub fn new(started_at: DateTime<Utc>) -> Self {
        FleetReport {
            started_at,
            verdicts: Vec::new(),
        }
    }

    pub fn with_status(&self, status: VerdictStatus) -> impl Iterator<Item = &AccountVerdict> {
        self.verdicts.iter().filter(move |v| v.status == status)
    }

    pub fn warnings(&self) -> Vec<&AccountVerdict> {
        self.with_status(VerdictStatus::Warning).collect()
    }

    pub fn recently_recharged(&self) -> Vec<&AccountVerdict> {
        self.with_status(VerdictStatus::RecentlyRecharged).collect()
    }

    /// Configured total minus warnings minus recharged.
    pub fn sufficient_count(&self) -> usize {
        self.verdicts.len() - self.warnings().len() - self.recently_recharged().len()
    }

    pub fn all_failed(&self) -> bool {
        !self.verdicts.is_empty()
            && self.verdicts.iter().all(|v| v.status == VerdictStatus::Failed)
    }
}

/// Flat record of the last scraped account, kept on disk for diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeterSnapshot {
    pub timestamp: String,
    pub account_number: String,
    pub nickname: String,
    pub status: String,
    pub remaining_balance: String,
    pub reading_time: String,
    pub last_recharge_amount: String,
    pub last_recharge_date: String,
    pub balance_numeric: Option<f64>,
    pub recharge_amount_numeric: Option<f64>,
    pub recently_recharged: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl MeterSnapshot {
    pub fn from_fields(
        meter: &Meter,
        fields: &AccountFields,
        recently_recharged: bool,
        taken_at: DateTime<Utc>,
    ) -> Self {
        MeterSnapshot {
            timestamp: taken_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            account_number: meter.id.clone(),
            nickname: meter.nickname.clone(),
            status: "success".to_string(),
            remaining_balance: fields.balance_text.to_string(),
            reading_time: fields.reading_time_text.to_string(),
            last_recharge_amount: fields.recharge_amount_text.to_string(),
            last_recharge_date: fields.recharge_date_text.to_string(),
            balance_numeric: fields.balance_numeric,
            recharge_amount_numeric: fields.recharge_amount_numeric,
            recently_recharged,
            error_message: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verdict(id: &str, status: VerdictStatus) -> AccountVerdict {
        AccountVerdict {
            account_id: id.to_string(),
            nickname: id.to_string(),
            status,
            balance: None,
            balance_text: None,
            recharge_amount: None,
            error: None,
        }
    }

    #[test]
    fn test_sufficient_count_is_total_minus_alerts() {
        let mut report = FleetReport::new(Utc::now());
        report.verdicts = vec![
            verdict("1", VerdictStatus::Warning),
            verdict("2", VerdictStatus::RecentlyRecharged),
            verdict("3", VerdictStatus::Sufficient),
            verdict("4", VerdictStatus::Failed),
        ];
        assert_eq!(report.warnings().len(), 1);
        assert_eq!(report.recently_recharged().len(), 1);
        assert_eq!(report.sufficient_count(), 2);
        assert!(!report.all_failed());
    }

    #[test]
    fn test_all_failed_requires_entries() {
        let mut report = FleetReport::new(Utc::now());
        assert!(!report.all_failed());
        report.verdicts.push(verdict("1", VerdictStatus::Failed));
        assert!(report.all_failed());
    }

    #[test]
    fn test_field_text_display() {
        assert_eq!(FieldText::NotFound.to_string(), "Not found");
        assert_eq!(FieldText::Error.to_string(), "Error");
        assert_eq!(FieldText::Found("12 BDT".into()).to_string(), "12 BDT");
    }
}
