// src/services/extractor.rs
//
// Turns the text snippets harvested from a meter page into typed fields.
// Each field is located by an ordered list of rules; the first rule (in
// RULES order) that finds a snippet for a still-empty field wins.
use chrono::{NaiveDate, NaiveDateTime};
use log::{debug, error};
use regex::Regex;

use crate::models::{AccountFields, FieldText};

pub const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];
pub const MAX_PLAUSIBLE_AMOUNT: f64 = 10_000.0;

const BALANCE_KEYWORDS: [&str; 2] = ["balance", "remaining"];
const READING_KEYWORDS: [&str; 2] = ["reading", "meter"];
const RECHARGE_KEYWORD: &str = "recharge";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Balance,
    ReadingTime,
    RechargeAmount,
    RechargeDate,
}

#[derive(Debug, Clone)]
pub struct ExtractionRules {
    pub currency_marker: String,
    pub recharge_floor: f64,
    /// Literals that disqualify a snippet from the balance fallback.
    pub excluded_balance_literals: Vec<String>,
}

impl Default for ExtractionRules {
    fn default() -> Self {
        ExtractionRules {
            currency_marker: "BDT".to_string(),
            recharge_floor: 500.0,
            excluded_balance_literals: Vec::new(),
        }
    }
}

struct Patterns {
    amount: Regex,
    datetime: Regex,
}

impl Patterns {
    fn compile() -> Result<Self, regex::Error> {
        Ok(Patterns {
            amount: Regex::new(r"\d[\d,]*(?:\.\d+)?")?,
            datetime: Regex::new(
                r"(\d{1,2})\s+(Jan|Feb|Mar|Apr|May|Jun|Jul|Aug|Sep|Oct|Nov|Dec)\s+(\d{4})\s+(\d{1,2}):(\d{2})",
            )?,
        })
    }

    fn amount(&self, text: &str) -> Option<f64> {
        let number = self.amount.find(text)?;
        let value = number.as_str().replace(',', "").parse::<f64>().ok()?;
        (0.0..=MAX_PLAUSIBLE_AMOUNT).contains(&value).then_some(value)
    }

    fn datetime(&self, text: &str) -> Option<NaiveDateTime> {
        let caps = self.datetime.captures(text)?;
        let day: u32 = caps[1].parse().ok()?;
        let month = MONTHS.iter().position(|m| *m == &caps[2])? as u32 + 1;
        let year: i32 = caps[3].parse().ok()?;
        let hour: u32 = caps[4].parse().ok()?;
        let minute: u32 = caps[5].parse().ok()?;
        NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, minute, 0)
    }
}

#[derive(Debug, Default)]
struct Located {
    balance: Option<String>,
    reading: Option<String>,
    recharge_amount: Option<String>,
    recharge_date: Option<String>,
}

impl Located {
    fn get(&self, field: Field) -> Option<&str> {
        match field {
            Field::Balance => self.balance.as_deref(),
            Field::ReadingTime => self.reading.as_deref(),
            Field::RechargeAmount => self.recharge_amount.as_deref(),
            Field::RechargeDate => self.recharge_date.as_deref(),
        }
    }

    fn set(&mut self, field: Field, text: String) {
        let slot = match field {
            Field::Balance => &mut self.balance,
            Field::ReadingTime => &mut self.reading,
            Field::RechargeAmount => &mut self.recharge_amount,
            Field::RechargeDate => &mut self.recharge_date,
        };
        *slot = Some(text);
    }
}

/// What a rule may consult besides the snippet itself.
pub struct MatchContext<'a> {
    rules: &'a ExtractionRules,
    patterns: &'a Patterns,
    located: &'a Located,
}

impl MatchContext<'_> {
    fn has_currency(&self, text: &str) -> bool {
        text.contains(self.rules.currency_marker.as_str())
    }

    fn is_located_as(&self, field: Field, text: &str) -> bool {
        self.located.get(field) == Some(text)
    }

    fn is_balance_related(&self, text: &str) -> bool {
        contains_any(&text.to_lowercase(), &BALANCE_KEYWORDS) || self.is_located_as(Field::Balance, text)
    }
}

type Matcher = fn(&str, &MatchContext<'_>) -> bool;

pub struct Rule {
    pub field: Field,
    pub name: &'static str,
    matches: Matcher,
}

/// Priority order: keyword rules for every field, then the fallbacks.
pub const RULES: [Rule; 8] = [
    Rule { field: Field::Balance, name: "balance keyword", matches: balance_keyword },
    Rule { field: Field::RechargeAmount, name: "recharge amount keyword", matches: recharge_amount_keyword },
    Rule { field: Field::RechargeDate, name: "recharge date keyword", matches: recharge_date_keyword },
    Rule { field: Field::ReadingTime, name: "reading time keyword", matches: reading_keyword },
    Rule { field: Field::Balance, name: "balance fallback", matches: balance_fallback },
    Rule { field: Field::ReadingTime, name: "reading time fallback", matches: reading_fallback },
    Rule { field: Field::RechargeAmount, name: "recharge amount fallback", matches: recharge_amount_fallback },
    Rule { field: Field::RechargeDate, name: "recharge date fallback", matches: recharge_date_fallback },
];

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}

fn has_month(text: &str) -> bool {
    contains_any(text, &MONTHS)
}

fn has_digit(text: &str) -> bool {
    text.chars().any(|c| c.is_ascii_digit())
}

fn mentions_recharge(text: &str) -> bool {
    text.to_lowercase().contains(RECHARGE_KEYWORD)
}

fn balance_keyword(text: &str, ctx: &MatchContext<'_>) -> bool {
    ctx.has_currency(text) && contains_any(&text.to_lowercase(), &BALANCE_KEYWORDS)
}

fn recharge_amount_keyword(text: &str, ctx: &MatchContext<'_>) -> bool {
    mentions_recharge(text) && ctx.has_currency(text) && !ctx.is_balance_related(text)
}

fn recharge_date_keyword(text: &str, ctx: &MatchContext<'_>) -> bool {
    mentions_recharge(text) && has_month(text) && !ctx.is_balance_related(text)
}

fn reading_keyword(text: &str, _ctx: &MatchContext<'_>) -> bool {
    contains_any(&text.to_lowercase(), &READING_KEYWORDS) && has_month(text)
}

// Best effort: any currency amount that is not a known recharge.
fn balance_fallback(text: &str, ctx: &MatchContext<'_>) -> bool {
    ctx.has_currency(text)
        && has_digit(text)
        && !mentions_recharge(text)
        && !ctx.is_located_as(Field::RechargeAmount, text)
        && !ctx
            .rules
            .excluded_balance_literals
            .iter()
            .any(|literal| text.contains(literal.as_str()))
}

fn reading_fallback(text: &str, ctx: &MatchContext<'_>) -> bool {
    has_month(text)
        && text.contains(':')
        && !mentions_recharge(text)
        && !ctx.is_located_as(Field::RechargeDate, text)
}

fn recharge_amount_fallback(text: &str, ctx: &MatchContext<'_>) -> bool {
    ctx.has_currency(text)
        && has_digit(text)
        && !ctx.is_balance_related(text)
        && ctx
            .patterns
            .amount(text)
            .map_or(false, |amount| amount >= ctx.rules.recharge_floor)
}

fn recharge_date_fallback(text: &str, ctx: &MatchContext<'_>) -> bool {
    has_month(text)
        && text.contains(':')
        && !ctx.is_balance_related(text)
        && !ctx.is_located_as(Field::ReadingTime, text)
}

pub struct Extractor {
    rules: ExtractionRules,
    patterns: Option<Patterns>,
}

impl Extractor {
    pub fn new(rules: ExtractionRules) -> Self {
        let patterns = match Patterns::compile() {
            Ok(patterns) => Some(patterns),
            Err(e) => {
                error!("Failed to compile extraction patterns: {}", e);
                None
            }
        };
        Extractor { rules, patterns }
    }

    pub fn rules(&self) -> &ExtractionRules {
        &self.rules
    }

    /// Never fails: misses become `NotFound`, a broken matcher becomes `Error`.
    pub fn extract(&self, snippets: &[String]) -> AccountFields {
        let patterns = match &self.patterns {
            Some(patterns) => patterns,
            None => {
                return AccountFields {
                    balance_text: FieldText::Error,
                    reading_time_text: FieldText::Error,
                    recharge_amount_text: FieldText::Error,
                    recharge_date_text: FieldText::Error,
                    ..AccountFields::default()
                }
            }
        };

        let mut located = Located::default();
        for rule in RULES.iter() {
            if located.get(rule.field).is_some() {
                continue;
            }
            let hit = {
                let ctx = MatchContext {
                    rules: &self.rules,
                    patterns,
                    located: &located,
                };
                snippets
                    .iter()
                    .map(|s| s.trim())
                    .filter(|s| !s.is_empty())
                    .find(|s| (rule.matches)(s, &ctx))
                    .map(str::to_string)
            };
            if let Some(text) = hit {
                debug!("{:?} located by {}: {}", rule.field, rule.name, text);
                located.set(rule.field, text);
            }
        }

        let text_of = |value: &Option<String>| match value {
            Some(text) => FieldText::Found(text.clone()),
            None => FieldText::NotFound,
        };

        AccountFields {
            balance_text: text_of(&located.balance),
            balance_numeric: located.balance.as_deref().and_then(|t| patterns.amount(t)),
            reading_time_text: text_of(&located.reading),
            reading_timestamp: located.reading.as_deref().and_then(|t| patterns.datetime(t)),
            recharge_amount_text: text_of(&located.recharge_amount),
            recharge_amount_numeric: located.recharge_amount.as_deref().and_then(|t| patterns.amount(t)),
            recharge_date_text: text_of(&located.recharge_date),
            recharge_timestamp: located.recharge_date.as_deref().and_then(|t| patterns.datetime(t)),
        }
    }

    /// First number in `text`, accepted only within `0..=10000`.
    pub fn parse_amount(&self, text: &str) -> Option<f64> {
        self.patterns.as_ref()?.amount(text)
    }

    /// Parses `<day> <Mon> <year> <hour>:<minute>` anywhere in `text`.
    pub fn parse_datetime(&self, text: &str) -> Option<NaiveDateTime> {
        self.patterns.as_ref()?.datetime(text)
    }
}

impl Default for Extractor {
    fn default() -> Self {
        Extractor::new(ExtractionRules::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snippets(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_amount() {
        let extractor = Extractor::default();
        assert_eq!(extractor.parse_amount("Remaining Balance: 135.25 BDT"), Some(135.25));
        assert_eq!(extractor.parse_amount("Current Balance: 1,250.00 BDT"), Some(1250.0));
        assert_eq!(extractor.parse_amount("Remaining Balance: -36.3 BDT"), Some(36.3));
        assert_eq!(extractor.parse_amount("Balance 45.75 BDT Reading time: 17 Aug 2025"), Some(45.75));
        assert_eq!(extractor.parse_amount("Not found"), None);
        assert_eq!(extractor.parse_amount("Error"), None);
    }

    #[test]
    fn test_parse_amount_rejects_implausible_first_number() {
        let extractor = Extractor::default();
        assert_eq!(extractor.parse_amount("Balance: 12,500.00 BDT"), None);
        assert_eq!(extractor.parse_amount("Balance 10000.01 BDT"), None);
        assert_eq!(extractor.parse_amount("Balance 10,000 BDT"), Some(10_000.0));
        assert_eq!(extractor.parse_amount("Account 37226784 balance 50 BDT"), None);
    }

    #[test]
    fn test_parse_datetime() {
        let extractor = Extractor::default();
        let parsed = extractor.parse_datetime("Recharge time: 17 Aug 2025 15:16").unwrap();
        assert_eq!(parsed.to_string(), "2025-08-17 15:16:00");
        let parsed = extractor.parse_datetime("10 Jul 2025 13:51").unwrap();
        assert_eq!(parsed.to_string(), "2025-07-10 13:51:00");
        assert_eq!(extractor.parse_datetime("Invalid date format"), None);
        assert_eq!(extractor.parse_datetime("31 Feb 2025 10:00"), None);
        assert_eq!(extractor.parse_datetime("17 Aug 2025 25:00"), None);
    }

    #[test]
    fn test_extract_keyword_matches() {
        let extractor = Extractor::default();
        let fields = extractor.extract(&snippets(&[
            "Customer Portal",
            "Remaining Balance: -36.3 BDT",
            "Reading time: 17 Aug 2025 00:00",
            "Last Recharge: 1,000.00 BDT",
            "Recharge time: 17 Aug 2025 15:16",
        ]));

        assert_eq!(fields.balance_text.as_found(), Some("Remaining Balance: -36.3 BDT"));
        assert_eq!(fields.balance_numeric, Some(36.3));
        assert_eq!(fields.reading_time_text.as_found(), Some("Reading time: 17 Aug 2025 00:00"));
        assert_eq!(fields.recharge_amount_numeric, Some(1000.0));
        assert_eq!(fields.recharge_date_text.as_found(), Some("Recharge time: 17 Aug 2025 15:16"));
        assert!(fields.reading_timestamp.unwrap() < fields.recharge_timestamp.unwrap());
    }

    #[test]
    fn test_extract_fallbacks() {
        let extractor = Extractor::default();
        let fields = extractor.extract(&snippets(&[
            "Last Recharge 3,000.00 BDT",
            "89.50 BDT",
            "17 Aug 2025 00:00",
            "10 Jul 2025 13:51",
        ]));

        // recharge keyword wins the amount, so the balance fallback skips it
        assert_eq!(fields.recharge_amount_numeric, Some(3000.0));
        assert_eq!(fields.balance_text.as_found(), Some("89.50 BDT"));
        assert_eq!(fields.balance_numeric, Some(89.5));
        assert_eq!(fields.reading_time_text.as_found(), Some("17 Aug 2025 00:00"));
        assert_eq!(fields.recharge_date_text.as_found(), Some("10 Jul 2025 13:51"));
    }

    #[test]
    fn test_recharge_fallback_requires_floor() {
        let extractor = Extractor::default();
        let fields = extractor.extract(&snippets(&["Remaining Balance: 80 BDT", "250.00 BDT"]));
        assert_eq!(fields.recharge_amount_text, FieldText::NotFound);
        assert_eq!(fields.recharge_amount_numeric, None);

        let fields = extractor.extract(&snippets(&["Remaining Balance: 80 BDT", "1,500.00 BDT"]));
        assert_eq!(fields.recharge_amount_numeric, Some(1500.0));
    }

    #[test]
    fn test_excluded_literals_skip_balance_fallback() {
        let extractor = Extractor::new(ExtractionRules {
            excluded_balance_literals: vec!["3,000".to_string()],
            ..ExtractionRules::default()
        });
        let fields = extractor.extract(&snippets(&["3,000.00 BDT", "42.00 BDT"]));
        assert_eq!(fields.balance_numeric, Some(42.0));
    }

    #[test]
    fn test_extract_nothing_found() {
        let extractor = Extractor::default();
        let fields = extractor.extract(&snippets(&["Login", "", "   "]));
        assert_eq!(fields, AccountFields::default());
    }

    #[test]
    fn test_implausible_balance_is_absent_but_text_kept() {
        let extractor = Extractor::default();
        let fields = extractor.extract(&snippets(&["Remaining Balance: 25,000.00 BDT"]));
        assert!(fields.balance_text.is_found());
        assert_eq!(fields.balance_numeric, None);
    }
}
