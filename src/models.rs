use std::str::FromStr;

use chrono::{DateTime, Duration, Local, NaiveDate, NaiveTime, SecondsFormat, Utc};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

use crate::error::{AppError, Result};

/// The two collections the dashboard keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum EntryKind {
    Income,
    Expense,
}

impl EntryKind {
    /// Remote table holding this kind.
    pub fn table(&self) -> &'static str {
        match self {
            EntryKind::Income => "income",
            EntryKind::Expense => "expenses",
        }
    }

    /// Fixed key of the local fallback snapshot.
    pub fn local_key(&self) -> &'static str {
        match self {
            EntryKind::Income => "carwash_income_v1",
            EntryKind::Expense => "carwash_expenses_v1",
        }
    }
}

/// Behaviour shared by income and expense entries.
///
/// `COLUMNS` lists the remote column names; `to_columns` and `from_columns`
/// map an entry to and from text values in that order. The first column is
/// always `id`.
pub trait Record:
    Clone + PartialEq + std::fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
    const KIND: EntryKind;
    const COLUMNS: &'static [&'static str];

    fn id(&self) -> &str;
    fn timestamp(&self) -> DateTime<Utc>;
    fn amount(&self) -> Decimal;
    fn to_columns(&self) -> Vec<String>;
    fn from_columns(columns: Vec<String>) -> Result<Self>;
    /// Case-insensitive match against the entry's searchable text.
    fn matches(&self, term: &str) -> bool;
}

#[derive(
    Debug,
    Clone,
    Copy,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Display,
    EnumString,
    EnumIter,
    Default,
)]
pub enum VehicleSize {
    Small,
    #[default]
    Medium,
    Large,
}

#[derive(
    Debug,
    Clone,
    Copy,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Display,
    EnumString,
    EnumIter,
    Default,
)]
pub enum PaymentMethod {
    Cash,
    Card,
    #[default]
    Pix,
}

/// A wash transaction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IncomeEntry {
    pub id: String,
    pub service_type: String,
    pub vehicle_size: VehicleSize,
    pub amount: Decimal,
    pub payment_method: PaymentMethod,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExpenseEntry {
    pub id: String,
    pub amount: Decimal,
    pub note: String,
    pub timestamp: DateTime<Utc>,
}

/// Timestamps are stored with millisecond precision and a `Z` suffix so that
/// text ordering matches time ordering.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| AppError::Deserialization(format!("Invalid timestamp {raw:?}: {e}")))
}

fn parse_amount(raw: &str) -> Result<Decimal> {
    Decimal::from_str(raw)
        .map_err(|e| AppError::Deserialization(format!("Invalid amount {raw:?}: {e}")))
}

fn take_columns<const N: usize>(kind: EntryKind, columns: Vec<String>) -> Result<[String; N]> {
    let found = columns.len();
    columns.try_into().map_err(|_| {
        AppError::Deserialization(format!(
            "Expected {N} columns for {kind}, found {found}"
        ))
    })
}

impl Record for IncomeEntry {
    const KIND: EntryKind = EntryKind::Income;
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "service_type",
        "vehicle_size",
        "amount",
        "payment_method",
        "timestamp",
    ];

    fn id(&self) -> &str {
        &self.id
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    fn amount(&self) -> Decimal {
        self.amount
    }

    fn to_columns(&self) -> Vec<String> {
        vec![
            self.id.clone(),
            self.service_type.clone(),
            self.vehicle_size.to_string(),
            self.amount.to_string(),
            self.payment_method.to_string(),
            format_timestamp(self.timestamp),
        ]
    }

    fn from_columns(columns: Vec<String>) -> Result<Self> {
        let [id, service_type, vehicle_size, amount, payment_method, timestamp] =
            take_columns(Self::KIND, columns)?;

        Ok(Self {
            vehicle_size: VehicleSize::from_str(&vehicle_size).map_err(|_| {
                AppError::Deserialization(format!("Invalid vehicle size: {vehicle_size}"))
            })?,
            payment_method: PaymentMethod::from_str(&payment_method).map_err(|_| {
                AppError::Deserialization(format!("Invalid payment method: {payment_method}"))
            })?,
            amount: parse_amount(&amount)?,
            timestamp: parse_timestamp(&timestamp)?,
            id,
            service_type,
        })
    }

    fn matches(&self, term: &str) -> bool {
        self.service_type
            .to_lowercase()
            .contains(&term.to_lowercase())
    }
}

impl Record for ExpenseEntry {
    const KIND: EntryKind = EntryKind::Expense;
    const COLUMNS: &'static [&'static str] = &["id", "amount", "note", "timestamp"];

    fn id(&self) -> &str {
        &self.id
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    fn amount(&self) -> Decimal {
        self.amount
    }

    fn to_columns(&self) -> Vec<String> {
        vec![
            self.id.clone(),
            self.amount.to_string(),
            self.note.clone(),
            format_timestamp(self.timestamp),
        ]
    }

    fn from_columns(columns: Vec<String>) -> Result<Self> {
        let [id, amount, note, timestamp] = take_columns(Self::KIND, columns)?;

        Ok(Self {
            amount: parse_amount(&amount)?,
            timestamp: parse_timestamp(&timestamp)?,
            id,
            note,
        })
    }

    fn matches(&self, term: &str) -> bool {
        self.note.to_lowercase().contains(&term.to_lowercase())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FinancialSummary {
    pub total_income: Decimal,
    pub total_expenses: Decimal,
    pub profit: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReportSummary {
    pub totals: FinancialSummary,
    pub income_count: usize,
    pub expense_count: usize,
    pub average_ticket: Decimal,
}

/// Income and expenses for one local calendar day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailyTotals {
    pub date: NaiveDate,
    pub income: Decimal,
    pub expenses: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentTotals {
    pub method: PaymentMethod,
    pub count: usize,
    pub total: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter, Default)]
pub enum DateRange {
    Today,
    Last7Days,
    Last30Days,
    Year,
    #[default]
    All,
}

impl DateRange {
    /// Inclusive bounds of the range relative to `now`, or `None` for
    /// [`DateRange::All`].
    pub fn bounds(&self, now: DateTime<Local>) -> Option<(DateTime<Local>, DateTime<Local>)> {
        let today = now.date_naive();
        let days_back = match self {
            DateRange::Today => 0,
            DateRange::Last7Days => 6,
            DateRange::Last30Days => 29,
            DateRange::Year => 364,
            DateRange::All => return None,
        };

        let start = local_at(today - Duration::days(days_back), NaiveTime::from_hms_opt(0, 0, 0)?)?;
        let end = local_at(today, NaiveTime::from_hms_milli_opt(23, 59, 59, 999)?)?;
        Some((start, end))
    }

    pub fn title(&self) -> &str {
        match self {
            DateRange::Today => "Today",
            DateRange::Last7Days => "Last 7 Days",
            DateRange::Last30Days => "Last 30 Days",
            DateRange::Year => "Last Year",
            DateRange::All => "All Time",
        }
    }

    pub fn next(&self) -> Self {
        match self {
            DateRange::Today => DateRange::Last7Days,
            DateRange::Last7Days => DateRange::Last30Days,
            DateRange::Last30Days => DateRange::Year,
            DateRange::Year => DateRange::All,
            DateRange::All => DateRange::Today,
        }
    }

    pub fn prev(&self) -> Self {
        match self {
            DateRange::Today => DateRange::All,
            DateRange::Last7Days => DateRange::Today,
            DateRange::Last30Days => DateRange::Last7Days,
            DateRange::Year => DateRange::Last30Days,
            DateRange::All => DateRange::Year,
        }
    }
}

fn local_at(date: NaiveDate, time: NaiveTime) -> Option<DateTime<Local>> {
    date.and_time(time)
        .and_local_timezone(Local)
        .earliest()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn wash() -> IncomeEntry {
        IncomeEntry {
            id: "a1".to_string(),
            service_type: "Full wash".to_string(),
            vehicle_size: VehicleSize::Large,
            amount: dec!(70.50),
            payment_method: PaymentMethod::Card,
            timestamp: Utc.with_ymd_and_hms(2026, 3, 14, 9, 30, 0).unwrap(),
        }
    }

    #[test]
    fn income_columns_survive_text_mapping() {
        let entry = wash();
        let columns = entry.to_columns();

        assert_eq!(columns.len(), IncomeEntry::COLUMNS.len());
        assert_eq!(columns[2], "Large");
        assert_eq!(columns[5], "2026-03-14T09:30:00.000Z");
        assert_eq!(IncomeEntry::from_columns(columns).unwrap(), entry);
    }

    #[test]
    fn expense_from_columns_rejects_bad_amount() {
        let columns = vec![
            "e1".to_string(),
            "ten".to_string(),
            "soap".to_string(),
            "2026-03-14T09:30:00.000Z".to_string(),
        ];

        assert!(matches!(
            ExpenseEntry::from_columns(columns),
            Err(AppError::Deserialization(_))
        ));
    }

    #[test]
    fn from_columns_rejects_wrong_arity() {
        let result = ExpenseEntry::from_columns(vec!["e1".to_string()]);
        assert!(matches!(result, Err(AppError::Deserialization(_))));
    }

    #[test]
    fn search_is_case_insensitive() {
        assert!(wash().matches("FULL"));
        assert!(!wash().matches("engine"));
    }

    #[test]
    fn last_seven_days_spans_seven_calendar_days() {
        let now = Local.with_ymd_and_hms(2026, 3, 14, 15, 0, 0).unwrap();
        let (start, end) = DateRange::Last7Days.bounds(now).unwrap();

        assert_eq!(start.date_naive(), NaiveDate::from_ymd_opt(2026, 3, 8).unwrap());
        assert_eq!(end.date_naive(), now.date_naive());
        assert!(DateRange::All.bounds(now).is_none());
    }

    #[test]
    fn date_range_cycles_both_ways() {
        for range in [DateRange::Today, DateRange::Year, DateRange::All] {
            assert_eq!(range.next().prev(), range);
        }
    }
}
