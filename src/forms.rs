use std::str::FromStr;

use chrono::{DateTime, Local, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use strum::IntoEnumIterator;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::{ExpenseEntry, IncomeEntry, PaymentMethod, VehicleSize};

pub const TIMESTAMP_INPUT_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Which form field has focus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FormField {
    #[default]
    ServiceType,
    VehicleSize,
    Amount,
    PaymentMethod,
    Timestamp,
    Note,
}

fn cycle<T: IntoEnumIterator + PartialEq + Copy>(current: T, forward: bool) -> T {
    let all: Vec<T> = T::iter().collect();
    let idx = all.iter().position(|v| *v == current).unwrap_or(0);
    let next = if forward {
        (idx + 1) % all.len()
    } else {
        (idx + all.len() - 1) % all.len()
    };
    all[next]
}

fn next_field(fields: &[FormField], current: FormField, forward: bool) -> FormField {
    let idx = fields.iter().position(|f| *f == current).unwrap_or(0);
    let next = if forward {
        (idx + 1) % fields.len()
    } else {
        (idx + fields.len() - 1) % fields.len()
    };
    fields[next]
}

pub fn parse_amount_input(raw: &str) -> Result<Decimal> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(AppError::Validation("Amount is required".into()));
    }
    let amount = Decimal::from_str(&raw.replace(',', "."))
        .map_err(|_| AppError::Validation(format!("Invalid amount: {raw}")))?;
    if amount <= Decimal::ZERO {
        return Err(AppError::Validation("Amount must be positive".into()));
    }
    Ok(amount)
}

/// Parse a local wall-clock time typed as `YYYY-MM-DD HH:MM`.
pub fn parse_timestamp_input(raw: &str) -> Result<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(raw.trim(), TIMESTAMP_INPUT_FORMAT).map_err(|_| {
        AppError::Validation(format!("Invalid date, expected YYYY-MM-DD HH:MM: {raw}"))
    })?;
    naive
        .and_local_timezone(Local)
        .earliest()
        .map(|ts| ts.with_timezone(&Utc))
        .ok_or_else(|| AppError::Validation(format!("Time does not exist locally: {raw}")))
}

pub fn format_timestamp_input(ts: DateTime<Utc>) -> String {
    ts.with_timezone(&Local)
        .format(TIMESTAMP_INPUT_FORMAT)
        .to_string()
}

/// The buffer only has minute precision, so an untouched buffer keeps the
/// stored timestamp as is.
fn resolve_timestamp(buffer: &str, original: Option<DateTime<Utc>>) -> Result<DateTime<Utc>> {
    match original {
        Some(ts) if buffer.trim() == format_timestamp_input(ts) => Ok(ts),
        _ => parse_timestamp_input(buffer),
    }
}

/// Buffers behind the income modal. `editing_id` is set when editing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomeForm {
    pub editing_id: Option<String>,
    pub service_type: String,
    pub vehicle_size: VehicleSize,
    pub amount: String,
    pub payment_method: PaymentMethod,
    pub timestamp: String,
    /// Timestamp of the entry being edited.
    pub original_timestamp: Option<DateTime<Utc>>,
    pub active: FormField,
}

impl IncomeForm {
    pub const FIELDS: &'static [FormField] = &[
        FormField::ServiceType,
        FormField::VehicleSize,
        FormField::Amount,
        FormField::PaymentMethod,
        FormField::Timestamp,
    ];

    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            editing_id: None,
            service_type: String::new(),
            vehicle_size: VehicleSize::default(),
            amount: String::new(),
            payment_method: PaymentMethod::default(),
            timestamp: format_timestamp_input(now),
            original_timestamp: None,
            active: FormField::ServiceType,
        }
    }

    pub fn edit(entry: &IncomeEntry) -> Self {
        Self {
            editing_id: Some(entry.id.clone()),
            service_type: entry.service_type.clone(),
            vehicle_size: entry.vehicle_size,
            amount: entry.amount.to_string(),
            payment_method: entry.payment_method,
            timestamp: format_timestamp_input(entry.timestamp),
            original_timestamp: Some(entry.timestamp),
            active: FormField::ServiceType,
        }
    }

    pub fn focus_next(&mut self, forward: bool) {
        self.active = next_field(Self::FIELDS, self.active, forward);
    }

    /// Left/Right on a choice field.
    pub fn cycle_choice(&mut self, forward: bool) {
        match self.active {
            FormField::VehicleSize => self.vehicle_size = cycle(self.vehicle_size, forward),
            FormField::PaymentMethod => self.payment_method = cycle(self.payment_method, forward),
            _ => {}
        }
    }

    pub fn push_char(&mut self, c: char) {
        match self.active {
            FormField::ServiceType => self.service_type.push(c),
            FormField::Amount => {
                if c.is_ascii_digit() || c == '.' || c == ',' {
                    self.amount.push(c);
                }
            }
            FormField::Timestamp => self.timestamp.push(c),
            _ => {}
        }
    }

    pub fn pop_char(&mut self) {
        match self.active {
            FormField::ServiceType => {
                self.service_type.pop();
            }
            FormField::Amount => {
                self.amount.pop();
            }
            FormField::Timestamp => {
                self.timestamp.pop();
            }
            _ => {}
        }
    }

    pub fn build(&self) -> Result<IncomeEntry> {
        let service_type = self.service_type.trim();
        if service_type.is_empty() {
            return Err(AppError::Validation("Service type is required".into()));
        }

        Ok(IncomeEntry {
            id: self
                .editing_id
                .clone()
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
            service_type: service_type.to_string(),
            vehicle_size: self.vehicle_size,
            amount: parse_amount_input(&self.amount)?,
            payment_method: self.payment_method,
            timestamp: resolve_timestamp(&self.timestamp, self.original_timestamp)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpenseForm {
    pub editing_id: Option<String>,
    pub amount: String,
    pub note: String,
    pub timestamp: String,
    pub original_timestamp: Option<DateTime<Utc>>,
    pub active: FormField,
}

impl ExpenseForm {
    pub const FIELDS: &'static [FormField] =
        &[FormField::Amount, FormField::Note, FormField::Timestamp];

    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            editing_id: None,
            amount: String::new(),
            note: String::new(),
            timestamp: format_timestamp_input(now),
            original_timestamp: None,
            active: FormField::Amount,
        }
    }

    pub fn edit(entry: &ExpenseEntry) -> Self {
        Self {
            editing_id: Some(entry.id.clone()),
            amount: entry.amount.to_string(),
            note: entry.note.clone(),
            timestamp: format_timestamp_input(entry.timestamp),
            original_timestamp: Some(entry.timestamp),
            active: FormField::Amount,
        }
    }

    pub fn focus_next(&mut self, forward: bool) {
        self.active = next_field(Self::FIELDS, self.active, forward);
    }

    pub fn push_char(&mut self, c: char) {
        match self.active {
            FormField::Amount => {
                if c.is_ascii_digit() || c == '.' || c == ',' {
                    self.amount.push(c);
                }
            }
            FormField::Note => self.note.push(c),
            FormField::Timestamp => self.timestamp.push(c),
            _ => {}
        }
    }

    pub fn pop_char(&mut self) {
        match self.active {
            FormField::Amount => {
                self.amount.pop();
            }
            FormField::Note => {
                self.note.pop();
            }
            FormField::Timestamp => {
                self.timestamp.pop();
            }
            _ => {}
        }
    }

    /// The note is optional.
    pub fn build(&self) -> Result<ExpenseEntry> {
        Ok(ExpenseEntry {
            id: self
                .editing_id
                .clone()
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
            amount: parse_amount_input(&self.amount)?,
            note: self.note.trim().to_string(),
            timestamp: resolve_timestamp(&self.timestamp, self.original_timestamp)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn filled_income() -> IncomeForm {
        IncomeForm {
            service_type: " Engine wash ".to_string(),
            amount: "35,50".to_string(),
            timestamp: "2026-07-01 14:05".to_string(),
            ..IncomeForm::new(Utc::now())
        }
    }

    #[test]
    fn valid_income_form_builds_entry() {
        let entry = filled_income().build().unwrap();

        assert_eq!(entry.service_type, "Engine wash");
        assert_eq!(entry.amount, dec!(35.50));
        assert_eq!(entry.vehicle_size, VehicleSize::Medium);
        assert_eq!(entry.payment_method, PaymentMethod::Pix);
        assert_eq!(
            entry.timestamp,
            Local.with_ymd_and_hms(2026, 7, 1, 14, 5, 0).unwrap().with_timezone(&Utc)
        );
        assert!(Uuid::parse_str(&entry.id).is_ok());
    }

    #[test]
    fn empty_service_type_blocks_submission() {
        let form = IncomeForm {
            service_type: "   ".to_string(),
            ..filled_income()
        };
        assert!(matches!(form.build(), Err(AppError::Validation(_))));
    }

    #[test]
    fn non_positive_or_missing_amounts_block_submission() {
        for amount in ["", "0", "0.00", "abc"] {
            let form = IncomeForm {
                amount: amount.to_string(),
                ..filled_income()
            };
            assert!(matches!(form.build(), Err(AppError::Validation(_))), "{amount:?}");
        }
    }

    #[test]
    fn bad_timestamp_blocks_submission() {
        let form = ExpenseForm {
            amount: "10".to_string(),
            timestamp: "yesterday".to_string(),
            ..ExpenseForm::new(Utc::now())
        };
        assert!(matches!(form.build(), Err(AppError::Validation(_))));
    }

    #[test]
    fn editing_keeps_the_original_id() {
        let original = ExpenseEntry {
            id: "keep-me".to_string(),
            amount: dec!(80),
            note: "Towels".to_string(),
            timestamp: Utc.with_ymd_and_hms(2026, 7, 1, 10, 0, 0).unwrap(),
        };
        let mut form = ExpenseForm::edit(&original);
        form.note.push_str(" and wax");

        let edited = form.build().unwrap();
        assert_eq!(edited.id, "keep-me");
        assert_eq!(edited.note, "Towels and wax");
        assert_eq!(edited.timestamp, original.timestamp);
    }

    #[test]
    fn untouched_edit_keeps_sub_minute_timestamp() {
        let original = IncomeEntry {
            id: "w1".to_string(),
            service_type: "Simple wash".to_string(),
            vehicle_size: VehicleSize::Small,
            amount: dec!(35.50),
            payment_method: PaymentMethod::Cash,
            timestamp: "2026-09-01T12:00:42.250Z".parse().unwrap(),
        };

        assert_eq!(IncomeForm::edit(&original).build().unwrap(), original);
    }

    #[test]
    fn edited_timestamp_is_parsed_from_the_buffer() {
        let original = ExpenseEntry {
            id: "e1".to_string(),
            amount: dec!(20),
            note: String::new(),
            timestamp: "2026-09-01T12:00:42.250Z".parse().unwrap(),
        };
        let mut form = ExpenseForm::edit(&original);
        form.timestamp = "2026-09-02 08:30".to_string();

        assert_eq!(
            form.build().unwrap().timestamp,
            Local.with_ymd_and_hms(2026, 9, 2, 8, 30, 0).unwrap().with_timezone(&Utc)
        );
    }

    #[test]
    fn expense_note_is_optional() {
        let form = ExpenseForm {
            amount: "12".to_string(),
            ..ExpenseForm::new(Utc::now())
        };
        assert_eq!(form.build().unwrap().note, "");
    }

    #[test]
    fn amount_field_only_accepts_numeric_input() {
        let mut form = IncomeForm::new(Utc::now());
        form.active = FormField::Amount;
        for c in "4x2.5".chars() {
            form.push_char(c);
        }
        assert_eq!(form.amount, "42.5");
    }

    #[test]
    fn focus_and_choices_wrap_around() {
        let mut form = IncomeForm::new(Utc::now());
        form.focus_next(false);
        assert_eq!(form.active, FormField::Timestamp);

        form.active = FormField::PaymentMethod;
        form.cycle_choice(true);
        assert_eq!(form.payment_method, PaymentMethod::Cash);
        form.cycle_choice(false);
        assert_eq!(form.payment_method, PaymentMethod::Pix);
    }
}
