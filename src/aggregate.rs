//! Pure sums and averages behind the dashboard cards, charts and reports.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Local, NaiveDate};
use rust_decimal::Decimal;
use strum::IntoEnumIterator;

use crate::models::{
    DailyTotals, DateRange, ExpenseEntry, FinancialSummary, IncomeEntry, PaymentMethod,
    PaymentTotals, Record, ReportSummary,
};

pub fn total<E: Record>(entries: &[E]) -> Decimal {
    entries.iter().map(Record::amount).sum()
}

pub fn summarize(income: &[IncomeEntry], expenses: &[ExpenseEntry]) -> FinancialSummary {
    let total_income = total(income);
    let total_expenses = total(expenses);
    FinancialSummary {
        total_income,
        total_expenses,
        profit: total_income - total_expenses,
    }
}

/// Entries whose timestamp falls inside `range`, both ends inclusive.
pub fn filter_range<E: Record>(entries: &[E], range: DateRange, now: DateTime<Local>) -> Vec<E> {
    match range.bounds(now) {
        None => entries.to_vec(),
        Some((start, end)) => entries
            .iter()
            .filter(|e| {
                let ts = e.timestamp();
                ts >= start && ts <= end
            })
            .cloned()
            .collect(),
    }
}

pub fn report_summary(income: &[IncomeEntry], expenses: &[ExpenseEntry]) -> ReportSummary {
    let totals = summarize(income, expenses);
    let average_ticket = if income.is_empty() {
        Decimal::ZERO
    } else {
        (totals.total_income / Decimal::from(income.len())).round_dp(2)
    };

    ReportSummary {
        totals,
        income_count: income.len(),
        expense_count: expenses.len(),
        average_ticket,
    }
}

/// One point per local calendar day for the `days` days ending `today`,
/// oldest first. Entries outside the window are ignored.
pub fn daily_series(
    income: &[IncomeEntry],
    expenses: &[ExpenseEntry],
    days: u32,
    today: NaiveDate,
) -> Vec<DailyTotals> {
    let mut series: BTreeMap<NaiveDate, DailyTotals> = (0..i64::from(days))
        .map(|back| {
            let date = today - Duration::days(back);
            (
                date,
                DailyTotals {
                    date,
                    income: Decimal::ZERO,
                    expenses: Decimal::ZERO,
                },
            )
        })
        .collect();

    for entry in income {
        if let Some(day) = series.get_mut(&local_day(entry)) {
            day.income += entry.amount;
        }
    }
    for entry in expenses {
        if let Some(day) = series.get_mut(&local_day(entry)) {
            day.expenses += entry.amount;
        }
    }

    series.into_values().collect()
}

fn local_day<E: Record>(entry: &E) -> NaiveDate {
    entry.timestamp().with_timezone(&Local).date_naive()
}

/// Income totals for every payment method, including unused ones.
pub fn payment_breakdown(income: &[IncomeEntry]) -> Vec<PaymentTotals> {
    PaymentMethod::iter()
        .map(|method| {
            let paid: Vec<&IncomeEntry> =
                income.iter().filter(|e| e.payment_method == method).collect();
            PaymentTotals {
                method,
                count: paid.len(),
                total: paid.iter().map(|e| e.amount).sum(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::VehicleSize;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn wash(amount: Decimal, payment_method: PaymentMethod, ts: DateTime<Utc>) -> IncomeEntry {
        IncomeEntry {
            id: uuid::Uuid::new_v4().to_string(),
            service_type: "Wash".to_string(),
            vehicle_size: VehicleSize::Medium,
            amount,
            payment_method,
            timestamp: ts,
        }
    }

    fn expense(amount: Decimal, ts: DateTime<Utc>) -> ExpenseEntry {
        ExpenseEntry {
            id: uuid::Uuid::new_v4().to_string(),
            amount,
            note: String::new(),
            timestamp: ts,
        }
    }

    fn local(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Local
            .with_ymd_and_hms(y, m, d, h, 0, 0)
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn dashboard_totals_scenario() {
        let now = Utc::now();
        let income = vec![
            wash(dec!(70), PaymentMethod::Pix, now),
            wash(dec!(35), PaymentMethod::Cash, now),
        ];
        let expenses = vec![expense(dec!(50), now)];

        let summary = summarize(&income, &expenses);

        assert_eq!(summary.total_income, dec!(105.00));
        assert_eq!(summary.total_expenses, dec!(50.00));
        assert_eq!(summary.profit, dec!(55.00));
    }

    #[test]
    fn filtered_profit_is_filtered_income_minus_filtered_expenses() {
        let now = Local.with_ymd_and_hms(2026, 6, 30, 12, 0, 0).unwrap();
        let income = vec![
            wash(dec!(40), PaymentMethod::Card, local(2026, 6, 30, 8)),
            wash(dec!(25), PaymentMethod::Pix, local(2026, 6, 24, 0)),
            wash(dec!(90), PaymentMethod::Pix, local(2026, 6, 1, 9)),
        ];
        let expenses = vec![
            expense(dec!(15), local(2026, 6, 29, 18)),
            expense(dec!(200), local(2026, 5, 2, 10)),
        ];

        for range in [
            DateRange::Today,
            DateRange::Last7Days,
            DateRange::Last30Days,
            DateRange::Year,
            DateRange::All,
        ] {
            let inc = filter_range(&income, range, now);
            let exp = filter_range(&expenses, range, now);
            let summary = summarize(&inc, &exp);
            assert_eq!(summary.profit, total(&inc) - total(&exp), "{range}");
        }

        let week = filter_range(&income, DateRange::Last7Days, now);
        assert_eq!(total(&week), dec!(65));
    }

    #[test]
    fn range_bounds_are_inclusive() {
        let now = Local.with_ymd_and_hms(2026, 6, 30, 12, 0, 0).unwrap();
        let (start, end) = DateRange::Last7Days.bounds(now).unwrap();
        let income = vec![
            wash(dec!(1), PaymentMethod::Cash, start.with_timezone(&Utc)),
            wash(dec!(2), PaymentMethod::Cash, end.with_timezone(&Utc)),
            wash(
                dec!(4),
                PaymentMethod::Cash,
                (start - Duration::milliseconds(1)).with_timezone(&Utc),
            ),
        ];

        assert_eq!(total(&filter_range(&income, DateRange::Last7Days, now)), dec!(3));
    }

    #[test]
    fn report_summary_average_ticket() {
        let now = Utc::now();
        let income = vec![
            wash(dec!(70), PaymentMethod::Pix, now),
            wash(dec!(35), PaymentMethod::Cash, now),
            wash(dec!(20), PaymentMethod::Cash, now),
        ];

        let report = report_summary(&income, &[]);

        assert_eq!(report.income_count, 3);
        assert_eq!(report.expense_count, 0);
        assert_eq!(report.average_ticket, dec!(41.67));
        assert_eq!(report_summary(&[], &[]).average_ticket, Decimal::ZERO);
    }

    #[test]
    fn daily_series_buckets_by_local_day() {
        let today = NaiveDate::from_ymd_opt(2026, 6, 30).unwrap();
        let income = vec![
            wash(dec!(30), PaymentMethod::Pix, local(2026, 6, 30, 9)),
            wash(dec!(20), PaymentMethod::Pix, local(2026, 6, 30, 17)),
            wash(dec!(99), PaymentMethod::Pix, local(2026, 6, 1, 9)),
        ];
        let expenses = vec![expense(dec!(5), local(2026, 6, 28, 11))];

        let series = daily_series(&income, &expenses, 7, today);

        assert_eq!(series.len(), 7);
        assert_eq!(series[0].date, NaiveDate::from_ymd_opt(2026, 6, 24).unwrap());
        assert_eq!(series[6].income, dec!(50));
        assert_eq!(series[4].expenses, dec!(5));
        assert_eq!(series.iter().map(|d| d.income).sum::<Decimal>(), dec!(50));
    }

    #[test]
    fn payment_breakdown_lists_every_method() {
        let now = Utc::now();
        let income = vec![
            wash(dec!(70), PaymentMethod::Pix, now),
            wash(dec!(30), PaymentMethod::Pix, now),
            wash(dec!(35), PaymentMethod::Cash, now),
        ];

        let breakdown = payment_breakdown(&income);

        assert_eq!(
            breakdown,
            vec![
                PaymentTotals { method: PaymentMethod::Cash, count: 1, total: dec!(35) },
                PaymentTotals { method: PaymentMethod::Card, count: 0, total: Decimal::ZERO },
                PaymentTotals { method: PaymentMethod::Pix, count: 2, total: dec!(100) },
            ]
        );
    }
}
