use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use crate::error::AppError;
use crate::filter::{filter, DateRange, FilterCriteria};
use crate::models::{Bill, BillStatus};
use crate::user_models::{User, UserRole, UserStatus};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BillSummary {
    pub total_bills: usize,
    pub total_amount: f64,
    pub pending: usize,
    pub paid: usize,
    pub overdue: usize,
    pub cancelled: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    pub total_users: usize,
    pub active_users: usize,
    pub admins: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryTotal {
    pub category: String,
    pub amount: f64,
    pub bills: usize,
    /// Share of the total amount, rounded to a whole percent.
    pub percentage: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VendorTotal {
    pub vendor: String,
    pub amount: f64,
    pub bills: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodTotal {
    pub period: String,
    pub amount: f64,
    pub bills: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportPeriod {
    #[default]
    Monthly,
    Quarterly,
    Yearly,
}

impl ReportPeriod {
    pub fn label(&self, date: NaiveDate) -> String {
        match self {
            ReportPeriod::Monthly => format!("{}-{:02}", date.year(), date.month()),
            ReportPeriod::Quarterly => format!("{}-Q{}", date.year(), (date.month() - 1) / 3 + 1),
            ReportPeriod::Yearly => date.year().to_string(),
        }
    }
}

impl fmt::Display for ReportPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ReportPeriod::Monthly => "monthly",
            ReportPeriod::Quarterly => "quarterly",
            ReportPeriod::Yearly => "yearly",
        })
    }
}

impl FromStr for ReportPeriod {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "monthly" => Ok(ReportPeriod::Monthly),
            "quarterly" => Ok(ReportPeriod::Quarterly),
            "yearly" => Ok(ReportPeriod::Yearly),
            other => Err(AppError::Validation(format!(
                "Unknown report period '{}'. Use monthly, quarterly or yearly",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub period: ReportPeriod,
    pub summary: BillSummary,
    pub by_category: Vec<CategoryTotal>,
    pub by_vendor: Vec<VendorTotal>,
    pub by_period: Vec<PeriodTotal>,
}

pub fn summarize_bills(bills: &[Bill]) -> BillSummary {
    let mut summary = BillSummary {
        total_bills: bills.len(),
        ..Default::default()
    };
    for bill in bills {
        summary.total_amount += bill.amount;
        match bill.status {
            BillStatus::Pending => summary.pending += 1,
            BillStatus::Paid => summary.paid += 1,
            BillStatus::Overdue => summary.overdue += 1,
            BillStatus::Cancelled => summary.cancelled += 1,
        }
    }
    summary
}

pub fn summarize_users(users: &[User]) -> UserSummary {
    UserSummary {
        total_users: users.len(),
        active_users: users.iter().filter(|u| u.status == UserStatus::Active).count(),
        admins: users.iter().filter(|u| u.role == UserRole::Admin).count(),
    }
}

pub fn totals_by_category(bills: &[Bill]) -> Vec<CategoryTotal> {
    let grand_total: f64 = bills.iter().map(|b| b.amount).sum();
    let mut totals: Vec<CategoryTotal> = group(bills, |b| b.category.clone())
        .into_iter()
        .map(|(category, (amount, count))| CategoryTotal {
            category,
            amount,
            bills: count,
            percentage: percentage_of(amount, grand_total),
        })
        .collect();
    totals.sort_by(|a, b| b.amount.total_cmp(&a.amount).then_with(|| a.category.cmp(&b.category)));
    totals
}

pub fn totals_by_vendor(bills: &[Bill]) -> Vec<VendorTotal> {
    let mut totals: Vec<VendorTotal> = group(bills, |b| b.vendor.clone())
        .into_iter()
        .map(|(vendor, (amount, count))| VendorTotal {
            vendor,
            amount,
            bills: count,
        })
        .collect();
    totals.sort_by(|a, b| b.amount.total_cmp(&a.amount).then_with(|| a.vendor.cmp(&b.vendor)));
    totals
}

/// Totals keyed on due date, in ascending period order.
pub fn totals_by_period(bills: &[Bill], period: ReportPeriod) -> Vec<PeriodTotal> {
    let mut buckets: BTreeMap<String, (f64, usize)> = BTreeMap::new();
    for bill in bills {
        let entry = buckets.entry(period.label(bill.due_date)).or_insert((0.0, 0));
        entry.0 += bill.amount;
        entry.1 += 1;
    }
    buckets
        .into_iter()
        .map(|(period, (amount, bills))| PeriodTotal {
            period,
            amount,
            bills,
        })
        .collect()
}

/// Builds the full report, optionally restricted to bills due inside `range`.
pub fn build_report(bills: &[Bill], period: ReportPeriod, range: Option<DateRange>) -> Report {
    let scoped = match range {
        Some(range) => filter(bills, &FilterCriteria {
            date_range: Some(range),
            ..Default::default()
        }),
        None => bills.to_vec(),
    };

    tracing::debug!(period = %period, bills = scoped.len(), "building report");

    Report {
        period,
        summary: summarize_bills(&scoped),
        by_category: totals_by_category(&scoped),
        by_vendor: totals_by_vendor(&scoped),
        by_period: totals_by_period(&scoped, period),
    }
}

fn group<F>(bills: &[Bill], key: F) -> HashMap<String, (f64, usize)>
where
    F: Fn(&Bill) -> String,
{
    let mut groups: HashMap<String, (f64, usize)> = HashMap::new();
    for bill in bills {
        let entry = groups.entry(key(bill)).or_insert((0.0, 0));
        entry.0 += bill.amount;
        entry.1 += 1;
    }
    groups
}

fn percentage_of(amount: f64, total: f64) -> u32 {
    if total <= 0.0 {
        return 0;
    }
    (amount / total * 100.0).round() as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;

    #[test]
    fn summary_counts_statuses() {
        let summary = summarize_bills(&fixtures::bills());
        assert_eq!(summary.total_bills, 5);
        assert_eq!(summary.pending, 2);
        assert_eq!(summary.paid, 2);
        assert_eq!(summary.overdue, 1);
        assert_eq!(summary.cancelled, 0);
        assert!((summary.total_amount - 8326.28).abs() < 1e-9);
    }

    #[test]
    fn user_summary_counts_active_and_admins() {
        let summary = summarize_users(&fixtures::users());
        assert_eq!(summary.total_users, 5);
        assert_eq!(summary.active_users, 4);
        assert_eq!(summary.admins, 1);
    }

    #[test]
    fn categories_sorted_by_amount_with_percentages() {
        let totals = totals_by_category(&fixtures::bills());
        assert_eq!(totals[0].category, "Rent");
        assert_eq!(totals[0].percentage, 60);
        assert_eq!(totals.last().unwrap().category, "Utilities");
        let sum: u32 = totals.iter().map(|t| t.percentage).sum();
        assert!((99..=101).contains(&sum));
    }

    #[test]
    fn period_labels() {
        let date = NaiveDate::from_ymd_opt(2024, 11, 3).unwrap();
        assert_eq!(ReportPeriod::Monthly.label(date), "2024-11");
        assert_eq!(ReportPeriod::Quarterly.label(date), "2024-Q4");
        assert_eq!(ReportPeriod::Yearly.label(date), "2024");
    }

    #[test]
    fn monthly_totals_are_ascending() {
        let totals = totals_by_period(&fixtures::bills(), ReportPeriod::Monthly);
        let labels: Vec<&str> = totals.iter().map(|t| t.period.as_str()).collect();
        assert_eq!(labels, vec!["2024-01", "2024-02", "2024-03"]);
        assert_eq!(totals[1].bills, 3);
    }

    #[test]
    fn report_scopes_to_open_date_range() {
        let range = DateRange::new(
            NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(),
        );
        let report = build_report(&fixtures::bills(), ReportPeriod::Yearly, Some(range));
        // 2024-02-01 and 2024-03-15 sit on the boundaries and are excluded.
        assert_eq!(report.summary.total_bills, 2);
        assert_eq!(report.by_period.len(), 1);
    }

    #[test]
    fn empty_input_yields_zero_percentages() {
        assert!(totals_by_category(&[]).is_empty());
        assert_eq!(percentage_of(10.0, 0.0), 0);
    }
}
