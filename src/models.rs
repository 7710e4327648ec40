use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::filter::FilterCriteria;
use crate::reports::BillSummary;

pub const SUGGESTED_CATEGORIES: [&str; 6] = [
    "Office Supplies",
    "Software",
    "Utilities",
    "Rent",
    "Travel",
    "Other",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BillStatus {
    Pending,
    Paid,
    Overdue,
    Cancelled,
}

impl BillStatus {
    pub const ALL: [BillStatus; 4] = [
        BillStatus::Pending,
        BillStatus::Paid,
        BillStatus::Overdue,
        BillStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BillStatus::Pending => "pending",
            BillStatus::Paid => "paid",
            BillStatus::Overdue => "overdue",
            BillStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for BillStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BillStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(BillStatus::Pending),
            "paid" => Ok(BillStatus::Paid),
            "overdue" => Ok(BillStatus::Overdue),
            "cancelled" => Ok(BillStatus::Cancelled),
            other => Err(AppError::Validation(format!(
                "Unknown bill status '{}'. Use pending, paid, overdue or cancelled",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bill {
    pub id: String,
    pub bill_number: String,
    pub vendor: String,
    pub amount: f64,
    pub due_date: NaiveDate,
    pub status: BillStatus,
    pub category: String,
    pub description: Option<String>,
    pub created_at: NaiveDate,
    pub updated_at: NaiveDate,
    #[serde(default)]
    pub attachments: Vec<String>,
}

impl Bill {
    pub fn new(
        bill_number: String,
        vendor: String,
        amount: f64,
        due_date: NaiveDate,
        category: String,
        description: Option<String>,
    ) -> Self {
        let today = Local::now().date_naive();
        Self {
            id: Uuid::new_v4().to_string(),
            bill_number,
            vendor,
            amount,
            due_date,
            status: BillStatus::Pending,
            category,
            description,
            created_at: today,
            updated_at: today,
            attachments: Vec::new(),
        }
    }

    /// Checks the record-level invariants: non-empty identifiers, a finite
    /// non-negative amount and `created_at <= updated_at`.
    pub fn validate(&self) -> AppResult<()> {
        if self.bill_number.trim().is_empty() {
            return Err(AppError::Validation("Bill number cannot be empty".to_string()));
        }
        if self.vendor.trim().is_empty() {
            return Err(AppError::Validation("Vendor cannot be empty".to_string()));
        }
        validate_amount(self.amount)?;
        if self.category.trim().is_empty() {
            return Err(AppError::Validation("Category cannot be empty".to_string()));
        }
        if self.created_at > self.updated_at {
            return Err(AppError::Validation(format!(
                "Bill {} was updated ({}) before it was created ({})",
                self.bill_number, self.updated_at, self.created_at
            )));
        }
        Ok(())
    }

    pub fn apply_update(&mut self, update: UpdateBillRequest, today: NaiveDate) -> AppResult<()> {
        if let Some(bill_number) = update.bill_number {
            self.bill_number = bill_number.trim().to_string();
        }
        if let Some(vendor) = update.vendor {
            self.vendor = vendor.trim().to_string();
        }
        if let Some(amount) = update.amount {
            self.amount = amount;
        }
        if let Some(due_date) = update.due_date {
            self.due_date = parse_date(&due_date)?;
        }
        if let Some(status) = update.status {
            self.status = status.parse()?;
        }
        if let Some(category) = update.category {
            self.category = category.trim().to_string();
        }
        if let Some(description) = update.description {
            self.description = normalize_optional(Some(description));
        }
        if let Some(attachments) = update.attachments {
            self.attachments = attachments;
        }
        self.updated_at = today.max(self.created_at);
        self.validate()
    }
}

pub fn validate_amount(amount: f64) -> AppResult<()> {
    if !amount.is_finite() || amount < 0.0 {
        return Err(AppError::Validation(format!(
            "Amount must be a non-negative number, got {}",
            amount
        )));
    }
    Ok(())
}

/// Parses a calendar date in `YYYY-MM-DD` form.
pub fn parse_date(value: &str) -> AppResult<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| {
        AppError::Validation(format!(
            "Invalid date '{}'. Use YYYY-MM-DD (e.g., 2024-02-15)",
            value
        ))
    })
}

pub(crate) fn normalize_optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateBillRequest {
    pub bill_number: String,
    pub vendor: String,
    pub amount: f64,
    pub due_date: String,
    pub category: String,
    pub description: Option<String>,
    pub status: Option<String>,
    #[serde(default)]
    pub attachments: Vec<String>,
}

impl CreateBillRequest {
    pub fn into_bill(self) -> AppResult<Bill> {
        let due_date = parse_date(&self.due_date)?;
        let mut bill = Bill::new(
            self.bill_number.trim().to_string(),
            self.vendor.trim().to_string(),
            self.amount,
            due_date,
            self.category.trim().to_string(),
            normalize_optional(self.description),
        );
        if let Some(status) = self.status {
            bill.status = status.parse()?;
        }
        bill.attachments = self.attachments;
        bill.validate()?;
        Ok(bill)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateBillRequest {
    pub bill_number: Option<String>,
    pub vendor: Option<String>,
    pub amount: Option<f64>,
    pub due_date: Option<String>,
    pub status: Option<String>,
    pub category: Option<String>,
    pub description: Option<String>,
    pub attachments: Option<Vec<String>>,
}

/// Query string accepted by the bill listing and export endpoints.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BillQuery {
    pub search: Option<String>,
    pub status: Option<String>,
    pub category: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub min_amount: Option<f64>,
    pub max_amount: Option<f64>,
}

impl BillQuery {
    pub fn into_criteria(self) -> AppResult<FilterCriteria> {
        let mut criteria = FilterCriteria::default();
        criteria.search = self.search.filter(|s| !s.is_empty());
        criteria.statuses = self
            .status
            .map(|s| {
                split_list(&s)
                    .iter()
                    .map(|v| v.parse::<BillStatus>().map(|st| st.as_str().to_string()))
                    .collect::<AppResult<Vec<_>>>()
            })
            .transpose()?;
        criteria.categories = self.category.map(|c| split_list(&c));

        criteria.date_range = match (self.from, self.to) {
            (Some(from), Some(to)) => Some((parse_date(&from)?, parse_date(&to)?).into()),
            (None, None) => None,
            _ => {
                return Err(AppError::Validation(
                    "A date range needs both 'from' and 'to'".to_string(),
                ))
            }
        };

        criteria.amount_range = match (self.min_amount, self.max_amount) {
            (Some(min), Some(max)) => Some((min, max).into()),
            (None, None) => None,
            _ => {
                return Err(AppError::Validation(
                    "An amount range needs both 'min_amount' and 'max_amount'".to_string(),
                ))
            }
        };

        Ok(criteria)
    }
}

/// Splits a comma-separated query value, dropping blank entries.
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BillListResponse {
    pub bills: Vec<Bill>,
    pub summary: BillSummary,
}
