//! Multi-criteria record filtering.
//!
//! [`filter`] is a pure function of a record slice and a [`FilterCriteria`]:
//! it keeps, in their original order, the records for which every populated
//! criterion matches. Unpopulated criteria are vacuously true.
//!
//! Range semantics differ by facet. The date range is an open interval
//! (`start < date < end`), the amount range a closed one (`min <= amount <= max`).

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::Bill;
use crate::user_models::User;

/// The facets a record exposes to the filter engine.
///
/// A record returns `None` for a facet it does not carry. A missing facet
/// never matches a populated range criterion.
pub trait Filterable {
    /// Fields searched by the free-text token. `None` entries are treated as
    /// empty strings.
    fn search_fields(&self) -> Vec<Option<&str>>;

    fn status_key(&self) -> Option<&str>;

    fn category_key(&self) -> Option<&str>;

    fn date_key(&self) -> Option<NaiveDate>;

    fn amount_key(&self) -> Option<f64>;

    fn role_key(&self) -> Option<&str> {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// Boundary dates are excluded.
    pub fn contains(&self, date: NaiveDate) -> bool {
        date > self.start && date < self.end
    }
}

impl From<(NaiveDate, NaiveDate)> for DateRange {
    fn from((start, end): (NaiveDate, NaiveDate)) -> Self {
        Self::new(start, end)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AmountRange {
    pub min: f64,
    pub max: f64,
}

impl AmountRange {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Boundary amounts are included.
    pub fn contains(&self, amount: f64) -> bool {
        amount >= self.min && amount <= self.max
    }
}

impl From<(f64, f64)> for AmountRange {
    fn from((min, max): (f64, f64)) -> Self {
        Self::new(min, max)
    }
}

/// User-specified constraints for one filtering pass.
///
/// `search: None` means no text constraint; `Some("")` is a present but empty
/// token, which matches every record. Empty status, category or role sets
/// impose no restriction. Inverted ranges are accepted and simply match nothing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterCriteria {
    pub search: Option<String>,
    pub statuses: Option<Vec<String>>,
    pub categories: Option<Vec<String>>,
    pub date_range: Option<DateRange>,
    pub amount_range: Option<AmountRange>,
    pub roles: Option<Vec<String>>,
}

impl FilterCriteria {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_search(mut self, token: impl Into<String>) -> Self {
        self.search = Some(token.into());
        self
    }

    pub fn with_statuses<I, S>(mut self, statuses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.statuses = Some(statuses.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_categories<I, S>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.categories = Some(categories.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles = Some(roles.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_date_range(mut self, start: NaiveDate, end: NaiveDate) -> Self {
        self.date_range = Some(DateRange::new(start, end));
        self
    }

    pub fn with_amount_range(mut self, min: f64, max: f64) -> Self {
        self.amount_range = Some(AmountRange::new(min, max));
        self
    }

    /// Number of criteria that will actually constrain the result.
    pub fn active_count(&self) -> usize {
        [
            self.search.is_some(),
            active_set(&self.statuses).is_some(),
            active_set(&self.categories).is_some(),
            self.date_range.is_some(),
            self.amount_range.is_some(),
            active_set(&self.roles).is_some(),
        ]
        .iter()
        .filter(|active| **active)
        .count()
    }

    pub fn is_empty(&self) -> bool {
        self.active_count() == 0
    }
}

fn active_set(set: &Option<Vec<String>>) -> Option<&[String]> {
    set.as_deref().filter(|values| !values.is_empty())
}

/// Returns true when `record` satisfies every populated criterion.
pub fn matches<T: Filterable + ?Sized>(record: &T, criteria: &FilterCriteria) -> bool {
    if let Some(token) = &criteria.search {
        let needle = token.to_lowercase();
        let hit = record
            .search_fields()
            .into_iter()
            .any(|field| field.unwrap_or("").to_lowercase().contains(&needle));
        if !hit {
            return false;
        }
    }

    if let Some(statuses) = active_set(&criteria.statuses) {
        match record.status_key() {
            Some(status) if statuses.iter().any(|s| s == status) => {}
            _ => return false,
        }
    }

    if let Some(categories) = active_set(&criteria.categories) {
        match record.category_key() {
            Some(category) if categories.iter().any(|c| c == category) => {}
            _ => return false,
        }
    }

    if let Some(roles) = active_set(&criteria.roles) {
        match record.role_key() {
            Some(role) if roles.iter().any(|r| r == role) => {}
            _ => return false,
        }
    }

    if let Some(range) = &criteria.date_range {
        match record.date_key() {
            Some(date) if range.contains(date) => {}
            _ => return false,
        }
    }

    if let Some(range) = &criteria.amount_range {
        match record.amount_key() {
            Some(amount) if range.contains(amount) => {}
            _ => return false,
        }
    }

    true
}

/// Returns the records matching `criteria`, in input order.
pub fn filter<T: Filterable + Clone>(records: &[T], criteria: &FilterCriteria) -> Vec<T> {
    let filtered: Vec<T> = records
        .iter()
        .filter(|record| matches(*record, criteria))
        .cloned()
        .collect();

    tracing::trace!(
        total = records.len(),
        matched = filtered.len(),
        criteria = criteria.active_count(),
        "filtered records"
    );
    filtered
}

impl Filterable for Bill {
    fn search_fields(&self) -> Vec<Option<&str>> {
        vec![
            Some(self.bill_number.as_str()),
            Some(self.vendor.as_str()),
            self.description.as_deref(),
        ]
    }

    fn status_key(&self) -> Option<&str> {
        Some(self.status.as_str())
    }

    fn category_key(&self) -> Option<&str> {
        Some(self.category.as_str())
    }

    fn date_key(&self) -> Option<NaiveDate> {
        Some(self.due_date)
    }

    fn amount_key(&self) -> Option<f64> {
        Some(self.amount)
    }
}

impl Filterable for User {
    fn search_fields(&self) -> Vec<Option<&str>> {
        vec![
            Some(self.name.as_str()),
            Some(self.email.as_str()),
            Some(self.department.as_str()),
        ]
    }

    fn status_key(&self) -> Option<&str> {
        Some(self.status.as_str())
    }

    fn category_key(&self) -> Option<&str> {
        Some(self.department.as_str())
    }

    fn date_key(&self) -> Option<NaiveDate> {
        Some(self.created_at)
    }

    fn amount_key(&self) -> Option<f64> {
        None
    }

    fn role_key(&self) -> Option<&str> {
        Some(self.role.as_str())
    }
}
