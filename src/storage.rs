use anyhow::Context;
use chrono::Local;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

use crate::error::{AppError, AppResult};
use crate::filter::{filter, FilterCriteria};
use crate::fixtures;
use crate::models::{Bill, UpdateBillRequest};

const STORAGE_FILE: &str = "bills.json";

pub struct BillStorage {
    path: PathBuf,
    bills: RwLock<Vec<Bill>>,
}

impl BillStorage {
    pub fn open(data_dir: &Path) -> AppResult<Self> {
        let path = data_dir.join(STORAGE_FILE);
        let bills: Vec<Bill> = load_json(&path)?;
        tracing::info!(path = %path.display(), bills = bills.len(), "opened bill storage");

        Ok(Self {
            path,
            bills: RwLock::new(bills),
        })
    }

    /// Fills an empty store with the sample bills. Returns how many were added.
    pub async fn seed_fixtures(&self) -> AppResult<usize> {
        let mut bills = self.bills.write().await;
        if !bills.is_empty() {
            return Ok(0);
        }
        let seeded = fixtures::bills();
        save_json(&self.path, seeded.as_slice())?;
        *bills = seeded;
        Ok(bills.len())
    }

    pub async fn add_bill(&self, bill: Bill) -> AppResult<Bill> {
        bill.validate()?;
        let mut bills = self.bills.write().await;

        if bills.iter().any(|b| b.bill_number == bill.bill_number) {
            return Err(AppError::Conflict(format!(
                "Bill number {} already exists",
                bill.bill_number
            )));
        }

        let mut next = bills.clone();
        next.push(bill.clone());
        save_json(&self.path, next.as_slice())?;
        *bills = next;
        tracing::info!(id = %bill.id, bill_number = %bill.bill_number, "added bill");
        Ok(bill)
    }

    /// Appends a batch atomically: either every bill is added or none is.
    pub async fn add_bills(&self, new_bills: Vec<Bill>) -> AppResult<Vec<Bill>> {
        let mut bills = self.bills.write().await;

        for (i, bill) in new_bills.iter().enumerate() {
            bill.validate()?;
            let duplicate = bills.iter().any(|b| b.bill_number == bill.bill_number)
                || new_bills[..i].iter().any(|b| b.bill_number == bill.bill_number);
            if duplicate {
                return Err(AppError::Conflict(format!(
                    "Bill number {} already exists",
                    bill.bill_number
                )));
            }
        }

        let mut next = bills.clone();
        next.extend(new_bills.iter().cloned());
        save_json(&self.path, next.as_slice())?;
        *bills = next;
        tracing::info!(count = new_bills.len(), "added bill batch");
        Ok(new_bills)
    }

    pub async fn get_bill(&self, id: &str) -> AppResult<Bill> {
        let bills = self.bills.read().await;
        bills
            .iter()
            .find(|b| b.id == id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Bill {}", id)))
    }

    pub async fn get_all_bills(&self) -> AppResult<Vec<Bill>> {
        let bills = self.bills.read().await;
        Ok(bills.clone())
    }

    /// Filters a snapshot of the base collection.
    pub async fn find_bills(&self, criteria: &FilterCriteria) -> AppResult<Vec<Bill>> {
        let bills = self.bills.read().await;
        Ok(filter(bills.as_slice(), criteria))
    }

    pub async fn update_bill(&self, id: &str, update: UpdateBillRequest) -> AppResult<Bill> {
        let mut bills = self.bills.write().await;

        let index = bills
            .iter()
            .position(|b| b.id == id)
            .ok_or_else(|| AppError::NotFound(format!("Bill {}", id)))?;

        let mut edited = bills[index].clone();
        edited.apply_update(update, Local::now().date_naive())?;

        if bills
            .iter()
            .any(|b| b.id != id && b.bill_number == edited.bill_number)
        {
            return Err(AppError::Conflict(format!(
                "Bill number {} already exists",
                edited.bill_number
            )));
        }

        let mut next = bills.clone();
        next[index] = edited.clone();
        save_json(&self.path, next.as_slice())?;
        *bills = next;
        tracing::info!(id = %id, "updated bill");
        Ok(edited)
    }

    pub async fn delete_bill(&self, id: &str) -> AppResult<()> {
        let mut bills = self.bills.write().await;
        let index = bills
            .iter()
            .position(|b| b.id == id)
            .ok_or_else(|| AppError::NotFound(format!("Bill {}", id)))?;

        let mut next = bills.clone();
        next.remove(index);
        save_json(&self.path, next.as_slice())?;
        *bills = next;
        tracing::info!(id = %id, "deleted bill");
        Ok(())
    }
}

pub(crate) fn load_json<T: DeserializeOwned>(path: &Path) -> anyhow::Result<Vec<T>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let data = fs::read_to_string(path)
        .with_context(|| format!("Failed to read storage file {}", path.display()))?;
    serde_json::from_str(&data)
        .with_context(|| format!("Failed to parse storage file {}", path.display()))
}

pub(crate) fn save_json<T: Serialize>(path: &Path, records: &[T]) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(records).context("Failed to serialize records")?;
    fs::write(path, json)
        .with_context(|| format!("Failed to write to storage file {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BillStatus;

    #[tokio::test]
    async fn persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let storage = BillStorage::open(dir.path()).unwrap();
        assert_eq!(storage.seed_fixtures().await.unwrap(), 5);
        assert_eq!(storage.seed_fixtures().await.unwrap(), 0);

        let reopened = BillStorage::open(dir.path()).unwrap();
        let bills = reopened.get_all_bills().await.unwrap();
        assert_eq!(bills.len(), 5);
        assert_eq!(bills[0].bill_number, "INV-2024-001");
    }

    #[tokio::test]
    async fn rejects_duplicate_bill_numbers() {
        let dir = tempfile::tempdir().unwrap();
        let storage = BillStorage::open(dir.path()).unwrap();
        storage.seed_fixtures().await.unwrap();

        let mut dup = fixtures::bills().remove(0);
        dup.id = "other".to_string();
        assert!(matches!(storage.add_bill(dup).await, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn batch_insert_is_all_or_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let storage = BillStorage::open(dir.path()).unwrap();
        let mut batch = fixtures::bills();
        batch[4].bill_number = batch[0].bill_number.clone();

        assert!(storage.add_bills(batch).await.is_err());
        assert!(storage.get_all_bills().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn update_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        let storage = BillStorage::open(dir.path()).unwrap();
        storage.seed_fixtures().await.unwrap();

        let updated = storage
            .update_bill(
                "1",
                UpdateBillRequest {
                    status: Some("paid".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.status, BillStatus::Paid);
        assert!(updated.updated_at >= updated.created_at);

        storage.delete_bill("1").await.unwrap();
        assert!(matches!(storage.get_bill("1").await, Err(AppError::NotFound(_))));
        assert!(matches!(storage.delete_bill("1").await, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn failed_update_leaves_record_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let storage = BillStorage::open(dir.path()).unwrap();
        storage.seed_fixtures().await.unwrap();

        let result = storage
            .update_bill(
                "2",
                UpdateBillRequest {
                    amount: Some(-5.0),
                    ..Default::default()
                },
            )
            .await;
        assert!(result.is_err());
        assert_eq!(storage.get_bill("2").await.unwrap().amount, 1299.0);
    }

    #[tokio::test]
    async fn edits_trim_and_still_reject_duplicate_numbers() {
        let dir = tempfile::tempdir().unwrap();
        let storage = BillStorage::open(dir.path()).unwrap();
        storage.seed_fixtures().await.unwrap();

        let result = storage
            .update_bill(
                "1",
                UpdateBillRequest {
                    bill_number: Some(" INV-2024-002 ".to_string()),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(result, Err(AppError::Conflict(_))));
        assert_eq!(storage.get_bill("1").await.unwrap().bill_number, "INV-2024-001");

        let updated = storage
            .update_bill(
                "1",
                UpdateBillRequest {
                    bill_number: Some("  INV-2024-101 ".to_string()),
                    vendor: Some(" Staples ".to_string()),
                    category: Some("Office Supplies ".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.bill_number, "INV-2024-101");
        assert_eq!(updated.vendor, "Staples");
        assert_eq!(updated.category, "Office Supplies");
    }

    #[tokio::test]
    async fn unknown_id_is_not_found_even_with_a_taken_number() {
        let dir = tempfile::tempdir().unwrap();
        let storage = BillStorage::open(dir.path()).unwrap();
        storage.seed_fixtures().await.unwrap();

        let result = storage
            .update_bill(
                "missing",
                UpdateBillRequest {
                    bill_number: Some("INV-2024-002".to_string()),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn failed_write_leaves_memory_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().join("data");
        fs::create_dir(&data_dir).unwrap();
        let storage = BillStorage::open(&data_dir).unwrap();
        storage.seed_fixtures().await.unwrap();
        fs::remove_dir_all(&data_dir).unwrap();

        let mut bill = fixtures::bills().remove(0);
        bill.id = "6".to_string();
        bill.bill_number = "INV-2024-006".to_string();
        assert!(matches!(storage.add_bill(bill).await, Err(AppError::Storage(_))));
        assert!(matches!(storage.delete_bill("1").await, Err(AppError::Storage(_))));

        let result = storage
            .update_bill(
                "2",
                UpdateBillRequest {
                    status: Some("overdue".to_string()),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(result, Err(AppError::Storage(_))));

        let bills = storage.get_all_bills().await.unwrap();
        assert_eq!(bills, fixtures::bills());
    }

    #[test]
    fn corrupt_file_is_a_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(STORAGE_FILE), "not json").unwrap();
        assert!(matches!(
            BillStorage::open(dir.path()),
            Err(AppError::Storage(_))
        ));
    }
}
