use crate::error::{AppError, AppResult};
use crate::models::Bill;

const HEADER: [&str; 10] = [
    "bill_number",
    "vendor",
    "amount",
    "due_date",
    "status",
    "category",
    "description",
    "created_at",
    "updated_at",
    "attachments",
];

/// Renders bills as CSV in the given order. Attachments are joined with `;`.
pub fn export_csv(bills: &[Bill]) -> AppResult<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(HEADER)?;

    for bill in bills {
        writer.write_record([
            bill.bill_number.clone(),
            bill.vendor.clone(),
            format!("{:.2}", bill.amount),
            bill.due_date.to_string(),
            bill.status.to_string(),
            bill.category.clone(),
            bill.description.clone().unwrap_or_default(),
            bill.created_at.to_string(),
            bill.updated_at.to_string(),
            bill.attachments.join(";"),
        ])?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| AppError::Io(e.into_error()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
