//! Sample bills and users used to seed empty stores and in tests.

use chrono::NaiveDate;

use crate::models::{Bill, BillStatus};
use crate::user_models::{User, UserRole, UserStatus};

fn date(value: &str) -> NaiveDate {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").expect("fixture dates are YYYY-MM-DD")
}

#[allow(clippy::too_many_arguments)]
fn bill(
    id: &str,
    bill_number: &str,
    vendor: &str,
    amount: f64,
    due_date: &str,
    status: BillStatus,
    category: &str,
    description: &str,
    created_at: &str,
    updated_at: &str,
) -> Bill {
    Bill {
        id: id.to_string(),
        bill_number: bill_number.to_string(),
        vendor: vendor.to_string(),
        amount,
        due_date: date(due_date),
        status,
        category: category.to_string(),
        description: Some(description.to_string()),
        created_at: date(created_at),
        updated_at: date(updated_at),
        attachments: Vec::new(),
    }
}

pub fn bills() -> Vec<Bill> {
    vec![
        bill(
            "1",
            "INV-2024-001",
            "Office Depot",
            456.78,
            "2024-02-15",
            BillStatus::Pending,
            "Office Supplies",
            "Monthly office supplies",
            "2024-01-15",
            "2024-01-15",
        ),
        bill(
            "2",
            "INV-2024-002",
            "Microsoft",
            1299.00,
            "2024-02-20",
            BillStatus::Paid,
            "Software",
            "Annual software license",
            "2024-01-10",
            "2024-01-20",
        ),
        bill(
            "3",
            "INV-2024-003",
            "Electric Company",
            320.50,
            "2024-01-30",
            BillStatus::Overdue,
            "Utilities",
            "January electricity bill",
            "2024-01-05",
            "2024-01-05",
        ),
        bill(
            "4",
            "INV-2024-004",
            "Landlord LLC",
            5000.00,
            "2024-02-01",
            BillStatus::Paid,
            "Rent",
            "February office rent",
            "2024-01-25",
            "2024-02-01",
        ),
        bill(
            "5",
            "INV-2024-005",
            "Travel Agency",
            1250.00,
            "2024-03-15",
            BillStatus::Pending,
            "Travel",
            "Business trip expenses",
            "2024-01-28",
            "2024-01-28",
        ),
    ]
}

#[allow(clippy::too_many_arguments)]
fn user(
    id: &str,
    name: &str,
    email: &str,
    role: UserRole,
    department: &str,
    status: UserStatus,
    created_at: &str,
    last_login: &str,
) -> User {
    User {
        id: id.to_string(),
        name: name.to_string(),
        email: email.to_string(),
        role,
        department: department.to_string(),
        status,
        created_at: date(created_at),
        last_login: Some(date(last_login)),
    }
}

pub fn users() -> Vec<User> {
    vec![
        user(
            "1",
            "John Smith",
            "john.smith@company.com",
            UserRole::Admin,
            "IT",
            UserStatus::Active,
            "2023-01-15",
            "2024-01-28",
        ),
        user(
            "2",
            "Sarah Johnson",
            "sarah.johnson@company.com",
            UserRole::Manager,
            "Finance",
            UserStatus::Active,
            "2023-02-20",
            "2024-01-27",
        ),
        user(
            "3",
            "Mike Wilson",
            "mike.wilson@company.com",
            UserRole::User,
            "Operations",
            UserStatus::Active,
            "2023-03-10",
            "2024-01-26",
        ),
        user(
            "4",
            "Emily Brown",
            "emily.brown@company.com",
            UserRole::User,
            "HR",
            UserStatus::Inactive,
            "2023-04-05",
            "2024-01-15",
        ),
        user(
            "5",
            "David Lee",
            "david.lee@company.com",
            UserRole::Manager,
            "Sales",
            UserStatus::Active,
            "2023-05-12",
            "2024-01-28",
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixture_records_are_valid() {
        for bill in bills() {
            bill.validate().unwrap();
            assert!(bill.created_at.to_string().starts_with("2024-"));
        }
        for user in users() {
            user.validate().unwrap();
        }
    }
}
