use bill_manager::fixtures;
use bill_manager::models::{Bill, BillStatus};
use bill_manager::user_models::User;
use bill_manager::{filter, FilterCriteria};
use chrono::NaiveDate;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

fn numbers(bills: &[Bill]) -> Vec<&str> {
    bills.iter().map(|b| b.bill_number.as_str()).collect()
}

fn names(users: &[User]) -> Vec<&str> {
    users.iter().map(|u| u.name.as_str()).collect()
}

fn sample_criteria() -> Vec<FilterCriteria> {
    vec![
        FilterCriteria::new(),
        FilterCriteria::new().with_search("in"),
        FilterCriteria::new().with_statuses(["paid", "overdue"]),
        FilterCriteria::new().with_categories(["Rent", "Travel", "Software"]),
        FilterCriteria::new().with_date_range(date(2024, 1, 1), date(2024, 2, 28)),
        FilterCriteria::new().with_amount_range(300.0, 1299.0),
        FilterCriteria::new()
            .with_search("o")
            .with_statuses(["pending", "paid"])
            .with_amount_range(0.0, 2000.0),
    ]
}

#[test]
fn empty_criteria_is_identity() {
    let bills = fixtures::bills();
    assert_eq!(filter(&bills, &FilterCriteria::default()), bills);
}

#[test]
fn filtering_is_idempotent() {
    let bills = fixtures::bills();
    for criteria in sample_criteria() {
        let once = filter(&bills, &criteria);
        let twice = filter(&once, &criteria);
        assert_eq!(once, twice, "criteria {:?}", criteria);
    }
}

#[test]
fn output_preserves_input_order() {
    let mut bills = fixtures::bills();
    bills.reverse();
    for criteria in sample_criteria() {
        let out = filter(&bills, &criteria);
        let positions: Vec<usize> = out
            .iter()
            .map(|b| bills.iter().position(|x| x.id == b.id).expect("from input"))
            .collect();
        assert!(
            positions.windows(2).all(|w| w[0] < w[1]),
            "order broken for {:?}",
            criteria
        );
    }
}

#[test]
fn criteria_compose_as_intersection() {
    let bills = fixtures::bills();
    let by_status = FilterCriteria::new().with_statuses(["paid", "pending"]);
    let by_category = FilterCriteria::new().with_categories(["Software", "Travel", "Utilities"]);
    let both = FilterCriteria {
        statuses: by_status.statuses.clone(),
        categories: by_category.categories.clone(),
        ..Default::default()
    };

    let left = filter(&bills, &by_status);
    let right = filter(&bills, &by_category);
    let expected: Vec<Bill> = left
        .into_iter()
        .filter(|b| right.iter().any(|r| r.id == b.id))
        .collect();

    let combined = filter(&bills, &both);
    assert_eq!(combined, expected);
    assert_eq!(numbers(&combined), vec!["INV-2024-002", "INV-2024-005"]);
}

#[test]
fn search_is_case_insensitive() {
    let bills = fixtures::bills();
    for token in ["office", "OFFICE", "Office Depot"] {
        let out = filter(&bills, &FilterCriteria::new().with_search(token));
        assert!(numbers(&out).contains(&"INV-2024-001"), "token {}", token);
    }
    assert!(filter(&bills, &FilterCriteria::new().with_search("xyz")).is_empty());
}

#[test]
fn search_covers_bill_number_and_description() {
    let bills = fixtures::bills();
    let out = filter(&bills, &FilterCriteria::new().with_search("inv-2024-003"));
    assert_eq!(numbers(&out), vec!["INV-2024-003"]);

    let out = filter(&bills, &FilterCriteria::new().with_search("electricity"));
    assert_eq!(numbers(&out), vec!["INV-2024-003"]);
}

#[test]
fn bill_without_description_is_not_matched_by_it() {
    let mut bills = fixtures::bills();
    bills[0].description = None;
    let out = filter(&bills, &FilterCriteria::new().with_search("monthly office"));
    assert!(out.is_empty());
}

#[test]
fn amount_range_is_closed() {
    let bills = fixtures::bills();
    let out = filter(&bills, &FilterCriteria::new().with_amount_range(320.50, 1299.00));
    assert_eq!(
        numbers(&out),
        vec!["INV-2024-001", "INV-2024-002", "INV-2024-003", "INV-2024-005"]
    );

    let out = filter(&bills, &FilterCriteria::new().with_amount_range(320.51, 1298.99));
    assert_eq!(numbers(&out), vec!["INV-2024-001", "INV-2024-005"]);
}

#[test]
fn date_range_is_open() {
    let bills = fixtures::bills();
    // INV-2024-004 is due on the start date, INV-2024-002 on the end date.
    let out = filter(
        &bills,
        &FilterCriteria::new().with_date_range(date(2024, 2, 1), date(2024, 2, 20)),
    );
    assert_eq!(numbers(&out), vec!["INV-2024-001"]);

    let out = filter(
        &bills,
        &FilterCriteria::new().with_date_range(date(2024, 1, 31), date(2024, 2, 21)),
    );
    assert_eq!(numbers(&out), vec!["INV-2024-001", "INV-2024-002", "INV-2024-004"]);
}

#[test]
fn paid_status_returns_second_and_fourth_bill() {
    let bills = fixtures::bills();
    let out = filter(&bills, &FilterCriteria::new().with_statuses(["paid"]));
    assert_eq!(numbers(&out), vec!["INV-2024-002", "INV-2024-004"]);
    assert!(out.iter().all(|b| b.status == BillStatus::Paid));
}

#[test]
fn empty_collection_stays_empty() {
    let empty: Vec<Bill> = Vec::new();
    for criteria in sample_criteria() {
        assert!(filter(&empty, &criteria).is_empty());
    }
}

#[test]
fn input_is_not_mutated() {
    let bills = fixtures::bills();
    let snapshot = bills.clone();
    let _ = filter(&bills, &FilterCriteria::new().with_statuses(["overdue"]));
    assert_eq!(bills, snapshot);
}

#[test]
fn users_filter_by_search_status_and_department() {
    let users = fixtures::users();

    let out = filter(&users, &FilterCriteria::new().with_search("sales"));
    assert_eq!(names(&out), vec!["David Lee"]);

    let out = filter(&users, &FilterCriteria::new().with_statuses(["inactive"]));
    assert_eq!(names(&out), vec!["Emily Brown"]);

    let out = filter(
        &users,
        &FilterCriteria::new()
            .with_statuses(["active"])
            .with_categories(["IT", "HR", "Finance"]),
    );
    assert_eq!(names(&out), vec!["John Smith", "Sarah Johnson"]);
}

#[test]
fn users_never_match_an_amount_range() {
    let users = fixtures::users();
    let out = filter(
        &users,
        &FilterCriteria::new().with_amount_range(f64::MIN, f64::MAX),
    );
    assert!(out.is_empty());
}

#[test]
fn users_filter_by_role() {
    let users = fixtures::users();

    let out = filter(&users, &FilterCriteria::new().with_roles(["manager"]));
    assert_eq!(names(&out), vec!["Sarah Johnson", "David Lee"]);

    let out = filter(
        &users,
        &FilterCriteria::new()
            .with_roles(["admin", "user"])
            .with_statuses(["active"]),
    );
    assert_eq!(names(&out), vec!["John Smith", "Mike Wilson"]);
}

#[test]
fn bills_never_match_a_role() {
    let bills = fixtures::bills();
    assert!(filter(&bills, &FilterCriteria::new().with_roles(["admin"])).is_empty());
}
