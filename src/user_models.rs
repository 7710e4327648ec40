use chrono::{Local, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::filter::FilterCriteria;
use crate::models::split_list;
use crate::reports::UserSummary;

pub const SUGGESTED_DEPARTMENTS: [&str; 6] =
    ["IT", "Finance", "Operations", "HR", "Sales", "Marketing"];

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9-]+(\.[A-Za-z0-9-]+)*\.[A-Za-z]{2,}$")
        .expect("email pattern is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Admin,
    Manager,
    User,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Admin => "admin",
            UserRole::Manager => "manager",
            UserRole::User => "user",
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserRole {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "admin" => Ok(UserRole::Admin),
            "manager" => Ok(UserRole::Manager),
            "user" => Ok(UserRole::User),
            other => Err(AppError::Validation(format!(
                "Unknown role '{}'. Use admin, manager or user",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    Active,
    Inactive,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Active => "active",
            UserStatus::Inactive => "inactive",
        }
    }
}

impl fmt::Display for UserStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "active" => Ok(UserStatus::Active),
            "inactive" => Ok(UserStatus::Inactive),
            other => Err(AppError::Validation(format!(
                "Unknown user status '{}'. Use active or inactive",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: UserRole,
    pub department: String,
    pub status: UserStatus,
    pub created_at: NaiveDate,
    pub last_login: Option<NaiveDate>,
}

impl User {
    pub fn new(name: String, email: String, role: UserRole, department: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name,
            email,
            role,
            department,
            status: UserStatus::Active,
            created_at: Local::now().date_naive(),
            last_login: None,
        }
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.name.trim().is_empty() {
            return Err(AppError::Validation("Name cannot be empty".to_string()));
        }
        validate_email(&self.email)?;
        if self.department.trim().is_empty() {
            return Err(AppError::Validation("Department cannot be empty".to_string()));
        }
        Ok(())
    }

    /// Applies an edit. The email is re-validated here as well as at creation.
    pub fn apply_update(&mut self, update: UpdateUserRequest) -> AppResult<()> {
        if let Some(name) = update.name {
            self.name = name.trim().to_string();
        }
        if let Some(email) = update.email {
            self.email = email.trim().to_string();
        }
        if let Some(role) = update.role {
            self.role = role.parse()?;
        }
        if let Some(department) = update.department {
            self.department = department.trim().to_string();
        }
        if let Some(status) = update.status {
            self.status = status.parse()?;
        }
        self.validate()
    }
}

pub fn validate_email(email: &str) -> AppResult<()> {
    if EMAIL_RE.is_match(email) {
        Ok(())
    } else {
        Err(AppError::Validation(format!(
            "'{}' is not a valid email address",
            email
        )))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUserRequest {
    pub name: String,
    pub email: String,
    pub role: String,
    pub department: String,
}

impl CreateUserRequest {
    pub fn into_user(self) -> AppResult<User> {
        let user = User::new(
            self.name.trim().to_string(),
            self.email.trim().to_string(),
            self.role.parse()?,
            self.department.trim().to_string(),
        );
        user.validate()?;
        Ok(user)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<String>,
    pub department: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserQuery {
    pub search: Option<String>,
    pub status: Option<String>,
    pub department: Option<String>,
    pub role: Option<String>,
}

impl UserQuery {
    pub fn into_criteria(self) -> AppResult<FilterCriteria> {
        let statuses = self
            .status
            .map(|s| {
                split_list(&s)
                    .iter()
                    .map(|v| v.parse::<UserStatus>().map(|st| st.as_str().to_string()))
                    .collect::<AppResult<Vec<_>>>()
            })
            .transpose()?;
        let roles = self
            .role
            .map(|r| {
                split_list(&r)
                    .iter()
                    .map(|v| v.parse::<UserRole>().map(|role| role.as_str().to_string()))
                    .collect::<AppResult<Vec<_>>>()
            })
            .transpose()?;

        Ok(FilterCriteria {
            search: self.search.filter(|s| !s.is_empty()),
            statuses,
            categories: self.department.map(|d| split_list(&d)),
            roles,
            ..Default::default()
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserListResponse {
    pub users: Vec<User>,
    pub summary: UserSummary,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> CreateUserRequest {
        CreateUserRequest {
            name: "Ana Diaz".to_string(),
            email: "ana.diaz@company.com".to_string(),
            role: "Manager".to_string(),
            department: "Finance".to_string(),
        }
    }

    #[test]
    fn new_users_default_to_active() {
        let user = request().into_user().unwrap();
        assert_eq!(user.status, UserStatus::Active);
        assert_eq!(user.role, UserRole::Manager);
        assert!(user.last_login.is_none());
    }

    #[test]
    fn email_validation() {
        assert!(validate_email("john.smith@company.com").is_ok());
        assert!(validate_email("a+b@sub.example.org").is_ok());
        assert!(validate_email("not-an-email").is_err());
        assert!(validate_email("missing@tld").is_err());
        assert!(validate_email("two@@signs.com").is_err());
    }

    #[test]
    fn edits_revalidate_email() {
        let mut user = request().into_user().unwrap();
        let result = user.apply_update(UpdateUserRequest {
            email: Some("broken".to_string()),
            ..Default::default()
        });
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[test]
    fn edits_can_change_status() {
        let mut user = request().into_user().unwrap();
        user.apply_update(UpdateUserRequest {
            status: Some("inactive".to_string()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(user.status, UserStatus::Inactive);
    }

    #[test]
    fn query_roles_are_normalized() {
        let criteria = UserQuery {
            role: Some("Admin, MANAGER".to_string()),
            ..Default::default()
        }
        .into_criteria()
        .unwrap();
        assert_eq!(
            criteria.roles,
            Some(vec!["admin".to_string(), "manager".to_string()])
        );

        let bad = UserQuery {
            role: Some("owner".to_string()),
            ..Default::default()
        };
        assert!(matches!(bad.into_criteria(), Err(AppError::Validation(_))));
    }

    #[test]
    fn unknown_role_is_rejected() {
        let mut req = request();
        req.role = "owner".to_string();
        assert!(req.into_user().is_err());
    }
}
