use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

use crate::error::{AppError, AppResult};
use crate::filter::{filter, FilterCriteria};
use crate::fixtures;
use crate::storage::{load_json, save_json};
use crate::user_models::{UpdateUserRequest, User};

const USERS_FILE: &str = "users.json";

pub struct UserStorage {
    path: PathBuf,
    users: RwLock<Vec<User>>,
}

impl UserStorage {
    pub fn open(data_dir: &Path) -> AppResult<Self> {
        let path = data_dir.join(USERS_FILE);
        let users: Vec<User> = load_json(&path)?;
        tracing::info!(path = %path.display(), users = users.len(), "opened user storage");

        Ok(Self {
            path,
            users: RwLock::new(users),
        })
    }

    pub async fn seed_fixtures(&self) -> AppResult<usize> {
        let mut users = self.users.write().await;
        if !users.is_empty() {
            return Ok(0);
        }
        let seeded = fixtures::users();
        save_json(&self.path, seeded.as_slice())?;
        *users = seeded;
        Ok(users.len())
    }

    pub async fn create_user(&self, user: User) -> AppResult<User> {
        user.validate()?;
        let mut users = self.users.write().await;

        if users.iter().any(|u| u.email.eq_ignore_ascii_case(&user.email)) {
            return Err(AppError::Conflict(format!(
                "A user with email {} already exists",
                user.email
            )));
        }

        let mut next = users.clone();
        next.push(user.clone());
        save_json(&self.path, next.as_slice())?;
        *users = next;
        tracing::info!(id = %user.id, "created user");
        Ok(user)
    }

    pub async fn get_user(&self, id: &str) -> AppResult<User> {
        let users = self.users.read().await;
        users
            .iter()
            .find(|u| u.id == id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("User {}", id)))
    }

    pub async fn get_all_users(&self) -> AppResult<Vec<User>> {
        let users = self.users.read().await;
        Ok(users.clone())
    }

    pub async fn find_users(&self, criteria: &FilterCriteria) -> AppResult<Vec<User>> {
        let users = self.users.read().await;
        Ok(filter(users.as_slice(), criteria))
    }

    pub async fn update_user(&self, id: &str, update: UpdateUserRequest) -> AppResult<User> {
        let mut users = self.users.write().await;

        let index = users
            .iter()
            .position(|u| u.id == id)
            .ok_or_else(|| AppError::NotFound(format!("User {}", id)))?;

        let mut edited = users[index].clone();
        edited.apply_update(update)?;

        if users
            .iter()
            .any(|u| u.id != id && u.email.eq_ignore_ascii_case(&edited.email))
        {
            return Err(AppError::Conflict(format!(
                "A user with email {} already exists",
                edited.email
            )));
        }

        let mut next = users.clone();
        next[index] = edited.clone();
        save_json(&self.path, next.as_slice())?;
        *users = next;
        tracing::info!(id = %id, "updated user");
        Ok(edited)
    }

    pub async fn delete_user(&self, id: &str) -> AppResult<()> {
        let mut users = self.users.write().await;
        let index = users
            .iter()
            .position(|u| u.id == id)
            .ok_or_else(|| AppError::NotFound(format!("User {}", id)))?;

        let mut next = users.clone();
        next.remove(index);
        save_json(&self.path, next.as_slice())?;
        *users = next;
        tracing::info!(id = %id, "deleted user");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::user_models::{CreateUserRequest, UserStatus};

    #[tokio::test]
    async fn create_rejects_duplicate_email() {
        let dir = tempfile::tempdir().unwrap();
        let storage = UserStorage::open(dir.path()).unwrap();
        storage.seed_fixtures().await.unwrap();

        let user = CreateUserRequest {
            name: "John Again".to_string(),
            email: "JOHN.SMITH@company.com".to_string(),
            role: "user".to_string(),
            department: "IT".to_string(),
        }
        .into_user()
        .unwrap();

        assert!(matches!(
            storage.create_user(user).await,
            Err(AppError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn update_status_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        let storage = UserStorage::open(dir.path()).unwrap();
        storage.seed_fixtures().await.unwrap();

        let user = storage
            .update_user(
                "4",
                UpdateUserRequest {
                    status: Some("active".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(user.status, UserStatus::Active);

        storage.delete_user("4").await.unwrap();
        assert_eq!(storage.get_all_users().await.unwrap().len(), 4);
        assert!(storage.get_user("4").await.is_err());
    }

    #[tokio::test]
    async fn edit_to_taken_email_conflicts_after_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let storage = UserStorage::open(dir.path()).unwrap();
        storage.seed_fixtures().await.unwrap();

        let taken = UpdateUserRequest {
            email: Some(" Sarah.Johnson@company.com ".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            storage.update_user("1", taken.clone()).await,
            Err(AppError::Conflict(_))
        ));
        assert!(matches!(
            storage.update_user("missing", taken).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn failed_write_leaves_memory_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().join("data");
        std::fs::create_dir(&data_dir).unwrap();
        let storage = UserStorage::open(&data_dir).unwrap();
        storage.seed_fixtures().await.unwrap();
        std::fs::remove_dir_all(&data_dir).unwrap();

        assert!(matches!(storage.delete_user("1").await, Err(AppError::Storage(_))));
        assert_eq!(storage.get_all_users().await.unwrap(), fixtures::users());
    }

    #[tokio::test]
    async fn search_matches_name_email_or_department() {
        let dir = tempfile::tempdir().unwrap();
        let storage = UserStorage::open(dir.path()).unwrap();
        storage.seed_fixtures().await.unwrap();

        let found = storage
            .find_users(&FilterCriteria::new().with_search("FINANCE"))
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "Sarah Johnson");

        let found = storage
            .find_users(&FilterCriteria::new().with_search("company.com"))
            .await
            .unwrap();
        assert_eq!(found.len(), 5);
    }
}
