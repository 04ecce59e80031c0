use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::user::models::ListOptions;
use crate::domain::user::models::User;
use crate::domain::user::models::UserChanges;
use crate::domain::user::models::UserFilter;
use crate::domain::user::models::UserId;
use crate::domain::user::ports::UserStore;
use crate::user::errors::UserError;

/// Transient backend: an insertion-ordered list held for the process lifetime.
///
/// Listing and counting ignore the filter and sort order.
#[derive(Debug, Default)]
pub struct InMemoryUserStore {
    users: RwLock<Vec<User>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn insert(&self, user: User) -> Result<User, UserError> {
        let mut users = self.users.write().await;

        if users.iter().any(|existing| existing.email == user.email) {
            return Err(UserError::EmailAlreadyExists(user.email.to_string()));
        }

        users.push(user.clone());
        Ok(user)
    }

    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, UserError> {
        let users = self.users.read().await;
        Ok(users.iter().find(|user| user.id == *id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, UserError> {
        let users = self.users.read().await;
        Ok(users
            .iter()
            .find(|user| user.email.as_str() == email)
            .cloned())
    }

    async fn find_page(
        &self,
        _filter: &UserFilter,
        options: &ListOptions,
    ) -> Result<Vec<User>, UserError> {
        let users = self.users.read().await;
        let skip = usize::try_from(options.skip()).unwrap_or(usize::MAX);

        Ok(users
            .iter()
            .skip(skip)
            .take(options.limit as usize)
            .cloned()
            .collect())
    }

    async fn count(&self, _filter: &UserFilter) -> Result<u64, UserError> {
        Ok(self.users.read().await.len() as u64)
    }

    async fn update(&self, id: &UserId, changes: UserChanges) -> Result<Option<User>, UserError> {
        let mut users = self.users.write().await;

        if let Some(email) = &changes.email {
            if users
                .iter()
                .any(|other| other.id != *id && other.email == *email)
            {
                return Err(UserError::EmailAlreadyExists(email.to_string()));
            }
        }

        Ok(users.iter_mut().find(|user| user.id == *id).map(|user| {
            changes.apply_to(user);
            user.clone()
        }))
    }

    async fn delete(&self, id: &UserId) -> Result<Option<User>, UserError> {
        let mut users = self.users.write().await;

        Ok(users
            .iter()
            .position(|user| user.id == *id)
            .map(|index| users.remove(index)))
    }
}
