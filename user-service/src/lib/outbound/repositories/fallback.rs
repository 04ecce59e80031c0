use std::fmt;

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use tokio::sync::RwLock;

use super::memory::InMemoryUserStore;
use crate::domain::user::models::CreateUserCommand;
use crate::domain::user::models::ListOptions;
use crate::domain::user::models::UpdateUserCommand;
use crate::domain::user::models::User;
use crate::domain::user::models::UserChanges;
use crate::domain::user::models::UserFilter;
use crate::domain::user::models::UserId;
use crate::domain::user::ports::UserRepository;
use crate::domain::user::ports::UserStore;
use crate::user::errors::UserError;

/// Which backend currently serves requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageMode {
    Persistent,
    Transient,
}

impl fmt::Display for StorageMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageMode::Persistent => f.write_str("persistent"),
            StorageMode::Transient => f.write_str("transient"),
        }
    }
}

/// User repository over a persistent store with an in-memory fallback.
///
/// While in `Persistent` mode every call goes to the persistent store. If
/// fallback is enabled and that store reports `StorageUnavailable`, the mode
/// switches to `Transient` for the rest of the process and the failed call is
/// retried once against the in-memory store. The switch is one-way.
pub struct FallbackUserRepository<S>
where
    S: UserStore,
{
    persistent: Option<S>,
    transient: InMemoryUserStore,
    mode: RwLock<StorageMode>,
    fallback_enabled: bool,
    password_hasher: auth::PasswordHasher,
}

impl<S> FallbackUserRepository<S>
where
    S: UserStore,
{
    /// Serve from `store`, downgrading on connectivity failures when
    /// `fallback_enabled` is set.
    pub fn persistent(store: S, fallback_enabled: bool) -> Self {
        Self {
            persistent: Some(store),
            transient: InMemoryUserStore::new(),
            mode: RwLock::new(StorageMode::Persistent),
            fallback_enabled,
            password_hasher: auth::PasswordHasher::new(),
        }
    }

    /// Serve from memory only.
    pub fn transient() -> Self {
        Self {
            persistent: None,
            transient: InMemoryUserStore::new(),
            mode: RwLock::new(StorageMode::Transient),
            fallback_enabled: false,
            password_hasher: auth::PasswordHasher::new(),
        }
    }

    pub async fn mode(&self) -> StorageMode {
        *self.mode.read().await
    }

    /// The persistent store, if it is still the active backend.
    async fn active_persistent(&self) -> Option<&S> {
        match *self.mode.read().await {
            StorageMode::Persistent => self.persistent.as_ref(),
            StorageMode::Transient => None,
        }
    }

    /// Decide whether a persistent-store error should trigger the fallback,
    /// performing the mode switch if so.
    async fn should_fall_back(&self, operation: &'static str, error: &UserError) -> bool {
        if !self.fallback_enabled || !matches!(error, UserError::StorageUnavailable(_)) {
            return false;
        }

        let mut mode = self.mode.write().await;
        if *mode == StorageMode::Persistent {
            *mode = StorageMode::Transient;
            tracing::warn!(
                operation,
                error = %error,
                from = %StorageMode::Persistent,
                to = %StorageMode::Transient,
                "Persistent storage unreachable, falling back to in-memory storage"
            );
        }

        true
    }

    /// Hash on the blocking pool.
    async fn hash_password(&self, password: &str) -> Result<String, UserError> {
        let hasher = self.password_hasher;
        let password = password.to_string();

        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| UserError::Unknown(format!("Password hashing task failed: {}", e)))?
            .map_err(UserError::from)
    }
}

#[async_trait]
impl<S> UserRepository for FallbackUserRepository<S>
where
    S: UserStore,
{
    async fn create(&self, command: CreateUserCommand) -> Result<User, UserError> {
        let now = Utc::now();
        let user = User {
            id: UserId::new(),
            name: command.name,
            email: command.email,
            password_hash: self.hash_password(command.password.as_str()).await?,
            role: command.role,
            created_at: now,
            updated_at: now,
        };

        if let Some(store) = self.active_persistent().await {
            match store.insert(user.clone()).await {
                Err(e) if self.should_fall_back("create", &e).await => {}
                result => return result,
            }
        }

        self.transient.insert(user).await
    }

    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, UserError> {
        if let Some(store) = self.active_persistent().await {
            match store.find_by_id(id).await {
                Err(e) if self.should_fall_back("find_by_id", &e).await => {}
                result => return result,
            }
        }

        self.transient.find_by_id(id).await
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, UserError> {
        if let Some(store) = self.active_persistent().await {
            match store.find_by_email(email).await {
                Err(e) if self.should_fall_back("find_by_email", &e).await => {}
                result => return result,
            }
        }

        self.transient.find_by_email(email).await
    }

    async fn find_all(
        &self,
        filter: &UserFilter,
        options: &ListOptions,
    ) -> Result<Vec<User>, UserError> {
        if let Some(store) = self.active_persistent().await {
            match store.find_page(filter, options).await {
                Err(e) if self.should_fall_back("find_all", &e).await => {}
                result => return result,
            }
        }

        self.transient.find_page(filter, options).await
    }

    async fn count(&self, filter: &UserFilter) -> Result<u64, UserError> {
        if let Some(store) = self.active_persistent().await {
            match store.count(filter).await {
                Err(e) if self.should_fall_back("count", &e).await => {}
                result => return result,
            }
        }

        self.transient.count(filter).await
    }

    async fn update(
        &self,
        id: &UserId,
        command: UpdateUserCommand,
    ) -> Result<Option<User>, UserError> {
        let password_hash = match &command.password {
            Some(password) => Some(self.hash_password(password.as_str()).await?),
            None => None,
        };
        let changes = UserChanges {
            name: command.name,
            email: command.email,
            password_hash,
            role: command.role,
            updated_at: Utc::now(),
        };

        if let Some(store) = self.active_persistent().await {
            match store.update(id, changes.clone()).await {
                Err(e) if self.should_fall_back("update", &e).await => {}
                result => return result,
            }
        }

        self.transient.update(id, changes).await
    }

    async fn delete(&self, id: &UserId) -> Result<Option<User>, UserError> {
        if let Some(store) = self.active_persistent().await {
            match store.delete(id).await {
                Err(e) if self.should_fall_back("delete", &e).await => {}
                result => return result,
            }
        }

        self.transient.delete(id).await
    }
}
