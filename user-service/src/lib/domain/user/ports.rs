use async_trait::async_trait;

use crate::domain::user::models::CreateUserCommand;
use crate::domain::user::models::ListOptions;
use crate::domain::user::models::ListUsersQuery;
use crate::domain::user::models::LoginOutcome;
use crate::domain::user::models::UpdateUserCommand;
use crate::domain::user::models::User;
use crate::domain::user::models::UserChanges;
use crate::domain::user::models::UserFilter;
use crate::domain::user::models::UserId;
use crate::domain::user::models::UserPage;
use crate::domain::user::models::UserProfile;
use crate::user::errors::UserError;

/// Port for user domain service operations.
#[async_trait]
pub trait UserServicePort: Send + Sync + 'static {
    /// Register a new user.
    ///
    /// # Returns
    /// Sanitized profile of the created user
    ///
    /// # Errors
    /// * `EmailAlreadyExists` - Email is already registered
    /// * `StorageUnavailable` / `DatabaseError` - Storage failed
    async fn register(&self, command: CreateUserCommand) -> Result<UserProfile, UserError>;

    /// Verify credentials and issue an access token.
    ///
    /// # Errors
    /// * `InvalidCredentials` - Unknown email or wrong password (indistinguishable)
    async fn login(&self, email: &str, password: &str) -> Result<LoginOutcome, UserError>;

    /// Retrieve one page of users with pagination metadata.
    async fn list(&self, query: ListUsersQuery) -> Result<UserPage, UserError>;

    /// Retrieve user by unique identifier.
    ///
    /// # Errors
    /// * `NotFound` - User does not exist
    async fn get_by_id(&self, id: &UserId) -> Result<UserProfile, UserError>;

    /// Update existing user with optional fields.
    ///
    /// # Errors
    /// * `NotFound` - User does not exist
    /// * `EmailAlreadyExists` - New email belongs to another user
    async fn update(
        &self,
        id: &UserId,
        command: UpdateUserCommand,
    ) -> Result<UserProfile, UserError>;

    /// Delete existing user.
    ///
    /// # Errors
    /// * `NotFound` - User does not exist
    async fn remove(&self, id: &UserId) -> Result<(), UserError>;

    /// Look up the full record a verified token refers to.
    ///
    /// # Returns
    /// `None` when the user no longer exists
    async fn resolve_identity(&self, id: &UserId) -> Result<Option<User>, UserError>;
}

/// Single point of access to user records, independent of the active backend.
#[async_trait]
pub trait UserRepository: Send + Sync + 'static {
    /// Hash the password, assign id and timestamps, then persist.
    ///
    /// # Returns
    /// Stored record, password hash included
    ///
    /// # Errors
    /// * `EmailAlreadyExists` - Email is already registered
    /// * `Password` - Hashing failed
    async fn create(&self, command: CreateUserCommand) -> Result<User, UserError>;

    /// Retrieve user by identifier (`None` if not found).
    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, UserError>;

    /// Retrieve user by exact email match (`None` if not found).
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, UserError>;

    /// Retrieve one page of users.
    async fn find_all(
        &self,
        filter: &UserFilter,
        options: &ListOptions,
    ) -> Result<Vec<User>, UserError>;

    /// Count users matching `filter`.
    async fn count(&self, filter: &UserFilter) -> Result<u64, UserError>;

    /// Apply a partial update, re-hashing a new password and refreshing `updated_at`.
    ///
    /// # Returns
    /// Updated record, or `None` if the id does not exist
    ///
    /// # Errors
    /// * `EmailAlreadyExists` - New email belongs to another user
    async fn update(
        &self,
        id: &UserId,
        command: UpdateUserCommand,
    ) -> Result<Option<User>, UserError>;

    /// Remove user, returning the removed record (`None` if not found).
    async fn delete(&self, id: &UserId) -> Result<Option<User>, UserError>;
}

/// Storage backend holding canonical user records.
///
/// Implementations enforce email uniqueness atomically and report
/// connectivity failures as `StorageUnavailable`.
#[async_trait]
pub trait UserStore: Send + Sync + 'static {
    /// Insert a fully-formed record.
    ///
    /// # Errors
    /// * `EmailAlreadyExists` - Another record holds the same email
    /// * `StorageUnavailable` - Backend unreachable
    async fn insert(&self, user: User) -> Result<User, UserError>;

    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, UserError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, UserError>;

    /// Retrieve a contiguous page of records.
    async fn find_page(
        &self,
        filter: &UserFilter,
        options: &ListOptions,
    ) -> Result<Vec<User>, UserError>;

    async fn count(&self, filter: &UserFilter) -> Result<u64, UserError>;

    /// Apply changes to an existing record.
    ///
    /// # Errors
    /// * `EmailAlreadyExists` - Changed email belongs to another record
    async fn update(&self, id: &UserId, changes: UserChanges) -> Result<Option<User>, UserError>;

    async fn delete(&self, id: &UserId) -> Result<Option<User>, UserError>;
}
