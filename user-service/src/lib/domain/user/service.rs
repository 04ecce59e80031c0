use std::sync::Arc;

use async_trait::async_trait;
use auth::Authenticator;

use crate::domain::user::models::verify_password;
use crate::domain::user::models::CreateUserCommand;
use crate::domain::user::models::ListUsersQuery;
use crate::domain::user::models::LoginOutcome;
use crate::domain::user::models::Pagination;
use crate::domain::user::models::UpdateUserCommand;
use crate::domain::user::models::User;
use crate::domain::user::models::UserId;
use crate::domain::user::models::UserPage;
use crate::domain::user::models::UserProfile;
use crate::user::errors::UserError;
use crate::user::ports::UserRepository;
use crate::user::ports::UserServicePort;

/// Domain service implementation for user operations.
///
/// Enforces email uniqueness, verifies credentials and strips secrets from
/// every record it returns.
pub struct UserService<UR>
where
    UR: UserRepository,
{
    repository: Arc<UR>,
    authenticator: Arc<Authenticator>,
}

impl<UR> UserService<UR>
where
    UR: UserRepository,
{
    /// Create a new user service with injected dependencies.
    ///
    /// # Arguments
    /// * `repository` - User persistence implementation
    /// * `authenticator` - Access token issuer
    pub fn new(repository: Arc<UR>, authenticator: Arc<Authenticator>) -> Self {
        Self {
            repository,
            authenticator,
        }
    }
}

#[async_trait]
impl<UR> UserServicePort for UserService<UR>
where
    UR: UserRepository,
{
    async fn register(&self, command: CreateUserCommand) -> Result<UserProfile, UserError> {
        if self
            .repository
            .find_by_email(command.email.as_str())
            .await?
            .is_some()
        {
            return Err(UserError::EmailAlreadyExists(command.email.to_string()));
        }

        let user = self.repository.create(command).await?;
        tracing::info!(user_id = %user.id, role = %user.role, "User registered");

        Ok(UserProfile::from(&user))
    }

    async fn login(&self, email: &str, password: &str) -> Result<LoginOutcome, UserError> {
        let Some(user) = self.repository.find_by_email(email).await? else {
            tracing::debug!("Login rejected: unknown email");
            return Err(UserError::InvalidCredentials);
        };

        let record = user.clone();
        let candidate = password.to_string();
        let matches = tokio::task::spawn_blocking(move || verify_password(&record, &candidate))
            .await
            .map_err(|e| UserError::Unknown(format!("Password check task failed: {}", e)))??;

        if !matches {
            tracing::debug!(user_id = %user.id, "Login rejected: password mismatch");
            return Err(UserError::InvalidCredentials);
        }

        let issued = self
            .authenticator
            .issue_token(user.id)
            .map_err(|e| UserError::Unknown(format!("Token generation failed: {}", e)))?;

        tracing::info!(
            user_id = %user.id,
            expires_at = %issued.expires_at,
            "User logged in"
        );

        Ok(LoginOutcome {
            user: UserProfile::from(&user),
            token: issued.access_token,
        })
    }

    async fn list(&self, query: ListUsersQuery) -> Result<UserPage, UserError> {
        let users = self
            .repository
            .find_all(&query.filter, &query.options)
            .await?;
        let total = self.repository.count(&query.filter).await?;

        Ok(UserPage {
            users: users.iter().map(UserProfile::from).collect(),
            pagination: Pagination::new(total, &query.options),
        })
    }

    async fn get_by_id(&self, id: &UserId) -> Result<UserProfile, UserError> {
        self.repository
            .find_by_id(id)
            .await?
            .map(|user| UserProfile::from(&user))
            .ok_or(UserError::NotFound(id.to_string()))
    }

    async fn update(
        &self,
        id: &UserId,
        command: UpdateUserCommand,
    ) -> Result<UserProfile, UserError> {
        if let Some(email) = &command.email {
            if let Some(owner) = self.repository.find_by_email(email.as_str()).await? {
                if owner.id != *id {
                    return Err(UserError::EmailAlreadyExists(email.to_string()));
                }
            }
        }

        let user = self
            .repository
            .update(id, command)
            .await?
            .ok_or(UserError::NotFound(id.to_string()))?;
        tracing::info!(user_id = %user.id, "User updated");

        Ok(UserProfile::from(&user))
    }

    async fn remove(&self, id: &UserId) -> Result<(), UserError> {
        self.repository
            .delete(id)
            .await?
            .ok_or(UserError::NotFound(id.to_string()))?;
        tracing::info!(user_id = %id, "User deleted");

        Ok(())
    }

    async fn resolve_identity(&self, id: &UserId) -> Result<Option<User>, UserError> {
        self.repository.find_by_id(id).await
    }
}
