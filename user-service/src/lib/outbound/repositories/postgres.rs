use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::user::models::EmailAddress;
use crate::domain::user::models::ListOptions;
use crate::domain::user::models::SortField;
use crate::domain::user::models::User;
use crate::domain::user::models::UserChanges;
use crate::domain::user::models::UserFilter;
use crate::domain::user::models::UserId;
use crate::domain::user::models::UserName;
use crate::domain::user::models::UserSort;
use crate::domain::user::ports::UserStore;
use crate::user::errors::UserError;

const USER_COLUMNS: &str = "id, name, email, password_hash, role, created_at, updated_at";

/// Persistent backend: one `users` table with a unique index on `email`.
pub struct PostgresUserStore {
    pool: PgPool,
}

impl PostgresUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    name: String,
    email: String,
    password_hash: String,
    role: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = UserError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(User {
            id: UserId(row.id),
            name: UserName::new(row.name)?,
            email: EmailAddress::new(row.email)?,
            password_hash: row.password_hash,
            role: row.role.parse()?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Classify a driver error. Connectivity problems become `StorageUnavailable`
/// so the repository can fall back; unique violations become conflicts.
fn map_sqlx_error(error: sqlx::Error, email: Option<&EmailAddress>) -> UserError {
    match &error {
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => UserError::StorageUnavailable(error.to_string()),
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            UserError::EmailAlreadyExists(email.map(ToString::to_string).unwrap_or_default())
        }
        _ => UserError::DatabaseError(error.to_string()),
    }
}

fn order_by(sort: &UserSort) -> String {
    let column = match sort.field {
        SortField::CreatedAt => "created_at",
        SortField::UpdatedAt => "updated_at",
        SortField::Name => "name",
        SortField::Email => "email",
    };
    let direction = if sort.descending { "DESC" } else { "ASC" };

    format!("{} {}, id ASC", column, direction)
}

#[async_trait]
impl UserStore for PostgresUserStore {
    async fn insert(&self, user: User) -> Result<User, UserError> {
        sqlx::query(
            r#"
            INSERT INTO users (id, name, email, password_hash, role, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(user.id.0)
        .bind(user.name.as_str())
        .bind(user.email.as_str())
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error(e, Some(&user.email)))?;

        Ok(user)
    }

    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, UserError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users WHERE id = $1",
            USER_COLUMNS
        ))
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error(e, None))?;

        row.map(User::try_from).transpose()
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, UserError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users WHERE email = $1",
            USER_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error(e, None))?;

        row.map(User::try_from).transpose()
    }

    async fn find_page(
        &self,
        filter: &UserFilter,
        options: &ListOptions,
    ) -> Result<Vec<User>, UserError> {
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            SELECT {}
            FROM users
            WHERE ($1::TEXT IS NULL OR role = $1)
            ORDER BY {}
            LIMIT $2 OFFSET $3
            "#,
            USER_COLUMNS,
            order_by(&options.sort)
        ))
        .bind(filter.role.map(|role| role.as_str()))
        .bind(i64::from(options.limit))
        .bind(i64::try_from(options.skip()).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error(e, None))?;

        rows.into_iter().map(User::try_from).collect()
    }

    async fn count(&self, filter: &UserFilter) -> Result<u64, UserError> {
        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE ($1::TEXT IS NULL OR role = $1)")
                .bind(filter.role.map(|role| role.as_str()))
                .fetch_one(&self.pool)
                .await
                .map_err(|e| map_sqlx_error(e, None))?;

        Ok(u64::try_from(total).unwrap_or_default())
    }

    async fn update(&self, id: &UserId, changes: UserChanges) -> Result<Option<User>, UserError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            UPDATE users
            SET name = COALESCE($2, name),
                email = COALESCE($3, email),
                password_hash = COALESCE($4, password_hash),
                role = COALESCE($5, role),
                updated_at = $6
            WHERE id = $1
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(id.0)
        .bind(changes.name.as_ref().map(UserName::as_str))
        .bind(changes.email.as_ref().map(EmailAddress::as_str))
        .bind(changes.password_hash.as_deref())
        .bind(changes.role.map(|role| role.as_str()))
        .bind(changes.updated_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error(e, changes.email.as_ref()))?;

        row.map(User::try_from).transpose()
    }

    async fn delete(&self, id: &UserId) -> Result<Option<User>, UserError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "DELETE FROM users WHERE id = $1 RETURNING {}",
            USER_COLUMNS
        ))
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error(e, None))?;

        row.map(User::try_from).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_by_whitelist() {
        assert_eq!(order_by(&UserSort::default()), "created_at DESC, id ASC");
        assert_eq!(
            order_by(&UserSort {
                field: SortField::Email,
                descending: false
            }),
            "email ASC, id ASC"
        );
    }

    #[test]
    fn test_connectivity_errors_are_storage_unavailable() {
        assert!(matches!(
            map_sqlx_error(sqlx::Error::PoolTimedOut, None),
            UserError::StorageUnavailable(_)
        ));
        assert!(matches!(
            map_sqlx_error(
                sqlx::Error::Io(std::io::Error::from(std::io::ErrorKind::ConnectionRefused)),
                None
            ),
            UserError::StorageUnavailable(_)
        ));
        assert!(matches!(
            map_sqlx_error(sqlx::Error::RowNotFound, None),
            UserError::DatabaseError(_)
        ));
    }
}
