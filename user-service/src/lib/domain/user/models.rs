use std::fmt;
use std::str::FromStr;

use chrono::DateTime;
use chrono::Utc;
use uuid::Uuid;

use crate::user::errors::EmailError;
use crate::user::errors::NameError;
use crate::user::errors::PasswordPolicyError;
use crate::user::errors::RoleError;
use crate::user::errors::SortError;
use crate::user::errors::UserError;
use crate::user::errors::UserIdError;

/// User aggregate entity.
///
/// The canonical stored record. `password_hash` is the only secret field and
/// never crosses the service boundary; see [`UserProfile`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub name: UserName,
    pub email: EmailAddress,
    pub password_hash: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Compare a candidate plaintext against the record's stored hash.
///
/// # Errors
/// * `Password` - The stored hash is not a valid PHC string
pub fn verify_password(user: &User, candidate: &str) -> Result<bool, UserError> {
    Ok(auth::PasswordHasher::new().verify(candidate, &user.password_hash)?)
}

/// User unique identifier type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UserId(pub Uuid);

impl UserId {
    /// Generate a new random user ID (UUID v4).
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a user ID from string.
    ///
    /// # Errors
    /// * `InvalidFormat` - String is not a valid UUID
    pub fn from_string(s: &str) -> Result<Self, UserIdError> {
        Uuid::parse_str(s)
            .map(UserId)
            .map_err(|e| UserIdError::InvalidFormat(e.to_string()))
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Display name value type
///
/// Surrounding whitespace is trimmed; the remainder must be 2-50 characters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserName(String);

impl UserName {
    const MIN_LENGTH: usize = 2;
    const MAX_LENGTH: usize = 50;

    /// Create a new valid display name.
    ///
    /// # Errors
    /// * `Empty` - Nothing left after trimming
    /// * `TooShort` - Fewer than 2 characters
    /// * `TooLong` - More than 50 characters
    pub fn new(name: String) -> Result<Self, NameError> {
        let trimmed = name.trim();
        let length = trimmed.chars().count();

        if length == 0 {
            Err(NameError::Empty)
        } else if length < Self::MIN_LENGTH {
            Err(NameError::TooShort {
                min: Self::MIN_LENGTH,
            })
        } else if length > Self::MAX_LENGTH {
            Err(NameError::TooLong {
                max: Self::MAX_LENGTH,
            })
        } else {
            Ok(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Email address type
///
/// Validates email format using RFC 5322 compliant parser. Comparison is an
/// exact, case-sensitive string match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailAddress(String);

impl EmailAddress {
    /// Create a new validated email address.
    ///
    /// # Errors
    /// * `Empty` - Blank input
    /// * `InvalidFormat` - Email does not conform to RFC 5322
    pub fn new(email: String) -> Result<Self, EmailError> {
        if email.trim().is_empty() {
            return Err(EmailError::Empty);
        }

        email_address::EmailAddress::from_str(&email)
            .map(|_| EmailAddress(email))
            .map_err(|e| EmailError::InvalidFormat(e.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Plaintext password accepted for hashing.
///
/// Never printed: the `Debug` output is redacted.
#[derive(Clone, PartialEq, Eq)]
pub struct Password(String);

impl Password {
    const MIN_LENGTH: usize = 8;

    /// # Errors
    /// * `Empty` - Blank input
    /// * `TooShort` - Fewer than 8 characters
    pub fn new(password: String) -> Result<Self, PasswordPolicyError> {
        if password.is_empty() {
            Err(PasswordPolicyError::Empty)
        } else if password.chars().count() < Self::MIN_LENGTH {
            Err(PasswordPolicyError::TooShort {
                min: Self::MIN_LENGTH,
            })
        } else {
            Ok(Self(password))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Password(***)")
    }
}

/// Access role.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

impl FromStr for Role {
    type Err = RoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            other => Err(RoleError::Unknown(other.to_string())),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sanitized projection of a [`User`], safe to expose outside the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.as_str().to_string(),
            email: user.email.as_str().to_string(),
            role: user.role,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// Command to create a new user with domain types
#[derive(Debug, Clone)]
pub struct CreateUserCommand {
    pub name: UserName,
    pub email: EmailAddress,
    pub password: Password,
    pub role: Role,
}

impl CreateUserCommand {
    /// Construct a new create user command.
    ///
    /// # Arguments
    /// * `name` - Validated display name
    /// * `email` - Validated email address
    /// * `password` - Plaintext password (hashed by the repository)
    /// * `role` - Requested role
    pub fn new(name: UserName, email: EmailAddress, password: Password, role: Role) -> Self {
        Self {
            name,
            email,
            password,
            role,
        }
    }
}

/// Command to update an existing user with optional validated fields.
///
/// Only provided fields are changed.
#[derive(Debug, Clone, Default)]
pub struct UpdateUserCommand {
    pub name: Option<UserName>,
    pub email: Option<EmailAddress>,
    pub password: Option<Password>,
    pub role: Option<Role>,
}

/// Already-hashed field changes handed to a storage backend.
#[derive(Debug, Clone)]
pub struct UserChanges {
    pub name: Option<UserName>,
    pub email: Option<EmailAddress>,
    pub password_hash: Option<String>,
    pub role: Option<Role>,
    pub updated_at: DateTime<Utc>,
}

impl UserChanges {
    /// Apply the changes to a record in place.
    pub fn apply_to(&self, user: &mut User) {
        if let Some(name) = &self.name {
            user.name = name.clone();
        }
        if let Some(email) = &self.email {
            user.email = email.clone();
        }
        if let Some(password_hash) = &self.password_hash {
            user.password_hash = password_hash.clone();
        }
        if let Some(role) = self.role {
            user.role = role;
        }
        user.updated_at = self.updated_at;
    }
}

/// Filter criteria for listing users.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserFilter {
    pub role: Option<Role>,
}

/// Sortable user attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    CreatedAt,
    UpdatedAt,
    Name,
    Email,
}

/// Sort order, written as `field` or `-field` for descending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserSort {
    pub field: SortField,
    pub descending: bool,
}

impl Default for UserSort {
    fn default() -> Self {
        Self {
            field: SortField::CreatedAt,
            descending: true,
        }
    }
}

impl FromStr for UserSort {
    type Err = SortError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (descending, name) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s),
        };

        let field = match name {
            "createdAt" => SortField::CreatedAt,
            "updatedAt" => SortField::UpdatedAt,
            "name" => SortField::Name,
            "email" => SortField::Email,
            other => return Err(SortError::UnknownField(other.to_string())),
        };

        Ok(Self { field, descending })
    }
}

/// Pagination and ordering for a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListOptions {
    pub page: u32,
    pub limit: u32,
    pub sort: UserSort,
}

impl ListOptions {
    pub const DEFAULT_PAGE: u32 = 1;
    pub const DEFAULT_LIMIT: u32 = 10;

    /// Build options, substituting defaults for missing or zero values.
    pub fn new(page: Option<u32>, limit: Option<u32>, sort: Option<UserSort>) -> Self {
        Self {
            page: page.filter(|p| *p > 0).unwrap_or(Self::DEFAULT_PAGE),
            limit: limit.filter(|l| *l > 0).unwrap_or(Self::DEFAULT_LIMIT),
            sort: sort.unwrap_or_default(),
        }
    }

    /// Number of records preceding the requested page.
    pub fn skip(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }
}

impl Default for ListOptions {
    fn default() -> Self {
        Self::new(None, None, None)
    }
}

/// Query accepted by the listing operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListUsersQuery {
    pub filter: UserFilter,
    pub options: ListOptions,
}

/// Pagination metadata returned with a page of users.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub total: u64,
    pub page: u32,
    pub limit: u32,
    pub pages: u64,
}

impl Pagination {
    pub fn new(total: u64, options: &ListOptions) -> Self {
        Self {
            total,
            page: options.page,
            limit: options.limit,
            pages: total.div_ceil(u64::from(options.limit)),
        }
    }
}

/// One page of sanitized users.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserPage {
    pub users: Vec<UserProfile>,
    pub pagination: Pagination,
}

/// Result of a successful login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginOutcome {
    pub user: UserProfile,
    pub token: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_is_trimmed() {
        let name = UserName::new("  Ann  ".to_string()).unwrap();
        assert_eq!(name.as_str(), "Ann");
    }

    #[test]
    fn test_name_length_bounds() {
        assert_eq!(
            UserName::new("A".to_string()),
            Err(NameError::TooShort { min: 2 })
        );
        assert_eq!(UserName::new("   ".to_string()), Err(NameError::Empty));
        assert!(UserName::new("x".repeat(50)).is_ok());
        assert_eq!(
            UserName::new("x".repeat(51)),
            Err(NameError::TooLong { max: 50 })
        );
    }

    #[test]
    fn test_email_validation() {
        assert!(EmailAddress::new("ann@x.com".to_string()).is_ok());
        assert!(matches!(
            EmailAddress::new("not-an-email".to_string()),
            Err(EmailError::InvalidFormat(_))
        ));
        assert_eq!(EmailAddress::new(String::new()), Err(EmailError::Empty));
    }

    #[test]
    fn test_password_policy() {
        assert!(Password::new("password123".to_string()).is_ok());
        assert_eq!(
            Password::new("short".to_string()),
            Err(PasswordPolicyError::TooShort { min: 8 })
        );
        assert_eq!(
            format!("{:?}", Password::new("password123".to_string()).unwrap()),
            "Password(***)"
        );
    }

    #[test]
    fn test_role_parsing() {
        assert_eq!("admin".parse::<Role>(), Ok(Role::Admin));
        assert_eq!("user".parse::<Role>(), Ok(Role::User));
        assert!("root".parse::<Role>().is_err());
        assert_eq!(Role::default(), Role::User);
    }

    #[test]
    fn test_sort_parsing() {
        assert_eq!(
            "-createdAt".parse::<UserSort>(),
            Ok(UserSort {
                field: SortField::CreatedAt,
                descending: true
            })
        );
        assert_eq!(
            "name".parse::<UserSort>(),
            Ok(UserSort {
                field: SortField::Name,
                descending: false
            })
        );
        assert!("password".parse::<UserSort>().is_err());
    }

    #[test]
    fn test_list_options_defaults() {
        let options = ListOptions::new(Some(0), None, None);
        assert_eq!(options.page, 1);
        assert_eq!(options.limit, 10);
        assert_eq!(options.skip(), 0);

        let options = ListOptions::new(Some(3), Some(10), None);
        assert_eq!(options.skip(), 20);
    }

    #[test]
    fn test_pagination_pages_round_up() {
        let options = ListOptions::new(Some(2), Some(10), None);

        assert_eq!(Pagination::new(25, &options).pages, 3);
        assert_eq!(Pagination::new(20, &options).pages, 2);
        assert_eq!(Pagination::new(0, &options).pages, 0);
    }

    #[test]
    fn test_profile_has_no_secret() {
        let user = User {
            id: UserId::new(),
            name: UserName::new("Ann".to_string()).unwrap(),
            email: EmailAddress::new("ann@x.com".to_string()).unwrap(),
            password_hash: "$argon2id$secret".to_string(),
            role: Role::User,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let profile = UserProfile::from(&user);
        assert_eq!(profile.id, user.id);
        assert_eq!(profile.email, "ann@x.com");
        assert!(!format!("{:?}", profile).contains("argon2"));
    }

    #[test]
    fn test_verify_password_against_record() {
        let hash = auth::PasswordHasher::new().hash("password123").unwrap();
        let user = User {
            id: UserId::new(),
            name: UserName::new("Ann".to_string()).unwrap(),
            email: EmailAddress::new("ann@x.com".to_string()).unwrap(),
            password_hash: hash,
            role: Role::User,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        assert!(verify_password(&user, "password123").unwrap());
        assert!(!verify_password(&user, "password124").unwrap());
    }
}
