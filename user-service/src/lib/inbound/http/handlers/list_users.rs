use axum::extract::rejection::QueryRejection;
use axum::extract::Query;
use axum::extract::State;
use axum::http::StatusCode;
use serde::Deserialize;
use serde::Serialize;

use super::ApiError;
use super::ApiSuccess;
use super::FieldErrors;
use super::UserData;
use crate::domain::user::models::ListOptions;
use crate::domain::user::models::ListUsersQuery;
use crate::domain::user::models::Pagination;
use crate::domain::user::models::Role;
use crate::domain::user::models::UserFilter;
use crate::domain::user::models::UserPage;
use crate::domain::user::models::UserSort;
use crate::domain::user::ports::UserServicePort;
use crate::inbound::http::router::AppState;

pub async fn list_users(
    State(state): State<AppState>,
    params: Result<Query<ListUsersParams>, QueryRejection>,
) -> Result<ApiSuccess<ListUsersResponseData>, ApiError> {
    let Query(params) = params?;

    state
        .user_service
        .list(params.try_into_query()?)
        .await
        .map_err(ApiError::from)
        .map(|ref page| ApiSuccess::new(StatusCode::OK, page.into()))
}

/// Raw query string parameters.
///
/// `page` and `limit` are parsed leniently: anything that is not a positive
/// integer falls back to the default.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ListUsersParams {
    page: Option<String>,
    limit: Option<String>,
    role: Option<String>,
    sort: Option<String>,
}

fn parse_positive(value: Option<&str>) -> Option<u32> {
    value.and_then(|v| v.trim().parse::<u32>().ok())
}

impl ListUsersParams {
    fn try_into_query(self) -> Result<ListUsersQuery, FieldErrors> {
        let mut errors = FieldErrors::default();

        let role = errors.check(
            "role",
            self.role.as_deref().map(str::parse::<Role>).transpose(),
        );
        let sort = errors.check(
            "sort",
            self.sort.as_deref().map(str::parse::<UserSort>).transpose(),
        );

        match (role, sort) {
            (Some(role), Some(sort)) => Ok(ListUsersQuery {
                filter: UserFilter { role },
                options: ListOptions::new(
                    parse_positive(self.page.as_deref()),
                    parse_positive(self.limit.as_deref()),
                    sort,
                ),
            }),
            _ => Err(errors),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListUsersResponseData {
    pub users: Vec<UserData>,
    pub pagination: PaginationData,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaginationData {
    pub total: u64,
    pub page: u32,
    pub limit: u32,
    pub pages: u64,
}

impl From<&Pagination> for PaginationData {
    fn from(pagination: &Pagination) -> Self {
        Self {
            total: pagination.total,
            page: pagination.page,
            limit: pagination.limit,
            pages: pagination.pages,
        }
    }
}

impl From<&UserPage> for ListUsersResponseData {
    fn from(page: &UserPage) -> Self {
        Self {
            users: page.users.iter().map(UserData::from).collect(),
            pagination: (&page.pagination).into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::user::models::SortField;

    fn params(page: &str, limit: &str) -> ListUsersParams {
        ListUsersParams {
            page: Some(page.to_string()),
            limit: Some(limit.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_defaults() {
        let query = ListUsersParams::default().try_into_query().unwrap();

        assert_eq!(query.options.page, 1);
        assert_eq!(query.options.limit, 10);
        assert_eq!(query.options.sort, UserSort::default());
        assert_eq!(query.filter.role, None);
    }

    #[test]
    fn test_unparseable_numbers_fall_back() {
        let query = params("abc", "0").try_into_query().unwrap();
        assert_eq!((query.options.page, query.options.limit), (1, 10));

        let query = params("-2", "5").try_into_query().unwrap();
        assert_eq!((query.options.page, query.options.limit), (1, 5));

        let query = params("3", "25").try_into_query().unwrap();
        assert_eq!((query.options.page, query.options.limit), (3, 25));
    }

    #[test]
    fn test_role_and_sort() {
        let query = ListUsersParams {
            role: Some("admin".to_string()),
            sort: Some("name".to_string()),
            ..Default::default()
        }
        .try_into_query()
        .unwrap();

        assert_eq!(query.filter.role, Some(Role::Admin));
        assert_eq!(query.options.sort.field, SortField::Name);
        assert!(!query.options.sort.descending);
    }

    #[test]
    fn test_invalid_role_and_sort_rejected() {
        let result = ListUsersParams {
            role: Some("root".to_string()),
            sort: Some("password_hash".to_string()),
            ..Default::default()
        }
        .try_into_query();

        match ApiError::from(result.unwrap_err()) {
            ApiError::BadRequest { errors, .. } => {
                assert_eq!(errors.len(), 2);
                assert_eq!(errors[1].message, "Cannot sort by 'password_hash'");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
