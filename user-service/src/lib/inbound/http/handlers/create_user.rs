use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use super::ApiError;
use super::ApiSuccess;
use super::FieldErrors;
use super::SingleUserResponseData;
use crate::domain::user::models::CreateUserCommand;
use crate::domain::user::models::EmailAddress;
use crate::domain::user::models::Password;
use crate::domain::user::models::Role;
use crate::domain::user::models::UserName;
use crate::domain::user::ports::UserServicePort;
use crate::inbound::http::router::AppState;

pub async fn create_user(
    State(state): State<AppState>,
    body: Result<Json<CreateUserRequest>, JsonRejection>,
) -> Result<ApiSuccess<SingleUserResponseData>, ApiError> {
    let Json(body) = body?;

    state
        .user_service
        .register(body.try_into_command()?)
        .await
        .map_err(ApiError::from)
        .map(|ref user| ApiSuccess::new(StatusCode::CREATED, user.into()))
}

/// HTTP request body for creating a user (raw JSON)
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CreateUserRequest {
    name: Option<String>,
    email: Option<String>,
    password: Option<String>,
    role: Option<String>,
}

impl CreateUserRequest {
    fn try_into_command(self) -> Result<CreateUserCommand, FieldErrors> {
        let mut errors = FieldErrors::default();

        let name = errors.check("name", UserName::new(self.name.unwrap_or_default()));
        let email = errors.check("email", EmailAddress::new(self.email.unwrap_or_default()));
        let password = errors.check("password", Password::new(self.password.unwrap_or_default()));
        let role = errors.check(
            "role",
            self.role.as_deref().map(str::parse::<Role>).transpose(),
        );

        match (name, email, password, role) {
            (Some(name), Some(email), Some(password), Some(role)) => Ok(CreateUserCommand::new(
                name,
                email,
                password,
                role.unwrap_or_default(),
            )),
            _ => Err(errors),
        }
    }
}
