use axum::extract::rejection::JsonRejection;
use axum::extract::Path;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Extension;
use axum::Json;
use serde::Deserialize;

use crate::domain::user::models::EmailAddress;
use crate::domain::user::models::Password;
use crate::domain::user::models::Role;
use crate::domain::user::models::UpdateUserCommand;
use crate::domain::user::models::UserId;
use crate::domain::user::models::UserName;
use crate::inbound::http::handlers::ApiError;
use crate::inbound::http::handlers::ApiSuccess;
use crate::inbound::http::handlers::FieldErrors;
use crate::inbound::http::handlers::SingleUserResponseData;
use crate::inbound::http::middleware::AuthenticatedUser;
use crate::inbound::http::router::AppState;
use crate::user::errors::UserError;
use crate::user::ports::UserServicePort;

/// HTTP request body for updating a user (raw JSON)
#[derive(Debug, Default, Deserialize)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<String>,
}

impl UpdateUserRequest {
    fn try_into_command(self) -> Result<UpdateUserCommand, FieldErrors> {
        let mut errors = FieldErrors::default();

        let name = errors.check("name", self.name.map(UserName::new).transpose());
        let email = errors.check("email", self.email.map(EmailAddress::new).transpose());
        let password = errors.check("password", self.password.map(Password::new).transpose());
        let role = errors.check(
            "role",
            self.role.as_deref().map(str::parse::<Role>).transpose(),
        );

        match (name, email, password, role) {
            (Some(name), Some(email), Some(password), Some(role)) => Ok(UpdateUserCommand {
                name,
                email,
                password,
                role,
            }),
            _ => Err(errors),
        }
    }
}

pub async fn update_user(
    State(state): State<AppState>,
    Extension(actor): Extension<AuthenticatedUser>,
    Path(id): Path<String>,
    body: Result<Json<UpdateUserRequest>, JsonRejection>,
) -> Result<ApiSuccess<SingleUserResponseData>, ApiError> {
    // Unknown ids are reported before body validation
    let user_id = UserId::from_string(&id).map_err(UserError::from)?;
    let Json(req) = body?;
    let command = req.try_into_command()?;

    tracing::debug!(user_id = %user_id, actor = %actor.user_id, "Updating user");

    state
        .user_service
        .update(&user_id, command)
        .await
        .map_err(ApiError::from)
        .map(|ref user| ApiSuccess::new(StatusCode::OK, user.into()))
}
