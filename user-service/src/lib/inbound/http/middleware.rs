use axum::extract::Request;
use axum::extract::State;
use axum::http::header;
use axum::middleware::Next;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::Json;

use crate::domain::user::models::Role;
use crate::domain::user::models::UserId;
use crate::domain::user::ports::UserServicePort;
use crate::inbound::http::handlers::ApiError;
use crate::inbound::http::handlers::ApiErrorBody;
use crate::inbound::http::handlers::ErrorDetail;
use crate::inbound::http::handlers::INTERNAL_SERVER_ERROR_MESSAGE;
use crate::inbound::http::router::AppState;

const NOT_LOGGED_IN: &str = "You are not logged in. Please log in to get access.";
const INVALID_TOKEN: &str = "Invalid token. Please log in again.";
const USER_NO_LONGER_EXISTS: &str = "The user belonging to this token no longer exists.";
const PERMISSION_DENIED: &str = "You do not have permission to perform this action";

/// Roles allowed through an admin-only route.
pub const ADMIN_ONLY: &[Role] = &[Role::Admin];

/// Identity resolved from a verified token, stored in request extensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub user_id: UserId,
    pub email: String,
    pub role: Role,
}

/// Middleware that validates the bearer token and resolves it to a live user.
///
/// # Errors
/// * `401` - Missing or malformed header, bad signature, expired token,
///   unparseable subject, or a subject that no longer exists
pub async fn authenticate(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_bearer_token(&req)
        .ok_or_else(|| ApiError::Unauthorized(NOT_LOGGED_IN.to_string()))?;

    let claims = state.authenticator.validate_token(token).map_err(|e| {
        tracing::warn!(error = %e, "JWT validation failed");
        ApiError::Unauthorized(INVALID_TOKEN.to_string())
    })?;

    let user_id = UserId::from_string(claims.subject()).map_err(|e| {
        tracing::warn!(error = %e, "Token subject is not a user id");
        ApiError::Unauthorized(INVALID_TOKEN.to_string())
    })?;

    let user = state
        .user_service
        .resolve_identity(&user_id)
        .await?
        .ok_or_else(|| {
            tracing::warn!(user_id = %user_id, "Token subject no longer exists");
            ApiError::Unauthorized(USER_NO_LONGER_EXISTS.to_string())
        })?;

    req.extensions_mut().insert(AuthenticatedUser {
        user_id: user.id,
        email: user.email.as_str().to_string(),
        role: user.role,
    });

    Ok(next.run(req).await)
}

/// Middleware that admits only callers whose role is in `roles`.
///
/// Must run after [`authenticate`].
pub async fn restrict_to(
    State(roles): State<&'static [Role]>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(user) = req.extensions().get::<AuthenticatedUser>() else {
        return Err(ApiError::Unauthorized(NOT_LOGGED_IN.to_string()));
    };

    if !roles.contains(&user.role) {
        tracing::warn!(user_id = %user.user_id, role = %user.role, "Role not permitted");
        return Err(ApiError::Forbidden(PERMISSION_DENIED.to_string()));
    }

    Ok(next.run(req).await)
}

/// Response mapper that adds the underlying error text to 500 bodies.
pub async fn expose_error_detail(response: Response) -> Response {
    match response.extensions().get::<ErrorDetail>().cloned() {
        Some(ErrorDetail(detail)) => (
            response.status(),
            Json(ApiErrorBody::new(INTERNAL_SERVER_ERROR_MESSAGE).with_detail(detail)),
        )
            .into_response(),
        None => response,
    }
}

fn extract_bearer_token(req: &Request) -> Option<&str> {
    req.headers()
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use auth::Authenticator;
    use axum::body::Body;
    use axum::http::StatusCode;
    use axum::middleware;
    use axum::routing::get;
    use axum::Extension;
    use axum::Router;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use super::*;
    use crate::domain::user::models::CreateUserCommand;
    use crate::domain::user::models::EmailAddress;
    use crate::domain::user::models::Password;
    use crate::domain::user::models::UserName;
    use crate::domain::user::service::UserService;
    use crate::inbound::http::router::UserRepositoryAdapter;

    const SECRET: &[u8] = b"test-secret-key-for-jwt-signing-at-least-32-bytes";

    async fn whoami(Extension(user): Extension<AuthenticatedUser>) -> String {
        user.email
    }

    fn state() -> AppState {
        let authenticator = Arc::new(Authenticator::new(SECRET, 1));
        AppState {
            user_service: Arc::new(UserService::new(
                Arc::new(UserRepositoryAdapter::transient()),
                Arc::clone(&authenticator),
            )),
            authenticator,
        }
    }

    fn protected(state: AppState) -> Router {
        Router::new()
            .route("/", get(whoami))
            .route_layer(middleware::from_fn_with_state(state.clone(), authenticate))
            .with_state(state)
    }

    fn request(authorization: Option<&str>) -> Request {
        let builder = axum::http::Request::builder().uri("/");
        let builder = match authorization {
            Some(value) => builder.header(header::AUTHORIZATION, value),
            None => builder,
        };
        builder.body(Body::empty()).unwrap()
    }

    async fn message(response: Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        body["message"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_missing_or_malformed_header() {
        for authorization in [None, Some("Token abc"), Some("Bearer ")] {
            let response = protected(state()).oneshot(request(authorization)).await.unwrap();

            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
            assert_eq!(message(response).await, NOT_LOGGED_IN);
        }
    }

    #[tokio::test]
    async fn test_invalid_token() {
        let response = protected(state())
            .oneshot(request(Some("Bearer not.a.jwt")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(message(response).await, INVALID_TOKEN);
    }

    #[tokio::test]
    async fn test_expired_token() {
        let expired = Authenticator::new(SECRET, -2)
            .issue_token(UserId::new())
            .unwrap()
            .access_token;

        let response = protected(state())
            .oneshot(request(Some(&format!("Bearer {}", expired))))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(message(response).await, INVALID_TOKEN);
    }

    #[tokio::test]
    async fn test_token_for_missing_user() {
        let state = state();
        let token = state
            .authenticator
            .issue_token(UserId::new())
            .unwrap()
            .access_token;

        let response = protected(state)
            .oneshot(request(Some(&format!("Bearer {}", token))))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(message(response).await, USER_NO_LONGER_EXISTS);
    }

    #[tokio::test]
    async fn test_valid_token_resolves_identity() {
        let state = state();
        let profile = state
            .user_service
            .register(CreateUserCommand::new(
                UserName::new("Ann".to_string()).unwrap(),
                EmailAddress::new("ann@x.com".to_string()).unwrap(),
                Password::new("password123".to_string()).unwrap(),
                Role::User,
            ))
            .await
            .unwrap();
        let token = state
            .authenticator
            .issue_token(profile.id)
            .unwrap()
            .access_token;

        let response = protected(state)
            .oneshot(request(Some(&format!("Bearer {}", token))))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], b"ann@x.com");
    }

    fn guarded(role: Option<Role>) -> Router {
        let router = Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(middleware::from_fn_with_state(ADMIN_ONLY, restrict_to));

        match role {
            Some(role) => router.layer(Extension(AuthenticatedUser {
                user_id: UserId::new(),
                email: "ann@x.com".to_string(),
                role,
            })),
            None => router,
        }
    }

    #[tokio::test]
    async fn test_restrict_to_rejects_other_roles() {
        let response = guarded(Some(Role::User))
            .oneshot(request(None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(message(response).await, PERMISSION_DENIED);
    }

    #[tokio::test]
    async fn test_restrict_to_admits_listed_role() {
        let response = guarded(Some(Role::Admin))
            .oneshot(request(None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_restrict_to_requires_authentication() {
        let response = guarded(None).oneshot(request(None)).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_expose_error_detail() {
        let response = expose_error_detail(
            ApiError::InternalServerError("pool timed out".to_string()).into_response(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["message"], INTERNAL_SERVER_ERROR_MESSAGE);
        assert_eq!(body["detail"], "pool timed out");
    }
}
