use std::sync::Arc;
use std::time::Duration;

use auth::Authenticator;
use axum::body::Body;
use axum::handler::Handler;
use axum::http::Request;
use axum::http::Response;
use axum::middleware;
use axum::routing::get;
use axum::routing::post;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::Span;

use super::handlers::create_user::create_user;
use super::handlers::delete_user::delete_user;
use super::handlers::get_user::get_user;
use super::handlers::list_users::list_users;
use super::handlers::login::login;
use super::handlers::not_found;
use super::handlers::root;
use super::handlers::update_user::update_user;
use super::middleware::authenticate;
use super::middleware::expose_error_detail;
use crate::domain::user::service::UserService;
use crate::outbound::repositories::FallbackUserRepository;
use crate::outbound::repositories::PostgresUserStore;

/// Repository served to the HTTP layer: Postgres with in-memory fallback.
pub type UserRepositoryAdapter = FallbackUserRepository<PostgresUserStore>;

#[derive(Clone)]
pub struct AppState {
    pub user_service: Arc<UserService<UserRepositoryAdapter>>,
    pub authenticator: Arc<Authenticator>,
}

/// Build the application router.
///
/// # Arguments
/// * `user_service` - Domain service backing every route
/// * `authenticator` - Verifies bearer tokens on protected routes
/// * `expose_error_details` - Add the underlying error text to 500 responses
pub fn create_router(
    user_service: Arc<UserService<UserRepositoryAdapter>>,
    authenticator: Arc<Authenticator>,
    expose_error_details: bool,
) -> Router {
    let state = AppState {
        user_service,
        authenticator,
    };

    let authenticated = middleware::from_fn_with_state(state.clone(), authenticate);

    // Unsupported methods on a known path sit behind authentication, then 404.
    let protected_not_found = not_found.layer(authenticated.clone());

    let user_routes = Router::new()
        .route(
            "/users",
            get(list_users)
                .route_layer(authenticated.clone())
                .post(create_user)
                .fallback(protected_not_found.clone()),
        )
        .route(
            "/users/login",
            post(login).fallback(protected_not_found.clone()),
        )
        .route(
            "/users/:user_id",
            get(get_user)
                .patch(update_user)
                .delete(delete_user)
                .route_layer(authenticated)
                .fallback(protected_not_found),
        );

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(|request: &Request<Body>| {
            tracing::info_span!(
                "http_request",
                method = %request.method(),
                uri = %request.uri(),
                version = ?request.version(),
            )
        })
        .on_request(|request: &Request<Body>, _span: &Span| {
            tracing::info!(
                method = %request.method(),
                uri = %request.uri(),
                "Request started"
            );
        })
        .on_response(
            |response: &Response<Body>, latency: Duration, _span: &Span| {
                tracing::info!(
                    status = response.status().as_u16(),
                    latency_ms = latency.as_millis(),
                    "Request completed"
                );
            },
        );

    let router = Router::new()
        .route("/", get(root).fallback(not_found))
        .nest("/v1", user_routes)
        .fallback(not_found);

    let router = if expose_error_details {
        router.layer(middleware::map_response(expose_error_detail))
    } else {
        router
    };

    router
        .layer(trace_layer)
        .layer(CorsLayer::permissive())
        .with_state(state)
}
