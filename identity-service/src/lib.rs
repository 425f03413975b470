pub mod config;
pub mod db;
pub mod dtos;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod storage;
pub mod utils;

use axum::{
    middleware::from_fn_with_state,
    routing::{delete, get, post},
    Json, Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::config::{AuthConfig, Environment};
use crate::services::{
    AuditSink, EmailProvider, LoginService, OrgService, PasswordResetService, RbacResolver,
    ServiceError, SessionLedger, SsoResolver, TokenIssuer, TotpEngine,
};
use crate::storage::IdentityStore;

#[derive(OpenApi)]
#[openapi(
    paths(
        health_check,
        handlers::auth::register,
        handlers::auth::login,
        handlers::auth::login_2fa,
        handlers::auth::refresh,
        handlers::auth::logout,
        handlers::auth::me,
        handlers::auth::change_password,
        handlers::two_factor::setup,
        handlers::two_factor::verify_setup,
        handlers::two_factor::disable,
        handlers::password::forgot_password,
        handlers::password::reset_password,
        handlers::sso::authorize,
        handlers::sso::callback,
        handlers::org::create,
        handlers::org::members,
        handlers::org::invite,
        handlers::org::accept_invitation,
        handlers::org::remove_member,
        handlers::role::list,
        handlers::role::create,
        handlers::role::assign,
        handlers::role::revoke,
        handlers::role::member_roles,
    ),
    components(
        schemas(
            dtos::ErrorResponse,
            dtos::MessageResponse,
            dtos::auth::RegisterRequest,
            dtos::auth::LoginRequest,
            dtos::auth::TwoFactorLoginRequest,
            dtos::auth::TwoFactorVerifyRequest,
            dtos::auth::RefreshRequest,
            dtos::auth::LogoutRequest,
            dtos::auth::ChangePasswordRequest,
            dtos::auth::ForgotPasswordRequest,
            dtos::auth::ResetPasswordRequest,
            dtos::auth::AuthResponse,
            dtos::auth::TwoFactorChallengeResponse,
            dtos::auth::TwoFactorSetupResponse,
            dtos::auth::AuthorizeUrlResponse,
            models::AccountResponse,
            models::organization::CreateOrganizationRequest,
            models::organization::OrganizationResponse,
            models::organization::MemberResponse,
            models::invitation::CreateInvitationRequest,
            models::invitation::AcceptInvitationRequest,
            models::invitation::InvitationResponse,
            models::role::CreateRoleRequest,
            models::role::RoleResponse,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Authentication", description = "Credential, session and token lifecycle"),
        (name = "Two-Factor", description = "TOTP enrollment"),
        (name = "SSO", description = "Third-party identity providers"),
        (name = "Organizations", description = "Organizations, invitations and membership"),
        (name = "Roles", description = "RBAC role management"),
        (name = "Observability", description = "Service health"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: AuthConfig,
    pub store: Arc<dyn IdentityStore>,
    pub tokens: Arc<TokenIssuer>,
    pub login: LoginService,
    pub sso: SsoResolver,
    pub rbac: RbacResolver,
    pub orgs: OrgService,
    pub reset: PasswordResetService,
}

impl AppState {
    /// Wire the full service graph over any store/mailer/audit backends.
    /// `main` passes the Postgres store and SMTP; tests pass the in-memory
    /// store and recording mocks.
    pub fn build(
        config: AuthConfig,
        store: Arc<dyn IdentityStore>,
        email: Arc<dyn EmailProvider>,
        audit: Arc<dyn AuditSink>,
    ) -> Result<Self, ServiceError> {
        let tokens = Arc::new(TokenIssuer::new(&config.jwt));
        let totp = Arc::new(TotpEngine::new(config.totp.issuer.clone()));
        let sessions = SessionLedger::new(store.clone(), config.jwt.refresh_token_expiry_days);

        let login = LoginService::new(
            store.clone(),
            tokens.clone(),
            totp,
            sessions.clone(),
            audit.clone(),
            email.clone(),
        );
        let sso = SsoResolver::new(&config.sso, store.clone(), login.clone())?;
        let rbac = RbacResolver::new(store.clone());
        let orgs = OrgService::new(store.clone(), rbac.clone(), audit.clone(), email.clone());
        let reset = PasswordResetService::new(store.clone(), sessions, email, audit);

        Ok(Self {
            config,
            store,
            tokens,
            login,
            sso,
            rbac,
            orgs,
            reset,
        })
    }
}

pub fn build_router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(health_check))
        .route("/auth/register", post(handlers::auth::register))
        .route("/auth/login", post(handlers::auth::login))
        .route("/auth/login/2fa", post(handlers::auth::login_2fa))
        .route("/auth/refresh", post(handlers::auth::refresh))
        .route(
            "/auth/forgot-password",
            post(handlers::password::forgot_password),
        )
        .route(
            "/auth/reset-password",
            post(handlers::password::reset_password),
        )
        .route("/sso/:provider/authorize", get(handlers::sso::authorize))
        .route("/sso/:provider/callback", get(handlers::sso::callback))
        .route(
            "/invitations/:token/accept",
            post(handlers::org::accept_invitation),
        );

    let protected_routes = Router::new()
        .route("/auth/logout", post(handlers::auth::logout))
        .route("/auth/me", get(handlers::auth::me))
        .route(
            "/auth/change-password",
            post(handlers::auth::change_password),
        )
        .route("/auth/2fa/setup", get(handlers::two_factor::setup))
        .route(
            "/auth/2fa/setup/verify",
            post(handlers::two_factor::verify_setup),
        )
        .route("/auth/2fa", delete(handlers::two_factor::disable))
        .route("/organizations", post(handlers::org::create))
        .route(
            "/organizations/:org_id/members",
            get(handlers::org::members),
        )
        .route(
            "/organizations/:org_id/members/:member_id",
            delete(handlers::org::remove_member),
        )
        .route(
            "/organizations/:org_id/members/:member_id/roles",
            get(handlers::role::member_roles),
        )
        .route(
            "/organizations/:org_id/invitations",
            post(handlers::org::invite),
        )
        .route(
            "/organizations/:org_id/roles",
            get(handlers::role::list).post(handlers::role::create),
        )
        .route(
            "/organizations/:org_id/roles/:role_id/assign/:member_id",
            post(handlers::role::assign).delete(handlers::role::revoke),
        )
        .layer(from_fn_with_state(
            state.clone(),
            middleware::auth_middleware,
        ));

    let mut app = Router::new().merge(public_routes).merge(protected_routes);

    // Swagger UI is a dev convenience; production serves only the JSON document.
    if state.config.environment == Environment::Dev {
        app = app.merge(SwaggerUi::new("/docs").url("/.well-known/openapi.json", ApiDoc::openapi()));
    } else {
        app = app.route(
            "/.well-known/openapi.json",
            get(|| async { Json(ApiDoc::openapi()) }),
        );
    }

    let cors = CorsLayer::new()
        .allow_origin(
            state
                .config
                .security
                .allowed_origins
                .iter()
                .filter_map(|origin| match origin.parse() {
                    Ok(value) => Some(value),
                    Err(e) => {
                        tracing::error!(origin = %origin, error = %e, "invalid CORS origin");
                        None
                    }
                })
                .collect::<Vec<axum::http::HeaderValue>>(),
        )
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::PATCH,
            axum::http::Method::DELETE,
            axum::http::Method::OPTIONS,
        ])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
        ]);

    app.with_state(state)
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                )
            }),
        )
        .layer(cors)
}

/// Service health check
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy"),
        (status = 500, description = "Store unreachable")
    ),
    tag = "Observability"
)]
pub async fn health_check(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    state.store.health_check().await.map_err(|e| {
        tracing::error!(error = %e, "store health check failed");
        ServiceError::Store(e)
    })?;

    Ok(Json(serde_json::json!({
        "status": "healthy",
        "service": state.config.service_name,
        "version": state.config.service_version,
    })))
}
