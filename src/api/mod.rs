pub mod auth;
pub mod dto;
pub mod errors;
pub mod handlers;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};
use chrono_tz::Tz;
use sqlx::PgPool;
use utoipa::OpenApi;
use utoipa_axum::router::OpenApiRouter;

use crate::{
    accounts::{AccountService, TokenKeys},
    assistant::ChatService,
    fleet::FleetService,
};

use handlers::ApiDoc;

/// Shared by every handler. All members are cheap to clone.
#[derive(Debug, Clone)]
pub struct AppState {
    pub fleet: FleetService,
    pub accounts: AccountService,
    pub chat: ChatService,
    pub tokens: Arc<TokenKeys>,
    /// Time zone used for hourly energy buckets.
    pub display_tz: Tz,
}

impl AppState {
    pub fn new(pool: PgPool, tokens: TokenKeys, chat: ChatService, display_tz: Tz) -> Self {
        Self {
            fleet: FleetService::new(pool.clone()),
            accounts: AccountService::new(pool),
            chat,
            tokens: Arc::new(tokens),
            display_tz,
        }
    }
}

pub fn router(state: AppState) -> Router {
    let (router, api) = OpenApiRouter::with_openapi(ApiDoc::openapi())
        .route("/auth/register", post(handlers::register))
        .route("/auth/login", post(handlers::login))
        .route(
            "/auth/me",
            get(handlers::get_profile).put(handlers::update_profile),
        )
        .route("/auth/me/password", put(handlers::change_password))
        .route("/devices", get(handlers::list_devices))
        .route("/devices/stats", get(handlers::device_stats))
        .route("/devices/locations", get(handlers::device_locations))
        .route("/devices/{id}", get(handlers::get_device))
        .route("/incidents", get(handlers::recent_incidents))
        .route("/incidents/stats", get(handlers::incident_stats))
        .route("/energy/readings", get(handlers::energy_readings))
        .route("/energy/current", get(handlers::current_power))
        .route("/system/health", get(handlers::system_health))
        .route("/dashboard", get(handlers::dashboard))
        .route("/api/chat", post(handlers::chat))
        .with_state(state.clone())
        .split_for_parts();

    router
        .route("/health", get(handlers::health))
        .route(
            "/api-docs/openapi.json",
            get(move || async move { axum::Json(api) }),
        )
        .layer(middleware::from_fn_with_state(state, auth::require_auth))
}
