use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;
use tracing::info;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use uuid::Uuid;

use super::{
    dto::{
        ChangePasswordRequest, ChatRequest, ChatResponse, CurrentPowerDto, DashboardDto,
        DeviceDetailDto, DeviceDto, DeviceListItemDto, DeviceLocationDto, ErrorBody, IncidentDto,
        IncidentFeedItemDto, LoginRequest, LoginResponse, RegisterRequest, RegisterResponse,
        UpdateProfileRequest, UserDto,
    },
    errors::{ApiJson, ApiQuery, AppError},
    AppState,
};
use crate::{
    accounts::{
        service::{ProfileUpdate, Registration},
        Claims,
    },
    db::models::{DeviceStatus, Severity},
    fleet::{
        self,
        aggregate::{EnergyPoint, SystemHealth},
        DeviceStats, IncidentStats,
    },
};

// ---------------------------------------------------------------------------
// Query parameters
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct LimitParams {
    pub limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct WindowParams {
    pub hours: Option<u32>,
}

// ---------------------------------------------------------------------------
// Accounts
// ---------------------------------------------------------------------------

/// Create an account with the default `user` role.
#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = RegisterResponse),
        (status = 400, description = "Invalid input data.", body = ErrorBody),
        (status = 409, description = "Email already in use.", body = ErrorBody),
        (status = 500, description = "Something went wrong.", body = ErrorBody),
    ),
    tag = "auth"
)]
pub async fn register(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), AppError> {
    let user = state
        .accounts
        .register(Registration {
            name: body.name,
            email: body.email,
            password: body.password,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            status: "success".to_owned(),
            user: user.into(),
        }),
    ))
}

/// Exchange email and password for a bearer token.
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Session token", body = LoginResponse),
        (status = 401, description = "Invalid credentials.", body = ErrorBody),
    ),
    tag = "auth"
)]
pub async fn login(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let user = state.accounts.authenticate(&body.email, &body.password).await?;
    let access_token = state
        .tokens
        .issue(&user)
        .map_err(|e| AppError::Internal(e.into()))?;

    info!(user_id = %user.id, "User signed in");
    Ok(Json(LoginResponse {
        access_token,
        token_type: "Bearer".to_owned(),
        expires_in: state.tokens.expire_secs(),
    }))
}

#[utoipa::path(
    get,
    path = "/auth/me",
    responses(
        (status = 200, description = "Signed-in user", body = UserDto),
        (status = 401, description = "Missing or invalid token", body = ErrorBody),
        (status = 404, description = "Account no longer exists", body = ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "auth"
)]
pub async fn get_profile(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<UserDto>, AppError> {
    let user = state.accounts.profile(claims.sub).await?;
    Ok(Json(user.into()))
}

/// Change name and/or email. Omitted fields stay as they are.
#[utoipa::path(
    put,
    path = "/auth/me",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Updated user", body = UserDto),
        (status = 400, description = "Invalid input data.", body = ErrorBody),
        (status = 401, description = "Missing or invalid token", body = ErrorBody),
        (status = 409, description = "Email already in use.", body = ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "auth"
)]
pub async fn update_profile(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiJson(body): ApiJson<UpdateProfileRequest>,
) -> Result<Json<UserDto>, AppError> {
    let user = state
        .accounts
        .update_profile(
            claims.sub,
            ProfileUpdate {
                name: body.name,
                email: body.email,
            },
        )
        .await?;
    Ok(Json(user.into()))
}

#[utoipa::path(
    put,
    path = "/auth/me/password",
    request_body = ChangePasswordRequest,
    responses(
        (status = 204, description = "Password changed"),
        (status = 400, description = "Invalid input data.", body = ErrorBody),
        (status = 401, description = "Wrong current password or invalid token", body = ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "auth"
)]
pub async fn change_password(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiJson(body): ApiJson<ChangePasswordRequest>,
) -> Result<StatusCode, AppError> {
    state
        .accounts
        .change_password(claims.sub, &body.current_password, &body.new_password)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Devices
// ---------------------------------------------------------------------------

/// All devices, most recently seen first.
#[utoipa::path(
    get,
    path = "/devices",
    responses(
        (status = 200, description = "Device inventory", body = Vec<DeviceListItemDto>),
        (status = 401, description = "Missing or invalid token", body = ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "devices"
)]
pub async fn list_devices(
    State(state): State<AppState>,
) -> Result<Json<Vec<DeviceListItemDto>>, AppError> {
    let devices = state.fleet.list_devices().await?;
    Ok(Json(devices.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    get,
    path = "/devices/stats",
    responses(
        (status = 200, description = "Device counts by status", body = DeviceStats),
        (status = 401, description = "Missing or invalid token", body = ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "devices"
)]
pub async fn device_stats(State(state): State<AppState>) -> Result<Json<DeviceStats>, AppError> {
    Ok(Json(state.fleet.device_stats().await?))
}

/// Devices with coordinates, for the map widget.
#[utoipa::path(
    get,
    path = "/devices/locations",
    responses(
        (status = 200, description = "Map points", body = Vec<DeviceLocationDto>),
        (status = 401, description = "Missing or invalid token", body = ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "devices"
)]
pub async fn device_locations(
    State(state): State<AppState>,
) -> Result<Json<Vec<DeviceLocationDto>>, AppError> {
    let locations = state.fleet.device_locations().await?;
    Ok(Json(locations.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    get,
    path = "/devices/{id}",
    params(("id" = Uuid, Path, description = "Device ID")),
    responses(
        (status = 200, description = "Device with its latest incidents", body = DeviceDetailDto),
        (status = 401, description = "Missing or invalid token", body = ErrorBody),
        (status = 404, description = "Device not found.", body = ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "devices"
)]
pub async fn get_device(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DeviceDetailDto>, AppError> {
    let not_found = || AppError::NotFound("Device not found.".to_owned());
    let id = Uuid::parse_str(&id).map_err(|_| not_found())?;
    let detail = state.fleet.get_device(id).await?.ok_or_else(not_found)?;
    Ok(Json(detail.into()))
}

// ---------------------------------------------------------------------------
// Incidents
// ---------------------------------------------------------------------------

/// Newest incidents first. `limit` defaults to 10 and is clamped to 1..=100.
#[utoipa::path(
    get,
    path = "/incidents",
    params(("limit" = Option<u32>, Query, description = "Maximum number of incidents")),
    responses(
        (status = 200, description = "Recent incidents", body = Vec<IncidentFeedItemDto>),
        (status = 401, description = "Missing or invalid token", body = ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "incidents"
)]
pub async fn recent_incidents(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<LimitParams>,
) -> Result<Json<Vec<IncidentFeedItemDto>>, AppError> {
    let limit = fleet::incident_limit(params.limit);
    let incidents = state.fleet.recent_incidents(limit).await?;
    Ok(Json(incidents.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    get,
    path = "/incidents/stats",
    responses(
        (status = 200, description = "Incident counts", body = IncidentStats),
        (status = 401, description = "Missing or invalid token", body = ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "incidents"
)]
pub async fn incident_stats(
    State(state): State<AppState>,
) -> Result<Json<IncidentStats>, AppError> {
    Ok(Json(state.fleet.incident_stats().await?))
}

// ---------------------------------------------------------------------------
// Energy & health
// ---------------------------------------------------------------------------

/// Hourly mean power over a trailing window. `hours` defaults to 24 and is
/// clamped to 1..=168.
#[utoipa::path(
    get,
    path = "/energy/readings",
    params(("hours" = Option<u32>, Query, description = "Window length in hours")),
    responses(
        (status = 200, description = "Hourly series, oldest first", body = Vec<EnergyPoint>),
        (status = 401, description = "Missing or invalid token", body = ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "energy"
)]
pub async fn energy_readings(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<WindowParams>,
) -> Result<Json<Vec<EnergyPoint>>, AppError> {
    let hours = fleet::window_hours(params.hours);
    let series = state.fleet.energy_series(hours, &state.display_tz).await?;
    Ok(Json(series))
}

#[utoipa::path(
    get,
    path = "/energy/current",
    responses(
        (status = 200, description = "Sum of each device's latest reading", body = CurrentPowerDto),
        (status = 401, description = "Missing or invalid token", body = ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "energy"
)]
pub async fn current_power(
    State(state): State<AppState>,
) -> Result<Json<CurrentPowerDto>, AppError> {
    let power = state.fleet.current_power().await?;
    Ok(Json(CurrentPowerDto { power }))
}

#[utoipa::path(
    get,
    path = "/system/health",
    responses(
        (status = 200, description = "Fleet health aggregate", body = SystemHealth),
        (status = 401, description = "Missing or invalid token", body = ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "system"
)]
pub async fn system_health(
    State(state): State<AppState>,
) -> Result<Json<SystemHealth>, AppError> {
    Ok(Json(state.fleet.system_health().await?))
}

/// Everything the landing page shows in one response.
#[utoipa::path(
    get,
    path = "/dashboard",
    responses(
        (status = 200, description = "Dashboard summary", body = DashboardDto),
        (status = 401, description = "Missing or invalid token", body = ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "system"
)]
pub async fn dashboard(State(state): State<AppState>) -> Result<Json<DashboardDto>, AppError> {
    let summary = state.fleet.dashboard(&state.display_tz).await?;
    Ok(Json(summary.into()))
}

// ---------------------------------------------------------------------------
// Chat
// ---------------------------------------------------------------------------

/// Ask the assistant. Falls back to canned replies when no model is
/// configured or the model call fails.
#[utoipa::path(
    post,
    path = "/api/chat",
    request_body = ChatRequest,
    responses(
        (status = 200, description = "Assistant reply", body = ChatResponse),
        (status = 400, description = "Message is required", body = ErrorBody),
    ),
    tag = "chat"
)]
pub async fn chat(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    let response = state.chat.reply(&body.message).await?;
    Ok(Json(ChatResponse { response }))
}

// ---------------------------------------------------------------------------
// Health check
// ---------------------------------------------------------------------------

/// Returns `200 OK` with `{"status":"ok"}` when the server is running.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy"),
    ),
    tag = "system"
)]
pub async fn health() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({ "status": "ok" }))
}

// ---------------------------------------------------------------------------
// OpenAPI spec
// ---------------------------------------------------------------------------

struct BearerAuth;

impl Modify for BearerAuth {
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

#[derive(OpenApi)]
#[openapi(
    paths(
        register, login, get_profile, update_profile, change_password,
        list_devices, device_stats, device_locations, get_device,
        recent_incidents, incident_stats,
        energy_readings, current_power, system_health, dashboard,
        chat, health,
    ),
    components(schemas(
        RegisterRequest, RegisterResponse, LoginRequest, LoginResponse, UpdateProfileRequest,
        ChangePasswordRequest, UserDto, DeviceDto, DeviceListItemDto, DeviceDetailDto,
        DeviceLocationDto, IncidentDto, IncidentFeedItemDto, CurrentPowerDto, DashboardDto,
        ChatRequest, ChatResponse, ErrorBody, DeviceStats, IncidentStats, EnergyPoint,
        SystemHealth, DeviceStatus, Severity,
    )),
    modifiers(&BearerAuth),
    tags(
        (name = "auth",      description = "Accounts and sessions"),
        (name = "devices",   description = "Device inventory"),
        (name = "incidents", description = "Device incidents"),
        (name = "energy",    description = "Power consumption"),
        (name = "system",    description = "Fleet health and service endpoints"),
        (name = "chat",      description = "AI assistant"),
    ),
    info(
        title = "Zenith IoT Platform API",
        version = "0.1.0",
        description = "REST API behind the Zenith IoT dashboard"
    )
)]
pub struct ApiDoc;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use axum_test::TestServer;
    use chrono::{Duration, Utc};
    use serde_json::{json, Value};
    use sqlx::PgPool;
    use uuid::Uuid;

    use crate::{
        accounts::TokenKeys,
        api::{router, AppState},
        assistant::{canned, ChatService},
        db,
    };

    fn test_state(pool: PgPool) -> AppState {
        AppState::new(
            pool,
            TokenKeys::new("test-secret", 3600),
            ChatService::default(),
            chrono_tz::Tz::UTC,
        )
    }

    fn test_server(pool: PgPool) -> TestServer {
        TestServer::new(router(test_state(pool))).unwrap()
    }

    /// A server whose pool never connects; for endpoints that skip the database.
    fn offline_server() -> TestServer {
        test_server(db::lazy_pool())
    }

    async fn insert_device(
        pool: &PgPool,
        name: &str,
        status: &str,
        (cpu, temperature, signal): (f64, f64, f64),
        coords: Option<(f64, f64)>,
    ) -> Uuid {
        sqlx::query_scalar(
            "INSERT INTO devices \
                 (name, device_type, status, location, region, lat, lng, firmware, cpu, temperature, signal) \
             VALUES ($1, 'sensor', $2::device_status, 'Building A', 'Europe', $3, $4, 'v1.0.0', $5, $6, $7) \
             RETURNING id",
        )
        .bind(name)
        .bind(status)
        .bind(coords.map(|c| c.0))
        .bind(coords.map(|c| c.1))
        .bind(cpu)
        .bind(temperature)
        .bind(signal)
        .fetch_one(pool)
        .await
        .unwrap()
    }

    async fn insert_incident(pool: &PgPool, device_id: Uuid, issue: &str, severity: &str, resolved: bool) {
        sqlx::query(
            "INSERT INTO incidents (device_id, issue, severity, resolved) \
             VALUES ($1, $2, $3::incident_severity, $4)",
        )
        .bind(device_id)
        .bind(issue)
        .bind(severity)
        .bind(resolved)
        .execute(pool)
        .await
        .unwrap();
    }

    async fn insert_reading(pool: &PgPool, device_id: Uuid, power: f64, hours_ago: i64) {
        sqlx::query("INSERT INTO energy_readings (device_id, power, timestamp) VALUES ($1, $2, $3)")
            .bind(device_id)
            .bind(power)
            .bind(Utc::now() - Duration::hours(hours_ago))
            .execute(pool)
            .await
            .unwrap();
    }

    async fn signed_in(server: &TestServer) -> String {
        server
            .post("/auth/register")
            .json(&json!({ "name": "Admin User", "email": "admin@zenith-iot.com", "password": "admin123" }))
            .await
            .assert_status(StatusCode::CREATED);

        let resp = server
            .post("/auth/login")
            .json(&json!({ "email": "admin@zenith-iot.com", "password": "admin123" }))
            .await;
        resp.assert_status_ok();
        let body: Value = resp.json();
        body["access_token"].as_str().unwrap().to_owned()
    }

    // -----------------------------------------------------------------------
    // Public endpoints (no database)
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn health_returns_ok() {
        let resp = offline_server().get("/health").await;
        resp.assert_status_ok();
        let body: Value = resp.json();
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn openapi_spec_is_served() {
        let resp = offline_server().get("/api-docs/openapi.json").await;
        resp.assert_status_ok();
        let body: Value = resp.json();
        assert_eq!(body["info"]["title"], "Zenith IoT Platform API");
        assert!(body["paths"]["/devices/{id}"].is_object());
        assert_eq!(body["components"]["securitySchemes"]["bearer_auth"]["scheme"], "bearer");
    }

    #[tokio::test]
    async fn chat_returns_canned_reply_without_key() {
        let resp = offline_server()
            .post("/api/chat")
            .json(&json!({ "message": "How much power are we using?" }))
            .await;
        resp.assert_status_ok();
        let body: Value = resp.json();
        assert_eq!(body["response"], canned::ENERGY_REPLY);
    }

    #[tokio::test]
    async fn chat_without_message_is_bad_request() {
        let server = offline_server();
        for payload in [json!({}), json!({ "message": "" }), json!({ "message": "   " })] {
            let resp = server.post("/api/chat").json(&payload).await;
            resp.assert_status(StatusCode::BAD_REQUEST);
            let body: Value = resp.json();
            assert_eq!(body["error"], "Message is required");
        }
    }

    #[tokio::test]
    async fn chat_with_malformed_json_is_bad_request() {
        let resp = offline_server()
            .post("/api/chat")
            .bytes("{not json".as_bytes().into())
            .content_type("application/json")
            .await;
        resp.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = resp.json();
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn protected_routes_require_token() {
        let server = offline_server();
        for path in ["/devices", "/incidents", "/energy/readings", "/system/health", "/dashboard", "/auth/me"] {
            let resp = server.get(path).await;
            resp.assert_status(StatusCode::UNAUTHORIZED);
            let body: Value = resp.json();
            assert_eq!(body["error"], "missing authorization token");
        }
    }

    #[tokio::test]
    async fn forged_token_is_rejected() {
        let server = offline_server();
        let resp = server.get("/devices").authorization_bearer("not.a.token").await;
        resp.assert_status(StatusCode::UNAUTHORIZED);
        let body: Value = resp.json();
        assert_eq!(body["error"], "invalid or expired token");
    }

    // -----------------------------------------------------------------------
    // Accounts
    // -----------------------------------------------------------------------

    #[sqlx::test(migrations = "./migrations")]
    async fn register_and_fetch_profile(pool: PgPool) {
        let server = test_server(pool);
        let token = signed_in(&server).await;

        let resp = server.get("/auth/me").authorization_bearer(&token).await;
        resp.assert_status_ok();
        let body: Value = resp.json();
        assert_eq!(body["email"], "admin@zenith-iot.com");
        assert_eq!(body["role"], "user");
        assert!(body.get("password_hash").is_none());
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn register_existing_email_conflicts(pool: PgPool) {
        let server = test_server(pool);
        signed_in(&server).await;

        let resp = server
            .post("/auth/register")
            .json(&json!({ "name": "Someone", "email": "admin@zenith-iot.com", "password": "another1" }))
            .await;
        resp.assert_status(StatusCode::CONFLICT);
        let body: Value = resp.json();
        assert_eq!(body["error"], "Email already in use.");
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn register_invalid_input(pool: PgPool) {
        let server = test_server(pool);
        let resp = server
            .post("/auth/register")
            .json(&json!({ "name": "A", "email": "a@zenith-iot.com", "password": "abcdef" }))
            .await;
        resp.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = resp.json();
        assert_eq!(body["error"], "Invalid input data.");
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn login_with_wrong_password(pool: PgPool) {
        let server = test_server(pool);
        signed_in(&server).await;

        let resp = server
            .post("/auth/login")
            .json(&json!({ "email": "admin@zenith-iot.com", "password": "wrong-one" }))
            .await;
        resp.assert_status(StatusCode::UNAUTHORIZED);
        let body: Value = resp.json();
        assert_eq!(body["error"], "Invalid credentials.");
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn update_profile_and_password(pool: PgPool) {
        let server = test_server(pool);
        let token = signed_in(&server).await;

        let resp = server
            .put("/auth/me")
            .authorization_bearer(&token)
            .json(&json!({ "name": "Ops Lead" }))
            .await;
        resp.assert_status_ok();
        let body: Value = resp.json();
        assert_eq!(body["name"], "Ops Lead");
        assert_eq!(body["email"], "admin@zenith-iot.com");

        server
            .put("/auth/me/password")
            .authorization_bearer(&token)
            .json(&json!({ "current_password": "admin123", "new_password": "rotated-secret" }))
            .await
            .assert_status(StatusCode::NO_CONTENT);

        server
            .post("/auth/login")
            .json(&json!({ "email": "admin@zenith-iot.com", "password": "rotated-secret" }))
            .await
            .assert_status_ok();
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn change_password_with_wrong_current(pool: PgPool) {
        let server = test_server(pool);
        let token = signed_in(&server).await;

        let resp = server
            .put("/auth/me/password")
            .authorization_bearer(&token)
            .json(&json!({ "current_password": "nope-nope", "new_password": "rotated-secret" }))
            .await;
        resp.assert_status(StatusCode::UNAUTHORIZED);
    }

    // -----------------------------------------------------------------------
    // Devices & incidents
    // -----------------------------------------------------------------------

    #[sqlx::test(migrations = "./migrations")]
    async fn devices_empty_returns_empty_array(pool: PgPool) {
        let server = test_server(pool);
        let token = signed_in(&server).await;

        let resp = server.get("/devices").authorization_bearer(&token).await;
        resp.assert_status_ok();
        let body: Value = resp.json();
        assert_eq!(body, json!([]));
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn devices_list_carries_incident_counts(pool: PgPool) {
        let turbine = insert_device(&pool, "Turbine-04", "online", (45.0, 72.0, -42.0), None).await;
        insert_device(&pool, "Pump-07", "offline", (0.0, 25.0, -78.0), None).await;
        insert_incident(&pool, turbine, "Overheating detected", "critical", false).await;
        insert_incident(&pool, turbine, "Fan noise", "info", true).await;

        let server = test_server(pool);
        let token = signed_in(&server).await;

        let resp = server.get("/devices").authorization_bearer(&token).await;
        resp.assert_status_ok();
        let body: Vec<Value> = resp.json();
        assert_eq!(body.len(), 2);

        let t = body.iter().find(|d| d["name"] == "Turbine-04").unwrap();
        assert_eq!(t["incident_count"], 2);
        assert_eq!(t["status"], "online");
        let p = body.iter().find(|d| d["name"] == "Pump-07").unwrap();
        assert_eq!(p["incident_count"], 0);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn device_stats_counts_by_status(pool: PgPool) {
        insert_device(&pool, "A", "online", (10.0, 20.0, -40.0), None).await;
        insert_device(&pool, "B", "online", (10.0, 20.0, -40.0), None).await;
        insert_device(&pool, "C", "warning", (10.0, 20.0, -40.0), None).await;
        insert_device(&pool, "D", "offline", (10.0, 20.0, -40.0), None).await;

        let server = test_server(pool);
        let token = signed_in(&server).await;

        let resp = server.get("/devices/stats").authorization_bearer(&token).await;
        resp.assert_status_ok();
        let body: Value = resp.json();
        assert_eq!(body, json!({ "total": 4, "online": 2, "offline": 1, "warning": 1 }));
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn device_detail_limits_incidents_to_five(pool: PgPool) {
        let id = insert_device(&pool, "Server-A", "warning", (92.0, 85.0, -38.0), None).await;
        for n in 0..7 {
            insert_incident(&pool, id, &format!("issue {n}"), "warning", false).await;
        }

        let server = test_server(pool);
        let token = signed_in(&server).await;

        let resp = server
            .get(&format!("/devices/{id}"))
            .authorization_bearer(&token)
            .await;
        resp.assert_status_ok();
        let body: Value = resp.json();
        assert_eq!(body["name"], "Server-A");
        assert_eq!(body["recent_incidents"].as_array().unwrap().len(), 5);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn device_detail_not_found(pool: PgPool) {
        let server = test_server(pool);
        let token = signed_in(&server).await;

        for path in [format!("/devices/{}", Uuid::new_v4()), "/devices/not-a-uuid".to_owned()] {
            let resp = server.get(&path).authorization_bearer(&token).await;
            resp.assert_status(StatusCode::NOT_FOUND);
            let body: Value = resp.json();
            assert_eq!(body["error"], "Device not found.");
        }
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn locations_skip_devices_without_coordinates(pool: PgPool) {
        insert_device(&pool, "Mapped", "online", (1.0, 1.0, -50.0), Some((51.5074, -0.1278))).await;
        insert_device(&pool, "Unmapped", "online", (1.0, 1.0, -50.0), None).await;

        let server = test_server(pool);
        let token = signed_in(&server).await;

        let resp = server.get("/devices/locations").authorization_bearer(&token).await;
        resp.assert_status_ok();
        let body: Vec<Value> = resp.json();
        assert_eq!(body.len(), 1);
        assert_eq!(body[0]["name"], "Mapped");
        assert_eq!(body[0]["lat"], 51.5074);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn incidents_feed_and_stats(pool: PgPool) {
        let id = insert_device(&pool, "Turbine-04", "online", (45.0, 72.0, -42.0), None).await;
        insert_incident(&pool, id, "Overheating detected", "critical", false).await;
        insert_incident(&pool, id, "High CPU usage", "warning", false).await;
        insert_incident(&pool, id, "Firmware update available", "info", true).await;

        let server = test_server(pool);
        let token = signed_in(&server).await;

        let resp = server
            .get("/incidents")
            .add_query_param("limit", 2)
            .authorization_bearer(&token)
            .await;
        resp.assert_status_ok();
        let body: Vec<Value> = resp.json();
        assert_eq!(body.len(), 2);
        assert!(body.iter().all(|i| i["device_name"] == "Turbine-04"));

        let resp = server.get("/incidents/stats").authorization_bearer(&token).await;
        resp.assert_status_ok();
        let body: Value = resp.json();
        assert_eq!(
            body,
            json!({ "total": 3, "critical": 1, "warnings": 1, "info": 1, "unresolved": 2 })
        );
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn malformed_query_params_get_json_errors(pool: PgPool) {
        let server = test_server(pool);
        let token = signed_in(&server).await;

        for (path, key, value) in [("/incidents", "limit", "abc"), ("/energy/readings", "hours", "-1")] {
            let resp = server
                .get(path)
                .add_query_param(key, value)
                .authorization_bearer(&token)
                .await;
            resp.assert_status(StatusCode::BAD_REQUEST);
            let body: Value = resp.json();
            let message = body["error"].as_str().unwrap();
            assert!(message.contains(key), "{path}: {message}");
        }
    }

    // -----------------------------------------------------------------------
    // Energy, health, dashboard
    // -----------------------------------------------------------------------

    #[sqlx::test(migrations = "./migrations")]
    async fn current_power_sums_latest_per_device(pool: PgPool) {
        let a = insert_device(&pool, "A", "online", (1.0, 1.0, -50.0), None).await;
        let b = insert_device(&pool, "B", "online", (1.0, 1.0, -50.0), None).await;
        insert_reading(&pool, a, 500.0, 3).await;
        insert_reading(&pool, a, 100.3, 0).await;
        insert_reading(&pool, b, 114.2, 1).await;

        let server = test_server(pool);
        let token = signed_in(&server).await;

        let resp = server.get("/energy/current").authorization_bearer(&token).await;
        resp.assert_status_ok();
        let body: Value = resp.json();
        assert_eq!(body["power"], 214.5);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn energy_window_excludes_old_readings(pool: PgPool) {
        let a = insert_device(&pool, "A", "online", (1.0, 1.0, -50.0), None).await;
        insert_reading(&pool, a, 100.0, 2).await;
        insert_reading(&pool, a, 200.0, 1).await;
        insert_reading(&pool, a, 999.0, 30).await;

        let server = test_server(pool);
        let token = signed_in(&server).await;

        let resp = server.get("/energy/readings").authorization_bearer(&token).await;
        resp.assert_status_ok();
        let body: Vec<Value> = resp.json();
        assert_eq!(body.len(), 2);
        assert_eq!(body[0]["power"], 100.0);
        assert_eq!(body[1]["power"], 200.0);

        let resp = server
            .get("/energy/readings")
            .add_query_param("hours", 48)
            .authorization_bearer(&token)
            .await;
        let body: Vec<Value> = resp.json();
        assert_eq!(body.len(), 3);
        assert_eq!(body[0]["power"], 999.0);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn system_health_from_devices(pool: PgPool) {
        insert_device(&pool, "A", "online", (80.0, 40.0, -50.0), None).await;
        insert_device(&pool, "B", "online", (80.0, 60.0, -50.0), None).await;

        let server = test_server(pool);
        let token = signed_in(&server).await;

        let resp = server.get("/system/health").authorization_bearer(&token).await;
        resp.assert_status_ok();
        let body: Value = resp.json();
        assert_eq!(
            body,
            json!({ "cpu_load": 80, "memory_usage": 83, "network_io": 40, "temperature": 50 })
        );
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn system_health_of_empty_fleet(pool: PgPool) {
        let server = test_server(pool);
        let token = signed_in(&server).await;

        let resp = server.get("/system/health").authorization_bearer(&token).await;
        resp.assert_status_ok();
        let body: Value = resp.json();
        assert_eq!(body["memory_usage"], 15);
        assert_eq!(body["network_io"], 80);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn dashboard_combines_widgets(pool: PgPool) {
        let id = insert_device(&pool, "Turbine-04", "online", (45.0, 72.0, -42.0), Some((40.7128, -74.006))).await;
        insert_incident(&pool, id, "Overheating detected", "critical", false).await;
        insert_reading(&pool, id, 210.0, 0).await;

        let server = test_server(pool);
        let token = signed_in(&server).await;

        let resp = server.get("/dashboard").authorization_bearer(&token).await;
        resp.assert_status_ok();
        let body: Value = resp.json();
        assert_eq!(body["devices"]["total"], 1);
        assert_eq!(body["incidents"]["critical"], 1);
        assert_eq!(body["current_power"], 210.0);
        assert_eq!(body["energy"].as_array().unwrap().len(), 1);
        assert_eq!(body["recent_incidents"][0]["device_name"], "Turbine-04");
        assert_eq!(body["health"]["cpu_load"], 45);
        assert_eq!(body["locations"][0]["name"], "Turbine-04");
    }
}
