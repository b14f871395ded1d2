use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    db::models::{
        Device, DeviceLocation, DeviceStatus, DeviceWithCount, Incident, IncidentWithDevice,
        Severity, User,
    },
    fleet::{
        aggregate::{EnergyPoint, SystemHealth},
        Dashboard, DeviceDetail, DeviceStats, IncidentStats,
    },
};

// ---------------------------------------------------------------------------
// Accounts
// ---------------------------------------------------------------------------

/// Request body for `POST /auth/register`. Missing fields count as empty and
/// fail validation.
#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RegisterResponse {
    /// Always `"success"`.
    pub status: String,
    pub user: UserDto,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LoginResponse {
    pub access_token: String,
    /// Always `"Bearer"`.
    pub token_type: String,
    /// Seconds until the token expires.
    pub expires_in: u64,
}

/// Request body for `PUT /auth/me`. Omitted fields are left unchanged.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ChangePasswordRequest {
    #[serde(default)]
    pub current_password: String,
    #[serde(default)]
    pub new_password: String,
}

/// Public view of a user; never carries the password hash.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UserDto {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<User> for UserDto {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            name: u.name,
            email: u.email,
            role: u.role,
            created_at: u.created_at,
            updated_at: u.updated_at,
        }
    }
}

// ---------------------------------------------------------------------------
// Devices
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DeviceDto {
    pub id: Uuid,
    pub name: String,
    /// sensor, gateway, controller, actuator, ...
    pub device_type: String,
    pub status: DeviceStatus,
    pub location: String,
    pub region: String,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub firmware: String,
    /// Percent.
    pub uptime: f64,
    /// Percent.
    pub cpu: f64,
    /// Degrees Celsius.
    pub temperature: f64,
    /// dBm.
    pub signal: f64,
    pub last_seen: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Device> for DeviceDto {
    fn from(d: Device) -> Self {
        Self {
            id: d.id,
            name: d.name,
            device_type: d.device_type,
            status: d.status,
            location: d.location,
            region: d.region,
            lat: d.lat,
            lng: d.lng,
            firmware: d.firmware,
            uptime: d.uptime,
            cpu: d.cpu,
            temperature: d.temperature,
            signal: d.signal,
            last_seen: d.last_seen,
            created_at: d.created_at,
            updated_at: d.updated_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DeviceListItemDto {
    #[serde(flatten)]
    pub device: DeviceDto,
    pub incident_count: i64,
}

impl From<DeviceWithCount> for DeviceListItemDto {
    fn from(d: DeviceWithCount) -> Self {
        Self {
            device: d.device.into(),
            incident_count: d.incident_count,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DeviceDetailDto {
    #[serde(flatten)]
    pub device: DeviceDto,
    /// The five most recent incidents, newest first.
    pub recent_incidents: Vec<IncidentDto>,
}

impl From<DeviceDetail> for DeviceDetailDto {
    fn from(d: DeviceDetail) -> Self {
        Self {
            device: d.device.into(),
            recent_incidents: d.recent_incidents.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DeviceLocationDto {
    pub id: Uuid,
    pub name: String,
    pub status: DeviceStatus,
    pub region: String,
    pub lat: f64,
    pub lng: f64,
}

impl From<DeviceLocation> for DeviceLocationDto {
    fn from(l: DeviceLocation) -> Self {
        Self {
            id: l.id,
            name: l.name,
            status: l.status,
            region: l.region,
            lat: l.lat,
            lng: l.lng,
        }
    }
}

// ---------------------------------------------------------------------------
// Incidents
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct IncidentDto {
    pub id: Uuid,
    pub device_id: Uuid,
    pub issue: String,
    pub severity: Severity,
    pub resolved: bool,
    pub created_at: DateTime<Utc>,
}

impl From<Incident> for IncidentDto {
    fn from(i: Incident) -> Self {
        Self {
            id: i.id,
            device_id: i.device_id,
            issue: i.issue,
            severity: i.severity,
            resolved: i.resolved,
            created_at: i.created_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct IncidentFeedItemDto {
    #[serde(flatten)]
    pub incident: IncidentDto,
    pub device_name: String,
}

impl From<IncidentWithDevice> for IncidentFeedItemDto {
    fn from(i: IncidentWithDevice) -> Self {
        Self {
            incident: i.incident.into(),
            device_name: i.device_name,
        }
    }
}

// ---------------------------------------------------------------------------
// Energy & dashboard
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CurrentPowerDto {
    /// Kilowatts, one decimal.
    pub power: f64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DashboardDto {
    pub devices: DeviceStats,
    pub incidents: IncidentStats,
    /// Kilowatts, one decimal.
    pub current_power: f64,
    pub energy: Vec<EnergyPoint>,
    pub recent_incidents: Vec<IncidentFeedItemDto>,
    pub health: SystemHealth,
    pub locations: Vec<DeviceLocationDto>,
}

impl From<Dashboard> for DashboardDto {
    fn from(d: Dashboard) -> Self {
        Self {
            devices: d.devices,
            incidents: d.incidents,
            current_power: d.current_power,
            energy: d.energy,
            recent_incidents: d.recent_incidents.into_iter().map(Into::into).collect(),
            health: d.health,
            locations: d.locations.into_iter().map(Into::into).collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Chat
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, ToSchema)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ChatResponse {
    pub response: String,
}

/// Body of every non-2xx response.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub error: String,
}
