use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// Mirrors the `device_status` Postgres enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "device_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DeviceStatus {
    Online,
    Offline,
    Warning,
}

impl fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DeviceStatus::Online => "online",
            DeviceStatus::Offline => "offline",
            DeviceStatus::Warning => "warning",
        };
        f.write_str(s)
    }
}

/// Mirrors the `incident_severity` Postgres enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "incident_severity", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Critical,
    Warning,
    Info,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Critical => "critical",
            Severity::Warning => "warning",
            Severity::Info => "info",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    /// `None` for accounts provisioned by an external identity provider.
    pub password_hash: Option<String>,
    pub role: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct Device {
    pub id: Uuid,
    pub name: String,
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
    /// dBm, typically negative.
    pub signal: f64,
    pub last_seen: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A device row joined with the number of incidents raised against it.
#[derive(Debug, Clone, FromRow)]
pub struct DeviceWithCount {
    #[sqlx(flatten)]
    pub device: Device,
    pub incident_count: i64,
}

#[derive(Debug, Clone, FromRow)]
pub struct Incident {
    pub id: Uuid,
    pub device_id: Uuid,
    pub issue: String,
    pub severity: Severity,
    pub resolved: bool,
    pub created_at: DateTime<Utc>,
}

/// An incident joined with the owning device's display name.
#[derive(Debug, Clone, FromRow)]
pub struct IncidentWithDevice {
    #[sqlx(flatten)]
    pub incident: Incident,
    pub device_name: String,
}

/// A reading stripped to what the energy chart needs.
#[derive(Debug, Clone, Copy, PartialEq, FromRow)]
pub struct PowerSample {
    pub power: f64,
    pub timestamp: DateTime<Utc>,
}

/// The subset of device telemetry that feeds the health aggregate.
#[derive(Debug, Clone, Copy, PartialEq, FromRow)]
pub struct Telemetry {
    pub cpu: f64,
    pub temperature: f64,
    pub signal: f64,
}

#[derive(Debug, Clone, FromRow)]
pub struct DeviceLocation {
    pub id: Uuid,
    pub name: String,
    pub status: DeviceStatus,
    pub region: String,
    pub lat: f64,
    pub lng: f64,
}
