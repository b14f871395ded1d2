pub mod aggregate;
pub mod service;

pub use service::FleetService;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use crate::db::models::{Device, DeviceLocation, Incident, IncidentWithDevice};

use self::aggregate::{EnergyPoint, SystemHealth};

pub const DEFAULT_INCIDENT_LIMIT: u32 = 10;
pub const MAX_INCIDENT_LIMIT: u32 = 100;
pub const DEFAULT_WINDOW_HOURS: u32 = 24;
/// One week.
pub const MAX_WINDOW_HOURS: u32 = 168;
/// How many incidents the dashboard feed shows.
pub const DASHBOARD_INCIDENTS: u32 = 8;
/// How many incidents a device detail view shows.
pub const DEVICE_DETAIL_INCIDENTS: i64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRow, Serialize, Deserialize, ToSchema)]
pub struct DeviceStats {
    pub total: i64,
    pub online: i64,
    pub offline: i64,
    pub warning: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRow, Serialize, Deserialize, ToSchema)]
pub struct IncidentStats {
    pub total: i64,
    pub critical: i64,
    pub warnings: i64,
    pub info: i64,
    pub unresolved: i64,
}

#[derive(Debug, Clone)]
pub struct DeviceDetail {
    pub device: Device,
    /// Newest first.
    pub recent_incidents: Vec<Incident>,
}

/// Everything the landing page renders, fetched in one round trip.
#[derive(Debug, Clone)]
pub struct Dashboard {
    pub devices: DeviceStats,
    pub incidents: IncidentStats,
    pub current_power: f64,
    pub energy: Vec<EnergyPoint>,
    pub recent_incidents: Vec<IncidentWithDevice>,
    pub health: SystemHealth,
    pub locations: Vec<DeviceLocation>,
}

pub fn incident_limit(requested: Option<u32>) -> u32 {
    requested
        .unwrap_or(DEFAULT_INCIDENT_LIMIT)
        .clamp(1, MAX_INCIDENT_LIMIT)
}

pub fn window_hours(requested: Option<u32>) -> u32 {
    requested
        .unwrap_or(DEFAULT_WINDOW_HOURS)
        .clamp(1, MAX_WINDOW_HOURS)
}
