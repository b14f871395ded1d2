use anyhow::{Context, Result};
use chrono::{TimeZone, Utc};
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use crate::db::models::{
    Device, DeviceLocation, DeviceWithCount, Incident, IncidentWithDevice, PowerSample, Telemetry,
};

use super::{
    aggregate::{self, EnergyPoint, SystemHealth},
    Dashboard, DeviceDetail, DeviceStats, IncidentStats, DASHBOARD_INCIDENTS,
    DEFAULT_WINDOW_HOURS, DEVICE_DETAIL_INCIDENTS,
};

const DEVICE_COLUMNS: &str = "d.id, d.name, d.device_type, d.status, d.location, d.region, \
     d.lat, d.lng, d.firmware, d.uptime, d.cpu, d.temperature, d.signal, \
     d.last_seen, d.created_at, d.updated_at";

/// Read-side queries over devices, incidents and energy readings.
#[derive(Debug, Clone)]
pub struct FleetService {
    pool: PgPool,
}

impl FleetService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// All devices, most recently seen first, each with its incident count.
    pub async fn list_devices(&self) -> Result<Vec<DeviceWithCount>> {
        let sql = format!(
            "SELECT {DEVICE_COLUMNS}, \
                    (SELECT COUNT(*) FROM incidents i WHERE i.device_id = d.id) AS incident_count \
             FROM devices d \
             ORDER BY d.last_seen DESC"
        );
        sqlx::query_as::<_, DeviceWithCount>(&sql)
            .fetch_all(&self.pool)
            .await
            .context("failed to list devices")
    }

    /// A single device plus its latest incidents, or `None` if the id is unknown.
    pub async fn get_device(&self, id: Uuid) -> Result<Option<DeviceDetail>> {
        let sql = format!("SELECT {DEVICE_COLUMNS} FROM devices d WHERE d.id = $1");
        let Some(device) = sqlx::query_as::<_, Device>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("failed to fetch device")?
        else {
            return Ok(None);
        };

        let recent_incidents = sqlx::query_as::<_, Incident>(
            r#"
            SELECT id, device_id, issue, severity, resolved, created_at
            FROM incidents
            WHERE device_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(id)
        .bind(DEVICE_DETAIL_INCIDENTS)
        .fetch_all(&self.pool)
        .await
        .context("failed to fetch device incidents")?;

        Ok(Some(DeviceDetail { device, recent_incidents }))
    }

    pub async fn device_stats(&self) -> Result<DeviceStats> {
        sqlx::query_as::<_, DeviceStats>(
            r#"
            SELECT COUNT(*)                                   AS total,
                   COUNT(*) FILTER (WHERE status = 'online')  AS online,
                   COUNT(*) FILTER (WHERE status = 'offline') AS offline,
                   COUNT(*) FILTER (WHERE status = 'warning') AS warning
            FROM devices
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .context("failed to count devices")
    }

    /// Newest incidents first, joined with the owning device's name.
    pub async fn recent_incidents(&self, limit: u32) -> Result<Vec<IncidentWithDevice>> {
        sqlx::query_as::<_, IncidentWithDevice>(
            r#"
            SELECT i.id, i.device_id, i.issue, i.severity, i.resolved, i.created_at,
                   d.name AS device_name
            FROM incidents i
            JOIN devices d ON d.id = i.device_id
            ORDER BY i.created_at DESC
            LIMIT $1
            "#,
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .context("failed to fetch recent incidents")
    }

    pub async fn incident_stats(&self) -> Result<IncidentStats> {
        sqlx::query_as::<_, IncidentStats>(
            r#"
            SELECT COUNT(*)                                     AS total,
                   COUNT(*) FILTER (WHERE severity = 'critical') AS critical,
                   COUNT(*) FILTER (WHERE severity = 'warning')  AS warnings,
                   COUNT(*) FILTER (WHERE severity = 'info')     AS info,
                   COUNT(*) FILTER (WHERE NOT resolved)          AS unresolved
            FROM incidents
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .context("failed to count incidents")
    }

    /// Hourly mean power over the trailing `hours`, bucketed in `tz`.
    pub async fn energy_series<Tz: TimeZone>(&self, hours: u32, tz: &Tz) -> Result<Vec<EnergyPoint>> {
        let since = aggregate::window_start(Utc::now(), hours);
        let samples = sqlx::query_as::<_, PowerSample>(
            r#"
            SELECT power, timestamp
            FROM energy_readings
            WHERE timestamp >= $1
            ORDER BY timestamp ASC
            "#,
        )
        .bind(since)
        .fetch_all(&self.pool)
        .await
        .context("failed to fetch energy readings")?;

        debug!(hours, samples = samples.len(), "Bucketing energy readings");
        Ok(aggregate::hourly_energy(&samples, tz))
    }

    /// Sum of the latest reading of every device, kW.
    pub async fn current_power(&self) -> Result<f64> {
        let latest = sqlx::query_scalar::<_, f64>(
            r#"
            SELECT DISTINCT ON (device_id) power
            FROM energy_readings
            ORDER BY device_id, timestamp DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("failed to fetch latest power readings")?;

        Ok(aggregate::total_power(&latest))
    }

    pub async fn system_health(&self) -> Result<SystemHealth> {
        let telemetry =
            sqlx::query_as::<_, Telemetry>("SELECT cpu, temperature, signal FROM devices")
                .fetch_all(&self.pool)
                .await
                .context("failed to fetch device telemetry")?;

        Ok(aggregate::system_health(&telemetry))
    }

    /// Devices that can be placed on the map.
    pub async fn device_locations(&self) -> Result<Vec<DeviceLocation>> {
        sqlx::query_as::<_, DeviceLocation>(
            r#"
            SELECT id, name, status, region, lat, lng
            FROM devices
            WHERE lat IS NOT NULL
              AND lng IS NOT NULL
            ORDER BY name
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("failed to fetch device locations")
    }

    pub async fn dashboard<Tz: TimeZone>(&self, tz: &Tz) -> Result<Dashboard> {
        let (devices, incidents, current_power, energy, recent_incidents, health, locations) = tokio::try_join!(
            self.device_stats(),
            self.incident_stats(),
            self.current_power(),
            self.energy_series(DEFAULT_WINDOW_HOURS, tz),
            self.recent_incidents(DASHBOARD_INCIDENTS),
            self.system_health(),
            self.device_locations(),
        )?;

        Ok(Dashboard {
            devices,
            incidents,
            current_power,
            energy,
            recent_incidents,
            health,
            locations,
        })
    }
}
