//! Pure reductions behind the dashboard widgets.
//!
//! Everything here works on already-fetched rows so it can be tested without
//! a database. Rounding is half-up toward positive infinity throughout, so
//! `-48.5` rounds to `-48` and `2.45` (one decimal) to `2.5`.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDateTime, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::db::models::{PowerSample, Telemetry};

/// Fleet-wide health figures, all integers. `memory_usage` and `network_io`
/// are display heuristics derived from CPU and signal and always lie in
/// `0..=100`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SystemHealth {
    /// Mean CPU load, percent.
    pub cpu_load: i64,
    pub memory_usage: i64,
    pub network_io: i64,
    /// Mean device temperature, degrees Celsius.
    pub temperature: i64,
}

/// One hourly bucket of the energy chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct EnergyPoint {
    /// Bucket label in the display time zone, e.g. `"02:00 PM"`.
    pub time: String,
    /// Mean power in the bucket, kW, one decimal.
    pub power: f64,
}

pub fn round_half_up(x: f64) -> f64 {
    (x + 0.5).floor()
}

/// Round to one decimal place.
pub fn round_tenth(x: f64) -> f64 {
    round_half_up(x * 10.0) / 10.0
}

/// Memory usage correlates with CPU: `0.85 * cpu + 15`.
pub fn derived_memory_usage(avg_cpu: i64) -> i64 {
    (round_half_up(avg_cpu as f64 * 0.85 + 15.0) as i64).clamp(0, 100)
}

/// Network throughput scales with signal strength: -100 dBm maps to 0,
/// 0 dBm maps to 80.
pub fn derived_network_io(avg_signal: i64) -> i64 {
    (round_half_up((avg_signal as f64 + 100.0) / 100.0 * 80.0) as i64).clamp(0, 100)
}

pub fn system_health(devices: &[Telemetry]) -> SystemHealth {
    // An empty fleet averages to zero rather than NaN.
    let count = devices.len().max(1) as f64;
    let mean = |field: fn(&Telemetry) -> f64| -> i64 {
        round_half_up(devices.iter().map(field).sum::<f64>() / count) as i64
    };

    let cpu_load = mean(|d| d.cpu);
    let temperature = mean(|d| d.temperature);
    let avg_signal = mean(|d| d.signal);

    SystemHealth {
        cpu_load,
        memory_usage: derived_memory_usage(cpu_load),
        network_io: derived_network_io(avg_signal),
        temperature,
    }
}

/// Group samples into hourly buckets of `tz` local time and average each.
///
/// Buckets are keyed by the full local date and hour, so a 48-hour window
/// produces two `"09:00 AM"` entries rather than merging them. Output is in
/// chronological order.
pub fn hourly_energy<Tz: TimeZone>(samples: &[PowerSample], tz: &Tz) -> Vec<EnergyPoint> {
    let mut buckets: BTreeMap<NaiveDateTime, (f64, u32)> = BTreeMap::new();

    for sample in samples {
        let local = sample.timestamp.with_timezone(tz).naive_local();
        let Some(hour) = local.date().and_hms_opt(local.hour(), 0, 0) else {
            continue;
        };
        let entry = buckets.entry(hour).or_insert((0.0, 0));
        entry.0 += sample.power;
        entry.1 += 1;
    }

    buckets
        .into_iter()
        .map(|(hour, (total, count))| EnergyPoint {
            time: hour.format("%I:00 %p").to_string(),
            power: round_tenth(total / count as f64),
        })
        .collect()
}

/// Total instantaneous draw: the sum of each device's latest reading.
pub fn total_power(latest: &[f64]) -> f64 {
    round_tenth(latest.iter().sum())
}

/// Lower bound of a trailing window of `hours` ending at `now`.
pub fn window_start(now: DateTime<Utc>, hours: u32) -> DateTime<Utc> {
    now - chrono::Duration::hours(i64::from(hours))
}
