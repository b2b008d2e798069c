//! Query validation and status aggregation.
//!
//! Turns the two optional query parameters (`idx`, `process`) into typed
//! values, walks the requested devices through a [`TelemetryProvider`], and
//! assembles the `{count, devices, processes}` payload. All-or-nothing: a
//! provider failure on any device aborts the whole aggregation.

use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use thiserror::Error;

use crate::provider::{GpuMemory, ProcessMetrics, ProviderError, TelemetryProvider};

const MIB: f64 = 1024.0 * 1024.0;

/// Failure validating a request or aggregating a snapshot.
#[derive(Debug, Error)]
pub enum StatusError {
    /// `idx` token failed to parse or fell outside `[0, device_count)`.
    #[error("Invalid GPU index")]
    InvalidIndex,
    /// `process` was not one of the allowed filter tokens.
    #[error("Invalid process type, choose from C, G, NA")]
    InvalidProcessType,
    /// Driver reported zero total memory, so utilization is undefined.
    #[error("device {idx} reports zero total memory")]
    ZeroMemoryTotal { idx: u32 },
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

impl StatusError {
    /// Whether this is a client-input failure (HTTP 400) as opposed to a
    /// provider/internal one (HTTP 500).
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::InvalidIndex | Self::InvalidProcessType)
    }
}

/// Point-in-time record of one GPU's hardware metrics.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceSnapshot {
    pub idx: u32,
    pub name: String,
    pub fan_speed: u32,
    pub temperature: u32,
    pub power_status: String,
    pub gpu_utilization: u32,
    pub memory_total: u64,
    pub memory_used: u64,
    pub memory_free: u64,
    pub memory_total_human: String,
    pub memory_used_human: String,
    pub memory_free_human: String,
    /// `round(memory_used / memory_total * 100)`.
    pub memory_utilization: u32,
    /// Epoch milliseconds, assigned when this device's metrics were read —
    /// not one request-wide timestamp.
    pub ts: u64,
}

/// Point-in-time record of one process's GPU usage on one device.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessEntry {
    /// Owning device's index, denormalized for flat listing.
    pub idx: u32,
    pub pid: u32,
    pub username: String,
    pub command: String,
    #[serde(rename = "type")]
    pub kind: String,
    /// `"<N>MiB"` or `"N/A"`.
    pub gpu_memory: String,
}

/// Full `/status` payload.
#[derive(Debug, Clone, Serialize)]
pub struct StatusPayload {
    /// Total visible device count — not the length of the requested index
    /// list, even when `idx` filters or duplicates devices.
    pub count: u32,
    pub devices: Vec<DeviceSnapshot>,
    pub processes: Vec<ProcessEntry>,
}

/// Process-type filter from the `process` query parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessFilter {
    /// No filter: absent or empty parameter.
    Any,
    Compute,
    Graphics,
    NotApplicable,
}

impl ProcessFilter {
    /// Parse the `process` query parameter. Absent and `""` both mean no
    /// filter; anything other than `C`, `G`, `NA` is a validation failure.
    pub fn parse(raw: Option<&str>) -> Result<Self, StatusError> {
        match raw.unwrap_or("") {
            "" => Ok(Self::Any),
            "C" => Ok(Self::Compute),
            "G" => Ok(Self::Graphics),
            "NA" => Ok(Self::NotApplicable),
            _ => Err(StatusError::InvalidProcessType),
        }
    }

    fn token(self) -> Option<&'static str> {
        match self {
            Self::Any => None,
            Self::Compute => Some("C"),
            Self::Graphics => Some("G"),
            Self::NotApplicable => Some("NA"),
        }
    }

    /// Substring containment of the filter token in the type code, so `C`
    /// matches a combined `"C+G"` process.
    pub fn matches(self, kind: &str) -> bool {
        match self.token() {
            None => true,
            Some(token) => kind.contains(token),
        }
    }
}

/// Resolve the `idx` query parameter against the current device count.
///
/// Absent → the full ordered sequence `[0, device_count)`. Present → each
/// comma-separated token parsed as an integer and range-checked. Duplicates
/// and ordering are preserved as given; the aggregator reads a device once
/// per occurrence.
pub fn resolve_indices(raw: Option<&str>, device_count: u32) -> Result<Vec<u32>, StatusError> {
    let Some(raw) = raw else {
        return Ok((0..device_count).collect());
    };
    raw.split(',')
        .map(|token| {
            let value: i64 = token.trim().parse().map_err(|_| StatusError::InvalidIndex)?;
            if value < 0 || value >= i64::from(device_count) {
                return Err(StatusError::InvalidIndex);
            }
            Ok(value as u32)
        })
        .collect()
}

/// Render a byte count as whole mebibytes, e.g. `"8192MiB"`.
pub fn mib_human(bytes: u64) -> String {
    format!("{}MiB", (bytes as f64 / MIB).round() as u64)
}

fn humanize_gpu_memory(memory: GpuMemory) -> String {
    match memory {
        GpuMemory::Known(bytes) => mib_human(bytes),
        GpuMemory::Unavailable => "N/A".to_string(),
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

fn snapshot_device(idx: u32, provider: &dyn TelemetryProvider) -> Result<DeviceSnapshot, StatusError> {
    let metrics = provider.device_metrics(idx)?;
    let ts = now_millis();
    if metrics.memory_total == 0 {
        return Err(StatusError::ZeroMemoryTotal { idx });
    }
    let memory_utilization =
        (metrics.memory_used as f64 / metrics.memory_total as f64 * 100.0).round() as u32;

    Ok(DeviceSnapshot {
        idx,
        name: metrics.name,
        fan_speed: metrics.fan_speed,
        temperature: metrics.temperature,
        power_status: metrics.power_status,
        gpu_utilization: metrics.gpu_utilization,
        memory_total: metrics.memory_total,
        memory_used: metrics.memory_used,
        memory_free: metrics.memory_free,
        memory_total_human: mib_human(metrics.memory_total),
        memory_used_human: mib_human(metrics.memory_used),
        memory_free_human: mib_human(metrics.memory_free),
        memory_utilization,
        ts,
    })
}

fn entry_for(idx: u32, pid: u32, metrics: ProcessMetrics) -> ProcessEntry {
    ProcessEntry {
        idx,
        pid,
        username: metrics.username,
        command: metrics.command,
        gpu_memory: humanize_gpu_memory(metrics.gpu_memory),
        kind: metrics.kind,
    }
}

/// Walk `indices` in order, snapshotting each device and its processes.
///
/// `device_count` is the total visible count already read for this request;
/// it is passed through unchanged as the payload's `count`. Any provider
/// failure mid-walk aborts the whole call — partial results are discarded.
pub fn collect_status(
    provider: &dyn TelemetryProvider,
    indices: &[u32],
    filter: ProcessFilter,
    device_count: u32,
) -> Result<StatusPayload, StatusError> {
    let mut devices = Vec::with_capacity(indices.len());
    let mut processes = Vec::new();

    for &idx in indices {
        devices.push(snapshot_device(idx, provider)?);

        // BTreeMap iteration yields ascending pids, the documented ordering
        // contract for the flat listing.
        let device_processes: BTreeMap<u32, ProcessMetrics> = provider.device_processes(idx)?;
        for (pid, metrics) in device_processes {
            if filter.matches(&metrics.kind) {
                processes.push(entry_for(idx, pid, metrics));
            }
        }
    }

    Ok(StatusPayload {
        count: device_count,
        devices,
        processes,
    })
}
