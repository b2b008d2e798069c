//! Telemetry provider boundary.
//!
//! The aggregation pipeline reads hardware state only through the
//! [`TelemetryProvider`] trait. Providers return raw, machine-oriented values;
//! humanization (MiB strings, `"N/A"`) happens at the response-shaping edge in
//! [`crate::status`].

use std::collections::BTreeMap;

use thiserror::Error;

/// Failure reading hardware or process state.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// NVML driver or device error, surfaced with the driver's message.
    #[error(transparent)]
    Nvml(#[from] nvml_wrapper::error::NvmlError),
    /// Any other provider-level failure.
    #[error("{0}")]
    Unavailable(String),
}

/// A process's GPU memory reading, which some drivers cannot report
/// (Windows under WDDM, some virtualized setups).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GpuMemory {
    /// Byte count reported by the driver.
    Known(u64),
    /// Driver could not report a value for this process.
    Unavailable,
}

/// Current hardware metrics for one device.
#[derive(Debug, Clone)]
pub struct DeviceMetrics {
    pub name: String,
    /// Fan speed reading, percent. 0 on fanless boards.
    pub fan_speed: u32,
    /// Core temperature, degrees Celsius.
    pub temperature: u32,
    /// Display string, e.g. `"42W / 350W"`, or `"N/A"` when the driver
    /// exposes no power readings.
    pub power_status: String,
    /// GPU utilization, percent.
    pub gpu_utilization: u32,
    pub memory_total: u64,
    pub memory_used: u64,
    pub memory_free: u64,
}

/// Current metrics for one process on one device.
///
/// `kind` is a short classification code: `"C"` (compute), `"G"` (graphics),
/// `"C+G"` (both), or `"NA"` when the provider cannot classify. Codes compose
/// by concatenation, which is what makes substring filter matching in
/// [`crate::status::ProcessFilter`] meaningful.
#[derive(Debug, Clone)]
pub struct ProcessMetrics {
    pub username: String,
    pub command: String,
    pub kind: String,
    pub gpu_memory: GpuMemory,
}

/// Interface the status pipeline requires from a telemetry backend.
///
/// Calls may block for the duration of a driver round-trip; nothing in this
/// crate caches or retries them.
pub trait TelemetryProvider: Send + Sync {
    /// Number of visible devices.
    fn device_count(&self) -> Result<u32, ProviderError>;

    /// Current hardware metrics for the device at `idx`.
    fn device_metrics(&self, idx: u32) -> Result<DeviceMetrics, ProviderError>;

    /// Current per-process metrics for the device at `idx`, keyed by pid.
    ///
    /// The map is ordered, so iteration yields ascending pids — callers rely
    /// on that ordering in the flat process listing.
    fn device_processes(&self, idx: u32) -> Result<BTreeMap<u32, ProcessMetrics>, ProviderError>;
}
