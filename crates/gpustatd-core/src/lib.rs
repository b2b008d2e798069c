//! # gpustatd-core
//!
//! Point-in-time NVIDIA GPU telemetry: device enumeration, per-device hardware
//! metrics, and per-process GPU usage, assembled into a flat, serializable
//! status payload.
//!
//! ## Quick Start
//!
//! ```no_run
//! use gpustatd_core::{NvmlProvider, ProcessFilter, TelemetryProvider};
//! use gpustatd_core::status::{collect_status, resolve_indices};
//!
//! let provider = NvmlProvider::init().expect("NVML driver available");
//! let count = provider.device_count().expect("device count");
//!
//! // All devices, no process filter.
//! let indices = resolve_indices(None, count).unwrap();
//! let payload = collect_status(&provider, &indices, ProcessFilter::Any, count).unwrap();
//! println!("{} devices, {} processes", payload.devices.len(), payload.processes.len());
//! ```
//!
//! ## Architecture
//!
//! Provider → index resolution + process filter → aggregation → payload
//!
//! Every reading is a fresh snapshot taken at request time. Nothing is cached,
//! buffered, or aggregated over time: two consecutive calls re-read the
//! hardware and may disagree.
//!
//! The aggregation pipeline consumes hardware state only through the
//! [`TelemetryProvider`] trait, so tests (and alternative backends) can swap
//! out NVML. [`NvmlProvider`] is the production implementation.

pub mod nvml;
pub mod provider;
pub mod status;

pub use nvml::NvmlProvider;
pub use provider::{DeviceMetrics, GpuMemory, ProcessMetrics, ProviderError, TelemetryProvider};
pub use status::{
    DeviceSnapshot, ProcessEntry, ProcessFilter, StatusError, StatusPayload, collect_status,
    mib_human, resolve_indices,
};

/// Library version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
