//! NVML-backed telemetry provider.
//!
//! Wraps `nvml-wrapper` for device metrics and merges the compute and graphics
//! process lists into one classified map. NVML only reports pids; usernames
//! and command lines come from the OS process table via `sysinfo`.

use std::collections::BTreeMap;
use std::sync::Mutex;

use nvml_wrapper::Nvml;
use nvml_wrapper::enum_wrappers::device::TemperatureSensor;
use nvml_wrapper::enums::device::UsedGpuMemory;
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System, UpdateKind, Users};

use crate::provider::{DeviceMetrics, GpuMemory, ProcessMetrics, ProviderError, TelemetryProvider};

/// Production [`TelemetryProvider`] backed by the NVIDIA Management Library.
pub struct NvmlProvider {
    nvml: Nvml,
    // Process-table cache; refreshed per-pid on demand.
    procs: Mutex<System>,
}

impl NvmlProvider {
    /// Load the NVML driver library and attach to it.
    ///
    /// Fails on machines without an NVIDIA driver; the error carries the
    /// driver's own message.
    pub fn init() -> Result<Self, ProviderError> {
        let nvml = Nvml::init()?;
        Ok(Self {
            nvml,
            procs: Mutex::new(System::new()),
        })
    }

    /// Resolve username and command line for `pid` from the process table.
    ///
    /// A pid that exits between the NVML read and this lookup resolves to
    /// `"N/A"` rather than failing the request.
    fn identify(&self, pid: u32) -> (String, String) {
        let target = Pid::from_u32(pid);
        let mut table = self.procs.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        table.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[target]),
            true,
            ProcessRefreshKind::nothing()
                .with_user(UpdateKind::Always)
                .with_cmd(UpdateKind::Always),
        );
        let Some(entry) = table.process(target) else {
            return ("N/A".to_string(), "N/A".to_string());
        };

        let command = if entry.cmd().is_empty() {
            entry.name().to_string_lossy().to_string()
        } else {
            entry
                .cmd()
                .iter()
                .map(|arg| arg.to_string_lossy())
                .collect::<Vec<_>>()
                .join(" ")
        };
        let username = entry
            .user_id()
            .and_then(|uid| {
                Users::new_with_refreshed_list()
                    .get_user_by_id(uid)
                    .map(|user| user.name().to_string())
            })
            .unwrap_or_else(|| "N/A".to_string());

        (username, command)
    }
}

fn known_memory(memory: &UsedGpuMemory) -> GpuMemory {
    match memory {
        UsedGpuMemory::Used(bytes) => GpuMemory::Known(*bytes),
        _ => GpuMemory::Unavailable,
    }
}

impl TelemetryProvider for NvmlProvider {
    fn device_count(&self) -> Result<u32, ProviderError> {
        Ok(self.nvml.device_count()?)
    }

    fn device_metrics(&self, idx: u32) -> Result<DeviceMetrics, ProviderError> {
        let device = self.nvml.device_by_index(idx)?;

        let memory = device.memory_info()?;
        let utilization = device.utilization_rates()?;
        // Milliwatts from the driver; readings are optional on older boards.
        let power_status = match (device.power_usage(), device.power_management_limit()) {
            (Ok(usage), Ok(limit)) => format!("{}W / {}W", usage / 1000, limit / 1000),
            _ => "N/A".to_string(),
        };

        Ok(DeviceMetrics {
            name: device.name()?,
            fan_speed: device.fan_speed(0).unwrap_or(0),
            temperature: device.temperature(TemperatureSensor::Gpu)?,
            power_status,
            gpu_utilization: utilization.gpu,
            memory_total: memory.total,
            memory_used: memory.used,
            memory_free: memory.free,
        })
    }

    fn device_processes(&self, idx: u32) -> Result<BTreeMap<u32, ProcessMetrics>, ProviderError> {
        let device = self.nvml.device_by_index(idx)?;

        // A pid can appear in both lists (CUDA + display on one process);
        // it then gets the combined "C+G" code and whichever memory reading
        // the driver managed to report.
        let mut merged: BTreeMap<u32, (&'static str, GpuMemory)> = BTreeMap::new();
        for proc in device.running_compute_processes()? {
            merged.insert(proc.pid, ("C", known_memory(&proc.used_gpu_memory)));
        }
        for proc in device.running_graphics_processes()? {
            let memory = known_memory(&proc.used_gpu_memory);
            merged
                .entry(proc.pid)
                .and_modify(|(kind, existing)| {
                    *kind = "C+G";
                    if *existing == GpuMemory::Unavailable {
                        *existing = memory;
                    }
                })
                .or_insert(("G", memory));
        }

        let mut processes = BTreeMap::new();
        for (pid, (kind, gpu_memory)) in merged {
            let (username, command) = self.identify(pid);
            processes.insert(
                pid,
                ProcessMetrics {
                    username,
                    command,
                    kind: kind.to_string(),
                    gpu_memory,
                },
            );
        }
        Ok(processes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_memory_used() {
        assert_eq!(
            known_memory(&UsedGpuMemory::Used(1024)),
            GpuMemory::Known(1024)
        );
    }

    #[test]
    fn test_known_memory_unavailable() {
        assert_eq!(
            known_memory(&UsedGpuMemory::Unavailable),
            GpuMemory::Unavailable
        );
    }
}
