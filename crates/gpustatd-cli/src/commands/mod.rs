pub mod count;
pub mod serve;
pub mod status;

use std::sync::Arc;

use gpustatd_core::NvmlProvider;
use gpustatd_core::provider::TelemetryProvider;

/// Attach to the NVML driver, or exit — nothing in this tool works without it.
pub fn make_provider() -> Arc<dyn TelemetryProvider> {
    match NvmlProvider::init() {
        Ok(provider) => Arc::new(provider),
        Err(err) => {
            eprintln!("Error initializing NVML: {err}");
            std::process::exit(1);
        }
    }
}
