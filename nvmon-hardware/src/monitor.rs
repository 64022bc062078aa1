use chrono::{DateTime, Local};
use nvml_wrapper::enum_wrappers::device::TemperatureSensor;
use nvml_wrapper::{Device, Nvml};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{GpuError, Result};

/// One reading of a single GPU, taken fresh each poll tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GpuSample {
    /// Local time the sample was taken.
    pub time: DateTime<Local>,

    /// Index of the sampled device.
    pub index: u32,

    /// GPU utilization (%).
    pub gpu_util: u32,

    /// Memory controller utilization (%).
    pub mem_util: u32,

    /// Core temperature (Celsius).
    pub temperature: u32,

    /// Fan speed (%).
    pub fan_speed: u32,
}

/// Scoped NVML session.
///
/// NVML is initialized exactly once on construction and shut down exactly
/// once when the session is dropped, on every exit path.
pub struct NvmlSession {
    nvml: Nvml,
    device_count: u32,
}

impl NvmlSession {
    /// Initialize NVML and enumerate the available devices.
    pub fn new() -> Result<Self> {
        debug!("initializing NVML");

        let nvml = Nvml::init()?;
        let device_count = nvml.device_count()?;
        debug!("NVML found {} GPU(s)", device_count);

        Ok(Self { nvml, device_count })
    }

    /// Number of devices enumerated at session start.
    pub fn device_count(&self) -> u32 {
        self.device_count
    }

    /// Product name of the device at `index`.
    pub fn device_name(&self, index: u32) -> Result<String> {
        let device = self.handle(index)?;
        Ok(device.name()?)
    }

    /// Query one sample for the GPU at `index`.
    ///
    /// The device handle is re-acquired on every call, so a device that
    /// disappears mid-run fails the query instead of returning stale data.
    pub fn sample(&self, index: u32) -> Result<GpuSample> {
        let device = self.handle(index)?;

        let util = device.utilization_rates()?;
        let temperature = device.temperature(TemperatureSensor::Gpu)?;
        let fan_speed = device.fan_speed(0)?;

        Ok(GpuSample {
            time: Local::now(),
            index,
            gpu_util: util.gpu,
            mem_util: util.memory,
            temperature,
            fan_speed,
        })
    }

    fn handle(&self, index: u32) -> Result<Device<'_>> {
        if index >= self.device_count {
            return Err(GpuError::DeviceNotFound {
                index,
                count: self.device_count,
            });
        }
        Ok(self.nvml.device_by_index(index)?)
    }
}

impl Drop for NvmlSession {
    fn drop(&mut self) {
        // The wrapped Nvml handle runs nvmlShutdown when it is dropped.
        debug!("releasing NVML session");
    }
}
