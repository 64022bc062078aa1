use thiserror::Error;

#[derive(Error, Debug)]
pub enum GpuError {
    #[error("NVML error: {0}")]
    Nvml(#[from] nvml_wrapper::error::NvmlError),

    #[error("GPU index {index} out of range, {count} device(s) present")]
    DeviceNotFound { index: u32, count: u32 },
}

pub type Result<T> = std::result::Result<T, GpuError>;
