use chrono::{DateTime, Local};
use thiserror::Error;
use tracing::{debug, info, warn};

use nvmon_hardware::{power, GpuError, GpuSample, NvmlSession};

use crate::config::MonitorConfig;
use crate::policy::{PolicyDecision, ShutdownPolicy};

#[derive(Error, Debug)]
pub enum MonitorError {
    #[error(transparent)]
    Gpu(#[from] GpuError),

    #[error("signal handler error: {0}")]
    Signal(#[from] std::io::Error),
}

/// Polling loop over one GPU: one sample, one policy evaluation and one
/// status line per tick.
pub struct Monitor {
    session: NvmlSession,
    config: MonitorConfig,
    policy: Option<ShutdownPolicy>,
}

impl Monitor {
    /// Open an NVML session and validate the configured GPU index before the
    /// first tick.
    pub fn new(config: MonitorConfig) -> Result<Self, MonitorError> {
        let session = NvmlSession::new()?;

        if config.gpu_index >= session.device_count() {
            return Err(GpuError::DeviceNotFound {
                index: config.gpu_index,
                count: session.device_count(),
            }
            .into());
        }

        match session.device_name(config.gpu_index) {
            Ok(name) => info!("watching GPU {}: {}", config.gpu_index, name),
            Err(e) => warn!("failed to read GPU {} name: {}", config.gpu_index, e),
        }

        let policy = config.window.clone().map(ShutdownPolicy::new);
        if policy.is_none() {
            debug!("suspend policy disabled");
        }

        Ok(Self {
            session,
            config,
            policy,
        })
    }

    /// Run until interrupted (ctrl-c) or a fatal NVML error.
    ///
    /// A failed suspend command is logged and the loop carries on; the
    /// machine evidently did not go down. Any sampling error is fatal and
    /// propagates after the NVML session has been released.
    pub async fn run(&mut self) -> Result<(), MonitorError> {
        info!(
            "polling GPU {} every {:.1}s",
            self.config.gpu_index,
            self.config.interval.as_secs_f64()
        );

        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);

        loop {
            let sample = self.session.sample(self.config.gpu_index)?;

            if let Some(policy) = &mut self.policy {
                let decision = policy.evaluate(sample.gpu_util, sample.time);
                if decision == PolicyDecision::Suspend {
                    if let Err(e) = power::suspend() {
                        warn!("suspend command failed: {}", e);
                    }
                }
            }

            log_sample(&sample, self.planned());

            tokio::select! {
                _ = tokio::time::sleep(self.config.interval) => {}
                result = &mut ctrl_c => {
                    result?;
                    info!("interrupted, stopping monitor");
                    return Ok(());
                }
            }
        }
    }

    fn planned(&self) -> Option<DateTime<Local>> {
        self.policy.as_ref().and_then(ShutdownPolicy::planned)
    }
}

fn log_sample(sample: &GpuSample, planned: Option<DateTime<Local>>) {
    let suspend_note = planned
        .map(|at| format!(", will suspend at {}", at.format("%H:%M:%S")))
        .unwrap_or_default();

    info!(
        "gpu {} at {:02}%, mem at {:02}%, temp {:02}C, fan {:02}%{}",
        sample.index, sample.gpu_util, sample.mem_util, sample.temperature, sample.fan_speed, suspend_note
    );
}
