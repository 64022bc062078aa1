use std::process::Command;

use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum PowerError {
    #[error("failed to run suspend command: {0}")]
    Io(#[from] std::io::Error),

    #[error("suspend command exited with {0}")]
    CommandFailed(std::process::ExitStatus),
}

/// Ask the OS to suspend the machine via `systemctl suspend`.
///
/// Returns once the command itself has finished; the actual suspend happens
/// asynchronously, so the calling process may be frozen shortly after.
pub fn suspend() -> Result<(), PowerError> {
    info!("issuing system suspend");

    let status = Command::new("systemctl").arg("suspend").status()?;
    if !status.success() {
        return Err(PowerError::CommandFailed(status));
    }

    Ok(())
}
