use std::fmt;
use std::sync::Arc;

use tracing::{debug, error, info};

use crate::client::GatewayClient;
use crate::coordinator::{Coordinator, CoordinatorBuilder};
use crate::protocol::DEFAULT_NAME;
use crate::Error;

/// What a successful setup check found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetupSummary {
    /// First device's home name, used as the integration title.
    pub title: String,
    pub device_count: usize,
}

#[derive(Debug)]
pub enum SetupError {
    CannotConnect(Error),
    NoDevices,
    Unknown(Error),
}

impl SetupError {
    /// Stable category string for the host's setup form.
    pub fn reason(&self) -> &'static str {
        match self {
            SetupError::CannotConnect(_) => "cannot_connect",
            SetupError::NoDevices => "no_devices",
            SetupError::Unknown(_) => "unknown",
        }
    }
}

impl fmt::Display for SetupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SetupError::CannotConnect(e) => write!(f, "cannot connect: {e}"),
            SetupError::NoDevices => write!(f, "no devices found"),
            SetupError::Unknown(e) => write!(f, "unexpected error: {e}"),
        }
    }
}

impl std::error::Error for SetupError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SetupError::CannotConnect(e) | SetupError::Unknown(e) => Some(e),
            SetupError::NoDevices => None,
        }
    }
}

impl From<Error> for SetupError {
    fn from(e: Error) -> Self {
        if e.is_gateway() {
            SetupError::CannotConnect(e)
        } else {
            SetupError::Unknown(e)
        }
    }
}

/// One fetch + normalize against a freshly configured host. Requires at
/// least one device.
pub async fn validate(client: &mut GatewayClient) -> Result<SetupSummary, SetupError> {
    debug!(host = client.host(), "validating gateway");
    let normalized = client.fetch_devices().await.inspect_err(|e| {
        if !e.is_gateway() {
            error!(host = client.host(), error = %e, "unexpected error during setup");
        }
    })?;

    let Some(first) = normalized.devices.first() else {
        return Err(SetupError::NoDevices);
    };
    let title = if first.home.is_empty() {
        DEFAULT_NAME.to_string()
    } else {
        first.home.clone()
    };

    Ok(SetupSummary {
        title,
        device_count: normalized.devices.len(),
    })
}

/// Builds the coordinator and runs its first refresh. The coordinator is only
/// handed out once that refresh succeeded.
pub async fn start(builder: CoordinatorBuilder) -> Result<Arc<Coordinator>, Error> {
    let coordinator = builder.build();
    let devices = coordinator.first_refresh().await?;
    info!(host = coordinator.host(), devices = devices.len(), "gateway ready");
    Ok(coordinator)
}
