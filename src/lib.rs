mod client;
mod climate;
mod coordinator;
mod credentials;
mod diff;
mod error;
mod logger;
mod normalize;
pub mod protocol;
pub mod setup;
mod types;

pub use client::{GatewayClient, GatewayClientBuilder};
pub use climate::{DeviceInfo, Features, Thermostat};
pub use coordinator::{Coordinator, CoordinatorBuilder, CoordinatorState, LastError, Phase};
pub use credentials::{CredentialProvider, NoCredentials, StaticCredentials};
pub use error::{Error, ErrorKind, ParseError, Result};
pub use logger::MessageLogMode;
pub use normalize::{Normalized, normalize};
pub use types::*;
