mod capability;
mod error;
mod gateway;

pub use capability::{CapabilityRecord, CapabilityRegistry};
pub use error::{GatewayError, Result};
pub use gateway::UpstreamGateway;
