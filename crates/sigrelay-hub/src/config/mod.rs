//! Relay configuration.

pub mod schema;

pub use schema::{AuthSection, CommandDefault, CommandPolicy, GatewaySection, HubSection, RelayConfig};
