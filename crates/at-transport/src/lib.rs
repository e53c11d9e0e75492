//! at-transport: command/response channel to BLE radio modules
//!
//! Radio modules in the Bluefruit family are driven by plain-text `AT+...` commands, one per
//! line, and answer with zero or more payload lines terminated by `OK` or `ERROR`. This crate
//! provides the [`AtLink`] trait over that exchange plus feature-gated backends. The default
//! build enables a `mock` backend that simulates a module's GATT table in-process.

mod types;
pub use types::{PortInfo, RawResponse, ReplyStatus, Timestamp};

mod error;
pub use error::{Result, TransportError};

mod traits;
pub use traits::{hex_dashed, AtLink};

#[cfg(feature = "mock")]
mod mock;

#[cfg(feature = "mock")]
pub use mock::MockModule;

#[cfg(feature = "serial")]
mod serial;

#[cfg(feature = "serial")]
pub use serial::SerialLink;
