//! Shared data model, error kinds, and the request fingerprint used by every
//! other `gateway-*` crate. No I/O lives here.

pub mod error;
pub mod family;
pub mod fingerprint;
pub mod model;

pub use error::GatewayError;
pub use family::ArrayFamily;
pub use fingerprint::Fingerprint;
