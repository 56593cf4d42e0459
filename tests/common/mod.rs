//! Integration test common infrastructure.
//!
//! Provides a synthetic all-CRDTs entity and a test proxy that drives a
//! stream runner over in-process channels, mirroring how the platform proxy
//! dials into a user function.

pub mod entity;
pub mod proxy;

#[allow(unused_imports)]
pub use entity::{synthetic_server, SERVICE_NAME};
#[allow(unused_imports)]
pub use proxy::{decode_payload, reply_payload, TestProxy};
