//! Management API client for the volume monitor.
//!
//! Signs requests with the profile's key pair and answers the engine's
//! existence question through `listVolumes`. No pagination: lookups are by
//! id.

mod client;
pub mod signing;

pub use client::{ApiError, ClientOptions, CloudStackClient, USER_AGENT};
