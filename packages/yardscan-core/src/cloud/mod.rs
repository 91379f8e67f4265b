//! Submission of completed scan pairs.
//!
//! Provides the HTTP client that posts combined documents to the collection
//! endpoint, and the endpoint configuration it is built from.

mod client;
pub mod config;

pub use client::{CloudClient, SubmitError, SubmitRequest, Submitter};
pub use config::{load_endpoint_config, ConfigSource, EndpointConfig};
