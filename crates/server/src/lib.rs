//! SupportFlow backend: conversation history API with AES-256-GCM field
//! encryption at rest.
//!
//! The binary in `main.rs` wires these modules together; integration tests
//! drive the router built by [`server::router::build`].

pub mod chat;
pub mod config;
pub mod crypto;
pub mod keys;
pub mod server;
pub mod store;
pub mod telemetry;
