#![doc = "sfdt-core: session resolution and metadata deploy engine for sfdt."]

//! This crate holds the business logic of sfdt: finding the session that belongs to the org a
//! user is viewing, speaking the partner/metadata SOAP dialects, packaging translation changes
//! into a stored ZIP archive and driving the deploy until it settles.
//! Nothing here touches the process environment or the file system; all I/O goes through the
//! traits in [`contract`].
//!
//! # Usage
//! The `sfdt` CLI crate supplies concrete transports and stores; tests use the mockall
//! doubles exported under the `test-export-mocks` feature.

pub mod archive;
pub mod client;
pub mod connection;
pub mod contract;
pub mod credentials;
pub mod deploy;
pub mod error;
pub mod session;
pub mod soap;
pub mod translation;

pub use error::{BridgeError, Result};
