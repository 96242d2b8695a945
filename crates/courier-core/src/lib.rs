//! Core types and trait definitions for the courier shipment lifecycle.
//!
//! This crate holds the status catalog, the transition table, the pure
//! lifecycle planner, scan parsing and the reactor contracts. It is free of
//! HTTP and database dependencies; storage backends implement
//! [`store::ShipmentStore`].

// Native `async fn` in trait impls; the trait signatures spell out `Send`.
#![allow(async_fn_in_trait)]

pub mod context;
pub mod engine;
pub mod error;
pub mod lifecycle;
pub mod reactor;
pub mod scan;
pub mod shipment;
pub mod signal;
pub mod status;
pub mod store;
pub mod transition;

pub use error::{AsCoreError, Error, Result};
