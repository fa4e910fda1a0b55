//! Client for the external drug catalog and dose calculation service.
//!
//! The wizard never computes doses itself. This crate describes the three
//! endpoints it consumes, exposes them behind the [`DoseApi`] trait, and ships
//! an HTTP implementation plus a scripted mock for tests and demos.

pub mod client;
pub mod error;
pub mod mock;
pub mod service;
pub mod types;

pub use client::*;
pub use error::*;
pub use mock::*;
pub use service::*;
pub use types::*;
