//! Core utilities for the Scensei credential and session gateway.
//!
//! This crate provides the error handling foundation shared by the
//! platform-access, integration, and server crates.

pub mod error;

pub use error::Result;
