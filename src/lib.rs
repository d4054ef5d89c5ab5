//! mediastage - bounded execution of external media tools
//!
//! This library crate exposes configuration and the request/response
//! boundary for integration testing.

pub mod config;
pub mod request;
