//! Core domain types and utilities for the bpm-dashboard client.
//!
//! This crate provides the foundational types and error handling shared by
//! the identity, API and application crates.

pub mod error;
pub mod id;
pub mod period;

pub use error::Result;
pub use id::DeviceId;
pub use period::{ParsePeriodError, StatisticsPeriod};
