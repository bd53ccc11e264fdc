//! Terminal dashboard for BPM telemetry.
//!
//! Wires the Session Manager from `bpm-dashboard-identity` to the API
//! client from `bpm-dashboard-api`, and exposes the backend's data
//! endpoints as subcommands.

pub mod app;
pub mod cli;
pub mod config;
pub mod error;
pub mod render;
