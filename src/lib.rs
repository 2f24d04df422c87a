//! BOCH dashboard - stoplight health view over the BOCH watch API.

pub mod api;
pub mod config;
pub mod orchestrator;
pub mod policy;
pub mod stats;
pub mod status;
pub mod web;
