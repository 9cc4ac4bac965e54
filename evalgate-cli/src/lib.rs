//! Command line client for the execution gateway.

pub mod api_client;
pub mod config;
